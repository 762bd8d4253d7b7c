// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Native geometry store.
//!
//! Records are appended to a body that follows a fixed header. The whole
//! file image is mirrored in memory so reads need no file handle; every
//! change is applied to the image and, for file-backed stores, written to
//! the same offset on disk together with the updated header.
//!
//! Deleting clears the alive bit in place. Rewriting reuses the record slot
//! when the new record fits its capacity, otherwise the old slot is
//! tombstoned and a new record is appended under the same id. Dead records
//! are never reclaimed.

use std::fs::{File, OpenOptions};
use std::io::{Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::feature::{Feature, LineType};
use crate::format::{self, ByteOrderTag, Header};
use crate::keys::LineId;
use crate::source::{validate_feature, GeometrySource, SourceKind};

/// Location of the current record of a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct RecordSlot {
    offset: u64,
    capacity: u32,
    kind: LineType,
    alive: bool,
}

/// Append-only feature store in the native record format.
#[derive(Debug)]
pub struct NativeStore {
    path: Option<PathBuf>,
    file: Option<File>,
    writable: bool,
    header: Header,
    image: Vec<u8>,
    /// Index = line id; slot 0 unused.
    slots: Vec<Option<RecordSlot>>,
    alive: usize,
}

impl NativeStore {
    /// Memory-only store, lost when dropped.
    pub fn in_memory(byte_order: ByteOrderTag, with_z: bool) -> Self {
        let header = Header::new(byte_order, with_z);
        Self {
            path: None,
            file: None,
            writable: true,
            image: header.encode(),
            header,
            slots: vec![None],
            alive: 0,
        }
    }

    /// Creates (or truncates) a store file.
    pub fn create(path: impl AsRef<Path>, byte_order: ByteOrderTag, with_z: bool) -> Result<Self> {
        let path = path.as_ref();
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut store = Self::in_memory(byte_order, with_z);
        file.write_all(&store.image)?;
        store.file = Some(file);
        store.path = Some(path.to_path_buf());
        debug!(path = %path.display(), ?byte_order, with_z, "created geometry store");
        Ok(store)
    }

    /// Opens an existing store file and indexes its records.
    pub fn open(path: impl AsRef<Path>, writable: bool) -> Result<Self> {
        let path = path.as_ref();
        let image = std::fs::read(path)?;
        let header = Header::decode(&image)?;
        let file = if writable {
            Some(OpenOptions::new().read(true).write(true).open(path)?)
        } else {
            None
        };
        let mut store = Self {
            path: Some(path.to_path_buf()),
            file,
            writable,
            header,
            image,
            slots: vec![None],
            alive: 0,
        };
        store.scan()?;
        debug!(
            path = %path.display(),
            lines = store.max_line_id(),
            alive = store.alive,
            "opened geometry store"
        );
        Ok(store)
    }

    pub fn header(&self) -> &Header {
        &self.header
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn byte_order(&self) -> ByteOrderTag {
        self.header.byte_order
    }

    /// Offset of the current record of `id`.
    pub fn record_offset(&self, id: LineId) -> Result<u64> {
        self.slot(id).map(|s| s.offset)
    }

    fn body_end(&self) -> u64 {
        u64::from(self.header.header_size) + self.header.body_size
    }

    fn scan(&mut self) -> Result<()> {
        let end = self.body_end();
        if (self.image.len() as u64) < end {
            return Err(Error::corrupt(
                self.image.len() as u64,
                format!("body truncated, header promises {end} bytes"),
            ));
        }
        if (self.image.len() as u64) > end {
            warn!(
                expected = end,
                actual = self.image.len(),
                "ignoring bytes past the recorded body size"
            );
            self.image.truncate(end as usize);
        }

        let order = self.header.byte_order;
        let mut offset = u64::from(self.header.header_size);
        while offset < end {
            let head = format::decode_head(order, &self.image, offset)?;
            if offset + u64::from(head.capacity) > end {
                return Err(Error::corrupt(offset, "record extends past body"));
            }
            let idx = head.id.get() as usize;
            if idx >= self.slots.len() {
                self.slots.resize(idx + 1, None);
            }
            // A relocated line leaves a dead record behind; the later record wins.
            if let Some(prev) = self.slots[idx] {
                if prev.alive {
                    if head.alive {
                        return Err(Error::corrupt(offset, format!("{} stored twice", head.id)));
                    }
                    offset += u64::from(head.capacity);
                    continue;
                }
            }
            self.slots[idx] = Some(RecordSlot {
                offset,
                capacity: head.capacity,
                kind: head.kind,
                alive: head.alive,
            });
            offset += u64::from(head.capacity);
        }
        // Ids are allocated contiguously; a gap means lost records.
        if let Some(missing) = self.slots.iter().skip(1).position(Option::is_none) {
            return Err(Error::corrupt(
                end,
                format!("no record for line {}", missing + 1),
            ));
        }
        self.alive = self.slots.iter().flatten().filter(|s| s.alive).count();
        Ok(())
    }

    fn slot(&self, id: LineId) -> Result<RecordSlot> {
        self.slots
            .get(id.get() as usize)
            .copied()
            .flatten()
            .ok_or(Error::InvalidLine(id))
    }

    fn live_slot(&self, id: LineId) -> Result<RecordSlot> {
        let slot = self.slot(id)?;
        if slot.alive {
            Ok(slot)
        } else {
            Err(Error::DeadLine(id))
        }
    }

    fn ensure_writable(&self) -> Result<()> {
        if self.writable {
            Ok(())
        } else {
            Err(Error::ReadOnly(SourceKind::Native))
        }
    }

    fn append(&mut self, id: LineId, feature: &Feature) -> Result<RecordSlot> {
        let size = format::record_size(feature, self.header.with_z);
        let bytes = format::encode_record(self.header.byte_order, id, feature, size, self.header.with_z)?;
        let offset = self.body_end();
        self.image.extend_from_slice(&bytes);
        self.header.body_size += bytes.len() as u64;
        self.persist(offset, bytes.len())?;
        self.persist_header()?;
        Ok(RecordSlot {
            offset,
            capacity: bytes.len() as u32,
            kind: feature.kind,
            alive: true,
        })
    }

    fn set_alive(&mut self, id: LineId, alive: bool) -> Result<()> {
        let mut slot = self.slot(id)?;
        format::set_alive(&mut self.image, slot.offset, alive)?;
        self.persist(slot.offset, 1)?;
        slot.alive = alive;
        self.slots[id.get() as usize] = Some(slot);
        Ok(())
    }

    fn persist(&mut self, offset: u64, len: usize) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            let start = offset as usize;
            file.seek(SeekFrom::Start(offset))?;
            file.write_all(&self.image[start..start + len])?;
        }
        Ok(())
    }

    fn persist_header(&mut self) -> Result<()> {
        let bytes = self.header.encode();
        self.image[..bytes.len()].copy_from_slice(&bytes);
        self.persist(0, bytes.len())
    }
}

impl GeometrySource for NativeStore {
    fn kind(&self) -> SourceKind {
        SourceKind::Native
    }

    fn with_z(&self) -> bool {
        self.header.with_z
    }

    fn max_line_id(&self) -> u32 {
        (self.slots.len() - 1) as u32
    }

    fn is_alive(&self, id: LineId) -> bool {
        self.slot(id).map(|s| s.alive).unwrap_or(false)
    }

    fn read(&self, id: LineId) -> Result<Feature> {
        let slot = self.live_slot(id)?;
        let (head, feature) =
            format::decode_record(self.header.byte_order, &self.image, slot.offset, self.header.with_z)?;
        if head.id != id {
            return Err(Error::corrupt(
                slot.offset,
                format!("expected {id}, found {}", head.id),
            ));
        }
        Ok(feature)
    }

    fn read_kind(&self, id: LineId) -> Result<LineType> {
        self.live_slot(id).map(|s| s.kind)
    }

    fn write(&mut self, feature: &Feature) -> Result<LineId> {
        self.ensure_writable()?;
        validate_feature(feature)?;
        let id = LineId::new(self.slots.len() as u32)
            .ok_or_else(|| Error::corrupt(self.body_end(), "line id overflow"))?;
        let slot = self.append(id, feature)?;
        self.slots.push(Some(slot));
        self.alive += 1;
        debug!(%id, kind = %feature.kind, offset = slot.offset, "wrote line");
        Ok(id)
    }

    fn rewrite(&mut self, id: LineId, feature: &Feature) -> Result<LineId> {
        self.ensure_writable()?;
        let old = self.live_slot(id)?;
        validate_feature(feature)?;

        let size = format::record_size(feature, self.header.with_z);
        if size <= old.capacity as usize {
            let bytes = format::encode_record(
                self.header.byte_order,
                id,
                feature,
                old.capacity as usize,
                self.header.with_z,
            )?;
            let start = old.offset as usize;
            self.image[start..start + bytes.len()].copy_from_slice(&bytes);
            self.persist(old.offset, bytes.len())?;
            self.slots[id.get() as usize] = Some(RecordSlot {
                kind: feature.kind,
                ..old
            });
            debug!(%id, offset = old.offset, "rewrote line in place");
        } else {
            format::set_alive(&mut self.image, old.offset, false)?;
            self.persist(old.offset, 1)?;
            let slot = self.append(id, feature)?;
            self.slots[id.get() as usize] = Some(slot);
            debug!(%id, from = old.offset, to = slot.offset, "relocated line");
        }
        Ok(id)
    }

    fn delete(&mut self, id: LineId) -> Result<()> {
        self.ensure_writable()?;
        self.live_slot(id)?;
        self.set_alive(id, false)?;
        self.alive -= 1;
        debug!(%id, "deleted line");
        Ok(())
    }

    fn restore(&mut self, id: LineId) -> Result<()> {
        self.ensure_writable()?;
        if self.slot(id)?.alive {
            return Err(Error::AliveLine(id));
        }
        self.set_alive(id, true)?;
        self.alive += 1;
        debug!(%id, "restored line");
        Ok(())
    }

    fn flush(&mut self) -> Result<()> {
        if let Some(file) = self.file.as_mut() {
            file.flush()?;
            file.sync_data()?;
        }
        Ok(())
    }

    fn body_size(&self) -> u64 {
        self.header.body_size
    }

    fn alive_count(&self) -> usize {
        self.alive
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feature::Categories;
    use crate::points::LinePoints;
    use approx::assert_relative_eq;

    fn line(coords: &[(f64, f64)]) -> Feature {
        Feature::new(LineType::Line, LinePoints::from_xy(coords), Categories::single(1, 3))
    }

    #[test]
    fn ids_are_monotonic() {
        let mut store = NativeStore::in_memory(ByteOrderTag::Little, false);
        let a = store.write(&line(&[(0.0, 0.0), (1.0, 1.0)])).unwrap();
        let b = store.write(&line(&[(1.0, 1.0), (2.0, 0.0)])).unwrap();
        assert_eq!(a.get(), 1);
        assert_eq!(b.get(), 2);
        store.delete(a).unwrap();
        let c = store.write(&line(&[(5.0, 5.0), (6.0, 6.0)])).unwrap();
        assert_eq!(c.get(), 3);
        assert_eq!(store.alive_count(), 2);
        assert_eq!(store.live_ids(), vec![b, c]);
    }

    #[test]
    fn read_dead_and_unknown_lines() {
        let mut store = NativeStore::in_memory(ByteOrderTag::Little, false);
        let id = store.write(&line(&[(0.0, 0.0), (1.0, 1.0)])).unwrap();
        store.delete(id).unwrap();
        assert!(matches!(store.read(id), Err(Error::DeadLine(_))));
        assert!(matches!(store.delete(id), Err(Error::DeadLine(_))));
        let unknown = LineId::new(99).unwrap();
        assert!(matches!(store.read(unknown), Err(Error::InvalidLine(_))));
    }

    #[test]
    fn rewrite_in_place_when_smaller() {
        let mut store = NativeStore::in_memory(ByteOrderTag::Little, false);
        let id = store
            .write(&line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 2.0)]))
            .unwrap();
        let before = store.record_offset(id).unwrap();
        let body = store.body_size();
        store.rewrite(id, &line(&[(5.0, 5.0), (6.0, 6.0)])).unwrap();
        assert_eq!(store.record_offset(id).unwrap(), before);
        assert_eq!(store.body_size(), body);
        let f = store.read(id).unwrap();
        assert_eq!(f.points.len(), 2);
        assert_relative_eq!(f.points.points()[1].x, 6.0);
    }

    #[test]
    fn rewrite_relocates_when_larger() {
        let mut store = NativeStore::in_memory(ByteOrderTag::Big, false);
        let id = store.write(&line(&[(0.0, 0.0), (1.0, 1.0)])).unwrap();
        let before = store.record_offset(id).unwrap();
        let bigger = line(&[(0.0, 0.0), (1.0, 1.0), (2.0, 0.0), (3.0, 1.0)]);
        assert_eq!(store.rewrite(id, &bigger).unwrap(), id);
        assert!(store.record_offset(id).unwrap() > before);
        assert_eq!(store.read(id).unwrap(), bigger);
        assert_eq!(store.max_line_id(), 1);
    }

    #[test]
    fn restore_revives_dead_line() {
        let mut store = NativeStore::in_memory(ByteOrderTag::Little, false);
        let id = store.write(&line(&[(0.0, 0.0), (1.0, 1.0)])).unwrap();
        assert!(matches!(store.restore(id), Err(Error::AliveLine(_))));
        store.delete(id).unwrap();
        store.restore(id).unwrap();
        assert!(store.is_alive(id));
        assert_eq!(store.read(id).unwrap().points.len(), 2);
    }

    #[test]
    fn empty_geometry_is_recoverable() {
        let mut store = NativeStore::in_memory(ByteOrderTag::Little, false);
        let err = store
            .write(&Feature::new(LineType::Line, LinePoints::new(), Categories::new()))
            .unwrap_err();
        assert!(err.is_recoverable());
        assert_eq!(store.max_line_id(), 0);
    }

    #[test]
    fn file_store_reopens_with_same_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coor");
        let (a, b) = {
            let mut store = NativeStore::create(&path, ByteOrderTag::Big, true).unwrap();
            let a = store.write(&line(&[(0.0, 0.0), (1.0, 1.0)])).unwrap();
            let b = store.write(&line(&[(1.0, 1.0), (2.0, 0.0)])).unwrap();
            store
                .rewrite(a, &line(&[(0.0, 0.0), (0.5, 2.0), (1.0, 1.0)]))
                .unwrap();
            store.delete(b).unwrap();
            store.flush().unwrap();
            (a, b)
        };

        let store = NativeStore::open(&path, false).unwrap();
        assert_eq!(store.byte_order(), ByteOrderTag::Big);
        assert!(store.with_z());
        assert_eq!(store.max_line_id(), 2);
        assert!(!store.is_alive(b));
        assert_eq!(store.read(a).unwrap().points.len(), 3);
        assert_eq!(store.alive_count(), 1);
    }

    #[test]
    fn read_only_store_rejects_writes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("coor");
        NativeStore::create(&path, ByteOrderTag::Little, false).unwrap();
        let mut store = NativeStore::open(&path, false).unwrap();
        assert!(matches!(
            store.write(&line(&[(0.0, 0.0), (1.0, 0.0)])),
            Err(Error::ReadOnly(SourceKind::Native))
        ));
    }
}
