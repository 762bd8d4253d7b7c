// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Binary layout of the geometry (`coor`) file.
//!
//! ```text
//! header (24 bytes)
//!   0..4    magic "VCOR"
//!   4, 5    format version major, minor
//!   6, 7    oldest compatible version major, minor
//!   8       byte order tag (0 little, 1 big)
//!   9       with-z flag
//!   10..12  header size (u16)
//!   12..20  body size (u64)
//!   20..24  reserved
//! record
//!   rhead u8: bit 0 alive, bit 1 has categories, bits 2-4 type code
//!   capacity u32: bytes reserved for the record, including this head
//!   line id u32
//!   [n_cats u32, layers i32 * n, cats i32 * n]   if has categories
//!   [n_points u32]                               unless point-class type
//!   x f64 * n, y f64 * n, [z f64 * n]            z only if with-z
//! ```
//!
//! Every multi-byte field uses the byte order named in the header. Readers
//! decode according to that tag, never the host order.

use std::io::{self, Cursor};

use byteorder::{BigEndian, ByteOrder, LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::feature::{Categories, Feature, LineType};
use crate::keys::LineId;
use crate::points::LinePoints;

pub const MAGIC: [u8; 4] = *b"VCOR";
pub const VERSION_MAJOR: u8 = 1;
pub const VERSION_MINOR: u8 = 0;
pub const BACK_MAJOR: u8 = 1;
pub const BACK_MINOR: u8 = 0;
pub const HEADER_SIZE: usize = 24;

/// Fixed part of every record: rhead, capacity, line id.
pub const RECORD_HEAD_SIZE: usize = 9;

const RHEAD_ALIVE: u8 = 0x01;
const RHEAD_CATS: u8 = 0x02;
const RHEAD_TYPE_SHIFT: u8 = 2;
const RHEAD_TYPE_MASK: u8 = 0x1C;

/// Byte order tag stored in the header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ByteOrderTag {
    #[default]
    Little,
    Big,
}

impl ByteOrderTag {
    pub fn native() -> Self {
        if cfg!(target_endian = "big") {
            ByteOrderTag::Big
        } else {
            ByteOrderTag::Little
        }
    }

    fn code(self) -> u8 {
        match self {
            ByteOrderTag::Little => 0,
            ByteOrderTag::Big => 1,
        }
    }

    fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(ByteOrderTag::Little),
            1 => Some(ByteOrderTag::Big),
            _ => None,
        }
    }
}

impl std::str::FromStr for ByteOrderTag {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "little" | "le" => Ok(ByteOrderTag::Little),
            "big" | "be" => Ok(ByteOrderTag::Big),
            "native" => Ok(ByteOrderTag::native()),
            other => Err(format!("unknown byte order '{other}'")),
        }
    }
}

// =============================================================================
// Header
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub version: (u8, u8),
    pub back_version: (u8, u8),
    pub byte_order: ByteOrderTag,
    pub with_z: bool,
    pub header_size: u16,
    pub body_size: u64,
}

impl Header {
    pub fn new(byte_order: ByteOrderTag, with_z: bool) -> Self {
        Self {
            version: (VERSION_MAJOR, VERSION_MINOR),
            back_version: (BACK_MAJOR, BACK_MINOR),
            byte_order,
            with_z,
            header_size: HEADER_SIZE as u16,
            body_size: 0,
        }
    }

    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE);
        out.extend_from_slice(&MAGIC);
        out.extend_from_slice(&[
            self.version.0,
            self.version.1,
            self.back_version.0,
            self.back_version.1,
            self.byte_order.code(),
            u8::from(self.with_z),
        ]);
        let mut tail = [0u8; 10];
        match self.byte_order {
            ByteOrderTag::Little => {
                LittleEndian::write_u16(&mut tail[0..2], self.header_size);
                LittleEndian::write_u64(&mut tail[2..10], self.body_size);
            }
            ByteOrderTag::Big => {
                BigEndian::write_u16(&mut tail[0..2], self.header_size);
                BigEndian::write_u64(&mut tail[2..10], self.body_size);
            }
        }
        out.extend_from_slice(&tail);
        out.resize(self.header_size as usize, 0);
        out
    }

    pub fn decode(buf: &[u8]) -> Result<Header> {
        if buf.len() < HEADER_SIZE {
            return Err(Error::corrupt(0, "truncated header"));
        }
        if buf[0..4] != MAGIC {
            return Err(Error::BadMagic);
        }
        let version = (buf[4], buf[5]);
        let back_version = (buf[6], buf[7]);
        if back_version > (VERSION_MAJOR, VERSION_MINOR) {
            return Err(Error::UnsupportedVersion {
                major: version.0,
                minor: version.1,
            });
        }
        let byte_order = ByteOrderTag::from_code(buf[8])
            .ok_or_else(|| Error::corrupt(8, format!("unknown byte order tag {}", buf[8])))?;
        let with_z = match buf[9] {
            0 => false,
            1 => true,
            other => return Err(Error::corrupt(9, format!("bad with-z flag {other}"))),
        };
        let (header_size, body_size) = match byte_order {
            ByteOrderTag::Little => (
                LittleEndian::read_u16(&buf[10..12]),
                LittleEndian::read_u64(&buf[12..20]),
            ),
            ByteOrderTag::Big => (
                BigEndian::read_u16(&buf[10..12]),
                BigEndian::read_u64(&buf[12..20]),
            ),
        };
        if (header_size as usize) < HEADER_SIZE {
            return Err(Error::corrupt(10, format!("header size {header_size} too small")));
        }
        Ok(Header {
            version,
            back_version,
            byte_order,
            with_z,
            header_size,
            body_size,
        })
    }
}

// =============================================================================
// Records
// =============================================================================

/// Decoded fixed part of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordHead {
    pub alive: bool,
    pub has_cats: bool,
    pub kind: LineType,
    pub capacity: u32,
    pub id: LineId,
}

/// Bytes needed to encode `feature`.
pub fn record_size(feature: &Feature, with_z: bool) -> usize {
    let n = feature.points.len();
    let mut size = RECORD_HEAD_SIZE;
    if !feature.cats.is_empty() {
        size += 4 + 8 * feature.cats.len();
    }
    if !feature.kind.is_point_class() {
        size += 4;
    }
    size + n * 8 * if with_z { 3 } else { 2 }
}

/// Encodes a live record padded to `capacity` bytes.
pub fn encode_record(
    order: ByteOrderTag,
    id: LineId,
    feature: &Feature,
    capacity: usize,
    with_z: bool,
) -> Result<Vec<u8>> {
    let size = record_size(feature, with_z);
    debug_assert!(capacity >= size);
    let capacity = capacity.max(size);
    let capacity_u32 = u32::try_from(capacity)
        .map_err(|_| Error::corrupt(0, format!("record of {capacity} bytes is too large")))?;

    let mut out = Vec::with_capacity(capacity);
    match order {
        ByteOrderTag::Little => {
            write_record::<LittleEndian>(&mut out, id, feature, capacity_u32, with_z)?
        }
        ByteOrderTag::Big => write_record::<BigEndian>(&mut out, id, feature, capacity_u32, with_z)?,
    }
    out.resize(capacity, 0);
    Ok(out)
}

fn write_record<B: ByteOrder>(
    out: &mut Vec<u8>,
    id: LineId,
    feature: &Feature,
    capacity: u32,
    with_z: bool,
) -> io::Result<()> {
    let mut rhead = RHEAD_ALIVE | (feature.kind.store_code() << RHEAD_TYPE_SHIFT);
    if !feature.cats.is_empty() {
        rhead |= RHEAD_CATS;
    }
    out.write_u8(rhead)?;
    out.write_u32::<B>(capacity)?;
    out.write_u32::<B>(id.get())?;

    if !feature.cats.is_empty() {
        out.write_u32::<B>(feature.cats.len() as u32)?;
        for c in feature.cats.iter() {
            out.write_i32::<B>(c.layer)?;
        }
        for c in feature.cats.iter() {
            out.write_i32::<B>(c.cat)?;
        }
    }

    let pts = feature.points.points();
    if !feature.kind.is_point_class() {
        out.write_u32::<B>(pts.len() as u32)?;
    }
    for p in pts {
        out.write_f64::<B>(p.x)?;
    }
    for p in pts {
        out.write_f64::<B>(p.y)?;
    }
    if with_z {
        for p in pts {
            out.write_f64::<B>(p.z)?;
        }
    }
    Ok(())
}

/// Decodes only the fixed part of the record starting at `offset`.
pub fn decode_head(order: ByteOrderTag, buf: &[u8], offset: u64) -> Result<RecordHead> {
    let start = usize::try_from(offset).map_err(|_| Error::corrupt(offset, "offset overflow"))?;
    let slice = buf
        .get(start..)
        .filter(|s| s.len() >= RECORD_HEAD_SIZE)
        .ok_or_else(|| Error::corrupt(offset, "truncated record head"))?;
    let mut cur = Cursor::new(slice);
    let head = match order {
        ByteOrderTag::Little => read_head::<LittleEndian>(&mut cur),
        ByteOrderTag::Big => read_head::<BigEndian>(&mut cur),
    };
    head.map_err(|e| Error::corrupt(offset, e.to_string()))?
        .ok_or_else(|| Error::corrupt(offset, "invalid record head"))
}

fn read_head<B: ByteOrder>(cur: &mut Cursor<&[u8]>) -> io::Result<Option<RecordHead>> {
    let rhead = cur.read_u8()?;
    let capacity = cur.read_u32::<B>()?;
    let raw_id = cur.read_u32::<B>()?;
    let kind = LineType::from_store_code((rhead & RHEAD_TYPE_MASK) >> RHEAD_TYPE_SHIFT);
    let id = LineId::new(raw_id);
    Ok(match (kind, id) {
        (Some(kind), Some(id)) if capacity as usize >= RECORD_HEAD_SIZE => Some(RecordHead {
            alive: rhead & RHEAD_ALIVE != 0,
            has_cats: rhead & RHEAD_CATS != 0,
            kind,
            capacity,
            id,
        }),
        _ => None,
    })
}

/// Decodes the full record starting at `offset`.
pub fn decode_record(
    order: ByteOrderTag,
    buf: &[u8],
    offset: u64,
    with_z: bool,
) -> Result<(RecordHead, Feature)> {
    let head = decode_head(order, buf, offset)?;
    let start = offset as usize;
    let end = start + head.capacity as usize;
    let body = buf
        .get(start + RECORD_HEAD_SIZE..end)
        .ok_or_else(|| Error::corrupt(offset, "record extends past end of file"))?;
    let mut cur = Cursor::new(body);
    let feature = match order {
        ByteOrderTag::Little => read_body::<LittleEndian>(&mut cur, &head, with_z),
        ByteOrderTag::Big => read_body::<BigEndian>(&mut cur, &head, with_z),
    }
    .map_err(|e| Error::corrupt(offset, e.to_string()))?;
    Ok((head, feature))
}

fn read_body<B: ByteOrder>(
    cur: &mut Cursor<&[u8]>,
    head: &RecordHead,
    with_z: bool,
) -> io::Result<Feature> {
    let remaining = |cur: &Cursor<&[u8]>| cur.get_ref().len() as u64 - cur.position();

    let mut cats = Categories::new();
    if head.has_cats {
        let n = cur.read_u32::<B>()? as u64;
        if n * 8 > remaining(cur) {
            return Err(io::Error::new(io::ErrorKind::InvalidData, "category count exceeds record"));
        }
        let layers = (0..n).map(|_| cur.read_i32::<B>()).collect::<io::Result<Vec<_>>>()?;
        for layer in layers {
            let cat = cur.read_i32::<B>()?;
            cats.add(layer, cat);
        }
    }

    let n = if head.kind.is_point_class() {
        1
    } else {
        cur.read_u32::<B>()? as u64
    };
    let dims = if with_z { 3 } else { 2 };
    if n == 0 || n * 8 * dims > remaining(cur) {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "bad point count"));
    }
    let n = n as usize;
    let xs = (0..n).map(|_| cur.read_f64::<B>()).collect::<io::Result<Vec<_>>>()?;
    let ys = (0..n).map(|_| cur.read_f64::<B>()).collect::<io::Result<Vec<_>>>()?;
    let zs = if with_z {
        (0..n).map(|_| cur.read_f64::<B>()).collect::<io::Result<Vec<_>>>()?
    } else {
        vec![0.0; n]
    };

    let mut points = LinePoints::with_capacity(n);
    for i in 0..n {
        points.push(xs[i], ys[i], zs[i]);
    }
    Ok(Feature::new(head.kind, points, cats))
}

/// Rewrites the alive bit of the record head at `offset` in place.
pub fn set_alive(buf: &mut [u8], offset: u64, alive: bool) -> Result<()> {
    let byte = buf
        .get_mut(offset as usize)
        .ok_or_else(|| Error::corrupt(offset, "record offset past end of file"))?;
    if alive {
        *byte |= RHEAD_ALIVE;
    } else {
        *byte &= !RHEAD_ALIVE;
    }
    Ok(())
}
