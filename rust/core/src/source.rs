// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! The `GeometrySource` capability and its variants.
//!
//! A dataset reads and writes features through one source chosen when it is
//! opened: the native store (full read/write) or an external, read-only
//! feature set produced by an importer. Write-path calls on an external
//! source fail with [`Error::ReadOnly`].

use crate::error::{Error, Result};
use crate::feature::{Feature, LineType};
use crate::keys::LineId;
use crate::store::NativeStore;

/// Which kind of backend a source is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceKind {
    Native,
    External,
}

impl SourceKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SourceKind::Native => "native",
            SourceKind::External => "external",
        }
    }
}

impl std::fmt::Display for SourceKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Feature storage keyed by line id.
pub trait GeometrySource {
    fn kind(&self) -> SourceKind;

    fn with_z(&self) -> bool;

    /// Highest id ever allocated (alive or dead); 0 when empty.
    fn max_line_id(&self) -> u32;

    fn is_alive(&self, id: LineId) -> bool;

    /// Reads a live feature.
    fn read(&self, id: LineId) -> Result<Feature>;

    /// Appends a feature and returns its new id.
    fn write(&mut self, feature: &Feature) -> Result<LineId>;

    /// Replaces the feature stored under `id`. The id never changes.
    fn rewrite(&mut self, id: LineId, feature: &Feature) -> Result<LineId>;

    /// Tombstones a live feature.
    fn delete(&mut self, id: LineId) -> Result<()>;

    /// Revives a tombstoned feature.
    fn restore(&mut self, id: LineId) -> Result<()>;

    /// Pushes buffered changes to durable storage.
    fn flush(&mut self) -> Result<()>;

    /// Size of the stored body, used to stamp derived files.
    fn body_size(&self) -> u64;

    /// Type of a live feature.
    fn read_kind(&self, id: LineId) -> Result<LineType> {
        self.read(id).map(|f| f.kind)
    }

    /// Ids of all live features in ascending order.
    fn live_ids(&self) -> Vec<LineId> {
        (1..=self.max_line_id())
            .filter_map(LineId::new)
            .filter(|&id| self.is_alive(id))
            .collect()
    }

    fn alive_count(&self) -> usize {
        self.live_ids().len()
    }
}

/// Checks the shape rules shared by all writable sources.
pub fn validate_feature(feature: &Feature) -> Result<()> {
    let n = feature.points.len();
    if n == 0 {
        return Err(Error::EmptyGeometry);
    }
    if feature.kind.is_point_class() && n != 1 {
        return Err(Error::PointCount {
            kind: feature.kind,
            count: n,
        });
    }
    Ok(())
}

// =============================================================================
// External (read-only) features
// =============================================================================

/// Features supplied by an external reader. Ids are positions + 1.
#[derive(Debug, Clone, Default)]
pub struct ExternalSource {
    features: Vec<Feature>,
    with_z: bool,
}

impl ExternalSource {
    pub fn new(features: Vec<Feature>, with_z: bool) -> Self {
        Self { features, with_z }
    }

    fn get(&self, id: LineId) -> Result<&Feature> {
        self.features
            .get(id.get() as usize - 1)
            .ok_or(Error::InvalidLine(id))
    }
}

impl GeometrySource for ExternalSource {
    fn kind(&self) -> SourceKind {
        SourceKind::External
    }

    fn with_z(&self) -> bool {
        self.with_z
    }

    fn max_line_id(&self) -> u32 {
        self.features.len() as u32
    }

    fn is_alive(&self, id: LineId) -> bool {
        (id.get() as usize) <= self.features.len()
    }

    fn read(&self, id: LineId) -> Result<Feature> {
        self.get(id).cloned()
    }

    fn read_kind(&self, id: LineId) -> Result<LineType> {
        self.get(id).map(|f| f.kind)
    }

    fn write(&mut self, _feature: &Feature) -> Result<LineId> {
        Err(Error::ReadOnly(SourceKind::External))
    }

    fn rewrite(&mut self, _id: LineId, _feature: &Feature) -> Result<LineId> {
        Err(Error::ReadOnly(SourceKind::External))
    }

    fn delete(&mut self, _id: LineId) -> Result<()> {
        Err(Error::ReadOnly(SourceKind::External))
    }

    fn restore(&mut self, _id: LineId) -> Result<()> {
        Err(Error::ReadOnly(SourceKind::External))
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }

    fn body_size(&self) -> u64 {
        self.features.len() as u64
    }
}

// =============================================================================
// Tagged variants
// =============================================================================

/// Source selected at open time.
#[derive(Debug)]
pub enum Source {
    Native(NativeStore),
    External(ExternalSource),
}

impl Source {
    fn inner(&self) -> &dyn GeometrySource {
        match self {
            Source::Native(s) => s,
            Source::External(s) => s,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn GeometrySource {
        match self {
            Source::Native(s) => s,
            Source::External(s) => s,
        }
    }

    pub fn as_native(&self) -> Option<&NativeStore> {
        match self {
            Source::Native(s) => Some(s),
            Source::External(_) => None,
        }
    }
}

impl GeometrySource for Source {
    fn kind(&self) -> SourceKind {
        self.inner().kind()
    }

    fn with_z(&self) -> bool {
        self.inner().with_z()
    }

    fn max_line_id(&self) -> u32 {
        self.inner().max_line_id()
    }

    fn is_alive(&self, id: LineId) -> bool {
        self.inner().is_alive(id)
    }

    fn read(&self, id: LineId) -> Result<Feature> {
        self.inner().read(id)
    }

    fn read_kind(&self, id: LineId) -> Result<LineType> {
        self.inner().read_kind(id)
    }

    fn write(&mut self, feature: &Feature) -> Result<LineId> {
        self.inner_mut().write(feature)
    }

    fn rewrite(&mut self, id: LineId, feature: &Feature) -> Result<LineId> {
        self.inner_mut().rewrite(id, feature)
    }

    fn delete(&mut self, id: LineId) -> Result<()> {
        self.inner_mut().delete(id)
    }

    fn restore(&mut self, id: LineId) -> Result<()> {
        self.inner_mut().restore(id)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner_mut().flush()
    }

    fn body_size(&self) -> u64 {
        self.inner().body_size()
    }

    fn live_ids(&self) -> Vec<LineId> {
        self.inner().live_ids()
    }
}

impl From<NativeStore> for Source {
    fn from(s: NativeStore) -> Self {
        Source::Native(s)
    }
}

impl From<ExternalSource> for Source {
    fn from(s: ExternalSource) -> Self {
        Source::External(s)
    }
}
