// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Integer id types for vector entities.
//!
//! Every entity is addressed by a positive integer id that stays valid for
//! the lifetime of the dataset: slots are tombstoned on removal and never
//! reused. Ids start at 1; 0 is reserved for "no entity" in the persisted
//! integer encodings.

use serde::{Deserialize, Serialize};

macro_rules! entity_id {
    ($(#[$meta:meta])* $name:ident, $label:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(u32);

        impl $name {
            /// Wraps a raw id. Returns `None` for 0.
            #[inline]
            pub fn new(raw: u32) -> Option<Self> {
                (raw > 0).then_some(Self(raw))
            }

            /// The raw id as stored on disk.
            #[inline]
            pub fn get(self) -> u32 {
                self.0
            }

            #[inline]
            pub(crate) fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, concat!($label, " {}"), self.0)
            }
        }
    };
}

entity_id!(
    /// Id of a feature (point, centroid, line, boundary, face or kernel).
    LineId,
    "line"
);
entity_id!(
    /// Id of a topology node.
    NodeId,
    "node"
);
entity_id!(
    /// Id of an area (closed region with an outer ring).
    AreaId,
    "area"
);
entity_id!(
    /// Id of an isle (hole ring inside an area or the universe).
    IsleId,
    "isle"
);

/// Slot index used by arena containers in dependent crates.
pub trait SlotId: Copy + Eq + std::hash::Hash + Ord {
    fn from_slot(slot: usize) -> Self;
    fn slot(self) -> usize;
}

macro_rules! slot_id {
    ($($name:ident),*) => {$(
        impl SlotId for $name {
            #[inline]
            fn from_slot(slot: usize) -> Self {
                debug_assert!(slot > 0 && slot <= u32::MAX as usize);
                Self(slot as u32)
            }

            #[inline]
            fn slot(self) -> usize {
                self.index()
            }
        }
    )*};
}

slot_id!(LineId, NodeId, AreaId, IsleId);

/// A line traversed in a given direction.
///
/// In a node's incidence list `forward` means the line starts at that node
/// and `!forward` means it ends there. In an area or isle ring `forward`
/// means the line is walked from its first to its last point. The signed
/// integer encoding (`+id` / `-id`) is kept for persistence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub struct DirectedLineRef {
    pub id: LineId,
    pub forward: bool,
}

impl DirectedLineRef {
    #[inline]
    pub fn forward(id: LineId) -> Self {
        Self { id, forward: true }
    }

    #[inline]
    pub fn backward(id: LineId) -> Self {
        Self { id, forward: false }
    }

    /// The same line walked the other way.
    #[inline]
    pub fn reversed(self) -> Self {
        Self {
            id: self.id,
            forward: !self.forward,
        }
    }

    pub fn to_signed(self) -> i64 {
        let raw = i64::from(self.id.get());
        if self.forward {
            raw
        } else {
            -raw
        }
    }

    /// Decodes `+id` / `-id`. Returns `None` for 0 or out-of-range values.
    pub fn from_signed(value: i64) -> Option<Self> {
        let raw = u32::try_from(value.unsigned_abs()).ok()?;
        let id = LineId::new(raw)?;
        Some(Self {
            id,
            forward: value > 0,
        })
    }
}

impl From<DirectedLineRef> for i64 {
    fn from(r: DirectedLineRef) -> Self {
        r.to_signed()
    }
}

impl TryFrom<i64> for DirectedLineRef {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_signed(value).ok_or_else(|| format!("invalid directed line reference {value}"))
    }
}

impl std::fmt::Display for DirectedLineRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_signed())
    }
}

/// What lies on one side of a boundary.
///
/// Persisted as an integer: 0 for the universe, `+id` for an area and `-id`
/// for an isle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(into = "i64", try_from = "i64")]
pub enum FaceRef {
    #[default]
    Universe,
    Area(AreaId),
    Isle(IsleId),
}

impl FaceRef {
    #[inline]
    pub fn is_universe(self) -> bool {
        matches!(self, FaceRef::Universe)
    }

    pub fn to_signed(self) -> i64 {
        match self {
            FaceRef::Universe => 0,
            FaceRef::Area(a) => i64::from(a.get()),
            FaceRef::Isle(i) => -i64::from(i.get()),
        }
    }

    pub fn from_signed(value: i64) -> Option<Self> {
        if value == 0 {
            return Some(FaceRef::Universe);
        }
        let raw = u32::try_from(value.unsigned_abs()).ok()?;
        if value > 0 {
            AreaId::new(raw).map(FaceRef::Area)
        } else {
            IsleId::new(raw).map(FaceRef::Isle)
        }
    }
}

impl From<FaceRef> for i64 {
    fn from(f: FaceRef) -> Self {
        f.to_signed()
    }
}

impl TryFrom<i64> for FaceRef {
    type Error = String;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_signed(value).ok_or_else(|| format!("invalid face reference {value}"))
    }
}

/// A key that can reference any entity, used in error reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKey {
    Line(LineId),
    Node(NodeId),
    Area(AreaId),
    Isle(IsleId),
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntityKey::Line(id) => id.fmt(f),
            EntityKey::Node(id) => id.fmt(f),
            EntityKey::Area(id) => id.fmt(f),
            EntityKey::Isle(id) => id.fmt(f),
        }
    }
}

impl From<LineId> for EntityKey {
    fn from(k: LineId) -> Self {
        EntityKey::Line(k)
    }
}

impl From<NodeId> for EntityKey {
    fn from(k: NodeId) -> Self {
        EntityKey::Node(k)
    }
}

impl From<AreaId> for EntityKey {
    fn from(k: AreaId) -> Self {
        EntityKey::Area(k)
    }
}

impl From<IsleId> for EntityKey {
    fn from(k: IsleId) -> Self {
        EntityKey::Isle(k)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(raw: u32) -> LineId {
        LineId::new(raw).unwrap()
    }

    #[test]
    fn zero_is_not_an_id() {
        assert!(LineId::new(0).is_none());
        assert_eq!(AreaId::new(7).map(AreaId::get), Some(7));
    }

    #[test]
    fn directed_ref_signed_encoding() {
        let fwd = DirectedLineRef::forward(line(12));
        assert_eq!(fwd.to_signed(), 12);
        assert_eq!(fwd.reversed().to_signed(), -12);
        assert_eq!(DirectedLineRef::from_signed(-12), Some(fwd.reversed()));
        assert_eq!(DirectedLineRef::from_signed(0), None);
    }

    #[test]
    fn face_ref_signed_encoding() {
        assert_eq!(FaceRef::from_signed(0), Some(FaceRef::Universe));
        assert_eq!(
            FaceRef::from_signed(-3),
            Some(FaceRef::Isle(IsleId::new(3).unwrap()))
        );
        assert_eq!(FaceRef::Area(AreaId::new(5).unwrap()).to_signed(), 5);
    }

    #[test]
    fn entity_key_display() {
        assert_eq!(EntityKey::from(line(3)).to_string(), "line 3");
        assert_eq!(EntityKey::from(IsleId::new(2).unwrap()).to_string(), "isle 2");
    }
}
