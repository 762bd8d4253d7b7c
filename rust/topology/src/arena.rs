// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Slot storage for planar topology entities.
//!
//! The [`TopologyGraph`] is the central owner of all topology data for one
//! dataset. Nodes, lines, areas and isles live in [`Slots`]: growable
//! vectors keyed by integer id in which removal leaves a tombstone, so an id
//! stays a valid index for the lifetime of the graph and is never handed out
//! again.
//!
//! ## Plus structure
//!
//! - a **node** keeps its incident lines sorted by outgoing angle;
//! - a **line** knows its endpoint nodes and, for boundaries, the faces on
//!   its left and right;
//! - an **area** is a clockwise ring of directed boundaries plus its isles
//!   and centroid;
//! - an **isle** is a counter-clockwise ring plus the area containing it.
//!
//! Line slots are indexed by the geometry store's line ids. Node, area and
//! isle ids are assigned here in creation order.

use std::marker::PhantomData;

use rustc_hash::FxHashSet;
use serde::{Deserialize, Serialize};
use vtopo_core::{
    AreaId, BoundingBox, DirectedLineRef, EntityKey, FaceRef, IsleId, LineId, LineType, NodeId,
    SlotId,
};

use crate::error::{Error, Result};
use crate::spatial::SpatialIndex;

// =============================================================================
// Slots
// =============================================================================

/// Integer-keyed arena with tombstones. Slot 0 is never used.
#[derive(Debug, Clone)]
pub struct Slots<K, T> {
    items: Vec<Option<T>>,
    live: usize,
    _key: PhantomData<K>,
}

impl<K: SlotId, T> Slots<K, T> {
    pub fn new() -> Self {
        Self {
            items: vec![None],
            live: 0,
            _key: PhantomData,
        }
    }

    /// Stores `value` under the next unused id.
    pub fn push(&mut self, value: T) -> K {
        self.items.push(Some(value));
        self.live += 1;
        K::from_slot(self.items.len() - 1)
    }

    /// Stores `value` under a caller-chosen id, growing with tombstones.
    /// Returns the previous occupant.
    pub fn insert_at(&mut self, id: K, value: T) -> Option<T> {
        let idx = id.slot();
        if idx >= self.items.len() {
            self.items.resize_with(idx + 1, || None);
        }
        let prev = self.items[idx].replace(value);
        if prev.is_none() {
            self.live += 1;
        }
        prev
    }

    #[inline]
    pub fn get(&self, id: K) -> Option<&T> {
        self.items.get(id.slot()).and_then(Option::as_ref)
    }

    #[inline]
    pub fn get_mut(&mut self, id: K) -> Option<&mut T> {
        self.items.get_mut(id.slot()).and_then(Option::as_mut)
    }

    #[inline]
    pub fn contains(&self, id: K) -> bool {
        self.get(id).is_some()
    }

    /// Tombstones the slot and returns its value.
    pub fn remove(&mut self, id: K) -> Option<T> {
        let value = self.items.get_mut(id.slot())?.take();
        if value.is_some() {
            self.live -= 1;
        }
        value
    }

    /// Number of live entries.
    #[inline]
    pub fn len(&self) -> usize {
        self.live
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.live == 0
    }

    /// Highest id ever handed out (live or dead).
    #[inline]
    pub fn max_id(&self) -> u32 {
        (self.items.len() - 1) as u32
    }

    pub fn iter(&self) -> impl Iterator<Item = (K, &T)> + '_ {
        self.items
            .iter()
            .enumerate()
            .skip(1)
            .filter_map(|(i, v)| v.as_ref().map(|v| (K::from_slot(i), v)))
    }

    /// Live ids in ascending order.
    pub fn ids(&self) -> Vec<K> {
        self.iter().map(|(k, _)| k).collect()
    }

    /// Raw slots including tombstones, index 0 excluded.
    pub(crate) fn raw(&self) -> &[Option<T>] {
        &self.items[1..]
    }

    pub(crate) fn from_raw(raw: Vec<Option<T>>) -> Self {
        let live = raw.iter().filter(|v| v.is_some()).count();
        let mut items = Vec::with_capacity(raw.len() + 1);
        items.push(None);
        items.extend(raw);
        Self {
            items,
            live,
            _key: PhantomData,
        }
    }
}

impl<K: SlotId, T> Default for Slots<K, T> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Entity records
// =============================================================================

/// A point where line endpoints meet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeData {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Incident lines sorted ascending by `angles`.
    pub lines: Vec<DirectedLineRef>,
    /// Outgoing angle of each entry of `lines`, radians in `[-pi, pi]` or
    /// the degenerate sentinel.
    pub angles: Vec<f32>,
}

impl NodeData {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self {
            x,
            y,
            z,
            lines: Vec::new(),
            angles: Vec::new(),
        }
    }

    /// Position of `line` in the incidence list.
    pub fn position(&self, line: DirectedLineRef) -> Option<usize> {
        self.lines.iter().position(|&l| l == line)
    }
}

/// Where a centroid sits relative to the areas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CentroidArea {
    /// Not inside any area (or areas not built).
    #[default]
    Outside,
    /// The centroid of this area.
    Area(AreaId),
    /// Inside an area that already has another centroid.
    Duplicate(AreaId),
}

/// Type-specific topology of a line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LineTopo {
    Point,
    Centroid {
        area: CentroidArea,
    },
    Line {
        n1: NodeId,
        n2: NodeId,
    },
    Boundary {
        n1: NodeId,
        n2: NodeId,
        left: FaceRef,
        right: FaceRef,
    },
    Face,
    Kernel,
}

/// Topology record of one live feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineData {
    pub kind: LineType,
    pub bbox: BoundingBox,
    pub topo: LineTopo,
    /// All points coincide; the line has no direction at its nodes.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub degenerate: bool,
}

impl LineData {
    /// Start and end node of a line or boundary.
    pub fn nodes(&self) -> Option<(NodeId, NodeId)> {
        match self.topo {
            LineTopo::Line { n1, n2 } | LineTopo::Boundary { n1, n2, .. } => Some((n1, n2)),
            _ => None,
        }
    }

    /// `(left, right)` faces of a boundary.
    pub fn faces(&self) -> Option<(FaceRef, FaceRef)> {
        match self.topo {
            LineTopo::Boundary { left, right, .. } => Some((left, right)),
            _ => None,
        }
    }

    pub fn centroid_area(&self) -> Option<CentroidArea> {
        match self.topo {
            LineTopo::Centroid { area } => Some(area),
            _ => None,
        }
    }

    /// Node the directed line leaves from.
    pub fn start_node(&self, forward: bool) -> Option<NodeId> {
        self.nodes().map(|(n1, n2)| if forward { n1 } else { n2 })
    }
}

/// Closed region bounded by a clockwise ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AreaData {
    /// Outer ring; the area lies right of every entry.
    pub lines: Vec<DirectedLineRef>,
    pub isles: Vec<IsleId>,
    pub centroid: Option<LineId>,
    pub bbox: BoundingBox,
}

/// Hole ring inside an area (or the universe).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IsleData {
    /// Counter-clockwise ring; the isle lies right of every entry.
    pub lines: Vec<DirectedLineRef>,
    pub area: Option<AreaId>,
    pub bbox: BoundingBox,
}

/// Side of a directed line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    Left,
    Right,
}

/// How far the topology has been built.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum BuildLevel {
    /// Geometry only.
    #[default]
    None,
    /// Nodes and the line/node spatial index.
    Base,
    /// Areas and isles traced.
    Areas,
    /// Isles attached to their containing areas.
    AttachIsles,
    /// Centroids attached to areas. Full topology.
    Centroids,
}

impl BuildLevel {
    pub const ALL: BuildLevel = BuildLevel::Centroids;

    pub fn as_str(&self) -> &'static str {
        match self {
            BuildLevel::None => "none",
            BuildLevel::Base => "base",
            BuildLevel::Areas => "areas",
            BuildLevel::AttachIsles => "attach_isles",
            BuildLevel::Centroids => "centroids",
        }
    }
}

impl std::fmt::Display for BuildLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for BuildLevel {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "none" => BuildLevel::None,
            "base" => BuildLevel::Base,
            "areas" => BuildLevel::Areas,
            "attach_isles" | "isles" => BuildLevel::AttachIsles,
            "centroids" | "all" => BuildLevel::Centroids,
            other => return Err(format!("unknown build level '{other}'")),
        })
    }
}

// =============================================================================
// Update log
// =============================================================================

/// Lines and nodes whose topology changed since the last reset.
#[derive(Debug, Clone, Default)]
pub struct UpdateLog {
    enabled: bool,
    lines: Vec<LineId>,
    nodes: Vec<NodeId>,
    seen_lines: FxHashSet<LineId>,
    seen_nodes: FxHashSet<NodeId>,
}

impl UpdateLog {
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn lines(&self) -> &[LineId] {
        &self.lines
    }

    pub fn nodes(&self) -> &[NodeId] {
        &self.nodes
    }

    pub(crate) fn line(&mut self, id: LineId) {
        if self.enabled && self.seen_lines.insert(id) {
            self.lines.push(id);
        }
    }

    pub(crate) fn node(&mut self, id: NodeId) {
        if self.enabled && self.seen_nodes.insert(id) {
            self.nodes.push(id);
        }
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.nodes.clear();
        self.seen_lines.clear();
        self.seen_nodes.clear();
    }
}

// =============================================================================
// Topology graph
// =============================================================================

/// The Plus structure of one dataset: all topology entities, the spatial
/// index over them and build state.
#[derive(Debug)]
pub struct TopologyGraph {
    pub(crate) level: BuildLevel,
    /// Node matching distance used when the topology was built.
    pub(crate) threshold: f64,
    pub(crate) nodes: Slots<NodeId, NodeData>,
    pub(crate) lines: Slots<LineId, LineData>,
    pub(crate) areas: Slots<AreaId, AreaData>,
    pub(crate) isles: Slots<IsleId, IsleData>,
    pub(crate) sidx: SpatialIndex,
    pub(crate) updates: UpdateLog,
}

impl TopologyGraph {
    /// Creates an empty, unbuilt graph.
    pub fn new() -> Self {
        Self {
            level: BuildLevel::None,
            threshold: 0.0,
            nodes: Slots::new(),
            lines: Slots::new(),
            areas: Slots::new(),
            isles: Slots::new(),
            sidx: SpatialIndex::new(),
            updates: UpdateLog::default(),
        }
    }

    #[inline]
    pub fn level(&self) -> BuildLevel {
        self.level
    }

    #[inline]
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn spatial_index(&self) -> &SpatialIndex {
        &self.sidx
    }

    /// Errors unless the graph is built to at least `required`.
    pub fn require(&self, required: BuildLevel) -> Result<()> {
        if self.level >= required {
            Ok(())
        } else {
            Err(Error::NotBuilt {
                required,
                current: self.level,
            })
        }
    }

    /// Drops every entity and returns to [`BuildLevel::None`].
    pub fn clear(&mut self) {
        let updates = std::mem::take(&mut self.updates);
        *self = Self::new();
        self.updates = updates;
    }

    // --- Entity access ---

    pub fn node(&self, id: NodeId) -> Result<&NodeData> {
        self.nodes.get(id).ok_or(Error::NotFound(EntityKey::Node(id)))
    }

    pub fn line(&self, id: LineId) -> Result<&LineData> {
        self.lines.get(id).ok_or(Error::NotFound(EntityKey::Line(id)))
    }

    pub fn area(&self, id: AreaId) -> Result<&AreaData> {
        self.areas.get(id).ok_or(Error::NotFound(EntityKey::Area(id)))
    }

    pub fn isle(&self, id: IsleId) -> Result<&IsleData> {
        self.isles.get(id).ok_or(Error::NotFound(EntityKey::Isle(id)))
    }

    pub(crate) fn node_mut(&mut self, id: NodeId) -> Result<&mut NodeData> {
        self.nodes
            .get_mut(id)
            .ok_or(Error::NotFound(EntityKey::Node(id)))
    }

    pub(crate) fn line_mut(&mut self, id: LineId) -> Result<&mut LineData> {
        self.lines
            .get_mut(id)
            .ok_or(Error::NotFound(EntityKey::Line(id)))
    }

    pub(crate) fn area_mut(&mut self, id: AreaId) -> Result<&mut AreaData> {
        self.areas
            .get_mut(id)
            .ok_or(Error::NotFound(EntityKey::Area(id)))
    }

    pub(crate) fn isle_mut(&mut self, id: IsleId) -> Result<&mut IsleData> {
        self.isles
            .get_mut(id)
            .ok_or(Error::NotFound(EntityKey::Isle(id)))
    }

    pub fn node_alive(&self, id: NodeId) -> bool {
        self.nodes.contains(id)
    }

    pub fn line_alive(&self, id: LineId) -> bool {
        self.lines.contains(id)
    }

    pub fn area_alive(&self, id: AreaId) -> bool {
        self.areas.contains(id)
    }

    pub fn isle_alive(&self, id: IsleId) -> bool {
        self.isles.contains(id)
    }

    // --- Counts and iteration ---

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn area_count(&self) -> usize {
        self.areas.len()
    }

    pub fn isle_count(&self) -> usize {
        self.isles.len()
    }

    /// Highest area id ever assigned; areas created later get larger ids.
    pub fn max_area_id(&self) -> u32 {
        self.areas.max_id()
    }

    pub fn max_line_id(&self) -> u32 {
        self.lines.max_id()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (NodeId, &NodeData)> + '_ {
        self.nodes.iter()
    }

    pub fn lines(&self) -> impl Iterator<Item = (LineId, &LineData)> + '_ {
        self.lines.iter()
    }

    pub fn areas(&self) -> impl Iterator<Item = (AreaId, &AreaData)> + '_ {
        self.areas.iter()
    }

    pub fn isles(&self) -> impl Iterator<Item = (IsleId, &IsleData)> + '_ {
        self.isles.iter()
    }

    /// Number of live lines of `kind`.
    pub fn count_of(&self, kind: LineType) -> usize {
        self.lines.iter().filter(|(_, l)| l.kind == kind).count()
    }

    // --- Update log ---

    pub fn updates(&self) -> &UpdateLog {
        &self.updates
    }

    /// Starts or stops recording changed lines and nodes.
    pub fn track_updates(&mut self, enabled: bool) {
        self.updates.enabled = enabled;
        if !enabled {
            self.updates.clear();
        }
    }

    pub fn clear_updates(&mut self) {
        self.updates.clear();
    }
}

impl Default for TopologyGraph {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slots_keep_ids_after_removal() {
        let mut slots: Slots<NodeId, &str> = Slots::new();
        let a = slots.push("a");
        let b = slots.push("b");
        assert_eq!(a.get(), 1);
        assert_eq!(slots.remove(a), Some("a"));
        assert_eq!(slots.remove(a), None);
        let c = slots.push("c");
        assert_eq!(c.get(), 3);
        assert_eq!(slots.len(), 2);
        assert_eq!(slots.ids(), vec![b, c]);
        assert_eq!(slots.max_id(), 3);
    }

    #[test]
    fn slots_insert_at_grows_with_tombstones() {
        let mut slots: Slots<LineId, u8> = Slots::new();
        let id = LineId::new(5).unwrap();
        assert_eq!(slots.insert_at(id, 9), None);
        assert_eq!(slots.len(), 1);
        assert!(!slots.contains(LineId::new(4).unwrap()));
        assert_eq!(slots.get(id), Some(&9));
        assert_eq!(slots.insert_at(id, 10), Some(9));
        assert_eq!(slots.len(), 1);
    }

    #[test]
    fn slots_raw_roundtrip() {
        let mut slots: Slots<AreaId, u8> = Slots::new();
        let a = slots.push(1);
        slots.push(2);
        slots.remove(a);
        let copy: Slots<AreaId, u8> = Slots::from_raw(slots.raw().to_vec());
        assert_eq!(copy.len(), 1);
        assert_eq!(copy.max_id(), 2);
        assert!(!copy.contains(a));
    }

    #[test]
    fn new_graph_is_empty_and_unbuilt() {
        let graph = TopologyGraph::new();
        assert_eq!(graph.level(), BuildLevel::None);
        assert_eq!(graph.node_count(), 0);
        assert_eq!(graph.area_count(), 0);
        assert!(matches!(
            graph.require(BuildLevel::Base),
            Err(Error::NotBuilt { .. })
        ));
    }

    #[test]
    fn dead_ids_are_errors() {
        let graph = TopologyGraph::new();
        let err = graph.area(AreaId::new(1).unwrap()).unwrap_err();
        assert!(matches!(err, Error::NotFound(EntityKey::Area(_))));
    }

    #[test]
    fn build_levels_are_ordered() {
        assert!(BuildLevel::None < BuildLevel::Base);
        assert!(BuildLevel::Areas < BuildLevel::AttachIsles);
        assert_eq!(BuildLevel::ALL, BuildLevel::Centroids);
        assert_eq!("all".parse::<BuildLevel>(), Ok(BuildLevel::Centroids));
    }

    #[test]
    fn update_log_records_once_when_enabled() {
        let mut graph = TopologyGraph::new();
        let id = LineId::new(2).unwrap();
        graph.updates.line(id);
        assert!(graph.updates().lines().is_empty());
        graph.track_updates(true);
        graph.updates.line(id);
        graph.updates.line(id);
        assert_eq!(graph.updates().lines(), &[id]);
        graph.clear_updates();
        assert!(graph.updates().lines().is_empty());
    }
}
