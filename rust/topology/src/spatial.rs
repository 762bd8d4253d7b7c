// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Rectangle tree over entity bounding boxes.
//!
//! [`RTree`] wraps an `rstar` tree of planar rectangles tagged with an id.
//! Each [`Partition`] pairs a tree with an id → box map so entries can be
//! deleted by id alone. The [`SpatialIndex`] keeps one partition per entity
//! kind.
//!
//! Queries are inclusive: boxes that only touch the query box are returned.
//! Result order is unspecified.

use std::hash::Hash;

use rstar::primitives::{GeomWithData, Rectangle};
use rstar::AABB;
use rustc_hash::FxHashMap;
use vtopo_core::{AreaId, BoundingBox, IsleId, LineId, NodeId};

type Entry<K> = GeomWithData<Rectangle<[f64; 2]>, K>;

fn entry<K>(bbox: &BoundingBox, id: K) -> Entry<K> {
    GeomWithData::new(
        Rectangle::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y]),
        id,
    )
}

fn envelope(bbox: &BoundingBox) -> AABB<[f64; 2]> {
    AABB::from_corners([bbox.min_x, bbox.min_y], [bbox.max_x, bbox.max_y])
}

/// R-tree keyed by `K`.
pub struct RTree<K> {
    tree: rstar::RTree<Entry<K>>,
}

impl<K> std::fmt::Debug for RTree<K> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RTree").field("len", &self.tree.size()).finish()
    }
}

impl<K: Copy + PartialEq> RTree<K> {
    pub fn new() -> Self {
        Self {
            tree: rstar::RTree::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }

    pub fn clear(&mut self) {
        self.tree = rstar::RTree::new();
    }

    pub fn insert(&mut self, bbox: BoundingBox, id: K) {
        self.tree.insert(entry(&bbox, id));
    }

    /// Removes the entry `id` stored with box `bbox`. Returns whether it
    /// was found.
    pub fn remove(&mut self, bbox: &BoundingBox, id: K) -> bool {
        self.tree.remove(&entry(bbox, id)).is_some()
    }

    /// Ids whose box intersects `bbox` (touching counts).
    pub fn query(&self, bbox: &BoundingBox) -> Vec<K> {
        self.tree
            .locate_in_envelope_intersecting(&envelope(bbox))
            .map(|e| e.data)
            .collect()
    }
}

impl<K: Copy + PartialEq> Default for RTree<K> {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Partitions
// =============================================================================

/// An R-tree plus the box of every id, so entries can be removed by id.
#[derive(Debug)]
pub struct Partition<K> {
    tree: RTree<K>,
    boxes: FxHashMap<K, BoundingBox>,
}

impl<K: Copy + Eq + Hash> Partition<K> {
    pub fn new() -> Self {
        Self {
            tree: RTree::new(),
            boxes: FxHashMap::default(),
        }
    }

    /// Adds `id`, replacing its previous box if present.
    pub fn insert(&mut self, id: K, bbox: BoundingBox) {
        if let Some(old) = self.boxes.insert(id, bbox) {
            self.tree.remove(&old, id);
        }
        self.tree.insert(bbox, id);
    }

    /// Removes `id`. Returns whether it was indexed.
    pub fn delete(&mut self, id: K) -> bool {
        match self.boxes.remove(&id) {
            Some(old) => self.tree.remove(&old, id),
            None => false,
        }
    }

    pub fn query(&self, bbox: &BoundingBox) -> Vec<K> {
        self.tree.query(bbox)
    }

    pub fn bbox(&self, id: K) -> Option<&BoundingBox> {
        self.boxes.get(&id)
    }

    pub fn len(&self) -> usize {
        self.tree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.is_empty()
    }

    pub fn clear(&mut self) {
        self.tree.clear();
        self.boxes.clear();
    }
}

impl<K: Copy + Eq + Hash> Default for Partition<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Spatial index of one topology graph: one partition per entity kind.
#[derive(Debug, Default)]
pub struct SpatialIndex {
    pub(crate) nodes: Partition<NodeId>,
    pub(crate) lines: Partition<LineId>,
    pub(crate) areas: Partition<AreaId>,
    pub(crate) isles: Partition<IsleId>,
}

impl SpatialIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &Partition<NodeId> {
        &self.nodes
    }

    pub fn lines(&self) -> &Partition<LineId> {
        &self.lines
    }

    pub fn areas(&self) -> &Partition<AreaId> {
        &self.areas
    }

    pub fn isles(&self) -> &Partition<IsleId> {
        &self.isles
    }

    pub fn clear(&mut self) {
        self.nodes.clear();
        self.lines.clear();
        self.areas.clear();
        self.isles.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square(x: f64, y: f64, size: f64) -> BoundingBox {
        BoundingBox::from_corners(x, y, x + size, y + size)
    }

    fn sorted(mut v: Vec<u32>) -> Vec<u32> {
        v.sort_unstable();
        v
    }

    #[test]
    fn empty_query_returns_nothing() {
        let tree: RTree<u32> = RTree::new();
        assert!(tree.is_empty());
        assert!(tree.query(&square(0.0, 0.0, 100.0)).is_empty());
    }

    #[test]
    fn touching_boxes_are_returned() {
        let mut tree = RTree::new();
        tree.insert(square(0.0, 0.0, 1.0), 1u32);
        tree.insert(square(2.0, 2.0, 1.0), 2u32);
        tree.insert(square(5.0, 5.0, 1.0), 3u32);
        assert_eq!(sorted(tree.query(&square(1.0, 1.0, 1.0))), vec![1, 2]);
        // a degenerate query box still hits a corner
        assert_eq!(tree.query(&BoundingBox::from_point(6.0, 6.0, 0.0)), vec![3]);
    }

    #[test]
    fn matches_brute_force() {
        let mut tree = RTree::new();
        let mut boxes = Vec::new();
        for i in 0..200u32 {
            let x = f64::from((i * 37) % 101);
            let y = f64::from((i * 53) % 97);
            let b = square(x, y, 1.0 + f64::from(i % 5));
            boxes.push((b, i));
            tree.insert(b, i);
        }
        assert_eq!(tree.len(), 200);

        let q = square(20.0, 20.0, 30.0);
        let expected: Vec<u32> = boxes
            .iter()
            .filter(|(b, _)| b.intersects(&q))
            .map(|(_, i)| *i)
            .collect();
        assert_eq!(sorted(tree.query(&q)), sorted(expected));
    }

    #[test]
    fn remove_keeps_others() {
        let mut tree = RTree::new();
        let mut boxes = Vec::new();
        for i in 0..60u32 {
            let b = square(f64::from(i % 10) * 3.0, f64::from(i / 10) * 3.0, 1.0);
            boxes.push((b, i));
            tree.insert(b, i);
        }
        for (b, i) in boxes.iter().filter(|(_, i)| i % 3 != 0) {
            assert!(tree.remove(b, *i));
        }
        assert!(!tree.remove(&boxes[1].0, 1));
        // the box alone does not match another id
        assert!(!tree.remove(&boxes[0].0, 99));
        assert_eq!(tree.len(), 20);

        let all = square(-10.0, -10.0, 100.0);
        let expected: Vec<u32> = (0..60).filter(|i| i % 3 == 0).collect();
        assert_eq!(sorted(tree.query(&all)), expected);
    }

    #[test]
    fn partition_deletes_by_id() {
        let mut p: Partition<NodeId> = Partition::new();
        let n1 = NodeId::new(1).unwrap();
        let n2 = NodeId::new(2).unwrap();
        p.insert(n1, BoundingBox::from_point(1.0, 1.0, 0.0));
        p.insert(n2, BoundingBox::from_point(5.0, 5.0, 0.0));
        // moving n1 replaces its old entry
        p.insert(n1, BoundingBox::from_point(9.0, 9.0, 0.0));
        assert_eq!(p.len(), 2);
        assert!(p.query(&square(0.0, 0.0, 2.0)).is_empty());
        assert!(p.delete(n2));
        assert!(!p.delete(n2));
        assert_eq!(p.query(&square(0.0, 0.0, 10.0)), vec![n1]);
    }
}
