// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Primitive edits of the Plus structure.
//!
//! These keep the node incidence lists, the line sides and the spatial
//! index in step with each other. They do not trace rings or attach isles;
//! that is done by the builders on top of them.

use vtopo_core::{
    AreaId, BoundingBox, DirectedLineRef, FaceRef, IsleId, LineId, LinePoints, LineType, NodeId,
};

use crate::arena::*;
use crate::error::{Error, Result};

/// Lookback used for endpoint angles: the first vertex that differs at all.
const ANGLE_LOOKBACK: f64 = 0.0;

impl TopologyGraph {
    /// Creates a node at `(x, y, z)`.
    pub(crate) fn add_node(&mut self, x: f64, y: f64, z: f64) -> NodeId {
        let id = self.nodes.push(NodeData::new(x, y, z));
        self.sidx.nodes.insert(id, BoundingBox::from_point(x, y, z));
        self.updates.node(id);
        id
    }

    /// Nearest node within `threshold` of `(x, y)`, planar distance,
    /// boundary inclusive. Equal distances resolve to the lower id.
    pub fn find_node_within(&self, x: f64, y: f64, threshold: f64) -> Option<NodeId> {
        let window = BoundingBox::around(x, y, threshold);
        let mut best: Option<(NodeId, f64)> = None;
        for id in self.sidx.nodes.query(&window) {
            let Some(node) = self.nodes.get(id) else {
                continue;
            };
            let d = (node.x - x).hypot(node.y - y);
            if d > threshold {
                continue;
            }
            let better = match best {
                None => true,
                Some((bid, bd)) => d < bd || (d == bd && id < bid),
            };
            if better {
                best = Some((id, d));
            }
        }
        best.map(|(id, _)| id)
    }

    fn node_at(&mut self, x: f64, y: f64, z: f64) -> NodeId {
        match self.find_node_within(x, y, self.threshold) {
            Some(id) => id,
            None => self.add_node(x, y, z),
        }
    }

    /// Inserts `line` into the node's incidence list, keeping it sorted by
    /// angle. Equal angles keep insertion order.
    pub(crate) fn node_add_line(&mut self, node: NodeId, line: DirectedLineRef, angle: f32) -> Result<()> {
        let data = self.node_mut(node)?;
        let pos = data.angles.partition_point(|&a| a <= angle);
        data.angles.insert(pos, angle);
        data.lines.insert(pos, line);
        self.updates.node(node);
        Ok(())
    }

    /// Removes `line` from the node. Returns whether the node is now empty.
    fn node_del_line(&mut self, node: NodeId, line: DirectedLineRef) -> Result<bool> {
        let data = self.node_mut(node)?;
        let pos = data
            .position(line)
            .ok_or_else(|| Error::invariant(node, format!("{line} is not incident")))?;
        data.lines.remove(pos);
        data.angles.remove(pos);
        let empty = data.lines.is_empty();
        self.updates.node(node);
        Ok(empty)
    }

    fn del_node(&mut self, node: NodeId) {
        if self.nodes.remove(node).is_some() {
            self.sidx.nodes.delete(node);
            self.updates.node(node);
        }
    }

    /// Registers the topology of a stored feature under its store id.
    ///
    /// Lines and boundaries are attached to the nodes at their endpoints,
    /// creating nodes as needed. Boundaries start with both sides in the
    /// universe and centroids outside any area.
    pub(crate) fn add_line(&mut self, id: LineId, kind: LineType, points: &LinePoints) -> Result<()> {
        if self.lines.contains(id) {
            return Err(Error::invariant(id, "line already registered"));
        }
        let bbox = points.bbox().ok_or(vtopo_core::Error::EmptyGeometry)?;
        let degenerate = kind.is_line_class() && points.is_degenerate();

        let topo = match kind {
            LineType::Point => LineTopo::Point,
            LineType::Centroid => LineTopo::Centroid {
                area: CentroidArea::Outside,
            },
            LineType::Face => LineTopo::Face,
            LineType::Kernel => LineTopo::Kernel,
            LineType::Line | LineType::Boundary => {
                let (first, last) = match (points.first(), points.last()) {
                    (Some(f), Some(l)) => (*f, *l),
                    _ => return Err(vtopo_core::Error::EmptyGeometry.into()),
                };
                let n1 = self.node_at(first.x, first.y, first.z);
                self.node_add_line(
                    n1,
                    DirectedLineRef::forward(id),
                    points.begin_angle(ANGLE_LOOKBACK),
                )?;
                let n2 = self.node_at(last.x, last.y, last.z);
                self.node_add_line(
                    n2,
                    DirectedLineRef::backward(id),
                    points.end_angle(ANGLE_LOOKBACK),
                )?;
                if kind == LineType::Line {
                    LineTopo::Line { n1, n2 }
                } else {
                    LineTopo::Boundary {
                        n1,
                        n2,
                        left: FaceRef::Universe,
                        right: FaceRef::Universe,
                    }
                }
            }
        };

        self.lines.insert_at(
            id,
            LineData {
                kind,
                bbox,
                topo,
                degenerate,
            },
        );
        self.sidx.lines.insert(id, bbox);
        self.updates.line(id);
        Ok(())
    }

    /// Unregisters a line, dropping endpoint nodes left without lines.
    ///
    /// Faces referring to the line are not touched; callers delete them
    /// first.
    pub(crate) fn del_line(&mut self, id: LineId) -> Result<LineData> {
        let data = self.lines.remove(id).ok_or(Error::NotFound(id.into()))?;
        self.sidx.lines.delete(id);
        self.updates.line(id);

        if let Some((n1, n2)) = data.nodes() {
            if self.node_del_line(n1, DirectedLineRef::forward(id))? {
                self.del_node(n1);
            }
            if self.node_del_line(n2, DirectedLineRef::backward(id))? {
                self.del_node(n2);
            }
        }
        Ok(data)
    }

    /// Writes `face` on the side of `r` that the ring encloses: right for
    /// forward entries, left for backward ones. A side already occupied is a
    /// broken invariant.
    fn claim_side(&mut self, r: DirectedLineRef, face: FaceRef) -> Result<()> {
        let line = self.line_mut(r.id)?;
        let LineTopo::Boundary { left, right, .. } = &mut line.topo else {
            return Err(Error::invariant(r.id, "ring member is not a boundary"));
        };
        let slot = if r.forward { right } else { left };
        if !slot.is_universe() {
            return Err(Error::invariant(
                r.id,
                format!("side of {r} already belongs to face {}", slot.to_signed()),
            ));
        }
        *slot = face;
        self.updates.line(r.id);
        Ok(())
    }

    /// Resets the ring side of `r` if it still refers to `face`.
    fn release_side(&mut self, r: DirectedLineRef, face: FaceRef) {
        let Some(line) = self.lines.get_mut(r.id) else {
            return;
        };
        if let LineTopo::Boundary { left, right, .. } = &mut line.topo {
            let slot = if r.forward { right } else { left };
            if *slot == face {
                *slot = FaceRef::Universe;
                self.updates.line(r.id);
            }
        }
    }

    fn ring_bbox(&self, ring: &[DirectedLineRef]) -> Result<BoundingBox> {
        let mut iter = ring.iter();
        let first = iter.next().ok_or(Error::EmptyRing)?;
        let mut bbox = self.line(first.id)?.bbox;
        for r in iter {
            bbox.merge(&self.line(r.id)?.bbox);
        }
        Ok(bbox)
    }

    /// Creates an area from a closed clockwise ring.
    pub(crate) fn add_area(&mut self, ring: Vec<DirectedLineRef>) -> Result<AreaId> {
        let bbox = self.ring_bbox(&ring)?;
        let lines = ring.clone();
        let id = self.areas.push(AreaData {
            lines,
            isles: Vec::new(),
            centroid: None,
            bbox,
        });
        for r in ring {
            self.claim_side(r, FaceRef::Area(id))?;
        }
        self.sidx.areas.insert(id, bbox);
        Ok(id)
    }

    /// Creates an isle from a closed counter-clockwise ring.
    pub(crate) fn add_isle(&mut self, ring: Vec<DirectedLineRef>) -> Result<IsleId> {
        let bbox = self.ring_bbox(&ring)?;
        let lines = ring.clone();
        let id = self.isles.push(IsleData {
            lines,
            area: None,
            bbox,
        });
        for r in ring {
            self.claim_side(r, FaceRef::Isle(id))?;
        }
        self.sidx.isles.insert(id, bbox);
        Ok(id)
    }

    /// Deletes an area. Its isles become unattached and its centroid, along
    /// with any duplicates pointing at it, falls back to outside.
    pub(crate) fn del_area(&mut self, id: AreaId) -> Result<AreaData> {
        let data = self.areas.remove(id).ok_or(Error::NotFound(id.into()))?;
        self.sidx.areas.delete(id);
        for &r in &data.lines {
            self.release_side(r, FaceRef::Area(id));
        }
        for &isle in &data.isles {
            if let Some(i) = self.isles.get_mut(isle) {
                if i.area == Some(id) {
                    i.area = None;
                }
            }
        }
        let orphaned: Vec<LineId> = self
            .sidx
            .lines
            .query(&data.bbox)
            .into_iter()
            .filter(|&lid| match self.lines.get(lid).and_then(LineData::centroid_area) {
                Some(CentroidArea::Area(a)) | Some(CentroidArea::Duplicate(a)) => a == id,
                _ => false,
            })
            .collect();
        for lid in orphaned {
            self.set_centroid_area(lid, CentroidArea::Outside)?;
        }
        Ok(data)
    }

    /// Deletes an isle and detaches it from its area.
    pub(crate) fn del_isle(&mut self, id: IsleId) -> Result<IsleData> {
        let data = self.isles.remove(id).ok_or(Error::NotFound(id.into()))?;
        self.sidx.isles.delete(id);
        for &r in &data.lines {
            self.release_side(r, FaceRef::Isle(id));
        }
        if let Some(area) = data.area {
            if let Some(a) = self.areas.get_mut(area) {
                a.isles.retain(|&i| i != id);
            }
        }
        Ok(data)
    }

    /// Makes `isle` a hole of `area`, detaching it from any previous area.
    pub(crate) fn area_add_isle(&mut self, area: AreaId, isle: IsleId) -> Result<()> {
        let previous = self.isle(isle)?.area;
        if previous == Some(area) {
            return Ok(());
        }
        if let Some(prev) = previous {
            self.area_del_isle(prev, isle)?;
        }
        self.area_mut(area)?.isles.push(isle);
        self.isle_mut(isle)?.area = Some(area);
        Ok(())
    }

    pub(crate) fn area_del_isle(&mut self, area: AreaId, isle: IsleId) -> Result<()> {
        let a = self.area_mut(area)?;
        let before = a.isles.len();
        a.isles.retain(|&i| i != isle);
        if a.isles.len() == before {
            return Err(Error::invariant(area, format!("{isle} is not attached")));
        }
        self.isle_mut(isle)?.area = None;
        Ok(())
    }

    /// Updates a centroid's area, keeping the area's centroid link in step.
    pub(crate) fn set_centroid_area(&mut self, centroid: LineId, to: CentroidArea) -> Result<()> {
        let line = self.line_mut(centroid)?;
        let LineTopo::Centroid { area } = &mut line.topo else {
            return Err(Error::invariant(centroid, "not a centroid"));
        };
        let from = std::mem::replace(area, to);
        self.updates.line(centroid);

        if let CentroidArea::Area(a) = from {
            if let Some(data) = self.areas.get_mut(a) {
                if data.centroid == Some(centroid) {
                    data.centroid = None;
                }
            }
        }
        if let CentroidArea::Area(a) = to {
            self.area_mut(a)?.centroid = Some(centroid);
        }
        Ok(())
    }
}
