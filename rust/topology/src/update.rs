// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Incremental topology maintenance.
//!
//! After a feature is written or deleted, only the faces touching it are
//! rebuilt. Isles and centroids are then re-attached inside the box covering
//! every face that changed. The result matches a full rebuild up to entity
//! numbering.

use vtopo_core::{
    BoundingBox, DirectedLineRef, FaceRef, GeometrySource, LineId, LineType, NodeId, TypeMask,
};

use crate::arena::*;
use crate::error::Result;

impl TopologyGraph {
    /// Registers feature `id`, already stored in `source`, and repairs the
    /// faces around it up to the current build level.
    pub fn add_line_topo(&mut self, source: &dyn GeometrySource, id: LineId) -> Result<()> {
        self.require(BuildLevel::Base)?;
        let feature = source.read(id)?;
        self.add_line(id, feature.kind, &feature.points)?;
        let line_bbox = self.line(id)?.bbox;

        match feature.kind {
            LineType::Boundary if self.level >= BuildLevel::Areas => {
                let mut bbox = line_bbox;

                // The new boundary splits the faces it was drawn into.
                let (n1, n2) = self.line_nodes(id)?;
                for (node, start) in [
                    (n1, DirectedLineRef::forward(id)),
                    (n2, DirectedLineRef::backward(id)),
                ] {
                    if let Some(face) = self.face_beside(node, start)? {
                        if let Some(b) = self.delete_face(face)? {
                            bbox.merge(&b);
                        }
                    }
                }

                for side in [Side::Left, Side::Right] {
                    let built = self.build_line_area(source, id, side)?;
                    if let Some(b) = built.bbox(self) {
                        bbox.merge(&b);
                    }
                }
                self.reattach_in_box(source, &bbox)?;
            }
            LineType::Centroid if self.level >= BuildLevel::Centroids => {
                self.attach_centroid(source, id)?;
            }
            _ => {}
        }
        Ok(())
    }

    /// Unregisters feature `id` and rebuilds the faces it bounded. Only the
    /// neighbours' geometry is read, so the feature may already be gone from
    /// `source`.
    pub fn delete_line_topo(&mut self, source: &dyn GeometrySource, id: LineId) -> Result<()> {
        self.require(BuildLevel::Base)?;
        let data = self.line(id)?.clone();

        match data.kind {
            LineType::Boundary if self.level >= BuildLevel::Areas => {
                let mut bbox = data.bbox;
                let (n1, n2) = self.line_nodes(id)?;

                // Sides of the neighbours facing the line, collected while it
                // is still in the node lists.
                let mut rebuild: Vec<(LineId, Side)> = Vec::new();
                for start in [DirectedLineRef::forward(id), DirectedLineRef::backward(id)] {
                    for side in [Side::Right, Side::Left] {
                        if let Some(next) = self.angle_next_line(start, side, TypeMask::BOUNDARY)? {
                            if next.id != id {
                                rebuild.push((next.id, line_side(next, side)));
                            }
                        }
                    }
                }

                if let Some((left, right)) = data.faces() {
                    for face in [left, right] {
                        if let Some(b) = self.delete_face(face)? {
                            bbox.merge(&b);
                        }
                    }
                }

                self.del_line(id)?;

                for (line, side) in rebuild {
                    if !self.line_alive(line) {
                        continue;
                    }
                    let built = self.build_line_area(source, line, side)?;
                    if let Some(b) = built.bbox(self) {
                        bbox.merge(&b);
                    }
                }
                self.reattach_in_box(source, &bbox)?;
                tracing::debug!(line = %id, nodes = ?(n1, n2), "Boundary removed from topology");
            }
            LineType::Centroid if self.level >= BuildLevel::Centroids => {
                let area = self.centroid_area(id)?;
                self.set_centroid_area(id, CentroidArea::Outside)?;
                self.del_line(id)?;
                // A duplicate may now take over the area.
                if let CentroidArea::Area(a) = area {
                    let abox = self.area(a)?.bbox;
                    self.attach_centroids_in_box(source, &abox)?;
                }
            }
            _ => {
                self.del_line(id)?;
            }
        }
        Ok(())
    }

    /// Face between `start` and the next boundary to its right at `node`.
    fn face_beside(&self, node: NodeId, start: DirectedLineRef) -> Result<Option<FaceRef>> {
        if self.node(node)?.lines.len() < 2 {
            return Ok(None);
        }
        let Some(next) = self.angle_next_line(start, Side::Right, TypeMask::BOUNDARY)? else {
            return Ok(None);
        };
        if next.id == start.id {
            return Ok(None);
        }
        let face = self.face_on(next, Side::Right)?;
        Ok((!face.is_universe()).then_some(face))
    }

    /// Deletes an area or isle, returning its box.
    fn delete_face(&mut self, face: FaceRef) -> Result<Option<BoundingBox>> {
        match face {
            FaceRef::Area(a) if self.area_alive(a) => Ok(Some(self.del_area(a)?.bbox)),
            FaceRef::Isle(i) if self.isle_alive(i) => Ok(Some(self.del_isle(i)?.bbox)),
            _ => Ok(None),
        }
    }

    fn reattach_in_box(&mut self, source: &dyn GeometrySource, bbox: &BoundingBox) -> Result<()> {
        if self.level >= BuildLevel::AttachIsles {
            self.attach_isles_in_box(source, bbox)?;
        }
        if self.level >= BuildLevel::Centroids {
            self.attach_centroids_in_box(source, bbox)?;
        }
        Ok(())
    }
}

/// The side of the underlying line that lies on `side` of the directed
/// reference.
fn line_side(r: DirectedLineRef, side: Side) -> Side {
    match (r.forward, side) {
        (true, s) => s,
        (false, Side::Left) => Side::Right,
        (false, Side::Right) => Side::Left,
    }
}
