// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Adjacency queries and ring tracing.
//!
//! Rings are traced by stepping, at every node, to the next higher angle
//! from the line the walk arrived on. That is the sharpest right turn, so
//! the traced face stays on the right of every ring entry.

use vtopo_core::{
    AreaId, DirectedLineRef, FaceRef, IsleId, LineId, LineType, NodeId, TypeMask,
    DEGENERATE_ANGLE,
};

use crate::arena::*;
use crate::error::{Error, Result};

/// How tracing a ring from one side of a line ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RingTrace {
    /// The walk returned to the first line.
    Closed(Vec<DirectedLineRef>),
    /// No ring: a dangle, a line met twice or ambiguous angles at a node.
    Open,
}

impl TopologyGraph {
    // --- Incidence ---

    /// Lines incident to `node`, sorted by outgoing angle. Each entry points
    /// away from the node.
    pub fn node_lines(&self, node: NodeId) -> Result<&[DirectedLineRef]> {
        Ok(&self.node(node)?.lines)
    }

    /// Outgoing angle of `line` at the node it starts from.
    pub fn node_line_angle(&self, line: DirectedLineRef) -> Result<f32> {
        let node = self.start_node(line)?;
        let data = self.node(node)?;
        let pos = data
            .position(line)
            .ok_or_else(|| Error::invariant(node, format!("{line} is not incident")))?;
        Ok(data.angles[pos])
    }

    /// Node the directed line leaves from.
    pub fn start_node(&self, line: DirectedLineRef) -> Result<NodeId> {
        self.line(line.id)?
            .start_node(line.forward)
            .ok_or_else(|| Error::invariant(line.id, "line has no nodes"))
    }

    pub fn line_nodes(&self, id: LineId) -> Result<(NodeId, NodeId)> {
        self.line(id)?
            .nodes()
            .ok_or_else(|| Error::invariant(id, "line has no nodes"))
    }

    /// `(left, right)` faces of a boundary.
    pub fn line_faces(&self, id: LineId) -> Result<(FaceRef, FaceRef)> {
        self.line(id)?
            .faces()
            .ok_or_else(|| Error::invariant(id, "not a boundary"))
    }

    /// Face on `side` of the directed line.
    pub fn face_on(&self, line: DirectedLineRef, side: Side) -> Result<FaceRef> {
        let (left, right) = self.line_faces(line.id)?;
        Ok(match (side, line.forward) {
            (Side::Right, true) | (Side::Left, false) => right,
            (Side::Left, true) | (Side::Right, false) => left,
        })
    }

    // --- Faces ---

    /// Outer ring of an area, clockwise.
    pub fn area_boundaries(&self, area: AreaId) -> Result<&[DirectedLineRef]> {
        Ok(&self.area(area)?.lines)
    }

    /// Ring of an isle, counter-clockwise.
    pub fn isle_boundaries(&self, isle: IsleId) -> Result<&[DirectedLineRef]> {
        Ok(&self.isle(isle)?.lines)
    }

    pub fn area_isles(&self, area: AreaId) -> Result<&[IsleId]> {
        Ok(&self.area(area)?.isles)
    }

    pub fn isle_area(&self, isle: IsleId) -> Result<Option<AreaId>> {
        Ok(self.isle(isle)?.area)
    }

    pub fn area_centroid(&self, area: AreaId) -> Result<Option<LineId>> {
        Ok(self.area(area)?.centroid)
    }

    pub fn centroid_area(&self, centroid: LineId) -> Result<CentroidArea> {
        self.line(centroid)?
            .centroid_area()
            .ok_or_else(|| Error::invariant(centroid, "not a centroid"))
    }

    /// Area a face resolves to: itself for an area, the containing area for
    /// an isle, none for the universe.
    pub fn face_area(&self, face: FaceRef) -> Result<Option<AreaId>> {
        match face {
            FaceRef::Universe => Ok(None),
            FaceRef::Area(a) => Ok(Some(a)),
            FaceRef::Isle(i) => self.isle_area(i),
        }
    }

    // --- Angle walks ---

    /// Next line of a type in `mask` around the node where `current` starts.
    ///
    /// [`Side::Right`] steps to higher angles, [`Side::Left`] to lower ones,
    /// wrapping around. Degenerate entries are skipped. When nothing else
    /// matches, `current` itself is returned if its type matches (a dangle);
    /// `None` means no candidate at all.
    pub fn angle_next_line(
        &self,
        current: DirectedLineRef,
        side: Side,
        mask: TypeMask,
    ) -> Result<Option<DirectedLineRef>> {
        let node_id = self.start_node(current)?;
        let node = self.node(node_id)?;
        let Some(start) = node.position(current) else {
            return Ok(None);
        };
        let n = node.lines.len();
        let mut next = start;
        loop {
            next = match side {
                Side::Right => (next + 1) % n,
                Side::Left => (next + n - 1) % n,
            };
            if node.angles[next] == DEGENERATE_ANGLE {
                if next == start {
                    break;
                }
                continue;
            }
            let candidate = node.lines[next];
            if mask.contains(self.line(candidate.id)?.kind) {
                return Ok(Some(candidate));
            }
            if next == start {
                break;
            }
        }
        Ok(None)
    }

    /// False if a neighbouring line of the same types leaves the node at
    /// exactly the same angle, which makes the walk direction ambiguous.
    pub fn node_angle_check(&self, line: DirectedLineRef, mask: TypeMask) -> Result<bool> {
        let angle = self.node_line_angle(line)?;
        if angle == DEGENERATE_ANGLE {
            return Ok(false);
        }
        for side in [Side::Right, Side::Left] {
            if let Some(other) = self.angle_next_line(line, side, mask)? {
                if other != line && self.node_line_angle(other)? == angle {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }

    /// Traces the ring on `side` of boundary `line`.
    ///
    /// The walk starts along the line so that the requested side is on its
    /// right, then at every node takes the next boundary to the right.
    pub fn build_area_with_line(&self, line: LineId, side: Side) -> Result<RingTrace> {
        let data = self.line(line)?;
        if data.kind != LineType::Boundary {
            return Err(Error::invariant(line, "rings are traced along boundaries"));
        }
        if data.degenerate {
            return Ok(RingTrace::Open);
        }

        let first = match side {
            Side::Right => DirectedLineRef::forward(line),
            Side::Left => DirectedLineRef::backward(line),
        };
        let mut ring = vec![first];
        let mut prev = first.reversed();
        loop {
            let next = self
                .angle_next_line(prev, Side::Right, TypeMask::BOUNDARY)?
                .ok_or_else(|| Error::invariant(prev.id, "no boundary at node of a boundary"))?;
            if !self.node_angle_check(next, TypeMask::BOUNDARY)? {
                return Ok(RingTrace::Open);
            }
            if next == first {
                return Ok(RingTrace::Closed(ring));
            }
            if next == prev {
                // dead end
                return Ok(RingTrace::Open);
            }
            if ring.iter().any(|r| r.id == next.id) {
                return Ok(RingTrace::Open);
            }
            ring.push(next);
            prev = next.reversed();
        }
    }
}
