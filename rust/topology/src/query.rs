// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Spatial lookups over a built topology.

use serde::Serialize;
use vtopo_core::{AreaId, BoundingBox, GeometrySource, IsleId, LineId, LineType, NodeId, TypeMask};

use crate::arena::*;
use crate::error::Result;

/// Entity counts of a graph, by kind and by line type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct TopologySummary {
    pub level: BuildLevel,
    pub nodes: usize,
    pub points: usize,
    pub lines: usize,
    pub boundaries: usize,
    pub centroids: usize,
    pub faces: usize,
    pub kernels: usize,
    pub areas: usize,
    pub isles: usize,
}

impl TopologyGraph {
    /// Nearest line of a type in `mask` within `max_dist` of `(x, y)`.
    ///
    /// Distance is measured to the closest point on the line; equal
    /// distances resolve to the lower id.
    pub fn find_line(
        &self,
        source: &dyn GeometrySource,
        x: f64,
        y: f64,
        mask: TypeMask,
        max_dist: f64,
        exclude: Option<LineId>,
    ) -> Result<Option<LineId>> {
        let mut best: Option<(LineId, f64)> = None;
        for id in self.sidx.lines.query(&BoundingBox::around(x, y, max_dist)) {
            if Some(id) == exclude {
                continue;
            }
            match self.lines.get(id) {
                Some(l) if mask.contains(l.kind) => {}
                _ => continue,
            }
            let Some(hit) = source.read(id)?.points.nearest_point(x, y) else {
                continue;
            };
            if hit.distance > max_dist {
                continue;
            }
            let better = match best {
                None => true,
                Some((bid, bd)) => hit.distance < bd || (hit.distance == bd && id < bid),
            };
            if better {
                best = Some((id, hit.distance));
            }
        }
        Ok(best.map(|(id, _)| id))
    }

    /// Nearest node within `max_dist` of `(x, y)`.
    pub fn find_node(&self, x: f64, y: f64, max_dist: f64) -> Option<NodeId> {
        self.find_node_within(x, y, max_dist)
    }

    /// Lines of a type in `mask` whose box meets `bbox`, ascending.
    pub fn select_lines_by_box(&self, bbox: &BoundingBox, mask: TypeMask) -> Vec<LineId> {
        let mut ids: Vec<LineId> = self
            .sidx
            .lines
            .query(bbox)
            .into_iter()
            .filter(|&id| self.lines.get(id).is_some_and(|l| mask.contains(l.kind)))
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn select_nodes_by_box(&self, bbox: &BoundingBox) -> Vec<NodeId> {
        let mut ids = self.sidx.nodes.query(bbox);
        ids.sort_unstable();
        ids
    }

    pub fn select_areas_by_box(&self, bbox: &BoundingBox) -> Vec<AreaId> {
        let mut ids = self.sidx.areas.query(bbox);
        ids.sort_unstable();
        ids
    }

    pub fn select_isles_by_box(&self, bbox: &BoundingBox) -> Vec<IsleId> {
        let mut ids = self.sidx.isles.query(bbox);
        ids.sort_unstable();
        ids
    }

    pub fn summary(&self) -> TopologySummary {
        TopologySummary {
            level: self.level,
            nodes: self.nodes.len(),
            points: self.count_of(LineType::Point),
            lines: self.count_of(LineType::Line),
            boundaries: self.count_of(LineType::Boundary),
            centroids: self.count_of(LineType::Centroid),
            faces: self.count_of(LineType::Face),
            kernels: self.count_of(LineType::Kernel),
            areas: self.areas.len(),
            isles: self.isles.len(),
        }
    }
}
