// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Building topology from the geometry source.
//!
//! A full build runs in stages, each one a [`BuildLevel`]:
//!
//! 1. **Base**: register every live feature, creating nodes at line
//!    endpoints (endpoints closer than the threshold share a node).
//! 2. **Areas**: trace a ring on each free side of every boundary.
//!    Clockwise rings become areas, counter-clockwise rings isles.
//! 3. **AttachIsles**: link each isle to the smallest area containing it.
//! 4. **Centroids**: link each centroid to the area it falls in. The first
//!    centroid of an area wins, later ones are duplicates.
//!
//! The face construction and attach routines are shared with incremental
//! updates.

use rustc_hash::FxHashSet;
use serde::Serialize;
use vtopo_core::{AreaId, BoundingBox, FaceRef, GeometrySource, IsleId, LineId, LineType};

use crate::arena::*;
use crate::error::Result;
use crate::geometry::{point_in_ring, signed_area, Containment};
use crate::traversal::RingTrace;

/// Options of a full build.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BuildOptions {
    pub level: BuildLevel,
    /// Endpoints closer than this share a node.
    pub threshold: f64,
    /// Log progress every this many lines; 0 disables.
    pub progress_interval: usize,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            level: BuildLevel::ALL,
            threshold: 0.0,
            progress_interval: 10_000,
        }
    }
}

/// Summary of a build.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BuildStats {
    pub level: Option<BuildLevel>,
    pub lines: usize,
    pub nodes: usize,
    pub areas: usize,
    pub isles: usize,
    /// Lines or boundaries whose points all coincide.
    pub degenerate: usize,
    /// Closed rings with zero area; no face was created for them.
    pub zero_rings: usize,
    pub centroids_attached: usize,
    pub centroids_duplicate: usize,
    pub centroids_outside: usize,
    pub isles_outside: usize,
}

impl TopologyGraph {
    /// Rebuilds the topology from scratch up to `options.level`.
    pub fn build(
        &mut self,
        source: &dyn GeometrySource,
        options: &BuildOptions,
    ) -> Result<BuildStats> {
        self.clear();
        self.threshold = options.threshold;
        let mut stats = BuildStats::default();
        if options.level == BuildLevel::None {
            stats.level = Some(BuildLevel::None);
            return Ok(stats);
        }

        // Base
        let ids = source.live_ids();
        tracing::info!(lines = ids.len(), threshold = options.threshold, "Registering lines");
        for (i, &id) in ids.iter().enumerate() {
            let feature = source.read(id)?;
            self.add_line(id, feature.kind, &feature.points)?;
            if self.lines.get(id).is_some_and(|l| l.degenerate) {
                tracing::warn!(line = %id, "Degenerate line: all points coincide");
                stats.degenerate += 1;
            }
            if options.progress_interval > 0 && (i + 1) % options.progress_interval == 0 {
                tracing::info!(done = i + 1, total = ids.len(), "Registering lines");
            }
        }
        self.level = BuildLevel::Base;

        if options.level >= BuildLevel::Areas {
            let boundaries: Vec<LineId> = self
                .lines
                .iter()
                .filter(|(_, l)| l.kind == LineType::Boundary)
                .map(|(id, _)| id)
                .collect();
            tracing::info!(boundaries = boundaries.len(), "Building areas");
            for (i, &line) in boundaries.iter().enumerate() {
                for side in [Side::Left, Side::Right] {
                    if let FaceBuild::ZeroArea = self.build_line_area(source, line, side)? {
                        stats.zero_rings += 1;
                    }
                }
                if options.progress_interval > 0 && (i + 1) % options.progress_interval == 0 {
                    tracing::info!(done = i + 1, total = boundaries.len(), "Building areas");
                }
            }
            self.level = BuildLevel::Areas;
        }

        if options.level >= BuildLevel::AttachIsles {
            tracing::info!(isles = self.isles.len(), "Attaching islands");
            for isle in self.isles.ids() {
                if self.attach_isle(source, isle)?.is_none() {
                    stats.isles_outside += 1;
                }
            }
            self.level = BuildLevel::AttachIsles;
        }

        if options.level >= BuildLevel::Centroids {
            let centroids: Vec<LineId> = self
                .lines
                .iter()
                .filter(|(_, l)| l.kind == LineType::Centroid)
                .map(|(id, _)| id)
                .collect();
            tracing::info!(centroids = centroids.len(), "Attaching centroids");
            for id in centroids {
                match self.attach_centroid(source, id)? {
                    CentroidArea::Area(_) => stats.centroids_attached += 1,
                    CentroidArea::Duplicate(area) => {
                        tracing::debug!(centroid = %id, area = %area, "Duplicate centroid");
                        stats.centroids_duplicate += 1;
                    }
                    CentroidArea::Outside => stats.centroids_outside += 1,
                }
            }
            self.level = BuildLevel::Centroids;
        }

        stats.level = Some(self.level);
        stats.lines = self.lines.len();
        stats.nodes = self.nodes.len();
        stats.areas = self.areas.len();
        stats.isles = self.isles.len();
        tracing::info!(
            level = %self.level,
            nodes = stats.nodes,
            lines = stats.lines,
            areas = stats.areas,
            isles = stats.isles,
            "Topology built"
        );
        Ok(stats)
    }

    /// Traces the face on `side` of boundary `line` and registers it as an
    /// area or isle. Sides that already have a face are left alone.
    pub(crate) fn build_line_area(
        &mut self,
        source: &dyn GeometrySource,
        line: LineId,
        side: Side,
    ) -> Result<FaceBuild> {
        let (left, right) = self.line_faces(line)?;
        let occupied = match side {
            Side::Left => left,
            Side::Right => right,
        };
        if !occupied.is_universe() {
            return Ok(FaceBuild::Occupied);
        }
        let RingTrace::Closed(ring) = self.build_area_with_line(line, side)? else {
            return Ok(FaceBuild::Open);
        };

        let size = signed_area(self.ring_points(source, &ring)?.points());
        if size < 0.0 {
            Ok(FaceBuild::Built(FaceRef::Area(self.add_area(ring)?)))
        } else if size > 0.0 {
            Ok(FaceBuild::Built(FaceRef::Isle(self.add_isle(ring)?)))
        } else {
            tracing::warn!(line = %line, "Closed ring with zero area, no face created");
            Ok(FaceBuild::ZeroArea)
        }
    }

    /// Links `isle` to the smallest area whose outer ring contains it, or
    /// unlinks it when none does.
    pub(crate) fn attach_isle(
        &mut self,
        source: &dyn GeometrySource,
        isle: IsleId,
    ) -> Result<Option<AreaId>> {
        let data = self.isle(isle)?;
        let isle_lines: FxHashSet<LineId> = data.lines.iter().map(|r| r.id).collect();
        let isle_points = self.ring_points(source, &data.lines)?;
        let isle_bbox = data.bbox;
        let current = data.area;

        let mut candidates = self.sidx.areas.query(&isle_bbox);
        candidates.sort_unstable();

        let mut best: Option<(AreaId, f64)> = None;
        for area in candidates {
            let adata = self.area(area)?;
            if !adata.bbox.contains(&isle_bbox) {
                continue;
            }
            if adata.lines.iter().any(|r| isle_lines.contains(&r.id)) {
                continue;
            }
            let outer = self.ring_points(source, &adata.lines)?;
            let inside = isle_points
                .points()
                .iter()
                .map(|p| point_in_ring(p.x, p.y, outer.points()))
                .find(|c| *c != Containment::OnBoundary)
                == Some(Containment::Inside);
            if !inside {
                continue;
            }
            let size = signed_area(outer.points()).abs();
            if best.map_or(true, |(_, s)| size < s) {
                best = Some((area, size));
            }
        }

        let target = best.map(|(a, _)| a);
        match (current, target) {
            (Some(from), Some(to)) if from == to => {}
            (_, Some(to)) => self.area_add_isle(to, isle)?,
            (Some(from), None) => self.area_del_isle(from, isle)?,
            (None, None) => {}
        }
        Ok(target)
    }

    /// Re-attaches every isle whose box meets `bbox`.
    pub(crate) fn attach_isles_in_box(
        &mut self,
        source: &dyn GeometrySource,
        bbox: &BoundingBox,
    ) -> Result<()> {
        let mut isles = self.sidx.isles.query(bbox);
        isles.sort_unstable();
        for isle in isles {
            self.attach_isle(source, isle)?;
        }
        Ok(())
    }

    /// Area strictly containing `(x, y)`, if any.
    pub fn find_area(&self, source: &dyn GeometrySource, x: f64, y: f64) -> Result<Option<AreaId>> {
        let mut candidates = self
            .sidx
            .areas
            .query(&BoundingBox::from_point(x, y, 0.0));
        candidates.sort_unstable();
        for area in candidates {
            if self.point_in_area(source, x, y, area)? {
                return Ok(Some(area));
            }
        }
        Ok(None)
    }

    /// Links a centroid to the area it falls in.
    pub(crate) fn attach_centroid(
        &mut self,
        source: &dyn GeometrySource,
        centroid: LineId,
    ) -> Result<CentroidArea> {
        let feature = source.read(centroid)?;
        let Some(p) = feature.points.first().copied() else {
            return Err(vtopo_core::Error::EmptyGeometry.into());
        };
        let to = match self.find_area(source, p.x, p.y)? {
            None => CentroidArea::Outside,
            Some(area) => match self.area(area)?.centroid {
                Some(existing) if existing != centroid => CentroidArea::Duplicate(area),
                _ => CentroidArea::Area(area),
            },
        };
        self.set_centroid_area(centroid, to)?;
        Ok(to)
    }

    /// Detaches and re-attaches every centroid in `bbox`, in id order.
    pub(crate) fn attach_centroids_in_box(
        &mut self,
        source: &dyn GeometrySource,
        bbox: &BoundingBox,
    ) -> Result<()> {
        let mut centroids: Vec<LineId> = self
            .sidx
            .lines
            .query(bbox)
            .into_iter()
            .filter(|&id| self.lines.get(id).is_some_and(|l| l.kind == LineType::Centroid))
            .collect();
        centroids.sort_unstable();

        for &id in &centroids {
            if self.centroid_area(id)? != CentroidArea::Outside {
                self.set_centroid_area(id, CentroidArea::Outside)?;
            }
        }
        for &id in &centroids {
            self.attach_centroid(source, id)?;
        }
        Ok(())
    }
}

/// Outcome of [`TopologyGraph::build_line_area`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FaceBuild {
    Built(FaceRef),
    Occupied,
    Open,
    ZeroArea,
}

impl FaceBuild {
    /// Box of the face that was built, if any.
    pub(crate) fn bbox(self, graph: &TopologyGraph) -> Option<BoundingBox> {
        match self {
            FaceBuild::Built(FaceRef::Area(a)) => graph.area(a).ok().map(|d| d.bbox),
            FaceBuild::Built(FaceRef::Isle(i)) => graph.isle(i).ok().map(|d| d.bbox),
            _ => None,
        }
    }
}
