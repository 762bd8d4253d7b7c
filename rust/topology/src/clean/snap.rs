// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Snapping vertices onto nearby lines.

use serde::Serialize;
use vtopo_core::{BoundingBox, GeometrySource, LineId, TypeMask};

use crate::arena::BuildLevel;
use crate::dataset::Dataset;
use crate::error::Result;

/// What a point snaps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapMode {
    /// The nearest vertex of a line.
    Vertex,
    /// The nearest point anywhere on a line's segments.
    Segment,
}

/// Position a point snapped to.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SnapHit {
    pub line: LineId,
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub distance: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SnapOutcome {
    /// No vertex moved.
    Unchanged,
    /// The line was rewritten with `moved` vertices displaced.
    Snapped { moved: usize },
    /// Snapping left fewer than two distinct vertices; the line was deleted.
    Collapsed,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SnapReport {
    pub snapped: usize,
    pub vertices: usize,
    pub collapsed: usize,
}

impl Dataset {
    /// Nearest position on a line of a type in `types` within `threshold`
    /// of `(x, y)`. Equal distances resolve to the lower line id.
    pub fn snap_point(
        &self,
        x: f64,
        y: f64,
        threshold: f64,
        mode: SnapMode,
        types: TypeMask,
        exclude: Option<LineId>,
    ) -> Result<Option<SnapHit>> {
        let candidates = self.select_lines_by_box(&BoundingBox::around(x, y, threshold), types)?;

        let mut best: Option<SnapHit> = None;
        for id in candidates {
            if Some(id) == exclude {
                continue;
            }
            let points = self.read_line(id)?.points;
            let hit = match mode {
                SnapMode::Vertex => points.nearest_vertex(x, y).map(|(i, distance)| {
                    let p = points.points()[i];
                    SnapHit {
                        line: id,
                        x: p.x,
                        y: p.y,
                        z: p.z,
                        distance,
                    }
                }),
                SnapMode::Segment => points.nearest_point(x, y).map(|p| SnapHit {
                    line: id,
                    x: p.x,
                    y: p.y,
                    z: p.z,
                    distance: p.distance,
                }),
            };
            let Some(hit) = hit else {
                continue;
            };
            if hit.distance > threshold {
                continue;
            }
            // candidates are ascending, so strict comparison keeps the lower id
            if best.map_or(true, |b| hit.distance < b.distance) {
                best = Some(hit);
            }
        }
        Ok(best)
    }

    /// Moves every vertex of line `id` onto the nearest vertex of another
    /// line within `threshold`, or failing that onto the nearest segment.
    pub fn snap_line(&mut self, id: LineId, threshold: f64, types: TypeMask) -> Result<SnapOutcome> {
        self.graph
            .require(BuildLevel::Base)
            .map_err(|e| self.err(e))?;
        let feature = self.read_line(id)?;
        let mut points = feature.points.clone();

        let mut moved = 0;
        for p in points.points_mut() {
            let hit = match self.snap_point(p.x, p.y, threshold, SnapMode::Vertex, types, Some(id))? {
                Some(hit) => Some(hit),
                None => self.snap_point(p.x, p.y, threshold, SnapMode::Segment, types, Some(id))?,
            };
            let Some(hit) = hit else {
                continue;
            };
            if hit.x != p.x || hit.y != p.y {
                p.x = hit.x;
                p.y = hit.y;
                if self.with_z() {
                    p.z = hit.z;
                }
                moved += 1;
            }
        }
        if moved == 0 {
            return Ok(SnapOutcome::Unchanged);
        }

        points.prune();
        if feature.kind.is_line_class() && points.is_degenerate() {
            self.delete_line(id)?;
            tracing::debug!(line = %id, "Line collapsed while snapping, deleted");
            return Ok(SnapOutcome::Collapsed);
        }
        self.rewrite_line(id, feature.kind, points, feature.cats)?;
        Ok(SnapOutcome::Snapped { moved })
    }

    /// Runs [`Dataset::snap_line`] on every live line of a type in `types`.
    pub fn snap_lines(&mut self, types: TypeMask, threshold: f64) -> Result<SnapReport> {
        let mut report = SnapReport::default();
        for id in self.source.live_ids() {
            if !self.source.is_alive(id) {
                continue;
            }
            let kind = self.source.read_kind(id).map_err(|e| self.err(e))?;
            if !types.contains(kind) {
                continue;
            }
            match self.snap_line(id, threshold, types)? {
                SnapOutcome::Unchanged => {}
                SnapOutcome::Snapped { moved } => {
                    report.snapped += 1;
                    report.vertices += moved;
                }
                SnapOutcome::Collapsed => report.collapsed += 1,
            }
        }
        tracing::info!(
            snapped = report.snapped,
            vertices = report.vertices,
            collapsed = report.collapsed,
            threshold,
            "Lines snapped"
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use vtopo_core::{Categories, LinePoints, LineType};

    fn line(ds: &mut Dataset, coords: &[(f64, f64)]) -> LineId {
        ds.write_line(LineType::Line, LinePoints::from_xy(coords), Categories::new())
            .unwrap()
    }

    #[test]
    fn vertex_and_segment_modes() {
        let mut ds = Dataset::in_memory("snap", false);
        let target = line(&mut ds, &[(0.0, 0.0), (10.0, 0.0)]);

        let hit = ds
            .snap_point(4.0, 0.5, 1.0, SnapMode::Segment, TypeMask::ALL, None)
            .unwrap()
            .unwrap();
        assert_eq!(hit.line, target);
        assert_relative_eq!(hit.x, 4.0);
        assert_relative_eq!(hit.y, 0.0);
        assert_relative_eq!(hit.distance, 0.5);

        // no vertex within reach
        assert!(ds
            .snap_point(4.0, 0.5, 1.0, SnapMode::Vertex, TypeMask::ALL, None)
            .unwrap()
            .is_none());
        // limit is inclusive
        let hit = ds
            .snap_point(10.0, 1.0, 1.0, SnapMode::Vertex, TypeMask::ALL, None)
            .unwrap()
            .unwrap();
        assert_relative_eq!(hit.x, 10.0);
        assert!(ds
            .snap_point(4.0, 0.5, 1.0, SnapMode::Segment, TypeMask::ALL, Some(target))
            .unwrap()
            .is_none());
    }

    #[test]
    fn snap_line_prefers_vertices() {
        let mut ds = Dataset::in_memory("snap", false);
        line(&mut ds, &[(0.0, 0.0), (10.0, 0.0)]);
        let moving = line(&mut ds, &[(0.2, 0.1), (5.0, 0.3), (5.0, 5.0)]);

        let outcome = ds.snap_line(moving, 0.5, TypeMask::LINES).unwrap();
        assert_eq!(outcome, SnapOutcome::Snapped { moved: 2 });
        assert_eq!(
            ds.read_line(moving).unwrap().points,
            LinePoints::from_xy(&[(0.0, 0.0), (5.0, 0.0), (5.0, 5.0)])
        );
    }

    #[test]
    fn short_line_collapses() {
        let mut ds = Dataset::in_memory("snap", false);
        line(&mut ds, &[(0.0, 0.0), (10.0, 0.0)]);
        let tiny = line(&mut ds, &[(3.0, 0.1), (3.0, 0.2)]);

        assert_eq!(ds.snap_line(tiny, 0.5, TypeMask::LINES).unwrap(), SnapOutcome::Collapsed);
        assert!(!ds.source().is_alive(tiny));
        let report = ds.snap_lines(TypeMask::LINES, 0.5).unwrap();
        assert_eq!(report, SnapReport::default());
    }
}
