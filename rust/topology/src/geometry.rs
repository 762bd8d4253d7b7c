// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Planar measurements on faces.
//!
//! Topology records hold no coordinates beyond node positions, so ring
//! geometry is assembled from the geometry source on demand.

use nalgebra::Point3;
use vtopo_core::{AreaId, DirectedLineRef, GeometrySource, IsleId, LineId, LinePoints};

use crate::arena::TopologyGraph;
use crate::error::Result;

/// Where a point lies relative to a closed ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Containment {
    Outside,
    Inside,
    OnBoundary,
}

/// Shoelace area of a closed ring. Positive for counter-clockwise rings,
/// negative for clockwise ones.
pub fn signed_area(ring: &[Point3<f64>]) -> f64 {
    if ring.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, p) in ring.iter().enumerate() {
        let q = &ring[(i + 1) % ring.len()];
        sum += p.x * q.y - q.x * p.y;
    }
    sum / 2.0
}

/// Length ignoring z.
pub fn planar_length(points: &[Point3<f64>]) -> f64 {
    points
        .windows(2)
        .map(|w| (w[1].x - w[0].x).hypot(w[1].y - w[0].y))
        .sum()
}

/// Crossing-number test with an explicit boundary case.
pub fn point_in_ring(x: f64, y: f64, ring: &[Point3<f64>]) -> Containment {
    let n = ring.len();
    if n == 0 {
        return Containment::Outside;
    }
    let mut inside = false;
    for i in 0..n {
        let a = &ring[i];
        let b = &ring[(i + 1) % n];
        if on_segment(x, y, a, b) {
            return Containment::OnBoundary;
        }
        if (a.y > y) != (b.y > y) {
            let cross_x = a.x + (y - a.y) * (b.x - a.x) / (b.y - a.y);
            if x < cross_x {
                inside = !inside;
            }
        }
    }
    if inside {
        Containment::Inside
    } else {
        Containment::Outside
    }
}

fn on_segment(x: f64, y: f64, a: &Point3<f64>, b: &Point3<f64>) -> bool {
    let cross = (b.x - a.x) * (y - a.y) - (b.y - a.y) * (x - a.x);
    if cross != 0.0 {
        return false;
    }
    x >= a.x.min(b.x) && x <= a.x.max(b.x) && y >= a.y.min(b.y) && y <= a.y.max(b.y)
}

impl TopologyGraph {
    /// Coordinates along a ring of directed lines, junction points shared.
    pub fn ring_points(
        &self,
        source: &dyn GeometrySource,
        ring: &[DirectedLineRef],
    ) -> Result<LinePoints> {
        let mut out = LinePoints::new();
        for r in ring {
            let feature = source.read(r.id)?;
            out.append(&feature.points, !r.forward);
        }
        Ok(out)
    }

    pub fn area_points(&self, source: &dyn GeometrySource, area: AreaId) -> Result<LinePoints> {
        self.ring_points(source, &self.area(area)?.lines)
    }

    pub fn isle_points(&self, source: &dyn GeometrySource, isle: IsleId) -> Result<LinePoints> {
        self.ring_points(source, &self.isle(isle)?.lines)
    }

    /// Planar length of a stored line.
    pub fn line_length(&self, source: &dyn GeometrySource, id: LineId) -> Result<f64> {
        Ok(planar_length(source.read(id)?.points.points()))
    }

    /// Area of the outer ring minus its isles.
    pub fn area_size(&self, source: &dyn GeometrySource, area: AreaId) -> Result<f64> {
        let data = self.area(area)?;
        let mut size = signed_area(self.ring_points(source, &data.lines)?.points()).abs();
        for &isle in &data.isles {
            size -= signed_area(self.isle_points(source, isle)?.points()).abs();
        }
        Ok(size)
    }

    /// Length of the outer ring.
    pub fn area_perimeter(&self, source: &dyn GeometrySource, area: AreaId) -> Result<f64> {
        let mut total = 0.0;
        for r in &self.area(area)?.lines {
            total += self.line_length(source, r.id)?;
        }
        Ok(total)
    }

    /// Strictly inside the outer ring and not inside or on any isle ring.
    pub fn point_in_area(
        &self,
        source: &dyn GeometrySource,
        x: f64,
        y: f64,
        area: AreaId,
    ) -> Result<bool> {
        let data = self.area(area)?;
        if !data.bbox.contains_point(x, y) {
            return Ok(false);
        }
        let outer = self.ring_points(source, &data.lines)?;
        if point_in_ring(x, y, outer.points()) != Containment::Inside {
            return Ok(false);
        }
        for &isle in &data.isles {
            let hole = self.isle_points(source, isle)?;
            if point_in_ring(x, y, hole.points()) != Containment::Outside {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// A point inside the area, away from its isles: the centroid of the
    /// largest triangle of the area's triangulation.
    pub fn area_interior_point(
        &self,
        source: &dyn GeometrySource,
        area: AreaId,
    ) -> Result<Option<(f64, f64)>> {
        let data = self.area(area)?;
        let mut coords: Vec<f64> = Vec::new();
        let mut hole_indices: Vec<usize> = Vec::new();

        push_ring(&mut coords, self.ring_points(source, &data.lines)?.points());
        for &isle in &data.isles {
            hole_indices.push(coords.len() / 2);
            push_ring(&mut coords, self.isle_points(source, isle)?.points());
        }

        let Ok(indices) = earcutr::earcut(&coords, &hole_indices, 2) else {
            return Ok(None);
        };

        let vertex = |i: usize| (coords[2 * i], coords[2 * i + 1]);
        let mut best: Option<((f64, f64), f64)> = None;
        for tri in indices.chunks(3) {
            if tri.len() < 3 {
                continue;
            }
            let (a, b, c) = (vertex(tri[0]), vertex(tri[1]), vertex(tri[2]));
            let size = ((b.0 - a.0) * (c.1 - a.1) - (c.0 - a.0) * (b.1 - a.1)).abs() / 2.0;
            if best.map_or(true, |(_, s)| size > s) {
                let centroid = ((a.0 + b.0 + c.0) / 3.0, (a.1 + b.1 + c.1) / 3.0);
                best = Some((centroid, size));
            }
        }
        Ok(best.filter(|(_, s)| *s > 0.0).map(|(p, _)| p))
    }
}

/// Flattens a closed ring for triangulation, dropping the closing vertex.
fn push_ring(coords: &mut Vec<f64>, ring: &[Point3<f64>]) {
    let n = match (ring.first(), ring.last()) {
        (Some(f), Some(l)) if ring.len() > 1 && f.x == l.x && f.y == l.y => ring.len() - 1,
        _ => ring.len(),
    };
    for p in &ring[..n] {
        coords.push(p.x);
        coords.push(p.y);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn ring(coords: &[(f64, f64)]) -> Vec<Point3<f64>> {
        coords.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect()
    }

    #[test]
    fn signed_area_follows_orientation() {
        let ccw = ring(&[(0.0, 0.0), (2.0, 0.0), (2.0, 3.0), (0.0, 3.0), (0.0, 0.0)]);
        assert_relative_eq!(signed_area(&ccw), 6.0);
        let mut cw = ccw.clone();
        cw.reverse();
        assert_relative_eq!(signed_area(&cw), -6.0);
        assert_eq!(signed_area(&ring(&[(0.0, 0.0), (1.0, 1.0)])), 0.0);
    }

    #[test]
    fn point_in_ring_cases() {
        let sq = ring(&[(0.0, 0.0), (4.0, 0.0), (4.0, 4.0), (0.0, 4.0), (0.0, 0.0)]);
        assert_eq!(point_in_ring(2.0, 2.0, &sq), Containment::Inside);
        assert_eq!(point_in_ring(5.0, 2.0, &sq), Containment::Outside);
        assert_eq!(point_in_ring(4.0, 1.0, &sq), Containment::OnBoundary);
        assert_eq!(point_in_ring(0.0, 0.0, &sq), Containment::OnBoundary);
        // ray passing through a vertex
        let diamond = ring(&[(0.0, 2.0), (2.0, 0.0), (4.0, 2.0), (2.0, 4.0), (0.0, 2.0)]);
        assert_eq!(point_in_ring(1.0, 2.0, &diamond), Containment::Inside);
        assert_eq!(point_in_ring(-1.0, 2.0, &diamond), Containment::Outside);
    }

    #[test]
    fn planar_length_ignores_z() {
        let pts = vec![Point3::new(0.0, 0.0, 0.0), Point3::new(3.0, 4.0, 100.0)];
        assert_relative_eq!(planar_length(&pts), 5.0);
    }

    #[test]
    fn push_ring_drops_closing_vertex() {
        let mut coords = Vec::new();
        push_ring(&mut coords, &ring(&[(0.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]));
        assert_eq!(coords.len(), 6);
    }
}
