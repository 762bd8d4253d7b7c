// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Point sequences (line geometry) and the planar measurements taken on
//! them: endpoint direction angles, lengths and nearest-point queries.

use nalgebra::{Point3, Vector2};

use crate::bounds::BoundingBox;

/// Angle reported for a line that has no direction at its endpoint.
pub const DEGENERATE_ANGLE: f32 = -9.0;

/// How a point sequence fails to describe a line with extent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Degeneracy {
    /// At least two distinct points.
    None,
    /// Exactly one point.
    SinglePoint,
    /// Several points, all identical.
    Collapsed,
}

/// Ordered list of coordinates.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LinePoints {
    points: Vec<Point3<f64>>,
}

/// Result of projecting a point onto a line.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NearestPoint {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    /// Planar distance from the query point.
    pub distance: f64,
    /// Index of the segment's first vertex.
    pub segment: usize,
}

impl LinePoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            points: Vec::with_capacity(n),
        }
    }

    /// Builds a 2D sequence (z = 0).
    pub fn from_xy(coords: &[(f64, f64)]) -> Self {
        Self {
            points: coords.iter().map(|&(x, y)| Point3::new(x, y, 0.0)).collect(),
        }
    }

    pub fn from_points(points: Vec<Point3<f64>>) -> Self {
        Self { points }
    }

    #[inline]
    pub fn push(&mut self, x: f64, y: f64, z: f64) {
        self.points.push(Point3::new(x, y, z));
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.points.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    #[inline]
    pub fn points(&self) -> &[Point3<f64>] {
        &self.points
    }

    #[inline]
    pub fn points_mut(&mut self) -> &mut [Point3<f64>] {
        &mut self.points
    }

    #[inline]
    pub fn first(&self) -> Option<&Point3<f64>> {
        self.points.first()
    }

    #[inline]
    pub fn last(&self) -> Option<&Point3<f64>> {
        self.points.last()
    }

    pub fn into_points(self) -> Vec<Point3<f64>> {
        self.points
    }

    pub fn bbox(&self) -> Option<BoundingBox> {
        let first = self.points.first()?;
        let mut b = BoundingBox::from_point(first.x, first.y, first.z);
        for p in &self.points[1..] {
            b.expand(p.x, p.y, p.z);
        }
        Some(b)
    }

    /// Length along the sequence.
    pub fn length(&self) -> f64 {
        self.points.windows(2).map(|w| (w[1] - w[0]).norm()).sum()
    }

    pub fn reverse(&mut self) {
        self.points.reverse();
    }

    /// Appends `other`, optionally reversed, dropping its first point when it
    /// repeats the current last point.
    pub fn append(&mut self, other: &LinePoints, reversed: bool) {
        let start = self.points.len();
        self.points.extend_from_slice(&other.points);
        if reversed {
            self.points[start..].reverse();
        }
        if start > 0 && self.points.len() > start && self.points[start - 1] == self.points[start] {
            self.points.remove(start);
        }
    }

    /// Removes consecutive duplicate points. Returns the number removed.
    pub fn prune(&mut self) -> usize {
        let before = self.points.len();
        self.points.dedup();
        before - self.points.len()
    }

    pub fn degeneracy(&self) -> Degeneracy {
        match self.points.split_first() {
            None => Degeneracy::SinglePoint,
            Some((_, [])) => Degeneracy::SinglePoint,
            Some((first, rest)) => {
                if rest.iter().all(|p| p.x == first.x && p.y == first.y) {
                    Degeneracy::Collapsed
                } else {
                    Degeneracy::None
                }
            }
        }
    }

    #[inline]
    pub fn is_degenerate(&self) -> bool {
        self.degeneracy() != Degeneracy::None
    }

    /// Direction angle leaving the first point.
    ///
    /// Looks for the first vertex that differs from the start by more than
    /// `lookback` in x or y; falls back to the last vertex. Degenerate
    /// sequences get [`DEGENERATE_ANGLE`].
    pub fn begin_angle(&self, lookback: f64) -> f32 {
        direction_angle(self.points.iter(), lookback, self.is_degenerate())
    }

    /// Direction angle leaving the last point, walking backwards.
    pub fn end_angle(&self, lookback: f64) -> f32 {
        direction_angle(self.points.iter().rev(), lookback, self.is_degenerate())
    }

    /// Nearest vertex to `(x, y)` as `(index, planar distance)`.
    pub fn nearest_vertex(&self, x: f64, y: f64) -> Option<(usize, f64)> {
        let mut best: Option<(usize, f64)> = None;
        for (i, p) in self.points.iter().enumerate() {
            let d = (p.x - x).hypot(p.y - y);
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best
    }

    /// Nearest point on any segment to `(x, y)`. A single-point sequence
    /// yields that point.
    pub fn nearest_point(&self, x: f64, y: f64) -> Option<NearestPoint> {
        let first = self.points.first()?;
        if self.points.len() == 1 {
            return Some(NearestPoint {
                x: first.x,
                y: first.y,
                z: first.z,
                distance: (first.x - x).hypot(first.y - y),
                segment: 0,
            });
        }

        let q = Vector2::new(x, y);
        let mut best: Option<NearestPoint> = None;
        for (i, w) in self.points.windows(2).enumerate() {
            let a = Vector2::new(w[0].x, w[0].y);
            let b = Vector2::new(w[1].x, w[1].y);
            let ab = b - a;
            let len2 = ab.norm_squared();
            let t = if len2 > 0.0 {
                ((q - a).dot(&ab) / len2).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let c = a + ab * t;
            let d = (q - c).norm();
            if best.map_or(true, |bp| d < bp.distance) {
                best = Some(NearestPoint {
                    x: c.x,
                    y: c.y,
                    z: w[0].z + (w[1].z - w[0].z) * t,
                    distance: d,
                    segment: i,
                });
            }
        }
        best
    }
}

fn direction_angle<'a>(
    mut iter: impl Iterator<Item = &'a Point3<f64>>,
    lookback: f64,
    degenerate: bool,
) -> f32 {
    if degenerate {
        return DEGENERATE_ANGLE;
    }
    let Some(origin) = iter.next() else {
        return DEGENERATE_ANGLE;
    };

    let mut last = origin;
    for p in iter {
        last = p;
        if (p.x - origin.x).abs() > lookback || (p.y - origin.y).abs() > lookback {
            return (p.y - origin.y).atan2(p.x - origin.x) as f32;
        }
    }
    (last.y - origin.y).atan2(last.x - origin.x) as f32
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use std::f32::consts::{FRAC_PI_2, PI};

    #[test]
    fn begin_and_end_angles() {
        let line = LinePoints::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        assert_relative_eq!(line.begin_angle(0.0), 0.0);
        assert_relative_eq!(line.end_angle(0.0), -FRAC_PI_2);
    }

    #[test]
    fn angle_skips_coincident_vertices() {
        let line = LinePoints::from_xy(&[(0.0, 0.0), (0.0, 0.0), (-1.0, 0.0)]);
        assert_relative_eq!(line.begin_angle(0.0), PI);
    }

    #[test]
    fn lookback_skips_near_vertices() {
        let line = LinePoints::from_xy(&[(0.0, 0.0), (0.1, 0.0), (0.0, 5.0)]);
        assert_relative_eq!(line.begin_angle(0.5), FRAC_PI_2);
    }

    #[test]
    fn degenerate_lines_get_sentinel_angle() {
        let collapsed = LinePoints::from_xy(&[(1.0, 1.0), (1.0, 1.0)]);
        assert_eq!(collapsed.degeneracy(), Degeneracy::Collapsed);
        assert_eq!(collapsed.begin_angle(0.0), DEGENERATE_ANGLE);
        let single = LinePoints::from_xy(&[(1.0, 1.0)]);
        assert_eq!(single.degeneracy(), Degeneracy::SinglePoint);
        assert_eq!(single.end_angle(0.0), DEGENERATE_ANGLE);
    }

    #[test]
    fn nearest_point_on_segment() {
        let line = LinePoints::from_xy(&[(0.0, 0.0), (10.0, 0.0), (10.0, 10.0)]);
        let np = line.nearest_point(4.0, 3.0).unwrap();
        assert_relative_eq!(np.x, 4.0);
        assert_relative_eq!(np.y, 0.0);
        assert_relative_eq!(np.distance, 3.0);
        assert_eq!(np.segment, 0);

        let (idx, d) = line.nearest_vertex(9.0, 9.0).unwrap();
        assert_eq!(idx, 2);
        assert_relative_eq!(d, 2f64.sqrt());
    }

    #[test]
    fn append_joins_shared_vertex() {
        let mut a = LinePoints::from_xy(&[(0.0, 0.0), (1.0, 0.0)]);
        let b = LinePoints::from_xy(&[(2.0, 0.0), (1.0, 0.0)]);
        a.append(&b, true);
        assert_eq!(a.len(), 3);
        assert_relative_eq!(a.length(), 2.0);

        let mut empty = LinePoints::new();
        empty.append(&b, false);
        assert_eq!(empty, b);
    }

    #[test]
    fn prune_drops_repeats() {
        let mut line = LinePoints::from_xy(&[(0.0, 0.0), (0.0, 0.0), (1.0, 1.0), (1.0, 1.0)]);
        assert_eq!(line.prune(), 2);
        assert_eq!(line.len(), 2);
    }
}
