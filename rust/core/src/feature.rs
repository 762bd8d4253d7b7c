// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Feature types, type masks and category sets.

use serde::{Deserialize, Serialize};

use crate::points::LinePoints;

/// Closed set of feature types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LineType {
    Point,
    Line,
    Boundary,
    Centroid,
    Face,
    Kernel,
}

impl LineType {
    pub const ALL: [LineType; 6] = [
        LineType::Point,
        LineType::Line,
        LineType::Boundary,
        LineType::Centroid,
        LineType::Face,
        LineType::Kernel,
    ];

    /// Code used in record headers.
    pub fn store_code(self) -> u8 {
        match self {
            LineType::Point => 1,
            LineType::Line => 2,
            LineType::Boundary => 3,
            LineType::Centroid => 4,
            LineType::Face => 5,
            LineType::Kernel => 6,
        }
    }

    pub fn from_store_code(code: u8) -> Option<Self> {
        Some(match code {
            1 => LineType::Point,
            2 => LineType::Line,
            3 => LineType::Boundary,
            4 => LineType::Centroid,
            5 => LineType::Face,
            6 => LineType::Kernel,
            _ => return None,
        })
    }

    /// Single-coordinate types. Records of these types omit the point count.
    #[inline]
    pub fn is_point_class(self) -> bool {
        matches!(self, LineType::Point | LineType::Centroid | LineType::Kernel)
    }

    /// Types that take part in the node graph.
    #[inline]
    pub fn is_line_class(self) -> bool {
        matches!(self, LineType::Line | LineType::Boundary)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            LineType::Point => "point",
            LineType::Line => "line",
            LineType::Boundary => "boundary",
            LineType::Centroid => "centroid",
            LineType::Face => "face",
            LineType::Kernel => "kernel",
        }
    }

    fn bit(self) -> u8 {
        1 << (self.store_code() - 1)
    }
}

impl std::fmt::Display for LineType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for LineType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        LineType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("unknown feature type '{s}'"))
    }
}

/// Set of feature types used to filter traversals and queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct TypeMask(u8);

impl TypeMask {
    pub const NONE: TypeMask = TypeMask(0);
    pub const POINT: TypeMask = TypeMask(1 << 0);
    pub const LINE: TypeMask = TypeMask(1 << 1);
    pub const BOUNDARY: TypeMask = TypeMask(1 << 2);
    pub const CENTROID: TypeMask = TypeMask(1 << 3);
    pub const FACE: TypeMask = TypeMask(1 << 4);
    pub const KERNEL: TypeMask = TypeMask(1 << 5);
    pub const LINES: TypeMask = TypeMask(Self::LINE.0 | Self::BOUNDARY.0);
    pub const POINTS: TypeMask = TypeMask(Self::POINT.0 | Self::CENTROID.0 | Self::KERNEL.0);
    pub const ALL: TypeMask = TypeMask(0b11_1111);

    #[inline]
    pub fn contains(self, t: LineType) -> bool {
        self.0 & t.bit() != 0
    }

    #[inline]
    pub fn is_empty(self) -> bool {
        self.0 == 0
    }
}

impl From<LineType> for TypeMask {
    fn from(t: LineType) -> Self {
        TypeMask(t.bit())
    }
}

impl std::ops::BitOr for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: TypeMask) -> TypeMask {
        TypeMask(self.0 | rhs.0)
    }
}

impl std::ops::BitOr<LineType> for TypeMask {
    type Output = TypeMask;

    fn bitor(self, rhs: LineType) -> TypeMask {
        self | TypeMask::from(rhs)
    }
}

/// A `(layer, category)` pair linking a feature to external attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Category {
    pub layer: i32,
    pub cat: i32,
}

/// Categories attached to one feature, in insertion order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Categories(Vec<Category>);

impl Categories {
    pub fn new() -> Self {
        Self::default()
    }

    /// Single category in `layer`.
    pub fn single(layer: i32, cat: i32) -> Self {
        Self(vec![Category { layer, cat }])
    }

    /// Adds a pair unless it is already present.
    pub fn add(&mut self, layer: i32, cat: i32) {
        let c = Category { layer, cat };
        if !self.0.contains(&c) {
            self.0.push(c);
        }
    }

    pub fn contains(&self, layer: i32, cat: i32) -> bool {
        self.0.contains(&Category { layer, cat })
    }

    /// Categories of `layer`.
    pub fn in_layer(&self, layer: i32) -> impl Iterator<Item = i32> + '_ {
        self.0.iter().filter(move |c| c.layer == layer).map(|c| c.cat)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Category> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Equal as sets, ignoring order.
    pub fn same_set(&self, other: &Categories) -> bool {
        self.0.len() == other.0.len() && self.0.iter().all(|c| other.0.contains(c))
    }

    /// Adds every pair of `other` not yet present.
    pub fn union_with(&mut self, other: &Categories) {
        for c in &other.0 {
            self.add(c.layer, c.cat);
        }
    }
}

impl FromIterator<Category> for Categories {
    fn from_iter<I: IntoIterator<Item = Category>>(iter: I) -> Self {
        let mut cats = Categories::new();
        for c in iter {
            cats.add(c.layer, c.cat);
        }
        cats
    }
}

/// A feature as read from or written to a geometry source.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub kind: LineType,
    pub points: LinePoints,
    pub cats: Categories,
}

impl Feature {
    pub fn new(kind: LineType, points: LinePoints, cats: Categories) -> Self {
        Self { kind, points, cats }
    }
}
