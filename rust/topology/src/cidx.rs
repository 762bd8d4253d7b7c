// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Category index: which live features carry a given `(layer, cat)` pair.

use rustc_hash::FxHashMap;
use vtopo_core::{Categories, Category, GeometrySource, LineId};

use crate::error::Result;

#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    lines: FxHashMap<Category, Vec<LineId>>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Indexes every live feature of `source`.
    pub fn build(source: &dyn GeometrySource) -> Result<Self> {
        let mut index = Self::new();
        for id in source.live_ids() {
            index.insert(id, &source.read(id)?.cats);
        }
        Ok(index)
    }

    pub fn insert(&mut self, id: LineId, cats: &Categories) {
        for &c in cats.iter() {
            let ids = self.lines.entry(c).or_default();
            if let Err(pos) = ids.binary_search(&id) {
                ids.insert(pos, id);
            }
        }
    }

    pub fn remove(&mut self, id: LineId, cats: &Categories) {
        for c in cats.iter() {
            if let Some(ids) = self.lines.get_mut(c) {
                ids.retain(|&l| l != id);
                if ids.is_empty() {
                    self.lines.remove(c);
                }
            }
        }
    }

    /// Lines with `(layer, cat)`, ascending.
    pub fn lines(&self, layer: i32, cat: i32) -> &[LineId] {
        self.lines
            .get(&Category { layer, cat })
            .map_or(&[], Vec::as_slice)
    }

    /// Layers in use, ascending.
    pub fn layers(&self) -> Vec<i32> {
        let mut layers: Vec<i32> = self.lines.keys().map(|c| c.layer).collect();
        layers.sort_unstable();
        layers.dedup();
        layers
    }

    /// Categories of `layer` with their line counts, ascending.
    pub fn cats_in_layer(&self, layer: i32) -> Vec<(i32, usize)> {
        let mut cats: Vec<(i32, usize)> = self
            .lines
            .iter()
            .filter(|(c, _)| c.layer == layer)
            .map(|(c, ids)| (c.cat, ids.len()))
            .collect();
        cats.sort_unstable();
        cats
    }

    /// Number of distinct pairs.
    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }
}
