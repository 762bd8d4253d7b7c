// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Placing centroids in areas that have none.

use serde::Serialize;
use vtopo_core::{AreaId, Categories, LineId, LinePoints, LineType};

use crate::arena::BuildLevel;
use crate::dataset::Dataset;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CentroidReport {
    /// Centroids written, ascending.
    pub added: Vec<LineId>,
    /// Areas without a centroid whose triangulation failed.
    pub failed: usize,
}

impl Dataset {
    /// Writes a centroid into every area without one. The point is taken
    /// from the area's triangulation, so it lies inside concave areas and
    /// outside isles.
    ///
    /// With `cats = Some((layer, first))` the new centroids get categories
    /// `first`, `first + 1`, ... in area order.
    pub fn add_centroids(&mut self, cats: Option<(i32, i32)>) -> Result<CentroidReport> {
        self.graph
            .require(BuildLevel::Centroids)
            .map_err(|e| self.err(e))?;

        let empty: Vec<AreaId> = self
            .graph
            .areas()
            .filter(|(_, a)| a.centroid.is_none())
            .map(|(id, _)| id)
            .collect();

        let mut report = CentroidReport::default();
        let mut next_cat = cats;
        for area in empty {
            let point = self
                .graph
                .area_interior_point(&self.source, area)
                .map_err(|e| self.err(e))?;
            let Some((x, y)) = point else {
                tracing::warn!(area = %area, "No interior point found, centroid skipped");
                report.failed += 1;
                continue;
            };

            let categories = match next_cat.as_mut() {
                Some((layer, cat)) => {
                    let c = Categories::single(*layer, *cat);
                    *cat += 1;
                    c
                }
                None => Categories::new(),
            };
            let points = LinePoints::from_xy(&[(x, y)]);
            let id = self.write_line(LineType::Centroid, points, categories)?;
            report.added.push(id);
        }

        tracing::info!(
            added = report.added.len(),
            failed = report.failed,
            "Centroids placed"
        );
        Ok(report)
    }
}
