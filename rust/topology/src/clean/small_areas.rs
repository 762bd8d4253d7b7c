// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dissolving small areas into their neighbours.

use serde::Serialize;
use vtopo_core::{AreaId, FaceRef, LineId};

use super::record;
use crate::arena::{BuildLevel, Side};
use crate::dataset::Dataset;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DissolveReport {
    /// Areas merged into a neighbour.
    pub areas: usize,
    /// Boundaries and centroids deleted.
    pub lines: usize,
    /// Summed size of the dissolved areas.
    pub size: f64,
    /// Small areas left alone because nothing borders them.
    pub skipped: usize,
}

/// Boundary shared with one neighbouring area.
struct Shared {
    area: AreaId,
    length: f64,
    lines: Vec<LineId>,
}

impl Dataset {
    /// Merges every area of size `<= threshold` into the neighbour it shares
    /// the longest boundary with. Areas created by a merge are checked too.
    pub fn remove_small_areas(
        &mut self,
        threshold: f64,
        mut errors: Option<&mut Dataset>,
    ) -> Result<DissolveReport> {
        self.graph
            .require(BuildLevel::Centroids)
            .map_err(|e| self.err(e))?;

        let mut report = DissolveReport::default();
        let mut raw = 0;
        while raw < self.graph.max_area_id() {
            raw += 1;
            let Some(area) = AreaId::new(raw) else {
                continue;
            };
            if !self.graph.area_alive(area) {
                continue;
            }
            let size = self.area_size(area)?;
            if size > threshold {
                continue;
            }

            let Some(target) = self.dissolve_target(area).map_err(|e| self.err(e))? else {
                tracing::warn!(area = %area, size, "Small area has no neighbour, left as is");
                report.skipped += 1;
                continue;
            };

            let mut doomed = Vec::with_capacity(target.lines.len() + 1);
            if let Some(centroid) = self.graph.area_centroid(area).map_err(|e| self.err(e))? {
                doomed.push(centroid);
            }
            doomed.extend(target.lines);
            for id in doomed {
                let feature = self.read_line(id)?;
                record(errors.as_deref_mut(), &feature)?;
                self.delete_line(id)?;
                report.lines += 1;
            }
            tracing::debug!(
                area = %area,
                into = %target.area,
                shared = target.length,
                "Small area dissolved"
            );
            report.areas += 1;
            report.size += size;
        }

        tracing::info!(
            areas = report.areas,
            lines = report.lines,
            skipped = report.skipped,
            "Small areas removed"
        );
        Ok(report)
    }

    /// Neighbour sharing the longest boundary with `area`; the first one in
    /// ring order wins a tie.
    fn dissolve_target(&self, area: AreaId) -> Result<Option<Shared>> {
        let data = self.graph.area(area)?;

        // Outer ring: the neighbour is left of each entry. Through an isle it
        // is the area holding the isle.
        let mut sides: Vec<(LineId, AreaId)> = Vec::new();
        for &r in &data.lines {
            let face = self.graph.face_on(r, Side::Left)?;
            if let Some(other) = self.graph.face_area(face)? {
                sides.push((r.id, other));
            }
        }
        // Isle rings: areas inside the hole are left of each entry.
        for &isle in &data.isles {
            for &r in self.graph.isle_boundaries(isle)? {
                if let FaceRef::Area(other) = self.graph.face_on(r, Side::Left)? {
                    sides.push((r.id, other));
                }
            }
        }

        let mut shared: Vec<Shared> = Vec::new();
        for (line, other) in sides {
            if other == area {
                continue;
            }
            let length = self.graph.line_length(&self.source, line)?;
            match shared.iter_mut().find(|s| s.area == other) {
                Some(s) => {
                    s.length += length;
                    if !s.lines.contains(&line) {
                        s.lines.push(line);
                    }
                }
                None => shared.push(Shared {
                    area: other,
                    length,
                    lines: vec![line],
                }),
            }
        }

        let mut best: Option<Shared> = None;
        for s in shared {
            if best.as_ref().map_or(true, |b| s.length > b.length) {
                best = Some(s);
            }
        }
        Ok(best)
    }
}
