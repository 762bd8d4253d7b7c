// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Bridge removal.
//!
//! A bridge is a boundary with the same face on both sides: walking around
//! that face passes the bridge once in each direction. Such a face never
//! closes as a ring, so bridges keep `Universe` on both sides after a build.

use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use vtopo_core::{DirectedLineRef, LineId, LineType, TypeMask};

use super::record;
use crate::arena::{BuildLevel, Side};
use crate::dataset::Dataset;
use crate::error::{Error, Result};

/// What to do with the bridges found.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeAction {
    /// Delete them.
    Remove,
    /// Rewrite them as plain lines.
    ChangeType,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BridgeReport {
    /// Bridges in the order the walks confirmed them.
    pub bridges: Vec<LineId>,
    /// Candidates skipped because their walk ran into a dangle.
    pub dangles: usize,
}

/// Outcome of walking the face right of a candidate.
enum Walk {
    Closed(Vec<LineId>),
    Dangle(LineId),
}

impl Dataset {
    /// Finds every bridge and removes it or changes its type.
    pub fn remove_bridges(
        &mut self,
        action: BridgeAction,
        mut errors: Option<&mut Dataset>,
    ) -> Result<BridgeReport> {
        self.graph
            .require(BuildLevel::Areas)
            .map_err(|e| self.err(e))?;

        let report = self.find_bridges().map_err(|e| self.err(e))?;
        for &id in &report.bridges {
            let feature = self.read_line(id)?;
            record(errors.as_deref_mut(), &feature)?;
            match action {
                BridgeAction::Remove => self.delete_line(id)?,
                BridgeAction::ChangeType => {
                    self.rewrite_line(id, LineType::Line, feature.points, feature.cats)?;
                }
            }
        }

        tracing::info!(
            bridges = report.bridges.len(),
            dangles = report.dangles,
            ?action,
            "Bridges processed"
        );
        Ok(report)
    }

    fn find_bridges(&self) -> Result<BridgeReport> {
        let mut report = BridgeReport::default();
        // shared by all walks: lines passed by a walk that hit a dangle are not walked again
        let mut walked: FxHashSet<LineId> = FxHashSet::default();

        for (id, line) in self.graph.lines() {
            if line.kind != LineType::Boundary || line.degenerate || walked.contains(&id) {
                continue;
            }
            let Some((left, right)) = line.faces() else {
                continue;
            };
            if !left.is_universe() || !right.is_universe() {
                continue;
            }
            // closed loops never separate anything
            if matches!(line.nodes(), Some((n1, n2)) if n1 == n2) {
                continue;
            }

            match self.bridge_walk(id, &mut walked)? {
                Walk::Closed(bridges) => {
                    for b in bridges {
                        if !report.bridges.contains(&b) {
                            report.bridges.push(b);
                        }
                    }
                }
                Walk::Dangle(at) => {
                    tracing::warn!(
                        line = %id,
                        dangle = %at,
                        "Dangle reached from bridge candidate, skipped"
                    );
                    report.dangles += 1;
                }
            }
        }
        Ok(report)
    }

    /// Walks the face right of `candidate` and returns the lines passed in
    /// both directions.
    fn bridge_walk(&self, candidate: LineId, walked: &mut FxHashSet<LineId>) -> Result<Walk> {
        let first = DirectedLineRef::forward(candidate);
        let mut direction: FxHashMap<LineId, bool> = FxHashMap::default();
        let mut bridges = Vec::new();
        let mut current = first;

        let limit = 2 * self.graph.line_count() + 2;
        for _ in 0..limit {
            walked.insert(current.id);
            match direction.get(&current.id) {
                Some(&forward) if forward != current.forward => {
                    if !bridges.contains(&current.id) {
                        bridges.push(current.id);
                    }
                }
                Some(_) => {}
                None => {
                    direction.insert(current.id, current.forward);
                }
            }

            let back = current.reversed();
            let next = self
                .graph
                .angle_next_line(back, Side::Right, TypeMask::BOUNDARY)?
                .ok_or_else(|| Error::invariant(back.id, "no boundary at node of a boundary"))?;
            if next == back {
                return Ok(Walk::Dangle(back.id));
            }
            if next == first {
                return Ok(Walk::Closed(bridges));
            }
            current = next;
        }
        Err(Error::invariant(candidate, "bridge walk did not return to its start"))
    }
}
