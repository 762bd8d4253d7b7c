// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Merging chains of lines joined at pseudo-nodes.
//!
//! A pseudo-node has exactly two incident lines of the same type. Lines
//! chained through pseudo-nodes are replaced by a single line, as long as
//! their categories agree. A chain with any conflicting pair is left as is.

use rustc_hash::FxHashSet;
use serde::Serialize;
use vtopo_core::{
    Categories, DirectedLineRef, GeometrySource, LineId, LinePoints, LineType, TypeMask,
};

use super::record;
use crate::arena::BuildLevel;
use crate::dataset::Dataset;
use crate::error::Result;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeReport {
    /// Lines written in place of the chains, ascending.
    pub merged: Vec<LineId>,
    /// Lines deleted by merging.
    pub removed: usize,
    /// Lines left unmerged because their chain mixes categories.
    pub incompatible: usize,
}

fn compatible(a: &Categories, b: &Categories) -> bool {
    a.is_empty() || b.is_empty() || a.same_set(b)
}

/// Lines of one chain in walking order.
struct Chain {
    refs: Vec<DirectedLineRef>,
    cats: Categories,
}

impl Dataset {
    /// Merges every chain of two or more lines of a type in `types`.
    pub fn merge_lines(
        &mut self,
        types: TypeMask,
        mut errors: Option<&mut Dataset>,
    ) -> Result<MergeReport> {
        self.graph
            .require(BuildLevel::Base)
            .map_err(|e| self.err(e))?;

        let mut report = MergeReport::default();
        for id in self.source.live_ids() {
            if !self.graph.line_alive(id) {
                continue;
            }
            let kind = self.graph.line(id).map_err(|e| self.err(e))?.kind;
            if !types.contains(kind) || !kind.is_line_class() {
                continue;
            }

            let Some(chain) = self.chain_through(id).map_err(|e| self.err(e))? else {
                report.incompatible += 1;
                continue;
            };
            if chain.refs.len() < 2 {
                continue;
            }

            let mut points = LinePoints::new();
            let mut originals = Vec::with_capacity(chain.refs.len());
            for r in &chain.refs {
                let feature = self.read_line(r.id)?;
                points.append(&feature.points, !r.forward);
                originals.push(feature);
            }
            for (r, feature) in chain.refs.iter().zip(&originals) {
                record(errors.as_deref_mut(), feature)?;
                self.delete_line(r.id)?;
            }
            let merged = self.write_line(kind, points, chain.cats)?;
            tracing::debug!(line = %merged, parts = chain.refs.len(), "Lines merged");
            report.removed += chain.refs.len();
            report.merged.push(merged);
        }

        tracing::info!(
            merged = report.merged.len(),
            removed = report.removed,
            incompatible = report.incompatible,
            "Lines merged"
        );
        Ok(report)
    }

    /// Chain containing `id`: first walks backward from its start node,
    /// then forward from its end node. `None` when two lines of the chain
    /// carry incompatible categories.
    fn chain_through(&self, id: LineId) -> Result<Option<Chain>> {
        let kind = self.graph.line(id)?.kind;
        let mut chain = Chain {
            refs: vec![DirectedLineRef::forward(id)],
            cats: self.source.read(id)?.cats,
        };
        let mut members: FxHashSet<LineId> = FxHashSet::default();
        members.insert(id);

        // Backward: prepend lines arriving at the chain's first node.
        loop {
            let head = chain.refs[0];
            let Some(other) = self.pseudo_node_partner(head, kind)? else {
                break;
            };
            if members.contains(&other.id) {
                break;
            }
            if !self.absorb(&mut chain, id, other.id)? {
                return Ok(None);
            }
            members.insert(other.id);
            chain.refs.insert(0, other.reversed());
        }

        // Forward: append lines leaving the chain's last node.
        loop {
            let Some(&tail) = chain.refs.last() else {
                break;
            };
            let Some(other) = self.pseudo_node_partner(tail.reversed(), kind)? else {
                break;
            };
            if members.contains(&other.id) {
                break;
            }
            if !self.absorb(&mut chain, id, other.id)? {
                return Ok(None);
            }
            members.insert(other.id);
            chain.refs.push(other);
        }
        Ok(Some(chain))
    }

    /// Adds the categories of `other` to the chain, or returns false if
    /// they conflict with those collected so far.
    fn absorb(&self, chain: &mut Chain, id: LineId, other: LineId) -> Result<bool> {
        let cats = self.source.read(other)?.cats;
        if !compatible(&chain.cats, &cats) {
            tracing::warn!(line = %id, other = %other, "Categories differ, chain not merged");
            return Ok(false);
        }
        chain.cats.union_with(&cats);
        Ok(true)
    }

    /// The other line leaving the node `leaving` starts at, if that node is
    /// a pseudo-node of type `kind`.
    fn pseudo_node_partner(
        &self,
        leaving: DirectedLineRef,
        kind: LineType,
    ) -> Result<Option<DirectedLineRef>> {
        let node = self.graph.start_node(leaving)?;
        let lines = self.graph.node_lines(node)?;
        if lines.len() != 2 {
            return Ok(None);
        }
        let Some(&other) = lines.iter().find(|&&r| r != leaving) else {
            return Ok(None);
        };
        if other.id == leaving.id || self.graph.line(other.id)?.kind != kind {
            return Ok(None);
        }
        Ok(Some(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(ds: &mut Dataset, coords: &[(f64, f64)], cats: Categories) -> LineId {
        ds.write_line(LineType::Line, LinePoints::from_xy(coords), cats)
            .unwrap()
    }

    #[test]
    fn chain_becomes_one_line() {
        let mut ds = Dataset::in_memory("roads", false);
        line(&mut ds, &[(1.0, 0.0), (2.0, 0.0)], Categories::new());
        line(&mut ds, &[(1.0, 0.0), (0.0, 0.0)], Categories::single(1, 5));
        line(&mut ds, &[(2.0, 0.0), (3.0, 1.0)], Categories::new());

        let report = ds.merge_lines(TypeMask::LINE, None).unwrap();
        assert_eq!(report.removed, 3);
        assert_eq!(report.merged.len(), 1);

        let merged = ds.read_line(report.merged[0]).unwrap();
        assert_eq!(ds.line_ids(), report.merged);
        assert_eq!(
            merged.points,
            LinePoints::from_xy(&[(0.0, 0.0), (1.0, 0.0), (2.0, 0.0), (3.0, 1.0)])
        );
        assert!(merged.cats.contains(1, 5));
    }

    #[test]
    fn differing_categories_stop_the_chain() {
        let mut ds = Dataset::in_memory("roads", false);
        line(&mut ds, &[(0.0, 0.0), (1.0, 0.0)], Categories::single(1, 1));
        line(&mut ds, &[(1.0, 0.0), (2.0, 0.0)], Categories::single(1, 2));

        let report = ds.merge_lines(TypeMask::LINE, None).unwrap();
        assert!(report.merged.is_empty());
        assert_eq!(report.incompatible, 2);
        assert_eq!(ds.line_ids().len(), 2);
    }

    #[test]
    fn uncategorised_start_does_not_bridge_a_conflict() {
        let mut ds = Dataset::in_memory("roads", false);
        line(&mut ds, &[(2.0, 0.0), (3.0, 0.0)], Categories::new());
        line(&mut ds, &[(1.0, 0.0), (2.0, 0.0)], Categories::single(1, 2));
        line(&mut ds, &[(0.0, 0.0), (1.0, 0.0)], Categories::single(1, 1));

        let report = ds.merge_lines(TypeMask::LINE, None).unwrap();
        assert!(report.merged.is_empty());
        assert_eq!(report.removed, 0);
        assert_eq!(report.incompatible, 3);
        assert_eq!(ds.line_ids().len(), 3);
        assert!(ds
            .line_ids()
            .iter()
            .all(|&id| ds.read_line(id).unwrap().cats.len() <= 1));
    }

    #[test]
    fn conflicting_chain_is_not_merged_in_part() {
        let mut ds = Dataset::in_memory("roads", false);
        let first = line(&mut ds, &[(0.0, 0.0), (1.0, 0.0)], Categories::single(1, 1));
        let second = line(&mut ds, &[(1.0, 0.0), (2.0, 0.0)], Categories::single(1, 1));
        let third = line(&mut ds, &[(2.0, 0.0), (3.0, 0.0)], Categories::single(1, 2));

        let mut errors = Dataset::in_memory("errors", false);
        let report = ds.merge_lines(TypeMask::LINE, Some(&mut errors)).unwrap();
        assert!(report.merged.is_empty());
        assert_eq!(report.incompatible, 3);
        assert_eq!(ds.line_ids(), vec![first, second, third]);
        assert!(errors.line_ids().is_empty());
    }

    #[test]
    fn branching_node_is_not_merged() {
        let mut ds = Dataset::in_memory("roads", false);
        line(&mut ds, &[(0.0, 0.0), (1.0, 0.0)], Categories::new());
        line(&mut ds, &[(1.0, 0.0), (2.0, 0.0)], Categories::new());
        line(&mut ds, &[(1.0, 0.0), (1.0, 1.0)], Categories::new());

        let report = ds.merge_lines(TypeMask::LINE, None).unwrap();
        assert!(report.merged.is_empty());
        assert_eq!(ds.line_ids().len(), 3);
    }
}
