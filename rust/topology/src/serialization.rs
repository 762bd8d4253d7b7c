// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON serialization for topology graphs.
//!
//! A snapshot stores every slot, tombstones included, so ids survive a
//! round trip. The spatial index is not stored; it is rebuilt on load.
//! Each snapshot is stamped with the body size of the geometry it was built
//! from, which lets a reader detect a topology file that no longer matches
//! its geometry.

use serde::{Deserialize, Serialize};
use vtopo_core::{BoundingBox, EntityKey};

use crate::arena::*;
use crate::error::{Error, Result};

/// Version of the snapshot layout.
pub const SNAPSHOT_VERSION: u32 = 1;

/// Serializable form of a [`TopologyGraph`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopologySnapshot {
    pub version: u32,
    /// Body size of the geometry store when the snapshot was taken.
    pub body_size: u64,
    pub level: BuildLevel,
    pub threshold: f64,
    pub nodes: Vec<Option<NodeData>>,
    pub lines: Vec<Option<LineData>>,
    pub areas: Vec<Option<AreaData>>,
    pub isles: Vec<Option<IsleData>>,
}

impl TopologySnapshot {
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl TopologyGraph {
    /// Copies the graph into a snapshot stamped with `body_size`.
    pub fn snapshot(&self, body_size: u64) -> TopologySnapshot {
        TopologySnapshot {
            version: SNAPSHOT_VERSION,
            body_size,
            level: self.level,
            threshold: self.threshold,
            nodes: self.nodes.raw().to_vec(),
            lines: self.lines.raw().to_vec(),
            areas: self.areas.raw().to_vec(),
            isles: self.isles.raw().to_vec(),
        }
    }

    /// Serializes the graph to a JSON string.
    pub fn to_json(&self, body_size: u64) -> Result<String> {
        serde_json::to_string_pretty(&self.snapshot(body_size))
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserializes a graph, returning it with the body size it was
    /// stamped with.
    pub fn from_json(json: &str) -> Result<(Self, u64)> {
        let snapshot = TopologySnapshot::from_json(json)?;
        let body_size = snapshot.body_size;
        Ok((Self::from_snapshot(snapshot)?, body_size))
    }

    /// Reconstructs a graph and its spatial index from a snapshot.
    pub fn from_snapshot(snap: TopologySnapshot) -> Result<Self> {
        if snap.version != SNAPSHOT_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported topology snapshot version {} (expected {SNAPSHOT_VERSION})",
                snap.version
            )));
        }

        let mut graph = TopologyGraph::new();
        graph.level = snap.level;
        graph.threshold = snap.threshold;
        graph.nodes = Slots::from_raw(snap.nodes);
        graph.lines = Slots::from_raw(snap.lines);
        graph.areas = Slots::from_raw(snap.areas);
        graph.isles = Slots::from_raw(snap.isles);

        for (id, node) in graph.nodes.iter() {
            graph
                .sidx
                .nodes
                .insert(id, BoundingBox::from_point(node.x, node.y, node.z));
        }
        for (id, line) in graph.lines.iter() {
            graph.sidx.lines.insert(id, line.bbox);
        }
        for (id, area) in graph.areas.iter() {
            graph.sidx.areas.insert(id, area.bbox);
        }
        for (id, isle) in graph.isles.iter() {
            graph.sidx.isles.insert(id, isle.bbox);
        }

        graph.check_references()?;
        Ok(graph)
    }

    /// Every id stored in a record must name a live entity.
    fn check_references(&self) -> Result<()> {
        for (id, node) in self.nodes.iter() {
            if node.lines.len() != node.angles.len() {
                return Err(Error::invariant(id, "angle count differs from line count"));
            }
            if let Some(r) = node.lines.iter().find(|r| !self.lines.contains(r.id)) {
                return Err(dangling(id, r.id));
            }
        }
        for (id, line) in self.lines.iter() {
            if let Some((n1, n2)) = line.nodes() {
                for n in [n1, n2] {
                    if !self.nodes.contains(n) {
                        return Err(dangling(id, n));
                    }
                }
            }
        }
        for (id, area) in self.areas.iter() {
            if let Some(r) = area.lines.iter().find(|r| !self.lines.contains(r.id)) {
                return Err(dangling(id, r.id));
            }
            if let Some(&i) = area.isles.iter().find(|&&i| !self.isles.contains(i)) {
                return Err(dangling(id, i));
            }
        }
        for (id, isle) in self.isles.iter() {
            if let Some(r) = isle.lines.iter().find(|r| !self.lines.contains(r.id)) {
                return Err(dangling(id, r.id));
            }
        }
        Ok(())
    }
}

fn dangling(at: impl Into<EntityKey>, missing: impl Into<EntityKey>) -> Error {
    Error::invariant(at, format!("refers to missing {}", missing.into()))
}
