// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Dataset handle: geometry source, topology graph and category index kept
//! in step through every edit.
//!
//! A dataset directory holds the geometry store (`coor`) and, optionally, a
//! JSON topology snapshot (`topo`). The snapshot is trusted only when its
//! body-size stamp matches the store; otherwise the dataset opens without
//! topology and must be rebuilt.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use vtopo_core::{
    AreaId, BoundingBox, Categories, DirectedLineRef, Feature, GeometrySource, LineId, LinePoints,
    LineType, NativeStore, NodeId, Source, SourceKind, TypeMask,
};

use crate::arena::{BuildLevel, TopologyGraph};
use crate::builders::{BuildOptions, BuildStats};
use crate::cidx::CategoryIndex;
use crate::config::TopologyConfig;
use crate::error::{Error, Result};
use crate::query::TopologySummary;

/// File name of the geometry store inside a dataset directory.
pub const COOR_FILE: &str = "coor";
/// File name of the topology snapshot inside a dataset directory.
pub const TOPO_FILE: &str = "topo";

/// Access requested when opening a dataset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    ReadOnly,
    Update,
}

/// An open vector dataset.
pub struct Dataset {
    name: String,
    dir: Option<PathBuf>,
    mode: OpenMode,
    pub(crate) source: Source,
    pub(crate) graph: TopologyGraph,
    pub(crate) cidx: CategoryIndex,
    config: TopologyConfig,
}

impl Dataset {
    /// Creates a new dataset directory with an empty store. The topology is
    /// built (empty) to the highest level, so edits maintain it from the
    /// start.
    pub fn create(dir: impl AsRef<Path>, with_z: bool, config: TopologyConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let name = dataset_name(dir);
        Self::create_at(dir, name.clone(), with_z, config).map_err(|e| e.in_dataset(&name))
    }

    fn create_at(dir: &Path, name: String, with_z: bool, config: TopologyConfig) -> Result<Self> {
        std::fs::create_dir_all(dir).map_err(vtopo_core::Error::from)?;
        let store = NativeStore::create(dir.join(COOR_FILE), config.byte_order, with_z)?;
        remove_if_exists(&dir.join(TOPO_FILE))?;

        let mut graph = TopologyGraph::new();
        graph.level = BuildLevel::ALL;
        graph.threshold = config.node_threshold;
        graph.track_updates(config.track_updates);

        tracing::info!(dataset = %name, with_z, "Dataset created");
        Ok(Self {
            name,
            dir: Some(dir.to_path_buf()),
            mode: OpenMode::Update,
            source: Source::Native(store),
            graph,
            cidx: CategoryIndex::new(),
            config,
        })
    }

    /// Opens an existing dataset directory.
    ///
    /// In [`OpenMode::Update`] the topology file is removed once loaded and
    /// written back by [`Dataset::close`], so an interrupted session never
    /// leaves a snapshot that silently disagrees with the store.
    pub fn open(dir: impl AsRef<Path>, mode: OpenMode, config: TopologyConfig) -> Result<Self> {
        let dir = dir.as_ref();
        let name = dataset_name(dir);
        Self::open_at(dir, name.clone(), mode, config).map_err(|e| e.in_dataset(&name))
    }

    fn open_at(dir: &Path, name: String, mode: OpenMode, config: TopologyConfig) -> Result<Self> {
        let store = NativeStore::open(dir.join(COOR_FILE), mode == OpenMode::Update)?;
        let body_size = store.body_size();
        let topo_path = dir.join(TOPO_FILE);

        let mut graph = match load_snapshot(&topo_path, body_size)? {
            Some(graph) => graph,
            None => {
                let mut graph = TopologyGraph::new();
                graph.threshold = config.node_threshold;
                graph
            }
        };
        graph.track_updates(config.track_updates);
        if mode == OpenMode::Update {
            remove_if_exists(&topo_path)?;
        }

        let source = Source::Native(store);
        let cidx = CategoryIndex::build(&source)?;
        tracing::info!(
            dataset = %name,
            ?mode,
            lines = source.alive_count(),
            level = %graph.level(),
            "Dataset opened"
        );
        Ok(Self {
            name,
            dir: Some(dir.to_path_buf()),
            mode,
            source,
            graph,
            cidx,
            config,
        })
    }

    /// Memory-only dataset with topology maintained from the first edit.
    pub fn in_memory(name: impl Into<String>, with_z: bool) -> Self {
        let config = TopologyConfig::default();
        let mut graph = TopologyGraph::new();
        graph.level = BuildLevel::ALL;
        graph.threshold = config.node_threshold;
        Self {
            name: name.into(),
            dir: None,
            mode: OpenMode::Update,
            source: Source::Native(NativeStore::in_memory(config.byte_order, with_z)),
            graph,
            cidx: CategoryIndex::new(),
            config,
        }
    }

    /// Wraps an existing source. The topology starts unbuilt.
    pub fn from_source(
        name: impl Into<String>,
        source: Source,
        config: TopologyConfig,
    ) -> Result<Self> {
        let name = name.into();
        let cidx = CategoryIndex::build(&source).map_err(|e| e.in_dataset(&name))?;
        let mut graph = TopologyGraph::new();
        graph.threshold = config.node_threshold;
        graph.track_updates(config.track_updates);
        let mode = match source.kind() {
            SourceKind::Native => OpenMode::Update,
            SourceKind::External => OpenMode::ReadOnly,
        };
        Ok(Self {
            name,
            dir: None,
            mode,
            source,
            graph,
            cidx,
            config,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn dir(&self) -> Option<&Path> {
        self.dir.as_deref()
    }

    pub fn mode(&self) -> OpenMode {
        self.mode
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    pub fn topology(&self) -> &TopologyGraph {
        &self.graph
    }

    pub fn category_index(&self) -> &CategoryIndex {
        &self.cidx
    }

    pub fn with_z(&self) -> bool {
        self.source.with_z()
    }

    /// Live line ids, ascending.
    pub fn line_ids(&self) -> Vec<LineId> {
        self.source.live_ids()
    }

    pub fn track_updates(&mut self, enabled: bool) {
        self.graph.track_updates(enabled);
    }

    pub fn summary(&self) -> TopologySummary {
        self.graph.summary()
    }

    /// Attributes an error to this dataset.
    pub(crate) fn err(&self, e: impl Into<Error>) -> Error {
        e.into().in_dataset(&self.name)
    }

    fn check_writable(&self) -> Result<()> {
        if self.source.kind() == SourceKind::External {
            return Err(vtopo_core::Error::ReadOnly(SourceKind::External).into());
        }
        if self.mode == OpenMode::ReadOnly {
            return Err(Error::ReadOnlyDataset);
        }
        Ok(())
    }

    fn maintains_topology(&self) -> bool {
        self.graph.level() >= BuildLevel::Base
    }

    // --- Feature I/O ---

    pub fn read_line(&self, id: LineId) -> Result<Feature> {
        self.source.read(id).map_err(|e| self.err(e))
    }

    /// Appends a feature and registers it in the topology.
    pub fn write_line(
        &mut self,
        kind: LineType,
        points: LinePoints,
        cats: Categories,
    ) -> Result<LineId> {
        let feature = Feature::new(kind, points, cats);
        self.write_feature(&feature).map_err(|e| self.err(e))
    }

    fn write_feature(&mut self, feature: &Feature) -> Result<LineId> {
        self.check_writable()?;
        let id = self.source.write(feature)?;
        if self.maintains_topology() {
            self.graph.add_line_topo(&self.source, id)?;
        }
        self.cidx.insert(id, &feature.cats);
        tracing::debug!(line = %id, kind = %feature.kind, "Line written");
        Ok(id)
    }

    /// Replaces feature `id`, keeping its id.
    pub fn rewrite_line(
        &mut self,
        id: LineId,
        kind: LineType,
        points: LinePoints,
        cats: Categories,
    ) -> Result<LineId> {
        let feature = Feature::new(kind, points, cats);
        self.rewrite_feature(id, &feature).map_err(|e| self.err(e))
    }

    fn rewrite_feature(&mut self, id: LineId, feature: &Feature) -> Result<LineId> {
        self.check_writable()?;
        vtopo_core::validate_feature(feature)?;
        let old = self.source.read(id)?;
        let topo = self.maintains_topology();
        if topo {
            self.graph.delete_line_topo(&self.source, id)?;
        }
        let id = self.source.rewrite(id, feature)?;
        if topo {
            self.graph.add_line_topo(&self.source, id)?;
        }
        self.cidx.remove(id, &old.cats);
        self.cidx.insert(id, &feature.cats);
        tracing::debug!(line = %id, kind = %feature.kind, "Line rewritten");
        Ok(id)
    }

    /// Tombstones feature `id` and removes it from the topology.
    pub fn delete_line(&mut self, id: LineId) -> Result<()> {
        self.delete_feature(id).map_err(|e| self.err(e))
    }

    fn delete_feature(&mut self, id: LineId) -> Result<()> {
        self.check_writable()?;
        let old = self.source.read(id)?;
        if self.maintains_topology() {
            self.graph.delete_line_topo(&self.source, id)?;
        }
        self.source.delete(id)?;
        self.cidx.remove(id, &old.cats);
        tracing::debug!(line = %id, "Line deleted");
        Ok(())
    }

    /// Brings a tombstoned feature back.
    pub fn restore_line(&mut self, id: LineId) -> Result<()> {
        self.restore_feature(id).map_err(|e| self.err(e))
    }

    fn restore_feature(&mut self, id: LineId) -> Result<()> {
        self.check_writable()?;
        self.source.restore(id)?;
        let feature = self.source.read(id)?;
        if self.maintains_topology() {
            self.graph.add_line_topo(&self.source, id)?;
        }
        self.cidx.insert(id, &feature.cats);
        tracing::debug!(line = %id, "Line restored");
        Ok(())
    }

    // --- Topology ---

    /// Rebuilds the topology from scratch up to `level`.
    pub fn build_topology(&mut self, level: BuildLevel, threshold: f64) -> Result<BuildStats> {
        let options = BuildOptions {
            level,
            threshold,
            progress_interval: self.config.progress_interval,
        };
        self.graph
            .build(&self.source, &options)
            .map_err(|e| e.in_dataset(&self.name))
    }

    pub fn get_area_boundaries(&self, area: AreaId) -> Result<Vec<DirectedLineRef>> {
        self.graph
            .area_boundaries(area)
            .map(<[_]>::to_vec)
            .map_err(|e| self.err(e))
    }

    pub fn get_node_lines(&self, node: NodeId) -> Result<Vec<DirectedLineRef>> {
        self.graph
            .node_lines(node)
            .map(<[_]>::to_vec)
            .map_err(|e| self.err(e))
    }

    /// Nearest line of a type in `types` within `threshold` of `(x, y)`.
    pub fn find_line(
        &self,
        x: f64,
        y: f64,
        threshold: f64,
        types: TypeMask,
    ) -> Result<Option<LineId>> {
        self.graph
            .require(BuildLevel::Base)
            .and_then(|()| self.graph.find_line(&self.source, x, y, types, threshold, None))
            .map_err(|e| self.err(e))
    }

    pub fn find_node(&self, x: f64, y: f64, threshold: f64) -> Result<Option<NodeId>> {
        self.graph
            .require(BuildLevel::Base)
            .map(|()| self.graph.find_node(x, y, threshold))
            .map_err(|e| self.err(e))
    }

    /// Area containing `(x, y)`.
    pub fn find_area(&self, x: f64, y: f64) -> Result<Option<AreaId>> {
        self.graph
            .require(BuildLevel::Areas)
            .and_then(|()| self.graph.find_area(&self.source, x, y))
            .map_err(|e| self.err(e))
    }

    pub fn area_size(&self, area: AreaId) -> Result<f64> {
        self.graph
            .area_size(&self.source, area)
            .map_err(|e| self.err(e))
    }

    pub fn select_lines_by_box(&self, bbox: &BoundingBox, types: TypeMask) -> Result<Vec<LineId>> {
        self.graph
            .require(BuildLevel::Base)
            .map(|()| self.graph.select_lines_by_box(bbox, types))
            .map_err(|e| self.err(e))
    }

    /// Live lines carrying `(layer, cat)`, ascending.
    pub fn lines_by_category(&self, layer: i32, cat: i32) -> Vec<LineId> {
        self.cidx.lines(layer, cat).to_vec()
    }

    // --- Persistence ---

    /// Writes the topology snapshot next to the store.
    pub fn save_topology(&self) -> Result<()> {
        let Some(dir) = self.dir.as_deref() else {
            return Ok(());
        };
        let json = self
            .graph
            .to_json(self.source.body_size())
            .map_err(|e| self.err(e))?;
        std::fs::write(dir.join(TOPO_FILE), json)
            .map_err(|e| self.err(vtopo_core::Error::from(e)))?;
        tracing::debug!(dataset = %self.name, level = %self.graph.level(), "Topology saved");
        Ok(())
    }

    /// Flushes the store and, for datasets opened for update, persists the
    /// topology.
    pub fn close(mut self) -> Result<()> {
        if self.mode == OpenMode::Update && self.source.kind() == SourceKind::Native {
            self.source.flush().map_err(|e| self.err(e))?;
            if self.config.save_topology && self.graph.level() > BuildLevel::None {
                self.save_topology()?;
            }
        }
        tracing::info!(dataset = %self.name, "Dataset closed");
        Ok(())
    }
}

impl std::fmt::Debug for Dataset {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dataset")
            .field("name", &self.name)
            .field("dir", &self.dir)
            .field("mode", &self.mode)
            .field("lines", &self.source.alive_count())
            .field("level", &self.graph.level())
            .finish()
    }
}

fn dataset_name(dir: &Path) -> String {
    dir.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| dir.display().to_string())
}

fn remove_if_exists(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(vtopo_core::Error::from(e).into()),
    }
}

/// Loads the snapshot at `path` if it exists and matches `body_size`.
fn load_snapshot(path: &Path, body_size: u64) -> Result<Option<TopologyGraph>> {
    let json = match std::fs::read_to_string(path) {
        Ok(json) => json,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(vtopo_core::Error::from(e).into()),
    };
    let (graph, stamp) = match TopologyGraph::from_json(&json) {
        Ok(loaded) => loaded,
        Err(e) => {
            tracing::warn!(path = %path.display(), error = %e, "Unreadable topology file ignored");
            return Ok(None);
        }
    };
    if stamp != body_size {
        tracing::warn!(
            path = %path.display(),
            stamp,
            body_size,
            "Stale topology file ignored, rebuild required"
        );
        return Ok(None);
    }
    Ok(Some(graph))
}
