// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

mod features;

use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use serde::Serialize;
use tracing_subscriber::EnvFilter;
use vtopo_core::{LineType, TypeMask};
use vtopo_topology::{BridgeAction, BuildLevel, Dataset, OpenMode, TopologyConfig};

use crate::features::{FeatureCollection, FeatureRecord};

#[derive(Parser)]
#[command(name = "vtopo")]
#[command(about = "Build and clean planar vector topology")]
struct Cmd {
    #[command(subcommand)]
    action: Action,
}

#[derive(Subcommand)]
enum Action {
    /// Create an empty dataset directory
    Create {
        dir: PathBuf,
        /// Store a z coordinate per vertex
        #[arg(long)]
        with_z: bool,
    },
    /// Append features from a JSON feature list
    Import { dir: PathBuf, input: PathBuf },
    /// Rebuild topology up to the given level
    Build {
        dir: PathBuf,
        #[arg(long, default_value = "all")]
        level: BuildLevel,
        /// Node snapping distance; defaults to VTOPO_NODE_THRESHOLD
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Print dataset and topology counts
    Info { dir: PathBuf },
    /// Run a cleaning tool
    Clean {
        dir: PathBuf,
        tool: Tool,
        /// Area size for rmarea, snapping distance for snap
        #[arg(long, default_value_t = 0.0)]
        threshold: f64,
        /// Comma separated feature types for merge and snap
        #[arg(long, default_value = "line,boundary", value_parser = parse_types)]
        types: TypeMask,
        /// Write every removed or changed feature to this dataset
        #[arg(long)]
        errors: Option<PathBuf>,
    },
    /// Place a centroid in every area that has none
    Centroids {
        dir: PathBuf,
        /// Give the new centroids categories in this layer
        #[arg(long)]
        layer: Option<i32>,
        /// First category number, counted up per centroid
        #[arg(long, default_value_t = 1)]
        start_cat: i32,
    },
    /// Write all live features as a JSON feature list
    Export {
        dir: PathBuf,
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Tool {
    /// Remove bridges between areas
    Bridges,
    /// Change bridges to plain lines
    Chbridges,
    /// Dissolve small areas into their neighbours
    Rmarea,
    /// Merge lines through pseudo nodes
    Merge,
    /// Snap vertices to nearby lines
    Snap,
}

fn main() -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let config = TopologyConfig::from_env();
    let cmd = Cmd::parse();
    match cmd.action {
        Action::Create { dir, with_z } => create(&dir, with_z, config),
        Action::Import { dir, input } => import(&dir, &input, config),
        Action::Build {
            dir,
            level,
            threshold,
        } => build(&dir, level, threshold, config),
        Action::Info { dir } => info(&dir, config),
        Action::Clean {
            dir,
            tool,
            threshold,
            types,
            errors,
        } => clean(&dir, tool, threshold, types, errors.as_deref(), config),
        Action::Centroids {
            dir,
            layer,
            start_cat,
        } => centroids(&dir, layer.map(|l| (l, start_cat)), config),
        Action::Export { dir, output } => export(&dir, output.as_deref(), config),
    }
}

fn parse_types(value: &str) -> std::result::Result<TypeMask, String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .try_fold(TypeMask::NONE, |mask, name| {
            Ok(mask | name.parse::<LineType>()?)
        })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn open(dir: &Path, mode: OpenMode, config: TopologyConfig) -> Result<Dataset> {
    Dataset::open(dir, mode, config).with_context(|| format!("opening {}", dir.display()))
}

fn create(dir: &Path, with_z: bool, config: TopologyConfig) -> Result<()> {
    let ds = Dataset::create(dir, with_z, config)
        .with_context(|| format!("creating {}", dir.display()))?;
    tracing::info!(dataset = ds.name(), with_z, "created");
    ds.close()?;
    Ok(())
}

fn import(dir: &Path, input: &Path, config: TopologyConfig) -> Result<()> {
    let file = File::open(input).with_context(|| format!("reading {}", input.display()))?;
    let collection: FeatureCollection = serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("parsing {}", input.display()))?;

    let mut ds = open(dir, OpenMode::Update, config)?;
    let total = collection.features.len();
    for (i, record) in collection.features.into_iter().enumerate() {
        let feature = record
            .into_feature()
            .with_context(|| format!("feature {i}"))?;
        ds.write_line(feature.kind, feature.points, feature.cats)
            .with_context(|| format!("feature {i}"))?;
    }
    tracing::info!(dataset = ds.name(), features = total, "imported");
    ds.close()?;
    Ok(())
}

fn build(
    dir: &Path,
    level: BuildLevel,
    threshold: Option<f64>,
    config: TopologyConfig,
) -> Result<()> {
    let threshold = threshold.unwrap_or(config.node_threshold);
    let mut ds = open(dir, OpenMode::Update, config)?;
    let stats = ds.build_topology(level, threshold)?;
    print_json(&stats)?;
    ds.close()?;
    Ok(())
}

#[derive(Serialize)]
struct Info<'a> {
    name: &'a str,
    with_z: bool,
    level: String,
    lines: usize,
    #[serde(flatten)]
    topology: vtopo_topology::TopologySummary,
}

fn info(dir: &Path, config: TopologyConfig) -> Result<()> {
    let ds = open(dir, OpenMode::ReadOnly, config)?;
    print_json(&Info {
        name: ds.name(),
        with_z: ds.with_z(),
        level: ds.topology().level().to_string(),
        lines: ds.line_ids().len(),
        topology: ds.summary(),
    })
}

fn clean(
    dir: &Path,
    tool: Tool,
    threshold: f64,
    types: TypeMask,
    errors: Option<&Path>,
    config: TopologyConfig,
) -> Result<()> {
    let node_threshold = config.node_threshold;
    let mut ds = open(dir, OpenMode::Update, config.clone())?;
    if ds.topology().level() < BuildLevel::ALL {
        tracing::info!(dataset = ds.name(), "topology missing, building");
        ds.build_topology(BuildLevel::ALL, node_threshold)?;
    }
    let mut errors = errors
        .map(|path| {
            Dataset::create(path, ds.with_z(), config)
                .with_context(|| format!("creating {}", path.display()))
        })
        .transpose()?;

    let err_ds = errors.as_mut();
    match tool {
        Tool::Bridges => print_json(&ds.remove_bridges(BridgeAction::Remove, err_ds)?)?,
        Tool::Chbridges => print_json(&ds.remove_bridges(BridgeAction::ChangeType, err_ds)?)?,
        Tool::Rmarea => print_json(&ds.remove_small_areas(threshold, err_ds)?)?,
        Tool::Merge => print_json(&ds.merge_lines(types, err_ds)?)?,
        Tool::Snap => print_json(&ds.snap_lines(types, threshold)?)?,
    }

    if let Some(errors) = errors {
        errors.close()?;
    }
    ds.close()?;
    Ok(())
}

fn centroids(dir: &Path, cats: Option<(i32, i32)>, config: TopologyConfig) -> Result<()> {
    let node_threshold = config.node_threshold;
    let mut ds = open(dir, OpenMode::Update, config)?;
    if ds.topology().level() < BuildLevel::ALL {
        ds.build_topology(BuildLevel::ALL, node_threshold)?;
    }
    print_json(&ds.add_centroids(cats)?)?;
    ds.close()?;
    Ok(())
}

fn export(dir: &Path, output: Option<&Path>, config: TopologyConfig) -> Result<()> {
    let ds = open(dir, OpenMode::ReadOnly, config)?;
    let mut collection = FeatureCollection::default();
    for id in ds.line_ids() {
        let feature = ds.read_line(id)?;
        collection
            .features
            .push(FeatureRecord::from_feature(id, feature, ds.with_z()));
    }

    match output {
        Some(path) => {
            let file = File::create(path).with_context(|| format!("writing {}", path.display()))?;
            let mut writer = BufWriter::new(file);
            serde_json::to_writer_pretty(&mut writer, &collection)?;
            writer.flush()?;
        }
        None => print_json(&collection)?,
    }
    tracing::info!(
        dataset = ds.name(),
        features = collection.features.len(),
        "exported"
    );
    ds.close()?;
    Ok(())
}
