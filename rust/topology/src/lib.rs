// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # VTopo Topology
//!
//! Planar topology for vector datasets.
//!
//! Features read from a [`vtopo_core::GeometrySource`] are organised into a
//! [`TopologyGraph`]: nodes where line endpoints meet, boundaries with an
//! area or isle on each side, areas with their isles and centroids. Every
//! node keeps its incident lines sorted by outgoing angle, which turns face
//! tracing into a sequence of constant-time neighbour steps.
//!
//! The graph is built in stages ([`BuildLevel`]) and, once built, is kept
//! up to date as features are written, rewritten and deleted through a
//! [`Dataset`]. Four R-trees ([`SpatialIndex`]) serve the box and nearest
//! queries used by building, editing and the cleaning tools in [`clean`].
//!
//! ```rust,ignore
//! use vtopo_core::{Categories, LinePoints, LineType};
//! use vtopo_topology::Dataset;
//!
//! let mut ds = Dataset::in_memory("parcels", false);
//! ds.write_line(
//!     LineType::Boundary,
//!     LinePoints::from_xy(&[(0.0, 0.0), (0.0, 10.0), (10.0, 10.0), (10.0, 0.0), (0.0, 0.0)]),
//!     Categories::new(),
//! )?;
//! let area = ds.find_area(5.0, 5.0)?.expect("inside the square");
//! assert_eq!(ds.get_area_boundaries(area)?.len(), 1);
//! ```

pub mod arena;
pub mod builders;
pub mod cidx;
pub mod clean;
pub mod config;
pub mod construction;
pub mod dataset;
pub mod error;
pub mod geometry;
pub mod query;
pub mod serialization;
pub mod spatial;
pub mod traversal;
pub mod update;

pub use arena::{
    AreaData, BuildLevel, CentroidArea, IsleData, LineData, LineTopo, NodeData, Side, Slots,
    TopologyGraph, UpdateLog,
};
pub use builders::{BuildOptions, BuildStats};
pub use cidx::CategoryIndex;
pub use clean::{
    BridgeAction, BridgeReport, CentroidReport, DissolveReport, MergeReport, SnapHit, SnapMode,
    SnapOutcome, SnapReport,
};
pub use config::TopologyConfig;
pub use dataset::{Dataset, OpenMode, COOR_FILE, TOPO_FILE};
pub use error::{Error, Result};
pub use geometry::Containment;
pub use query::TopologySummary;
pub use serialization::{TopologySnapshot, SNAPSHOT_VERSION};
pub use spatial::{Partition, RTree, SpatialIndex};
pub use traversal::RingTrace;
