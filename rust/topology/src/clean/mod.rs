// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Cleaning tools that run on a built topology.
//!
//! Every tool edits through the [`Dataset`] write, rewrite and delete
//! operations, so the topology stays maintained while it runs. Features a
//! tool removes or changes can be copied, as they were before the change,
//! to a second dataset for review.

mod bridges;
mod centroids;
mod merge;
mod small_areas;
mod snap;

pub use bridges::{BridgeAction, BridgeReport};
pub use centroids::CentroidReport;
pub use merge::MergeReport;
pub use small_areas::DissolveReport;
pub use snap::{SnapHit, SnapMode, SnapOutcome, SnapReport};

use vtopo_core::Feature;

use crate::dataset::Dataset;
use crate::error::Result;

/// Copies `feature` to the error dataset, if there is one.
fn record(errors: Option<&mut Dataset>, feature: &Feature) -> Result<()> {
    if let Some(errors) = errors {
        errors.write_line(feature.kind, feature.points.clone(), feature.cats.clone())?;
    }
    Ok(())
}
