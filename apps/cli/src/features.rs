// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! JSON feature lists used by `import` and `export`.
//!
//! ```json
//! { "features": [
//!     { "type": "boundary", "coordinates": [[0, 0], [0, 10], [10, 10]],
//!       "cats": [{ "layer": 1, "cat": 7 }] }
//! ] }
//! ```

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use vtopo_core::{Categories, Feature, LineId, LinePoints, LineType};

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct FeatureCollection {
    pub features: Vec<FeatureRecord>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct FeatureRecord {
    /// Line id, only set on export.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<LineId>,
    #[serde(rename = "type")]
    pub kind: LineType,
    /// `[x, y]` or `[x, y, z]` per vertex.
    pub coordinates: Vec<Vec<f64>>,
    #[serde(default, skip_serializing_if = "Categories::is_empty")]
    pub cats: Categories,
}

impl FeatureRecord {
    pub fn from_feature(id: LineId, feature: Feature, with_z: bool) -> Self {
        let coordinates = feature
            .points
            .points()
            .iter()
            .map(|p| if with_z { vec![p.x, p.y, p.z] } else { vec![p.x, p.y] })
            .collect();
        Self {
            id: Some(id),
            kind: feature.kind,
            coordinates,
            cats: feature.cats,
        }
    }

    pub fn into_feature(self) -> Result<Feature> {
        let mut points = LinePoints::with_capacity(self.coordinates.len());
        for c in &self.coordinates {
            match c.as_slice() {
                [x, y] => points.push(*x, *y, 0.0),
                [x, y, z] => points.push(*x, *y, *z),
                other => bail!("coordinate must have 2 or 3 values, got {}", other.len()),
            }
        }
        Ok(Feature::new(self.kind, points, self.cats))
    }
}
