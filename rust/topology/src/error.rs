// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for topology operations.

use vtopo_core::EntityKey;

use crate::arena::BuildLevel;

/// Result type alias for topology operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during topology operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Geometry store failure.
    #[error(transparent)]
    Store(#[from] vtopo_core::Error),

    /// A referenced entity is dead or was never created.
    #[error("topology entity not found: {0}")]
    NotFound(EntityKey),

    /// The operation needs a higher build level.
    #[error("topology must be built to level {required} (current level: {current})")]
    NotBuilt {
        required: BuildLevel,
        current: BuildLevel,
    },

    /// An internal consistency check failed; the topology must be rebuilt.
    #[error("topology invariant violated at {key}: {detail}")]
    Invariant { key: EntityKey, detail: String },

    /// A face was requested for a ring without lines.
    #[error("cannot create a face from an empty ring")]
    EmptyRing,

    /// The dataset was opened without write access.
    #[error("dataset is opened read-only")]
    ReadOnlyDataset,

    /// Serialization/deserialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// An error attributed to a named dataset.
    #[error("dataset '{dataset}': {source}")]
    Dataset {
        dataset: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    pub(crate) fn invariant(key: impl Into<EntityKey>, detail: impl Into<String>) -> Self {
        Error::Invariant {
            key: key.into(),
            detail: detail.into(),
        }
    }

    /// Expected conditions (feature not found, empty geometry) that batch
    /// tools may skip. Everything else requires a rebuild.
    pub fn is_recoverable(&self) -> bool {
        match self {
            Error::Store(e) => e.is_recoverable(),
            Error::Dataset { source, .. } => source.is_recoverable(),
            Error::NotBuilt { .. } | Error::ReadOnlyDataset => true,
            _ => false,
        }
    }

    /// Attributes the error to `dataset` unless it already names one.
    pub fn in_dataset(self, dataset: &str) -> Self {
        match self {
            e @ Error::Dataset { .. } => e,
            e => Error::Dataset {
                dataset: dataset.to_string(),
                source: Box::new(e),
            },
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
