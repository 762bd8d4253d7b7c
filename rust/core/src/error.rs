// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Error types for geometry storage.

use crate::keys::LineId;
use crate::source::SourceKind;

/// Result type alias for geometry store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by geometry sources.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Underlying file operation failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// File does not start with the geometry file magic.
    #[error("not a vector geometry file (bad magic)")]
    BadMagic,

    /// File was written by a newer, incompatible format revision.
    #[error("unsupported geometry format {major}.{minor}")]
    UnsupportedVersion { major: u8, minor: u8 },

    /// A header or record could not be decoded.
    #[error("corrupt geometry data at offset {offset}: {reason}")]
    Corrupt { offset: u64, reason: String },

    /// The line exists but has been deleted.
    #[error("{0} is dead")]
    DeadLine(LineId),

    /// The line id was never allocated.
    #[error("{0} does not exist")]
    InvalidLine(LineId),

    /// `restore` called on a line that is alive.
    #[error("{0} is not deleted")]
    AliveLine(LineId),

    /// A feature must have at least one point.
    #[error("feature has no points")]
    EmptyGeometry,

    /// Point-class features hold exactly one coordinate.
    #[error("{kind} feature must have exactly one point, got {count}")]
    PointCount { kind: crate::LineType, count: usize },

    /// Write attempted on a read-only source.
    #[error("{0} geometry source is read-only")]
    ReadOnly(SourceKind),
}

impl Error {
    /// Expected conditions that batch tools may skip and continue past.
    /// Everything else leaves the dataset needing a rebuild.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            Error::DeadLine(_) | Error::AliveLine(_) | Error::EmptyGeometry | Error::PointCount { .. }
        )
    }

    pub(crate) fn corrupt(offset: u64, reason: impl Into<String>) -> Self {
        Error::Corrupt {
            offset,
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recoverable_classification() {
        let id = LineId::new(4).unwrap();
        assert!(Error::DeadLine(id).is_recoverable());
        assert!(Error::EmptyGeometry.is_recoverable());
        assert!(!Error::InvalidLine(id).is_recoverable());
        assert!(!Error::corrupt(24, "truncated").is_recoverable());
        assert!(!Error::ReadOnly(SourceKind::External).is_recoverable());
    }

    #[test]
    fn messages_name_the_id_and_offset() {
        let id = LineId::new(9).unwrap();
        assert_eq!(Error::DeadLine(id).to_string(), "line 9 is dead");
        assert_eq!(
            Error::corrupt(128, "bad type code").to_string(),
            "corrupt geometry data at offset 128: bad type code"
        );
    }
}
