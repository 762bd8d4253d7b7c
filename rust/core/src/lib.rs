// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! # VTopo Core
//!
//! Storage layer of the planar vector topology engine.
//!
//! - **Ids**: positive integer ids for lines, nodes, areas and isles, plus
//!   the [`DirectedLineRef`] and [`FaceRef`] value types that replace signed
//!   id conventions.
//! - **Geometry**: [`LinePoints`] with the endpoint angle and nearest-point
//!   measurements the topology builder relies on.
//! - **Features**: [`LineType`], [`TypeMask`] and [`Categories`].
//! - **Storage**: the endian-tagged record format ([`format`]), the
//!   [`NativeStore`] and the [`GeometrySource`] capability with its
//!   [`Source`] variants.
//!
//! ```rust,ignore
//! use vtopo_core::{Categories, Feature, GeometrySource, LinePoints, LineType, NativeStore};
//! use vtopo_core::format::ByteOrderTag;
//!
//! let mut store = NativeStore::in_memory(ByteOrderTag::Little, false);
//! let id = store.write(&Feature::new(
//!     LineType::Boundary,
//!     LinePoints::from_xy(&[(0.0, 0.0), (10.0, 0.0)]),
//!     Categories::new(),
//! ))?;
//! assert_eq!(store.read(id)?.points.len(), 2);
//! ```

pub mod bounds;
pub mod error;
pub mod feature;
pub mod format;
pub mod keys;
pub mod points;
pub mod source;
pub mod store;

pub use bounds::BoundingBox;
pub use error::{Error, Result};
pub use feature::{Categories, Category, Feature, LineType, TypeMask};
pub use format::ByteOrderTag;
pub use keys::{AreaId, DirectedLineRef, EntityKey, FaceRef, IsleId, LineId, NodeId, SlotId};
pub use points::{Degeneracy, LinePoints, NearestPoint, DEGENERATE_ANGLE};
pub use source::{validate_feature, ExternalSource, GeometrySource, Source, SourceKind};
pub use store::NativeStore;
