//! # Alembic
//!
//! Storage core of the Alembic (.abc) interchange format: the Ogawa
//! container, the object/property graph laid out inside it, time sampling
//! and the content hashes used for sample sharing.
//!
//! ## Modules
//!
//! - [`util`] - Basic types (POD, DataType, Dimensions, errors)
//! - [`core`] - Time sampling, metadata, headers, digests and backend traits
//! - [`ogawa`] - Ogawa container and the graph mapping on top of it
//! - [`abc`] - High-level API (IArchive, OArchive, Objects, Properties)
//!
//! ## Example
//!
//! ```ignore
//! use alembic::prelude::*;
//!
//! let archive = IArchive::open("animation.abc")?;
//! for child in archive.top()?.children() {
//!     println!("{}", child?.full_name());
//! }
//! ```

pub mod util;
pub mod core;
pub mod ogawa;
pub mod abc;

pub use util::{DataType, Dimensions, Error, PlainOldDataType, Result};

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::abc::{
        IArchive, IArrayProperty, ICompoundProperty, IObject, IScalarProperty, OArchive,
        OArrayProperty, OCompoundProperty, OObject, OScalarProperty,
    };
    pub use crate::core::{ArraySample, MetaData, SampleSelector, TimeSampling};
    pub use crate::ogawa::{ReadOptions, SharedBuffer, WriteOptions};
    pub use crate::util::{DataType, Dimensions, Error, PlainOldDataType, Result};
}
