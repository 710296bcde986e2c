//! Ogawa container backend.
//!
//! Ogawa is the binary container used by Alembic files (.abc): a tree of
//! groups and data blocks addressed by absolute offset.
//!
//! ## File Structure
//!
//! ```text
//! +------------------+
//! | Magic: "Ogawa"   |  5 bytes
//! +------------------+
//! | Frozen flag      |  1 byte (0x00 while writing, 0xFF when complete)
//! +------------------+
//! | Version          |  2 bytes (u16 BE)
//! +------------------+
//! | Root Group Pos   |  8 bytes (u64 LE)
//! +------------------+
//! | ... Data ...     |
//! +------------------+
//! ```
//!
//! [`IArchive`], [`IGroup`] and [`IData`] read raw nodes; [`OStream`] and
//! [`OGroup`] write them. [`OgawaArchiveReader`] and [`OgawaArchiveWriter`]
//! lay the object/property graph out on top.

mod abc_impl;
mod format;
mod options;
pub mod property_info;
pub mod read_util;
mod reader;
mod streams;
pub mod writer;

pub use abc_impl::{
    OgawaArchiveReader, OgawaArrayReader, OgawaCompoundReader, OgawaObjectReader, OgawaScalarReader,
};
pub use format::*;
pub use options::{ReadOptions, WriteOptions};
pub use reader::{IArchive, IData, IGroup};
pub use streams::{IStreams, ReadSeek, SlotGuard, StreamManager};
pub use writer::{
    OArrayProperty, OCompoundProperty, OGroup, OObject, OScalarProperty, OStream,
    OgawaArchiveWriter, SharedBuffer, WriteSink,
};
