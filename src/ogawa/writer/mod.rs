//! Write side of the container.
//!
//! [`OStream`] and [`OGroup`] append raw blocks. The node writers on top of
//! them lay objects and properties out as groups, write sample data as it
//! arrives and commit the tree in [`OgawaArchiveWriter`]'s finalize.

mod archive;
pub(crate) mod constants;
mod metadata;
mod object;
mod property;
mod stream;
pub(crate) mod write_util;

pub use archive::OgawaArchiveWriter;
pub use object::OObject;
pub use property::{OArrayProperty, OCompoundProperty, OScalarProperty};
pub use stream::{OGroup, OStream, SharedBuffer, WriteSink};
