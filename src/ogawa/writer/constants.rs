//! Values stored in every written archive.

/// Library version stored in root child 1 (1.8.10).
pub(crate) const ALEMBIC_LIBRARY_VERSION: i32 = 10810;

/// Archive format version stored in root child 0.
pub(crate) const OGAWA_FILE_VERSION: i32 = 0;

/// Length of the key digest in front of every sample payload.
pub(crate) const DATA_KEY_SIZE: usize = 16;

/// Root group children, in order.
pub(crate) const ROOT_FORMAT_VERSION: usize = 0;
pub(crate) const ROOT_LIBRARY_VERSION: usize = 1;
pub(crate) const ROOT_TOP_OBJECT: usize = 2;
pub(crate) const ROOT_METADATA: usize = 3;
pub(crate) const ROOT_TIME_SAMPLINGS: usize = 4;
pub(crate) const ROOT_INDEXED_METADATA: usize = 5;
pub(crate) const ROOT_NUM_CHILDREN: usize = 6;

/// Trailing hashes of an object's headers block.
pub(crate) const OBJECT_TRAILER_SIZE: usize = 32;

/// Trailing rollup of a compound's headers block.
pub(crate) const COMPOUND_TRAILER_SIZE: usize = 16;
