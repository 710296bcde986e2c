//! Backend-independent layer.
//!
//! - [`TimeSampling`] - index/time resolution
//! - [`MetaData`] - key/value metadata
//! - [`ObjectHeader`] / [`PropertyHeader`]
//! - [`ArraySample`] / [`SampleSelector`]
//! - [`SampleKey`] and structural digests
//! - [`WeakCache`] - lazy child materialization
//! - reader/writer traits every backend implements

mod cache;
mod digest;
mod header;
mod metadata;
mod sample;
mod time_sampling;
mod traits;

pub use cache::WeakCache;
pub use digest::{
    hash_dimensions, hash_of, hash_parts, object_hash, property_hash, Digest, DigestFold, SampleKey,
};
pub use header::{child_path, ObjectHeader, PropertyHeader, PropertyType};
pub use metadata::MetaData;
pub use sample::{
    check_sample_bytes, decode_strings, encode_strings, encode_wstrings, points_in_bytes,
    ArraySample, SampleSelector,
};
pub use time_sampling::{TimeSampling, TimeSamplingType, ACYCLIC_TIME_PER_CYCLE};
pub use traits::{
    ArchiveReader, ArchiveWriter, ArrayPropertyReader, ArrayPropertyWriter, CompoundPropertyReader,
    CompoundPropertyWriter, ObjectReader, ObjectWriter, PropertyReader, PropertyWriter,
    SampledPropertyReader, SampledPropertyWriter, ScalarPropertyReader, ScalarPropertyWriter,
};
