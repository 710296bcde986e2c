//! Backend-independent reader and writer contracts.
//!
//! A backend hands out nodes as `Arc`s. Reader nodes keep their parent alive
//! and parents remember children only weakly, so a subtree lives exactly as
//! long as somebody outside holds a piece of it. Writer nodes are owned by
//! their parent until the archive is finalized; handles to them are weak
//! from the parent's side.

use std::sync::Arc;

use super::{ArraySample, Digest, MetaData, ObjectHeader, PropertyHeader, SampleKey, TimeSampling};
use crate::util::{DataType, Result};

// ============================================================================
// Readers
// ============================================================================

pub trait ArchiveReader: Send + Sync {
    /// Path or label of the byte source.
    fn name(&self) -> &str;

    /// Library version that wrote the archive, e.g. `10810`.
    fn archive_version(&self) -> i32;

    fn archive_metadata(&self) -> &MetaData;

    fn top(&self) -> Result<Arc<dyn ObjectReader>>;

    fn num_time_samplings(&self) -> usize;

    fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>>;

    /// Largest sample count written against a time sampling.
    fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<usize>;
}

pub trait ObjectReader: Send + Sync {
    fn header(&self) -> &ObjectHeader;

    fn archive(&self) -> Arc<dyn ArchiveReader>;

    /// `None` for the top object.
    fn parent(&self) -> Option<Arc<dyn ObjectReader>>;

    fn num_children(&self) -> usize;

    fn child_header(&self, index: usize) -> Result<&ObjectHeader>;

    fn child(&self, index: usize) -> Result<Arc<dyn ObjectReader>>;

    /// `Ok(None)` when no child has that name.
    fn child_by_name(&self, name: &str) -> Result<Option<Arc<dyn ObjectReader>>>;

    fn properties(&self) -> Result<Arc<dyn CompoundPropertyReader>>;

    /// Stored rollup of this object's properties.
    fn properties_hash(&self) -> Digest;

    /// Stored fold of this object's child object hashes.
    fn children_hash(&self) -> Digest;

    fn name(&self) -> &str {
        &self.header().name
    }

    fn full_name(&self) -> &str {
        &self.header().full_name
    }

    fn meta_data(&self) -> &MetaData {
        &self.header().meta_data
    }
}

pub trait CompoundPropertyReader: Send + Sync {
    fn header(&self) -> &PropertyHeader;

    fn object(&self) -> Arc<dyn ObjectReader>;

    /// `None` for an object's root compound.
    fn parent(&self) -> Option<Arc<dyn CompoundPropertyReader>>;

    fn num_properties(&self) -> usize;

    fn property_header(&self, index: usize) -> Result<&PropertyHeader>;

    fn property(&self, index: usize) -> Result<PropertyReader>;

    /// `Ok(None)` when no property has that name.
    fn property_by_name(&self, name: &str) -> Result<Option<PropertyReader>>;

    /// Stored rollup of the children's hashes.
    fn rollup(&self) -> Digest;

    /// Recompute every structural hash below this compound and compare it
    /// with what is stored. Returns the rollup.
    fn verify(&self) -> Result<Digest>;
}

/// Behaviour shared by scalar and array readers.
pub trait SampledPropertyReader: Send + Sync {
    fn header(&self) -> &PropertyHeader;

    fn parent(&self) -> Arc<dyn CompoundPropertyReader>;

    fn num_samples(&self) -> usize;

    /// True when every sample is identical.
    fn is_constant(&self) -> bool;

    fn time_sampling(&self) -> Arc<TimeSampling>;

    /// Key of the sample at `index`, read from the stored digest.
    fn sample_key(&self, index: usize) -> Result<SampleKey>;
}

pub trait ScalarPropertyReader: SampledPropertyReader {
    /// Raw element bytes of sample `index`.
    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>>;
}

pub trait ArrayPropertyReader: SampledPropertyReader {
    fn sample(&self, index: usize) -> Result<ArraySample>;

    /// Shape of sample `index` without reading its payload when possible.
    fn dimensions(&self, index: usize) -> Result<crate::util::Dimensions>;

    /// Every sample has the same number of points.
    fn is_homogenous(&self) -> bool;

    /// Every sample has exactly one point.
    fn is_scalar_like(&self) -> bool;
}

/// A property of any kind.
#[derive(Clone)]
pub enum PropertyReader {
    Scalar(Arc<dyn ScalarPropertyReader>),
    Array(Arc<dyn ArrayPropertyReader>),
    Compound(Arc<dyn CompoundPropertyReader>),
}

impl PropertyReader {
    pub fn header(&self) -> &PropertyHeader {
        match self {
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
            Self::Compound(p) => p.header(),
        }
    }

    pub fn name(&self) -> &str {
        &self.header().name
    }

    pub fn into_scalar(self) -> Option<Arc<dyn ScalarPropertyReader>> {
        match self {
            Self::Scalar(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Arc<dyn ArrayPropertyReader>> {
        match self {
            Self::Array(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_compound(self) -> Option<Arc<dyn CompoundPropertyReader>> {
        match self {
            Self::Compound(p) => Some(p),
            _ => None,
        }
    }
}

// ============================================================================
// Writers
// ============================================================================

pub trait ArchiveWriter: Send + Sync {
    fn name(&self) -> &str;

    fn top(&self) -> Result<Arc<dyn ObjectWriter>>;

    /// Register a sampling, reusing an equal existing entry.
    fn add_time_sampling(&self, time_sampling: TimeSampling) -> Result<u32>;

    fn num_time_samplings(&self) -> usize;

    fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>>;

    /// Write every pending group, the tables and the header. Nothing can be
    /// written afterwards.
    fn finalize(&self) -> Result<()>;

    fn is_finalized(&self) -> bool;
}

pub trait ObjectWriter: Send + Sync {
    fn header(&self) -> &ObjectHeader;

    /// Fails with `DuplicateName` if a child of that name was ever created
    /// here, and with `Closed` once this object was closed.
    fn create_child(&self, name: &str, meta_data: MetaData) -> Result<Arc<dyn ObjectWriter>>;

    fn num_children(&self) -> usize;

    fn child_header(&self, index: usize) -> Result<ObjectHeader>;

    /// The child handle if it is still held somewhere.
    fn child(&self, name: &str) -> Option<Arc<dyn ObjectWriter>>;

    fn properties(&self) -> Result<Arc<dyn CompoundPropertyWriter>>;

    /// Refuse further children.
    fn close(&self);
}

pub trait CompoundPropertyWriter: Send + Sync {
    fn header(&self) -> PropertyHeader;

    fn create_scalar(
        &self,
        name: &str,
        data_type: DataType,
        meta_data: MetaData,
        time_sampling_index: u32,
    ) -> Result<Arc<dyn ScalarPropertyWriter>>;

    fn create_array(
        &self,
        name: &str,
        data_type: DataType,
        meta_data: MetaData,
        time_sampling_index: u32,
    ) -> Result<Arc<dyn ArrayPropertyWriter>>;

    fn create_compound(&self, name: &str, meta_data: MetaData) -> Result<Arc<dyn CompoundPropertyWriter>>;

    fn num_properties(&self) -> usize;

    fn property_header(&self, index: usize) -> Result<PropertyHeader>;

    /// The handle created under `name` if it is still held somewhere.
    fn property(&self, name: &str) -> Option<PropertyWriter>;

    fn property_at(&self, index: usize) -> Option<PropertyWriter>;

    /// Refuse further children.
    fn close(&self);
}

/// Behaviour shared by scalar and array writers.
pub trait SampledPropertyWriter: Send + Sync {
    fn header(&self) -> PropertyHeader;

    fn num_samples(&self) -> usize;

    /// Repeat the last sample.
    fn set_from_previous(&self) -> Result<()>;

    /// Point at another entry of the archive's table. Fails with
    /// `TimeSamplingMismatch` if it cannot describe the samples already set.
    fn set_time_sampling(&self, index: u32) -> Result<()>;
}

pub trait ScalarPropertyWriter: SampledPropertyWriter {
    fn set_sample(&self, bytes: &[u8]) -> Result<()>;
}

pub trait ArrayPropertyWriter: SampledPropertyWriter {
    fn set_sample(&self, sample: &ArraySample) -> Result<()>;
}

/// A writable property of any kind.
#[derive(Clone)]
pub enum PropertyWriter {
    Scalar(Arc<dyn ScalarPropertyWriter>),
    Array(Arc<dyn ArrayPropertyWriter>),
    Compound(Arc<dyn CompoundPropertyWriter>),
}

impl PropertyWriter {
    pub fn header(&self) -> PropertyHeader {
        match self {
            Self::Scalar(p) => p.header(),
            Self::Array(p) => p.header(),
            Self::Compound(p) => p.header(),
        }
    }

    pub fn into_scalar(self) -> Option<Arc<dyn ScalarPropertyWriter>> {
        match self {
            Self::Scalar(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_array(self) -> Option<Arc<dyn ArrayPropertyWriter>> {
        match self {
            Self::Array(p) => Some(p),
            _ => None,
        }
    }

    pub fn into_compound(self) -> Option<Arc<dyn CompoundPropertyWriter>> {
        match self {
            Self::Compound(p) => Some(p),
            _ => None,
        }
    }
}
