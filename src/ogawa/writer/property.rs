//! Property writers.
//!
//! A property's node belongs to its parent compound and lives until the
//! archive is finalized. The handles returned to callers share the node;
//! the parent only remembers them weakly so `property(name)` can hand back a
//! handle that is still held somewhere.
//!
//! Sample bytes go to the stream as soon as they are set. Runs of repeated
//! samples are compacted: only the samples from the first to the last
//! change are stored, and the range is recorded in the header.

use std::collections::HashSet;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use super::archive::{ArchiveCore, ArchiveShared, FinalizeContext};
use super::write_util::{property_entry, LeafState};
use crate::core::{
    check_sample_bytes, hash_dimensions, hash_of, property_hash, ArraySample, ArrayPropertyWriter,
    CompoundPropertyWriter, Digest, DigestFold, MetaData, PropertyHeader, PropertyWriter,
    SampleKey, SampledPropertyWriter, ScalarPropertyWriter,
};
use crate::ogawa::property_info::ChangeRange;
use crate::util::{DataType, Dimensions, Error, Result};

/// The most recently stored sample, reused when later samples repeat it.
struct StoredSample {
    key: SampleKey,
    dimensions: Dimensions,
    refs: SmallVec<[u64; 2]>,
    digests: SmallVec<[Digest; 2]>,
}

/// State of one scalar or array property.
pub(crate) struct SampledNode {
    header: PropertyHeader,
    is_array: bool,
    refs: Vec<u64>,
    rollup: DigestFold,
    range: ChangeRange,
    previous: Option<StoredSample>,
    homogenous: bool,
    scalar_like: bool,
    first_points: Option<usize>,
}

impl SampledNode {
    fn new(header: PropertyHeader) -> Self {
        Self {
            is_array: header.is_array(),
            header,
            refs: Vec::new(),
            rollup: DigestFold::new(),
            range: ChangeRange::default(),
            previous: None,
            homogenous: true,
            scalar_like: true,
            first_points: None,
        }
    }

    fn num_samples(&self) -> usize {
        self.range.num_samples as usize
    }

    /// Fails when the time sampling cannot describe one more sample.
    fn check_room(&self, shared: &ArchiveShared) -> Result<()> {
        let time_sampling = shared.time_sampling(self.header.time_sampling_index)?;
        let samples = self.num_samples() + 1;
        match time_sampling.max_supported_samples() {
            Some(times) if samples > times => Err(Error::TimeSamplingMismatch {
                property: self.header.name.clone(),
                samples,
                times,
            }),
            _ => Ok(()),
        }
    }

    /// Append one sample. `dimensions` is the stored shape of an array
    /// sample and `None` for scalars.
    fn set(&mut self, shared: &mut ArchiveShared, bytes: &[u8], dimensions: Option<Dimensions>) -> Result<()> {
        shared.check_writable()?;
        self.check_room(shared)?;

        let data_type = self.header.data_type;
        let key = hash_of(data_type, bytes);
        let dimensions = dimensions.unwrap_or_else(Dimensions::scalar);
        let next = self.range.num_samples;
        let changed = next == 0
            || self
                .previous
                .as_ref()
                .map_or(true, |p| p.key != key || p.dimensions != dimensions);

        if changed {
            if self.range.first_changed != 0 {
                if let Some(previous) = &self.previous {
                    for _ in self.range.last_changed + 1..next {
                        self.refs.extend_from_slice(&previous.refs);
                        for digest in &previous.digests {
                            self.rollup.push(digest);
                        }
                    }
                }
            }

            let mut refs = SmallVec::new();
            let mut digests = SmallVec::new();
            refs.push(shared.write_sample(&key, bytes)?);
            digests.push(key.digest);
            if self.is_array {
                let stored_dims = dimensions.rank() > 1 || data_type.is_string();
                refs.push(if stored_dims {
                    shared.write_dimensions(&dimensions)?
                } else {
                    crate::ogawa::format::EMPTY_DATA
                });
                digests.push(hash_dimensions(&dimensions));
            }
            self.refs.extend_from_slice(&refs);
            for digest in &digests {
                self.rollup.push(digest);
            }

            if next != 0 {
                if self.range.first_changed == 0 {
                    self.range.first_changed = next;
                }
                self.range.last_changed = next;
            }
            self.previous = Some(StoredSample {
                key,
                dimensions: dimensions.clone(),
                refs,
                digests,
            });
        }

        if self.is_array {
            let points = dimensions.num_points();
            self.scalar_like &= points == 1;
            match self.first_points {
                None => self.first_points = Some(points),
                Some(first) => self.homogenous &= first == points,
            }
        }
        self.range.num_samples += 1;
        Ok(())
    }

    fn set_from_previous(&mut self, shared: &ArchiveShared) -> Result<()> {
        shared.check_writable()?;
        if self.range.num_samples == 0 {
            return Err(Error::SampleOutOfBounds { index: 0, count: 0 });
        }
        self.check_room(shared)?;
        self.range.num_samples += 1;
        Ok(())
    }

    fn set_time_sampling(&mut self, shared: &ArchiveShared, index: u32) -> Result<()> {
        shared.check_writable()?;
        let time_sampling = shared.time_sampling(index)?;
        if let Some(times) = time_sampling.max_supported_samples() {
            if self.num_samples() > times {
                return Err(Error::TimeSamplingMismatch {
                    property: self.header.name.clone(),
                    samples: self.num_samples(),
                    times,
                });
            }
        }
        self.header.time_sampling_index = index;
        Ok(())
    }

    /// Write the sample group. Returns its reference, header entry and hash.
    fn finalize(&self, ctx: &mut FinalizeContext) -> Result<(u64, Vec<u8>, Digest)> {
        let group = ctx.add_group(&self.refs)?;
        ctx.record_samples(self.header.time_sampling_index, self.range.num_samples);

        let leaf = LeafState {
            range: self.range,
            homogenous: self.homogenous,
            scalar_like: self.scalar_like,
        };
        let (md_index, md_text) = ctx.metadata.index_of(&self.header.meta_data);
        let entry = property_entry(&self.header, Some(&leaf), md_index, &md_text);
        let hash = property_hash(&entry, &self.rollup.clone().finish());
        Ok((group, entry, hash))
    }
}

/// A child of a compound and the weak handle last given out for it.
pub(crate) enum PropertySlot {
    Scalar {
        node: Arc<Mutex<SampledNode>>,
        handle: Weak<OScalarProperty>,
    },
    Array {
        node: Arc<Mutex<SampledNode>>,
        handle: Weak<OArrayProperty>,
    },
    Compound {
        node: Arc<Mutex<CompoundNode>>,
        handle: Weak<OCompoundProperty>,
    },
}

impl PropertySlot {
    fn header(&self) -> PropertyHeader {
        match self {
            Self::Scalar { node, .. } | Self::Array { node, .. } => node.lock().header.clone(),
            Self::Compound { node, .. } => node.lock().header.clone(),
        }
    }

    fn upgrade(&self) -> Option<PropertyWriter> {
        match self {
            Self::Scalar { handle, .. } => handle.upgrade().map(|h| PropertyWriter::Scalar(h)),
            Self::Array { handle, .. } => handle.upgrade().map(|h| PropertyWriter::Array(h)),
            Self::Compound { handle, .. } => handle.upgrade().map(|h| PropertyWriter::Compound(h)),
        }
    }
}

/// State of one compound property, including an object's root compound.
pub(crate) struct CompoundNode {
    header: PropertyHeader,
    /// Display name of the enclosing compound, or the owning object's path
    /// for a root compound. Used in error messages.
    path: String,
    children: Vec<PropertySlot>,
    names: HashSet<String>,
    closed: bool,
}

impl CompoundNode {
    pub(crate) fn new(header: PropertyHeader, path: String) -> Self {
        Self {
            header,
            path,
            children: Vec::new(),
            names: HashSet::new(),
            closed: false,
        }
    }

    fn check_new_child(&self, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::other(format!("empty property name under '{}'", self.display_name())));
        }
        if self.closed {
            return Err(Error::Closed(self.display_name()));
        }
        if self.names.contains(name) {
            return Err(Error::DuplicateName {
                parent: self.display_name(),
                name: name.to_string(),
            });
        }
        Ok(())
    }

    fn display_name(&self) -> String {
        if self.header.name.is_empty() {
            format!("{}.properties", self.path)
        } else {
            format!("{}.{}", self.path, self.header.name)
        }
    }

    pub(crate) fn close(&mut self) {
        self.closed = true;
    }

    /// Write every child, then the headers block, then the group. Returns
    /// the group reference and the rollup of the children's hashes.
    pub(crate) fn finalize(&self, ctx: &mut FinalizeContext) -> Result<(u64, Digest)> {
        let mut refs = Vec::with_capacity(self.children.len() + 1);
        let mut headers = Vec::new();
        let mut fold = DigestFold::new();

        for child in &self.children {
            let (group, entry, hash) = match child {
                PropertySlot::Scalar { node, .. } | PropertySlot::Array { node, .. } => {
                    node.lock().finalize(ctx)?
                }
                PropertySlot::Compound { node, .. } => {
                    let node = node.lock();
                    let (group, rollup) = node.finalize(ctx)?;
                    let (md_index, md_text) = ctx.metadata.index_of(&node.header.meta_data);
                    let entry = property_entry(&node.header, None, md_index, &md_text);
                    let hash = property_hash(&entry, &rollup);
                    (group, entry, hash)
                }
            };
            refs.push(group);
            headers.extend_from_slice(&entry);
            fold.push(&hash);
            ctx.num_properties += 1;
        }

        if self.children.is_empty() {
            return Ok((ctx.add_group(&[])?, Digest::ZERO));
        }
        let rollup = fold.finish();
        headers.extend_from_slice(rollup.as_bytes());
        refs.push(ctx.add_data(&headers)?);
        Ok((ctx.add_group(&refs)?, rollup))
    }
}

fn validate_data_type(name: &str, data_type: DataType) -> Result<()> {
    if data_type.is_valid() {
        Ok(())
    } else {
        Err(Error::type_mismatch(format!("valid data type for '{name}'"), data_type))
    }
}

// ============================================================================
// Handles
// ============================================================================

/// Writer for a scalar property: one fixed-size value per sample.
pub struct OScalarProperty {
    core: Arc<ArchiveCore>,
    node: Arc<Mutex<SampledNode>>,
}

impl SampledPropertyWriter for OScalarProperty {
    fn header(&self) -> PropertyHeader {
        self.node.lock().header.clone()
    }

    fn num_samples(&self) -> usize {
        self.node.lock().num_samples()
    }

    fn set_from_previous(&self) -> Result<()> {
        let mut node = self.node.lock();
        node.set_from_previous(&self.core.shared.lock())
    }

    fn set_time_sampling(&self, index: u32) -> Result<()> {
        let mut node = self.node.lock();
        node.set_time_sampling(&self.core.shared.lock(), index)
    }
}

impl ScalarPropertyWriter for OScalarProperty {
    fn set_sample(&self, bytes: &[u8]) -> Result<()> {
        let mut node = self.node.lock();
        check_sample_bytes(node.header.data_type, 1, bytes)?;
        node.set(&mut self.core.shared.lock(), bytes, None)
    }
}

/// Writer for an array property: a shaped run of elements per sample.
pub struct OArrayProperty {
    core: Arc<ArchiveCore>,
    node: Arc<Mutex<SampledNode>>,
}

impl SampledPropertyWriter for OArrayProperty {
    fn header(&self) -> PropertyHeader {
        self.node.lock().header.clone()
    }

    fn num_samples(&self) -> usize {
        self.node.lock().num_samples()
    }

    fn set_from_previous(&self) -> Result<()> {
        let mut node = self.node.lock();
        node.set_from_previous(&self.core.shared.lock())
    }

    fn set_time_sampling(&self, index: u32) -> Result<()> {
        let mut node = self.node.lock();
        node.set_time_sampling(&self.core.shared.lock(), index)
    }
}

impl ArrayPropertyWriter for OArrayProperty {
    fn set_sample(&self, sample: &ArraySample) -> Result<()> {
        let mut node = self.node.lock();
        if sample.data_type() != node.header.data_type {
            return Err(Error::type_mismatch(node.header.data_type, sample.data_type()));
        }
        // rank 0 and 1 are both stored as a flat run of points
        let dims = if sample.dimensions().rank() <= 1 {
            Dimensions::d1(sample.num_points())
        } else {
            sample.dimensions().clone()
        };
        node.set(&mut self.core.shared.lock(), sample.bytes(), Some(dims))
    }
}

/// Writer for a compound property.
pub struct OCompoundProperty {
    core: Arc<ArchiveCore>,
    node: Arc<Mutex<CompoundNode>>,
}

impl OCompoundProperty {
    pub(crate) fn new(core: Arc<ArchiveCore>, node: Arc<Mutex<CompoundNode>>) -> Self {
        Self { core, node }
    }

    /// Register a scalar or array child. `wrap` builds the handle and the
    /// slot that remembers it.
    fn add_sampled<H>(
        &self,
        header: PropertyHeader,
        wrap: impl FnOnce(Arc<ArchiveCore>, Arc<Mutex<SampledNode>>) -> (Arc<H>, PropertySlot),
    ) -> Result<Arc<H>> {
        let mut parent = self.node.lock();
        parent.check_new_child(&header.name)?;
        validate_data_type(&header.name, header.data_type)?;
        {
            let shared = self.core.shared.lock();
            shared.check_writable()?;
            shared.time_sampling(header.time_sampling_index)?;
        }
        tracing::trace!(parent = %parent.display_name(), name = %header.name, "created property");
        parent.names.insert(header.name.clone());
        let node = Arc::new(Mutex::new(SampledNode::new(header)));
        let (handle, slot) = wrap(self.core.clone(), node);
        parent.children.push(slot);
        Ok(handle)
    }
}

impl CompoundPropertyWriter for OCompoundProperty {
    fn header(&self) -> PropertyHeader {
        self.node.lock().header.clone()
    }

    fn create_scalar(
        &self,
        name: &str,
        data_type: DataType,
        meta_data: MetaData,
        time_sampling_index: u32,
    ) -> Result<Arc<dyn ScalarPropertyWriter>> {
        let header = PropertyHeader::scalar(name, data_type)
            .with_meta_data(meta_data)
            .with_time_sampling(time_sampling_index);
        let handle = self.add_sampled(header, |core, node| {
            let handle = Arc::new(OScalarProperty {
                core,
                node: node.clone(),
            });
            let slot = PropertySlot::Scalar {
                node,
                handle: Arc::downgrade(&handle),
            };
            (handle, slot)
        })?;
        Ok(handle)
    }

    fn create_array(
        &self,
        name: &str,
        data_type: DataType,
        meta_data: MetaData,
        time_sampling_index: u32,
    ) -> Result<Arc<dyn ArrayPropertyWriter>> {
        let header = PropertyHeader::array(name, data_type)
            .with_meta_data(meta_data)
            .with_time_sampling(time_sampling_index);
        let handle = self.add_sampled(header, |core, node| {
            let handle = Arc::new(OArrayProperty {
                core,
                node: node.clone(),
            });
            let slot = PropertySlot::Array {
                node,
                handle: Arc::downgrade(&handle),
            };
            (handle, slot)
        })?;
        Ok(handle)
    }

    fn create_compound(&self, name: &str, meta_data: MetaData) -> Result<Arc<dyn CompoundPropertyWriter>> {
        let mut parent = self.node.lock();
        parent.check_new_child(name)?;
        self.core.shared.lock().check_writable()?;
        parent.names.insert(name.to_string());

        let header = PropertyHeader::compound(name).with_meta_data(meta_data);
        let node = Arc::new(Mutex::new(CompoundNode::new(header, parent.display_name())));
        let handle = Arc::new(OCompoundProperty::new(self.core.clone(), node.clone()));
        parent.children.push(PropertySlot::Compound {
            node,
            handle: Arc::downgrade(&handle),
        });
        Ok(handle)
    }

    fn num_properties(&self) -> usize {
        self.node.lock().children.len()
    }

    fn property_header(&self, index: usize) -> Result<PropertyHeader> {
        let node = self.node.lock();
        node.children
            .get(index)
            .map(PropertySlot::header)
            .ok_or(Error::ChildOutOfBounds {
                index,
                count: node.children.len(),
            })
    }

    fn property(&self, name: &str) -> Option<PropertyWriter> {
        let node = self.node.lock();
        node.children
            .iter()
            .find(|slot| slot.header().name == name)
            .and_then(PropertySlot::upgrade)
    }

    fn property_at(&self, index: usize) -> Option<PropertyWriter> {
        self.node.lock().children.get(index).and_then(PropertySlot::upgrade)
    }

    fn close(&self) {
        self.node.lock().close();
    }
}
