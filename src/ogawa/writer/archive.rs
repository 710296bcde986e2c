//! Archive writer: the shared write state and finalization.
//!
//! Sample data is appended as it arrives. Groups can only be written once
//! all of their children are known, so object and property groups are
//! written bottom-up by [`ArchiveWriter::finalize`], followed by the root
//! group and finally the header patch that freezes the container.
//!
//! Locks are always taken node first, then the shared state.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use super::constants::OGAWA_FILE_VERSION;
use super::metadata::MetaDataTable;
use super::object::{OObject, ObjectNode};
use super::stream::{OStream, SharedBuffer};
use super::write_util::{encode_dimensions, format_alembic_version, push_time_sampling};
use crate::core::{ArchiveWriter, MetaData, ObjectHeader, ObjectWriter, SampleKey, TimeSampling};
use crate::ogawa::WriteOptions;
use crate::util::{Dimensions, Error, Result};

/// State every writer node of one archive shares.
pub(crate) struct ArchiveShared {
    stream: OStream,
    dedup: HashMap<SampleKey, u64>,
    dedup_enabled: bool,
    time_samplings: Vec<Arc<TimeSampling>>,
    /// Set when finalization starts; sample writes fail from then on.
    sealed: bool,
    /// Set once the header patch went through.
    finalized: bool,
    num_reused: usize,
}

impl ArchiveShared {
    pub(crate) fn check_writable(&self) -> Result<()> {
        if self.sealed {
            Err(Error::Frozen)
        } else {
            Ok(())
        }
    }

    pub(crate) fn time_sampling(&self, index: u32) -> Result<Arc<TimeSampling>> {
        self.time_samplings
            .get(index as usize)
            .cloned()
            .ok_or(Error::TimeSamplingNotFound {
                index,
                count: self.time_samplings.len(),
            })
    }

    /// Store a keyed sample payload, reusing an earlier identical one.
    pub(crate) fn write_sample(&mut self, key: &SampleKey, bytes: &[u8]) -> Result<u64> {
        self.check_writable()?;
        if self.dedup_enabled {
            if let Some(&reference) = self.dedup.get(key) {
                self.num_reused += 1;
                return Ok(reference);
            }
        }
        let reference = self.stream.add_data(&[key.digest.as_bytes(), bytes])?;
        if self.dedup_enabled {
            self.dedup.insert(*key, reference);
        }
        Ok(reference)
    }

    pub(crate) fn write_dimensions(&mut self, dims: &Dimensions) -> Result<u64> {
        self.check_writable()?;
        self.stream.add_data(&[&encode_dimensions(dims)])
    }
}

/// What every handle of one archive points at.
pub(crate) struct ArchiveCore {
    name: String,
    options: WriteOptions,
    pub(crate) shared: Mutex<ArchiveShared>,
    metadata: Mutex<MetaData>,
    top: Arc<Mutex<ObjectNode>>,
}

/// Bookkeeping while the groups are written.
pub(crate) struct FinalizeContext<'a> {
    core: &'a ArchiveCore,
    pub(crate) metadata: MetaDataTable,
    max_samples: Vec<u32>,
    pub(crate) num_objects: usize,
    pub(crate) num_properties: usize,
}

impl FinalizeContext<'_> {
    pub(crate) fn add_group(&mut self, children: &[u64]) -> Result<u64> {
        self.core.shared.lock().stream.add_group(children)
    }

    pub(crate) fn add_data(&mut self, bytes: &[u8]) -> Result<u64> {
        self.core.shared.lock().stream.add_data(&[bytes])
    }

    /// Remember the largest sample count seen for a time sampling.
    pub(crate) fn record_samples(&mut self, time_sampling: u32, num_samples: u32) {
        if let Some(max) = self.max_samples.get_mut(time_sampling as usize) {
            *max = (*max).max(num_samples);
        }
    }
}

/// Archive writer over an Ogawa container.
///
/// Dropping it finalizes the archive if [`ArchiveWriter::finalize`] was not
/// called; errors at that point can only be logged.
pub struct OgawaArchiveWriter {
    core: Arc<ArchiveCore>,
}

impl OgawaArchiveWriter {
    pub fn create(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        let path = path.as_ref();
        let stream = OStream::create(path)?;
        Ok(Self::with_stream(path.display().to_string(), stream, options))
    }

    /// Write into a shared in-memory buffer.
    pub fn in_memory(buffer: SharedBuffer, options: WriteOptions) -> Result<Self> {
        let stream = OStream::memory(buffer)?;
        Ok(Self::with_stream("<memory>".to_string(), stream, options))
    }

    pub fn with_stream(name: String, stream: OStream, options: WriteOptions) -> Self {
        tracing::debug!(archive = %name, dedup = options.dedup, "creating archive");
        let shared = ArchiveShared {
            stream,
            dedup: HashMap::new(),
            dedup_enabled: options.dedup,
            time_samplings: vec![Arc::new(TimeSampling::identity())],
            sealed: false,
            finalized: false,
            num_reused: 0,
        };
        let top = ObjectNode::new(ObjectHeader::new("ABC", "/"));
        Self {
            core: Arc::new(ArchiveCore {
                name,
                options,
                shared: Mutex::new(shared),
                metadata: Mutex::new(MetaData::new()),
                top: Arc::new(Mutex::new(top)),
            }),
        }
    }

    pub fn options(&self) -> &WriteOptions {
        &self.core.options
    }

    pub fn archive_metadata(&self) -> MetaData {
        self.core.metadata.lock().clone()
    }

    /// Set one archive metadata entry.
    pub fn set_archive_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.core.shared.lock().check_writable()?;
        self.core.metadata.lock().set(key, value);
        Ok(())
    }

    /// Samples that were stored by reference to an identical earlier one.
    pub fn num_reused_samples(&self) -> usize {
        self.core.shared.lock().num_reused
    }

    fn write_root(&self, ctx: &mut FinalizeContext, top: u64) -> Result<()> {
        let mut metadata = self.core.metadata.lock().clone();
        metadata.set_unique(
            MetaData::ALEMBIC_VERSION_KEY,
            format_alembic_version(self.core.options.library_version),
        );
        if let Some(application) = &self.core.options.application_writer {
            metadata.set_unique(MetaData::APPLICATION_KEY, application.as_str());
        }

        let mut time_samplings = Vec::new();
        let mut guard = self.core.shared.lock();
        let shared = &mut *guard;
        for (ts, &max) in shared.time_samplings.iter().zip(&ctx.max_samples) {
            push_time_sampling(&mut time_samplings, ts, max);
        }

        let stream = &mut shared.stream;
        let children = [
            stream.add_data(&[&OGAWA_FILE_VERSION.to_le_bytes()])?,
            stream.add_data(&[&self.core.options.library_version.to_le_bytes()])?,
            top,
            stream.add_data(&[metadata.serialize().as_bytes()])?,
            stream.add_data(&[&time_samplings])?,
            stream.add_data(&[&ctx.metadata.serialize()])?,
        ];
        let root = stream.add_group(&children)?;
        stream.finalize(root)?;

        tracing::debug!(
            archive = %self.core.name,
            size = stream.pos(),
            objects = ctx.num_objects,
            properties = ctx.num_properties,
            reused_samples = shared.num_reused,
            "archive finalized"
        );
        Ok(())
    }
}

impl ArchiveWriter for OgawaArchiveWriter {
    fn name(&self) -> &str {
        &self.core.name
    }

    fn top(&self) -> Result<Arc<dyn ObjectWriter>> {
        Ok(Arc::new(OObject::new(self.core.clone(), self.core.top.clone())))
    }

    fn add_time_sampling(&self, time_sampling: TimeSampling) -> Result<u32> {
        let mut shared = self.core.shared.lock();
        shared.check_writable()?;
        if let Some(i) = shared.time_samplings.iter().position(|ts| **ts == time_sampling) {
            return Ok(i as u32);
        }
        shared.time_samplings.push(Arc::new(time_sampling));
        Ok((shared.time_samplings.len() - 1) as u32)
    }

    fn num_time_samplings(&self) -> usize {
        self.core.shared.lock().time_samplings.len()
    }

    fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>> {
        self.core.shared.lock().time_sampling(index as u32)
    }

    /// Write every group, the root and the header patch. A failed attempt
    /// leaves the container non-frozen and the archive sealed against new
    /// samples; calling `finalize` again rewrites the groups after the
    /// partial output.
    fn finalize(&self) -> Result<()> {
        let num_time_samplings = {
            let mut shared = self.core.shared.lock();
            if shared.finalized {
                return Ok(());
            }
            shared.sealed = true;
            shared.time_samplings.len()
        };

        let mut ctx = FinalizeContext {
            core: &self.core,
            metadata: MetaDataTable::new(),
            max_samples: vec![0; num_time_samplings],
            num_objects: 0,
            num_properties: 0,
        };
        let top = self.core.top.lock();
        let (top_group, _, _) = top.finalize(&mut ctx)?;
        drop(top);
        self.write_root(&mut ctx, top_group)?;
        self.core.shared.lock().finalized = true;
        Ok(())
    }

    fn is_finalized(&self) -> bool {
        self.core.shared.lock().finalized
    }
}

impl Drop for OgawaArchiveWriter {
    fn drop(&mut self) {
        if self.is_finalized() {
            return;
        }
        if let Err(err) = self.finalize() {
            tracing::warn!(archive = %self.core.name, error = %err, "finalizing archive on drop failed");
        }
    }
}
