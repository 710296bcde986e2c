//! High-level Alembic API.
//!
//! Entry points for reading and writing archives:
//! - [`IArchive`] / [`OArchive`] - archive access
//! - [`IObject`] / [`OObject`] - hierarchical objects
//! - [`ICompoundProperty`] / [`OCompoundProperty`] - property containers
//! - [`IScalarProperty`] / [`OScalarProperty`] - one value per sample
//! - [`IArrayProperty`] / [`OArrayProperty`] - arrays of values per sample
//!
//! Every wrapper owns an `Arc` to its node, so handles can be stored and
//! sent across threads freely.
//!
//! ## Example
//!
//! ```ignore
//! use alembic::abc::{IArchive, OArchive};
//! use alembic::util::DataType;
//!
//! let archive = OArchive::create("out.abc")?;
//! let child = archive.top()?.create_child("points")?;
//! let p = child.properties()?.create_array("P", DataType::VEC3F, 0)?;
//! p.set_array(&[0.0f32, 1.0, 2.0])?;
//! archive.finalize()?;
//!
//! let archive = IArchive::open("out.abc")?;
//! let p = archive.find_object("/points")?.unwrap().properties()?.array("P")?.unwrap();
//! let values: Vec<f32> = p.get_array(0)?;
//! ```

mod properties;

pub use properties::{
    IArrayProperty, ICompoundProperty, IScalarProperty, OArrayProperty, OCompoundProperty,
    OScalarProperty,
};

use std::path::Path;
use std::sync::Arc;

use crate::core::{
    ArchiveReader, ArchiveWriter, Digest, MetaData, ObjectHeader, ObjectReader, ObjectWriter,
    TimeSampling,
};
use crate::ogawa::{OgawaArchiveReader, OgawaArchiveWriter, ReadOptions, SharedBuffer, WriteOptions};
use crate::util::Result;

// ============================================================================
// Archives
// ============================================================================

/// Input archive.
#[derive(Clone)]
pub struct IArchive {
    reader: Arc<OgawaArchiveReader>,
}

impl IArchive {
    /// Open a file with default options.
    ///
    /// # Example
    /// ```ignore
    /// let archive = IArchive::open("scene.abc")?;
    /// ```
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with(path, &ReadOptions::default())
    }

    pub fn open_with(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        Ok(Self {
            reader: OgawaArchiveReader::open(path, options)?,
        })
    }

    /// Read an archive held in memory.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, options: &ReadOptions) -> Result<Self> {
        Ok(Self {
            reader: OgawaArchiveReader::from_bytes(bytes, options)?,
        })
    }

    pub fn name(&self) -> &str {
        self.reader.name()
    }

    /// The backend reader.
    pub fn reader(&self) -> &Arc<OgawaArchiveReader> {
        &self.reader
    }

    pub fn top(&self) -> Result<IObject> {
        Ok(IObject::new(self.reader.top()?))
    }

    /// Find an object by path such as `/parent/child`. The leading slash is
    /// optional; `/` alone is the top object.
    pub fn find_object(&self, path: &str) -> Result<Option<IObject>> {
        let mut current = self.top()?;
        for part in path.split('/').filter(|p| !p.is_empty()) {
            match current.child_by_name(part)? {
                Some(child) => current = child,
                None => return Ok(None),
            }
        }
        Ok(Some(current))
    }

    pub fn num_time_samplings(&self) -> usize {
        self.reader.num_time_samplings()
    }

    pub fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>> {
        self.reader.time_sampling(index)
    }

    /// Library version that wrote the archive, as `AABBCC` (10810 = 1.8.10).
    pub fn archive_version(&self) -> i32 {
        self.reader.archive_version()
    }

    /// Largest sample count written against a time sampling.
    pub fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<usize> {
        self.reader.max_num_samples_for_time_sampling(index)
    }

    pub fn archive_metadata(&self) -> &MetaData {
        self.reader.archive_metadata()
    }

    pub fn app_name(&self) -> Option<&str> {
        self.archive_metadata().get(MetaData::APPLICATION_KEY)
    }

    pub fn date_written(&self) -> Option<&str> {
        self.archive_metadata().get(MetaData::DATE_WRITTEN_KEY)
    }

    pub fn user_description(&self) -> Option<&str> {
        self.archive_metadata().get(MetaData::DESCRIPTION_KEY)
    }

    pub fn dcc_fps(&self) -> Option<f64> {
        self.archive_metadata()
            .get(MetaData::DCC_FPS_KEY)
            .and_then(|s| s.parse().ok())
    }

    /// Version string of the library that wrote the archive.
    pub fn alembic_version(&self) -> Option<&str> {
        self.archive_metadata().get(MetaData::ALEMBIC_VERSION_KEY)
    }

    /// Recheck every stored hash in the archive.
    pub fn verify(&self) -> Result<()> {
        self.reader.verify()
    }
}

/// Output archive. Finalized explicitly with [`OArchive::finalize`] or on
/// drop.
pub struct OArchive {
    writer: OgawaArchiveWriter,
}

impl OArchive {
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        Self::create_with(path, WriteOptions::default())
    }

    pub fn create_with(path: impl AsRef<Path>, options: WriteOptions) -> Result<Self> {
        Ok(Self {
            writer: OgawaArchiveWriter::create(path, options)?,
        })
    }

    /// Write into `buffer`; read the finished archive back with
    /// [`IArchive::from_bytes`].
    pub fn in_memory(buffer: SharedBuffer, options: WriteOptions) -> Result<Self> {
        Ok(Self {
            writer: OgawaArchiveWriter::in_memory(buffer, options)?,
        })
    }

    pub fn name(&self) -> &str {
        self.writer.name()
    }

    /// The backend writer.
    pub fn writer(&self) -> &OgawaArchiveWriter {
        &self.writer
    }

    pub fn top(&self) -> Result<OObject> {
        Ok(OObject::new(self.writer.top()?))
    }

    /// Register a time sampling and return its index. Equal samplings share
    /// one index.
    pub fn add_time_sampling(&self, time_sampling: TimeSampling) -> Result<u32> {
        self.writer.add_time_sampling(time_sampling)
    }

    pub fn num_time_samplings(&self) -> usize {
        self.writer.num_time_samplings()
    }

    pub fn set_application(&self, name: &str) -> Result<()> {
        self.writer.set_archive_metadata(MetaData::APPLICATION_KEY, name)
    }

    pub fn set_description(&self, description: &str) -> Result<()> {
        self.writer.set_archive_metadata(MetaData::DESCRIPTION_KEY, description)
    }

    pub fn set_date_written(&self, date: &str) -> Result<()> {
        self.writer.set_archive_metadata(MetaData::DATE_WRITTEN_KEY, date)
    }

    pub fn set_dcc_fps(&self, fps: f64) -> Result<()> {
        self.writer.set_archive_metadata(MetaData::DCC_FPS_KEY, &fps.to_string())
    }

    pub fn set_archive_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.writer.set_archive_metadata(key, value)
    }

    /// Samples stored by reference to an identical earlier sample.
    pub fn num_reused_samples(&self) -> usize {
        self.writer.num_reused_samples()
    }

    pub fn finalize(&self) -> Result<()> {
        self.writer.finalize()
    }

    pub fn is_finalized(&self) -> bool {
        self.writer.is_finalized()
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Object in an input archive.
#[derive(Clone)]
pub struct IObject {
    reader: Arc<dyn ObjectReader>,
}

impl IObject {
    pub fn new(reader: Arc<dyn ObjectReader>) -> Self {
        Self { reader }
    }

    pub fn as_reader(&self) -> &Arc<dyn ObjectReader> {
        &self.reader
    }

    pub fn header(&self) -> &ObjectHeader {
        self.reader.header()
    }

    pub fn name(&self) -> &str {
        self.reader.name()
    }

    pub fn full_name(&self) -> &str {
        self.reader.full_name()
    }

    pub fn meta_data(&self) -> &MetaData {
        self.reader.meta_data()
    }

    pub fn is_top(&self) -> bool {
        self.reader.parent().is_none()
    }

    pub fn parent(&self) -> Option<IObject> {
        self.reader.parent().map(IObject::new)
    }

    pub fn num_children(&self) -> usize {
        self.reader.num_children()
    }

    pub fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.reader.child_header(index)
    }

    pub fn child(&self, index: usize) -> Result<IObject> {
        Ok(IObject::new(self.reader.child(index)?))
    }

    pub fn child_by_name(&self, name: &str) -> Result<Option<IObject>> {
        Ok(self.reader.child_by_name(name)?.map(IObject::new))
    }

    pub fn children(&self) -> impl Iterator<Item = Result<IObject>> + '_ {
        (0..self.num_children()).map(move |i| self.child(i))
    }

    pub fn properties(&self) -> Result<ICompoundProperty> {
        Ok(ICompoundProperty::new(self.reader.properties()?))
    }

    pub fn matches_schema(&self, schema: &str) -> bool {
        self.meta_data().schema() == Some(schema)
    }

    pub fn properties_hash(&self) -> Digest {
        self.reader.properties_hash()
    }

    pub fn children_hash(&self) -> Digest {
        self.reader.children_hash()
    }
}

/// Object in an output archive.
#[derive(Clone)]
pub struct OObject {
    writer: Arc<dyn ObjectWriter>,
}

impl OObject {
    pub fn new(writer: Arc<dyn ObjectWriter>) -> Self {
        Self { writer }
    }

    pub fn as_writer(&self) -> &Arc<dyn ObjectWriter> {
        &self.writer
    }

    pub fn header(&self) -> &ObjectHeader {
        self.writer.header()
    }

    pub fn name(&self) -> &str {
        &self.writer.header().name
    }

    pub fn full_name(&self) -> &str {
        &self.writer.header().full_name
    }

    pub fn create_child(&self, name: &str) -> Result<OObject> {
        self.create_child_with(name, MetaData::new())
    }

    pub fn create_child_with(&self, name: &str, meta_data: MetaData) -> Result<OObject> {
        Ok(OObject::new(self.writer.create_child(name, meta_data)?))
    }

    /// The child created under `name`, while some handle to it is alive.
    pub fn child(&self, name: &str) -> Option<OObject> {
        self.writer.child(name).map(OObject::new)
    }

    pub fn num_children(&self) -> usize {
        self.writer.num_children()
    }

    pub fn properties(&self) -> Result<OCompoundProperty> {
        Ok(OCompoundProperty::new(self.writer.properties()?))
    }

    pub fn close(&self) {
        self.writer.close();
    }
}
