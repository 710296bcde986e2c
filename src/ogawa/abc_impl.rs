//! Object and property readers over an open container.
//!
//! Nodes keep their parent alive and their parent remembers them through a
//! [`WeakCache`]: a subtree stays materialized for as long as anyone holds a
//! node in it and is rebuilt from the stored headers after it was dropped.
//! Every read checks a slot out of the archive's [`StreamManager`] for the
//! duration of that read only.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Weak};

use super::read_util::{
    parse_dimensions, parse_i32, parse_indexed_metadata, parse_object_headers,
    parse_property_headers, parse_time_samplings, ParsedPropertyHeader, ALEMBIC_OGAWA_FILE_VERSION,
    MIN_ALEMBIC_VERSION,
};
use super::reader::IGroup;
use super::streams::{IStreams, StreamManager};
use super::writer::constants::*;
use super::ReadOptions;
use crate::core::{
    check_sample_bytes, hash_dimensions, hash_of, object_hash, points_in_bytes, property_hash,
    ArchiveReader, ArrayPropertyReader, ArraySample, CompoundPropertyReader, Digest, DigestFold,
    MetaData, ObjectHeader, ObjectReader, PropertyHeader, PropertyReader, PropertyType, SampleKey,
    SampledPropertyReader, ScalarPropertyReader, TimeSampling, WeakCache,
};
use crate::util::{Dimensions, Error, Result};

/// What every node of one archive reads through.
struct ReadState {
    streams: Arc<IStreams>,
    slots: StreamManager,
    metadata_table: Vec<MetaData>,
    time_samplings: Vec<Arc<TimeSampling>>,
    verify_sample_keys: bool,
}

impl ReadState {
    fn group(&self, parent: &IGroup, index: usize) -> Result<IGroup> {
        let slot = self.slots.checkout();
        parent.group(index, slot.slot())
    }

    fn read_data(&self, parent: &IGroup, index: usize) -> Result<Vec<u8>> {
        let slot = self.slots.checkout();
        parent.data(index, slot.slot())?.read_all(slot.slot())
    }

    /// Size of a data child without reading it.
    fn data_size(&self, parent: &IGroup, index: usize) -> Result<u64> {
        let slot = self.slots.checkout();
        Ok(parent.data(index, slot.slot())?.size())
    }

    fn read_prefix(&self, parent: &IGroup, index: usize, len: usize) -> Result<Vec<u8>> {
        let slot = self.slots.checkout();
        parent.data(index, slot.slot())?.read_range(slot.slot(), 0, len)
    }
}

// ============================================================================
// Archive
// ============================================================================

/// Archive reader over an Ogawa container.
pub struct OgawaArchiveReader {
    name: String,
    state: ReadState,
    archive_version: i32,
    archive_metadata: MetaData,
    max_samples: Vec<u32>,
    top_group: IGroup,
    top: WeakCache<(), OgawaObjectReader>,
    this: Weak<OgawaArchiveReader>,
}

impl OgawaArchiveReader {
    pub fn open(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Arc<Self>> {
        let streams = IStreams::open(path, options)?;
        Self::from_streams(Arc::new(streams), options)
    }

    /// Read an archive held in memory.
    pub fn from_bytes(bytes: impl Into<Arc<[u8]>>, options: &ReadOptions) -> Result<Arc<Self>> {
        let streams = IStreams::from_bytes(bytes.into(), options.num_streams)?;
        Self::from_streams(Arc::new(streams), options)
    }

    /// Validate the root group and load the archive tables.
    pub fn from_streams(streams: Arc<IStreams>, options: &ReadOptions) -> Result<Arc<Self>> {
        let root = IGroup::new(streams.clone(), streams.root_pos(), 0)?;
        if root.num_children() < ROOT_NUM_CHILDREN {
            return Err(Error::invalid(format!(
                "root group has {} children, expected {ROOT_NUM_CHILDREN}",
                root.num_children()
            )));
        }
        for index in [
            ROOT_FORMAT_VERSION,
            ROOT_LIBRARY_VERSION,
            ROOT_METADATA,
            ROOT_TIME_SAMPLINGS,
            ROOT_INDEXED_METADATA,
        ] {
            if !root.is_child_data(index)? {
                return Err(Error::invalid(format!("root child {index} is not data")));
            }
        }
        if !root.is_child_group(ROOT_TOP_OBJECT)? {
            return Err(Error::invalid("root child 2 is not the top object group"));
        }

        let read = |index: usize| -> Result<Vec<u8>> { root.data(index, 0)?.read_all(0) };
        let format_version = parse_i32(&read(ROOT_FORMAT_VERSION)?, "format version")?;
        if !(0..=ALEMBIC_OGAWA_FILE_VERSION).contains(&format_version) {
            return Err(Error::invalid(format!("unsupported archive format version {format_version}")));
        }
        let archive_version = parse_i32(&read(ROOT_LIBRARY_VERSION)?, "library version")?;
        if archive_version < MIN_ALEMBIC_VERSION {
            return Err(Error::invalid(format!("unsupported library version {archive_version}")));
        }
        let archive_metadata = MetaData::parse(&String::from_utf8(read(ROOT_METADATA)?)?);
        let (time_samplings, max_samples) = parse_time_samplings(&read(ROOT_TIME_SAMPLINGS)?)?;
        let metadata_table = parse_indexed_metadata(&read(ROOT_INDEXED_METADATA)?)?;
        let top_group = root.group(ROOT_TOP_OBJECT, 0)?;

        let name = streams.name().to_string();
        tracing::debug!(
            archive = %name,
            version = archive_version,
            time_samplings = time_samplings.len(),
            metadata_entries = metadata_table.len(),
            slots = streams.num_slots(),
            "opened archive"
        );
        let state = ReadState {
            slots: StreamManager::new(streams.num_slots()),
            streams,
            metadata_table,
            time_samplings: time_samplings.into_iter().map(Arc::new).collect(),
            verify_sample_keys: options.verify_sample_keys,
        };
        Ok(Arc::new_cyclic(|this| Self {
            name,
            state,
            archive_version,
            archive_metadata,
            max_samples,
            top_group,
            top: WeakCache::new(),
            this: this.clone(),
        }))
    }

    pub fn streams(&self) -> &Arc<IStreams> {
        &self.state.streams
    }

    pub fn stream_manager(&self) -> &StreamManager {
        &self.state.slots
    }

    /// Interned metadata; entry 0 is empty.
    pub fn indexed_metadata(&self) -> &[MetaData] {
        &self.state.metadata_table
    }

    /// Recheck every stored rollup and sample digest in the archive.
    pub fn verify(&self) -> Result<()> {
        self.top_node()?.verify()
    }

    fn top_node(&self) -> Result<Arc<OgawaObjectReader>> {
        self.top.get_or_try_insert_with(&(), || {
            let archive = self
                .this
                .upgrade()
                .ok_or_else(|| Error::Expired(self.name.clone()))?;
            let header = ObjectHeader::new("ABC", "/").with_meta_data(self.archive_metadata.clone());
            OgawaObjectReader::build(archive, None, header, self.top_group.clone())
        })
    }
}

impl ArchiveReader for OgawaArchiveReader {
    fn name(&self) -> &str {
        &self.name
    }

    fn archive_version(&self) -> i32 {
        self.archive_version
    }

    fn archive_metadata(&self) -> &MetaData {
        &self.archive_metadata
    }

    fn top(&self) -> Result<Arc<dyn ObjectReader>> {
        Ok(self.top_node()?)
    }

    fn num_time_samplings(&self) -> usize {
        self.state.time_samplings.len()
    }

    fn time_sampling(&self, index: usize) -> Result<Arc<TimeSampling>> {
        self.state
            .time_samplings
            .get(index)
            .cloned()
            .ok_or(Error::TimeSamplingNotFound {
                index: index as u32,
                count: self.state.time_samplings.len(),
            })
    }

    fn max_num_samples_for_time_sampling(&self, index: usize) -> Option<usize> {
        self.max_samples.get(index).map(|&n| n as usize)
    }
}

// ============================================================================
// Objects
// ============================================================================

/// Reader for one object. Group layout: root compound, one group per
/// child object, then the child headers block.
pub struct OgawaObjectReader {
    archive: Arc<OgawaArchiveReader>,
    /// Held strongly so a child keeps its ancestors readable; parents only
    /// reach children through a `WeakCache`, so no cycle forms.
    parent: Option<Arc<OgawaObjectReader>>,
    header: ObjectHeader,
    group: IGroup,
    children: Vec<ObjectHeader>,
    names: HashMap<String, usize>,
    properties_hash: Digest,
    children_hash: Digest,
    child_cache: WeakCache<usize, OgawaObjectReader>,
    properties_cache: WeakCache<(), OgawaCompoundReader>,
    this: Weak<OgawaObjectReader>,
}

impl OgawaObjectReader {
    fn build(
        archive: Arc<OgawaArchiveReader>,
        parent: Option<Arc<OgawaObjectReader>>,
        header: ObjectHeader,
        group: IGroup,
    ) -> Result<Arc<Self>> {
        let count = group.num_children();
        if count < 2 || !group.is_child_group(0)? || !group.is_child_data(count - 1)? {
            return Err(Error::invalid(format!(
                "object '{}' group has an unexpected layout ({count} children)",
                header.full_name
            )));
        }
        let bytes = archive.state.read_data(&group, count - 1)?;
        let parsed = parse_object_headers(&bytes, &header.full_name, &archive.state.metadata_table)?;
        if parsed.children.len() != count - 2 {
            return Err(Error::invalid(format!(
                "object '{}' lists {} children but stores {}",
                header.full_name,
                parsed.children.len(),
                count - 2
            )));
        }

        let mut names = HashMap::with_capacity(parsed.children.len());
        for (index, child) in parsed.children.iter().enumerate() {
            if names.insert(child.name.clone(), index).is_some() {
                return Err(Error::invalid(format!("duplicate child object '{}'", child.full_name)));
            }
        }

        Ok(Arc::new_cyclic(|this| Self {
            archive,
            parent,
            header,
            group,
            children: parsed.children,
            names,
            properties_hash: parsed.properties_hash,
            children_hash: parsed.children_hash,
            child_cache: WeakCache::new(),
            properties_cache: WeakCache::new(),
            this: this.clone(),
        }))
    }

    fn this(&self) -> Result<Arc<Self>> {
        self.this
            .upgrade()
            .ok_or_else(|| Error::Expired(self.header.full_name.clone()))
    }

    fn child_node(&self, index: usize) -> Result<Arc<OgawaObjectReader>> {
        let header = self.children.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.children.len(),
        })?;
        self.child_cache.get_or_try_insert_with(&index, || {
            let group = self.archive.state.group(&self.group, index + 1)?;
            Self::build(self.archive.clone(), Some(self.this()?), header.clone(), group)
        })
    }

    fn properties_node(&self) -> Result<Arc<OgawaCompoundReader>> {
        self.properties_cache.get_or_try_insert_with(&(), || {
            let group = self.archive.state.group(&self.group, 0)?;
            OgawaCompoundReader::build(
                self.this()?,
                None,
                PropertyHeader::compound(""),
                self.header.full_name.clone(),
                group,
            )
        })
    }

    /// Recompute the properties rollup and the children hash of this
    /// subtree and compare them with the stored ones.
    pub fn verify(&self) -> Result<()> {
        self.verify_hashes().map(|_| ())
    }

    fn verify_hashes(&self) -> Result<(Digest, Digest)> {
        let properties = self.properties_node()?.verify()?;
        if properties != self.properties_hash {
            return Err(Error::HashMismatch(format!(
                "properties of '{}'",
                self.header.full_name
            )));
        }

        let mut fold = DigestFold::new();
        for (index, header) in self.children.iter().enumerate() {
            let (child_properties, child_children) = self.child_node(index)?.verify_hashes()?;
            fold.push(&object_hash(
                &child_children,
                &child_properties,
                &header.meta_data.serialize(),
                &header.name,
            ));
        }
        let children = fold.finish();
        if children != self.children_hash {
            return Err(Error::HashMismatch(format!(
                "children of '{}'",
                self.header.full_name
            )));
        }
        Ok((properties, children))
    }

    /// Number of child objects currently materialized.
    pub fn num_live_children(&self) -> usize {
        self.child_cache.live_count()
    }
}

impl ObjectReader for OgawaObjectReader {
    fn header(&self) -> &ObjectHeader {
        &self.header
    }

    fn archive(&self) -> Arc<dyn ArchiveReader> {
        self.archive.clone()
    }

    fn parent(&self) -> Option<Arc<dyn ObjectReader>> {
        self.parent.clone().map(|p| p as Arc<dyn ObjectReader>)
    }

    fn num_children(&self) -> usize {
        self.children.len()
    }

    fn child_header(&self, index: usize) -> Result<&ObjectHeader> {
        self.children.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.children.len(),
        })
    }

    fn child(&self, index: usize) -> Result<Arc<dyn ObjectReader>> {
        Ok(self.child_node(index)?)
    }

    fn child_by_name(&self, name: &str) -> Result<Option<Arc<dyn ObjectReader>>> {
        match self.names.get(name) {
            Some(&index) => Ok(Some(self.child(index)?)),
            None => Ok(None),
        }
    }

    fn properties(&self) -> Result<Arc<dyn CompoundPropertyReader>> {
        Ok(self.properties_node()?)
    }

    fn properties_hash(&self) -> Digest {
        self.properties_hash
    }

    fn children_hash(&self) -> Digest {
        self.children_hash
    }
}

// ============================================================================
// Compound properties
// ============================================================================

/// Reader for a compound property. Group layout: one group per child
/// property, then the headers block; an empty compound is the empty group.
pub struct OgawaCompoundReader {
    object: Arc<OgawaObjectReader>,
    /// Strong like the object's parent link; children are cached weakly.
    parent: Option<Arc<OgawaCompoundReader>>,
    header: PropertyHeader,
    /// Object path plus compound names, for messages.
    path: String,
    group: IGroup,
    entries: Vec<ParsedPropertyHeader>,
    names: HashMap<String, usize>,
    rollup: Digest,
    scalars: WeakCache<usize, OgawaScalarReader>,
    arrays: WeakCache<usize, OgawaArrayReader>,
    compounds: WeakCache<usize, OgawaCompoundReader>,
    this: Weak<OgawaCompoundReader>,
}

impl OgawaCompoundReader {
    fn build(
        object: Arc<OgawaObjectReader>,
        parent: Option<Arc<OgawaCompoundReader>>,
        header: PropertyHeader,
        path: String,
        group: IGroup,
    ) -> Result<Arc<Self>> {
        let (entries, rollup) = if group.is_empty() {
            (Vec::new(), Digest::ZERO)
        } else {
            let count = group.num_children();
            if !group.is_child_data(count - 1)? {
                return Err(Error::invalid(format!("compound '{path}' has no headers block")));
            }
            let state = &object.archive.state;
            let parsed = parse_property_headers(&state.read_data(&group, count - 1)?, &state.metadata_table)?;
            if parsed.properties.len() != count - 1 {
                return Err(Error::invalid(format!(
                    "compound '{path}' lists {} properties but stores {}",
                    parsed.properties.len(),
                    count - 1
                )));
            }
            (parsed.properties, parsed.rollup)
        };

        let mut names = HashMap::with_capacity(entries.len());
        for (index, entry) in entries.iter().enumerate() {
            if names.insert(entry.header.name.clone(), index).is_some() {
                return Err(Error::invalid(format!(
                    "duplicate property '{}' in '{path}'",
                    entry.header.name
                )));
            }
        }

        Ok(Arc::new_cyclic(|this| Self {
            object,
            parent,
            header,
            path,
            group,
            entries,
            names,
            rollup,
            scalars: WeakCache::new(),
            arrays: WeakCache::new(),
            compounds: WeakCache::new(),
            this: this.clone(),
        }))
    }

    fn state(&self) -> &ReadState {
        &self.object.archive.state
    }

    fn this(&self) -> Result<Arc<Self>> {
        self.this.upgrade().ok_or_else(|| Error::Expired(self.path.clone()))
    }

    fn entry(&self, index: usize) -> Result<&ParsedPropertyHeader> {
        self.entries.get(index).ok_or(Error::ChildOutOfBounds {
            index,
            count: self.entries.len(),
        })
    }

    fn sampled(&self, index: usize, entry: &ParsedPropertyHeader) -> Result<SampledData> {
        let state = self.state();
        let group = state.group(&self.group, index)?;
        let ts_index = entry.header.time_sampling_index;
        let time_sampling = state
            .time_samplings
            .get(ts_index as usize)
            .cloned()
            .ok_or(Error::TimeSamplingNotFound {
                index: ts_index,
                count: state.time_samplings.len(),
            })?;

        let path = format!("{}.{}", self.path, entry.header.name);
        let blocks_per_sample = if entry.header.is_array() { 2 } else { 1 };
        let expected = entry.range.num_stored() * blocks_per_sample;
        if group.num_children() != expected {
            return Err(Error::invalid(format!(
                "'{path}' stores {} blocks, expected {expected}",
                group.num_children()
            )));
        }
        Ok(SampledData {
            parent: self.this()?,
            entry: entry.clone(),
            path,
            group,
            time_sampling,
        })
    }

    fn scalar_node(&self, index: usize) -> Result<Arc<OgawaScalarReader>> {
        let entry = self.entry(index)?;
        self.scalars.get_or_try_insert_with(&index, || {
            Ok(Arc::new(OgawaScalarReader {
                data: self.sampled(index, entry)?,
            }))
        })
    }

    fn array_node(&self, index: usize) -> Result<Arc<OgawaArrayReader>> {
        let entry = self.entry(index)?;
        self.arrays.get_or_try_insert_with(&index, || {
            Ok(Arc::new(OgawaArrayReader {
                data: self.sampled(index, entry)?,
            }))
        })
    }

    fn compound_node(&self, index: usize) -> Result<Arc<OgawaCompoundReader>> {
        let entry = self.entry(index)?;
        self.compounds.get_or_try_insert_with(&index, || {
            let group = self.state().group(&self.group, index)?;
            Self::build(
                self.object.clone(),
                Some(self.this()?),
                entry.header.clone(),
                format!("{}.{}", self.path, entry.header.name),
                group,
            )
        })
    }

    /// Number of child properties currently materialized.
    pub fn num_live_properties(&self) -> usize {
        self.scalars.live_count() + self.arrays.live_count() + self.compounds.live_count()
    }
}

impl CompoundPropertyReader for OgawaCompoundReader {
    fn header(&self) -> &PropertyHeader {
        &self.header
    }

    fn object(&self) -> Arc<dyn ObjectReader> {
        self.object.clone()
    }

    fn parent(&self) -> Option<Arc<dyn CompoundPropertyReader>> {
        self.parent.clone().map(|p| p as Arc<dyn CompoundPropertyReader>)
    }

    fn num_properties(&self) -> usize {
        self.entries.len()
    }

    fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        Ok(&self.entry(index)?.header)
    }

    fn property(&self, index: usize) -> Result<PropertyReader> {
        Ok(match self.entry(index)?.header.property_type {
            PropertyType::Scalar => PropertyReader::Scalar(self.scalar_node(index)?),
            PropertyType::Array => PropertyReader::Array(self.array_node(index)?),
            PropertyType::Compound => PropertyReader::Compound(self.compound_node(index)?),
        })
    }

    fn property_by_name(&self, name: &str) -> Result<Option<PropertyReader>> {
        match self.names.get(name) {
            Some(&index) => Ok(Some(self.property(index)?)),
            None => Ok(None),
        }
    }

    fn rollup(&self) -> Digest {
        self.rollup
    }

    fn verify(&self) -> Result<Digest> {
        let mut fold = DigestFold::new();
        for (index, entry) in self.entries.iter().enumerate() {
            let contents = match entry.header.property_type {
                PropertyType::Scalar => self.scalar_node(index)?.sample_rollup()?,
                PropertyType::Array => self.array_node(index)?.sample_rollup()?,
                PropertyType::Compound => self.compound_node(index)?.verify()?,
            };
            fold.push(&property_hash(&entry.entry, &contents));
        }
        let rollup = fold.finish();
        if rollup != self.rollup {
            return Err(Error::HashMismatch(format!("property rollup of '{}'", self.path)));
        }
        Ok(rollup)
    }
}

// ============================================================================
// Scalar and array properties
// ============================================================================

/// Header, sample group and time sampling shared by scalar and array readers.
struct SampledData {
    parent: Arc<OgawaCompoundReader>,
    entry: ParsedPropertyHeader,
    path: String,
    group: IGroup,
    time_sampling: Arc<TimeSampling>,
}

impl SampledData {
    fn state(&self) -> &ReadState {
        self.parent.state()
    }

    fn num_samples(&self) -> usize {
        self.entry.range.num_samples as usize
    }

    /// Position among the stored samples of logical sample `index`.
    fn stored(&self, index: usize) -> Result<usize> {
        let count = self.num_samples();
        if index >= count {
            return Err(Error::SampleOutOfBounds { index, count });
        }
        Ok(self.entry.range.stored_index(index))
    }

    /// Stored digest and payload of the data block `child`.
    fn read_block(&self, child: usize) -> Result<(Digest, Vec<u8>)> {
        let mut bytes = self.state().read_data(&self.group, child)?;
        if bytes.len() < DATA_KEY_SIZE {
            return Err(Error::invalid(format!(
                "sample block of {} bytes in '{}'",
                bytes.len(),
                self.path
            )));
        }
        let payload = bytes.split_off(DATA_KEY_SIZE);
        Ok((Digest::from_slice(&bytes).unwrap_or_default(), payload))
    }

    fn check_digest(&self, stored: &Digest, payload: &[u8]) -> Result<()> {
        if hash_of(self.entry.header.data_type, payload).digest != *stored {
            return Err(Error::HashMismatch(format!("sample of '{}'", self.path)));
        }
        Ok(())
    }

    fn read_payload(&self, child: usize) -> Result<Vec<u8>> {
        let (digest, payload) = self.read_block(child)?;
        if self.state().verify_sample_keys {
            self.check_digest(&digest, &payload)?;
        }
        Ok(payload)
    }

    /// Key of data block `child`, reading only its digest.
    fn key(&self, child: usize) -> Result<SampleKey> {
        let size = self.state().data_size(&self.group, child)?;
        if size < DATA_KEY_SIZE as u64 {
            return Err(Error::invalid(format!("sample block of {size} bytes in '{}'", self.path)));
        }
        let digest = self.state().read_prefix(&self.group, child, DATA_KEY_SIZE)?;
        Ok(SampleKey {
            digest: Digest::from_slice(&digest).unwrap_or_default(),
            num_bytes: size - DATA_KEY_SIZE as u64,
            pod: self.entry.header.data_type.pod,
        })
    }
}

/// Reader for a scalar property.
pub struct OgawaScalarReader {
    data: SampledData,
}

impl OgawaScalarReader {
    /// Rehash every stored sample and return the rollup over them.
    fn sample_rollup(&self) -> Result<Digest> {
        let mut fold = DigestFold::new();
        for stored in 0..self.data.entry.range.num_stored() {
            let (digest, payload) = self.data.read_block(stored)?;
            self.data.check_digest(&digest, &payload)?;
            fold.push(&digest);
        }
        Ok(fold.finish())
    }
}

impl SampledPropertyReader for OgawaScalarReader {
    fn header(&self) -> &PropertyHeader {
        &self.data.entry.header
    }

    fn parent(&self) -> Arc<dyn CompoundPropertyReader> {
        self.data.parent.clone()
    }

    fn num_samples(&self) -> usize {
        self.data.num_samples()
    }

    fn is_constant(&self) -> bool {
        self.data.entry.is_constant()
    }

    fn time_sampling(&self) -> Arc<TimeSampling> {
        self.data.time_sampling.clone()
    }

    fn sample_key(&self, index: usize) -> Result<SampleKey> {
        self.data.key(self.data.stored(index)?)
    }
}

impl ScalarPropertyReader for OgawaScalarReader {
    fn sample_bytes(&self, index: usize) -> Result<Vec<u8>> {
        let payload = self.data.read_payload(self.data.stored(index)?)?;
        check_sample_bytes(self.data.entry.header.data_type, 1, &payload)?;
        Ok(payload)
    }
}

/// Reader for an array property.
pub struct OgawaArrayReader {
    data: SampledData,
}

impl OgawaArrayReader {
    /// Shape of stored sample `stored`. Flat numeric samples keep no shape
    /// block; their point count follows from the payload size.
    fn stored_dimensions(&self, stored: usize, payload: Option<&[u8]>) -> Result<Dimensions> {
        let state = self.data.state();
        let shape = state.read_data(&self.data.group, 2 * stored + 1)?;
        if !shape.is_empty() {
            return parse_dimensions(&shape);
        }

        let data_type = self.data.entry.header.data_type;
        let points = match payload {
            Some(bytes) => points_in_bytes(data_type, bytes),
            None if data_type.is_string() => {
                let (_, bytes) = self.data.read_block(2 * stored)?;
                points_in_bytes(data_type, &bytes)
            }
            None => {
                let size = state.data_size(&self.data.group, 2 * stored)?;
                let payload = size.saturating_sub(DATA_KEY_SIZE as u64) as usize;
                payload.checked_div(data_type.num_bytes()).unwrap_or(0)
            }
        };
        Ok(Dimensions::d1(points))
    }

    /// Rehash every stored payload and fold it with its shape.
    fn sample_rollup(&self) -> Result<Digest> {
        let mut fold = DigestFold::new();
        for stored in 0..self.data.entry.range.num_stored() {
            let (digest, payload) = self.data.read_block(2 * stored)?;
            self.data.check_digest(&digest, &payload)?;
            fold.push(&digest);
            fold.push(&hash_dimensions(&self.stored_dimensions(stored, Some(&payload))?));
        }
        Ok(fold.finish())
    }
}

impl SampledPropertyReader for OgawaArrayReader {
    fn header(&self) -> &PropertyHeader {
        &self.data.entry.header
    }

    fn parent(&self) -> Arc<dyn CompoundPropertyReader> {
        self.data.parent.clone()
    }

    fn num_samples(&self) -> usize {
        self.data.num_samples()
    }

    fn is_constant(&self) -> bool {
        self.data.entry.is_constant()
    }

    fn time_sampling(&self) -> Arc<TimeSampling> {
        self.data.time_sampling.clone()
    }

    fn sample_key(&self, index: usize) -> Result<SampleKey> {
        self.data.key(2 * self.data.stored(index)?)
    }
}

impl ArrayPropertyReader for OgawaArrayReader {
    fn sample(&self, index: usize) -> Result<ArraySample> {
        let stored = self.data.stored(index)?;
        let payload = self.data.read_payload(2 * stored)?;
        let dimensions = self.stored_dimensions(stored, Some(&payload))?;
        ArraySample::new(self.data.entry.header.data_type, dimensions, payload)
    }

    fn dimensions(&self, index: usize) -> Result<Dimensions> {
        self.stored_dimensions(self.data.stored(index)?, None)
    }

    fn is_homogenous(&self) -> bool {
        self.data.entry.info.homogenous
    }

    fn is_scalar_like(&self) -> bool {
        self.data.entry.info.scalar_like
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{ArchiveWriter, ObjectWriter};
    use crate::ogawa::writer::{OgawaArchiveWriter, SharedBuffer};
    use crate::ogawa::WriteOptions;
    use crate::util::DataType;

    const MARKER: i32 = 0x5eed_f00d;

    fn sample_archive() -> Result<Vec<u8>> {
        let buffer = SharedBuffer::new();
        let archive = OgawaArchiveWriter::in_memory(buffer.clone(), WriteOptions::default())?;
        let child = archive.top()?.create_child("a", MetaData::new())?;
        let props = child.properties()?;
        props
            .create_scalar("s", DataType::INT32, MetaData::new(), 0)?
            .set_sample(&MARKER.to_le_bytes())?;
        let points = props.create_array("p", DataType::VEC3F, MetaData::new(), 0)?;
        points.set_sample(&ArraySample::from_pods(3, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0])?)?;
        archive.finalize()?;
        Ok(buffer.to_vec())
    }

    fn corrupt_marker(bytes: &mut [u8]) {
        let needle = MARKER.to_le_bytes();
        let pos = bytes
            .windows(needle.len())
            .position(|w| w == needle)
            .unwrap();
        bytes[pos] ^= 0xff;
    }

    #[test]
    fn test_archive_tables() -> Result<()> {
        let archive = OgawaArchiveReader::from_bytes(sample_archive()?, &ReadOptions::new())?;
        assert_eq!(archive.archive_version(), ALEMBIC_LIBRARY_VERSION);
        assert_eq!(archive.num_time_samplings(), 1);
        assert!(archive.time_sampling(0)?.is_identity());
        assert_eq!(archive.max_num_samples_for_time_sampling(0), Some(1));
        assert!(matches!(archive.time_sampling(3), Err(Error::TimeSamplingNotFound { .. })));

        let top = archive.top()?;
        assert_eq!(top.name(), "ABC");
        assert_eq!(top.full_name(), "/");
        assert!(top.meta_data().contains(MetaData::ALEMBIC_VERSION_KEY));
        assert!(top.parent().is_none());
        archive.verify()
    }

    #[test]
    fn test_sample_access() -> Result<()> {
        let archive = OgawaArchiveReader::from_bytes(sample_archive()?, &ReadOptions::new())?;
        let child = archive.top()?.child(0)?;
        assert_eq!(child.full_name(), "/a");
        let props = child.properties()?;

        let scalar = props.property_by_name("s")?.and_then(PropertyReader::into_scalar).unwrap();
        assert_eq!(scalar.sample_bytes(0)?, MARKER.to_le_bytes());
        assert!(matches!(scalar.sample_bytes(1), Err(Error::SampleOutOfBounds { index: 1, count: 1 })));
        let key = scalar.sample_key(0)?;
        assert_eq!(key, hash_of(DataType::INT32, &MARKER.to_le_bytes()));

        let array = props.property_by_name("p")?.and_then(PropertyReader::into_array).unwrap();
        assert_eq!(array.dimensions(0)?, Dimensions::d1(2));
        let sample = array.sample(0)?;
        assert_eq!(sample.num_points(), 2);
        assert!(array.is_homogenous() && !array.is_scalar_like());
        assert!(props.property_by_name("missing")?.is_none());
        Ok(())
    }

    #[test]
    fn test_corrupt_sample_detected() -> Result<()> {
        let mut bytes = sample_archive()?;
        corrupt_marker(&mut bytes);

        // without key checks the damaged bytes come back as stored
        let lenient = OgawaArchiveReader::from_bytes(bytes.clone(), &ReadOptions::new())?;
        let props = lenient.top()?.child(0)?.properties()?;
        let scalar = props.property(0)?.into_scalar().unwrap();
        assert_ne!(scalar.sample_bytes(0)?, MARKER.to_le_bytes());
        assert!(matches!(lenient.verify(), Err(Error::HashMismatch(_))));

        let strict = OgawaArchiveReader::from_bytes(bytes, &ReadOptions::new().verify_sample_keys(true))?;
        let props = strict.top()?.child(0)?.properties()?;
        let scalar = props.property(0)?.into_scalar().unwrap();
        assert!(matches!(scalar.sample_bytes(0), Err(Error::HashMismatch(_))));
        Ok(())
    }

    #[test]
    fn test_nodes_are_released() -> Result<()> {
        let archive = OgawaArchiveReader::from_bytes(sample_archive()?, &ReadOptions::new())?;
        let top = archive.top_node()?;
        let first = top.child(0)?;
        let again = top.child_by_name("a")?.unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(top.num_live_children(), 1);

        // the child keeps its parent alive
        let parent = first.parent().unwrap();
        assert_eq!(parent.full_name(), "/");
        drop((first, again, parent));
        assert_eq!(top.num_live_children(), 0);
        Ok(())
    }

    #[test]
    fn test_child_outlives_archive_handle() -> Result<()> {
        let archive = OgawaArchiveReader::from_bytes(sample_archive()?, &ReadOptions::new())?;
        let child = archive.top_node()?.child(0)?;
        let scalar = child.properties()?.property(0)?.into_scalar().unwrap();
        drop((archive, child));

        assert_eq!(scalar.sample_bytes(0)?, MARKER.to_le_bytes());
        Ok(())
    }
}
