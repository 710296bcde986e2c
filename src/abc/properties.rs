//! Property wrappers with typed sample access.

use std::sync::Arc;

use crate::core::{
    decode_strings, encode_strings, encode_wstrings, ArrayPropertyReader, ArrayPropertyWriter,
    ArraySample, CompoundPropertyReader, CompoundPropertyWriter, MetaData, PropertyHeader,
    PropertyReader, PropertyWriter, SampleKey, SampleSelector, SampledPropertyReader,
    SampledPropertyWriter, ScalarPropertyReader, ScalarPropertyWriter, TimeSampling,
};
use crate::util::{AlembicPod, DataType, Dimensions, Error, PlainOldDataType, Result};

/// Elements of type `T` stored in `bytes`, after checking `T` against the
/// stored element kind.
fn decode_pods<T: AlembicPod>(data_type: DataType, bytes: &[u8]) -> Result<Vec<T>> {
    if data_type.pod != T::POD_TYPE {
        return Err(Error::type_mismatch(data_type.pod, T::POD_TYPE));
    }
    Ok(bytemuck::pod_collect_to_vec(bytes))
}

fn check_pod<T: AlembicPod>(data_type: DataType) -> Result<()> {
    if data_type.pod == T::POD_TYPE {
        Ok(())
    } else {
        Err(Error::type_mismatch(data_type, T::POD_TYPE))
    }
}

fn encode_any_strings<S: AsRef<str>>(data_type: DataType, values: &[S]) -> Result<Vec<u8>> {
    match data_type.pod {
        PlainOldDataType::String => encode_strings(values),
        PlainOldDataType::Wstring => encode_wstrings(values),
        other => Err(Error::type_mismatch("string", other)),
    }
}

// ============================================================================
// Readers
// ============================================================================

/// Compound property in an input archive.
#[derive(Clone)]
pub struct ICompoundProperty {
    reader: Arc<dyn CompoundPropertyReader>,
}

impl ICompoundProperty {
    pub fn new(reader: Arc<dyn CompoundPropertyReader>) -> Self {
        Self { reader }
    }

    pub fn as_reader(&self) -> &Arc<dyn CompoundPropertyReader> {
        &self.reader
    }

    pub fn header(&self) -> &PropertyHeader {
        self.reader.header()
    }

    pub fn name(&self) -> &str {
        &self.reader.header().name
    }

    pub fn num_properties(&self) -> usize {
        self.reader.num_properties()
    }

    pub fn property_header(&self, index: usize) -> Result<&PropertyHeader> {
        self.reader.property_header(index)
    }

    pub fn property_names(&self) -> Vec<String> {
        (0..self.num_properties())
            .filter_map(|i| self.reader.property_header(i).ok())
            .map(|h| h.name.clone())
            .collect()
    }

    pub fn has_property(&self, name: &str) -> bool {
        (0..self.num_properties())
            .any(|i| self.reader.property_header(i).is_ok_and(|h| h.name == name))
    }

    pub fn property(&self, index: usize) -> Result<PropertyReader> {
        self.reader.property(index)
    }

    pub fn property_by_name(&self, name: &str) -> Result<Option<PropertyReader>> {
        self.reader.property_by_name(name)
    }

    /// The scalar property `name`. A property of another kind is a
    /// `TypeMismatch`.
    pub fn scalar(&self, name: &str) -> Result<Option<IScalarProperty>> {
        match self.reader.property_by_name(name)? {
            None => Ok(None),
            Some(PropertyReader::Scalar(reader)) => Ok(Some(IScalarProperty { reader })),
            Some(other) => Err(Error::type_mismatch("scalar property", describe(&other))),
        }
    }

    pub fn array(&self, name: &str) -> Result<Option<IArrayProperty>> {
        match self.reader.property_by_name(name)? {
            None => Ok(None),
            Some(PropertyReader::Array(reader)) => Ok(Some(IArrayProperty { reader })),
            Some(other) => Err(Error::type_mismatch("array property", describe(&other))),
        }
    }

    pub fn compound(&self, name: &str) -> Result<Option<ICompoundProperty>> {
        match self.reader.property_by_name(name)? {
            None => Ok(None),
            Some(PropertyReader::Compound(reader)) => Ok(Some(ICompoundProperty { reader })),
            Some(other) => Err(Error::type_mismatch("compound property", describe(&other))),
        }
    }

    /// Recheck the stored rollups below this compound.
    pub fn verify(&self) -> Result<()> {
        self.reader.verify().map(|_| ())
    }
}

fn describe(property: &PropertyReader) -> String {
    let kind = match property {
        PropertyReader::Scalar(_) => "scalar",
        PropertyReader::Array(_) => "array",
        PropertyReader::Compound(_) => "compound",
    };
    format!("{kind} property '{}'", property.name())
}

/// Scalar property in an input archive.
#[derive(Clone)]
pub struct IScalarProperty {
    reader: Arc<dyn ScalarPropertyReader>,
}

impl IScalarProperty {
    pub fn new(reader: Arc<dyn ScalarPropertyReader>) -> Self {
        Self { reader }
    }

    pub fn header(&self) -> &PropertyHeader {
        self.reader.header()
    }

    pub fn data_type(&self) -> DataType {
        self.reader.header().data_type
    }

    pub fn num_samples(&self) -> usize {
        self.reader.num_samples()
    }

    pub fn is_constant(&self) -> bool {
        self.reader.is_constant()
    }

    pub fn time_sampling(&self) -> Arc<TimeSampling> {
        self.reader.time_sampling()
    }

    /// Sample index a selector picks.
    pub fn resolve(&self, sel: impl Into<SampleSelector>) -> usize {
        sel.into().resolve(&self.reader.time_sampling(), self.reader.num_samples())
    }

    pub fn sample_key(&self, sel: impl Into<SampleSelector>) -> Result<SampleKey> {
        self.reader.sample_key(self.resolve(sel))
    }

    pub fn read_bytes(&self, sel: impl Into<SampleSelector>) -> Result<Vec<u8>> {
        self.reader.sample_bytes(self.resolve(sel))
    }

    /// Single value of a property with extent 1.
    pub fn get<T: AlembicPod>(&self, sel: impl Into<SampleSelector>) -> Result<T> {
        let data_type = self.data_type();
        if data_type.extent != 1 {
            return Err(Error::type_mismatch(data_type, DataType::scalar(T::POD_TYPE)));
        }
        let values = decode_pods::<T>(data_type, &self.read_bytes(sel)?)?;
        values
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid("empty scalar sample"))
    }

    /// All `extent` values of one sample, e.g. the three floats of a vector.
    pub fn get_values<T: AlembicPod>(&self, sel: impl Into<SampleSelector>) -> Result<Vec<T>> {
        decode_pods(self.data_type(), &self.read_bytes(sel)?)
    }

    pub fn get_strings(&self, sel: impl Into<SampleSelector>) -> Result<Vec<String>> {
        decode_strings(self.data_type().pod, &self.read_bytes(sel)?)
    }

    pub fn get_string(&self, sel: impl Into<SampleSelector>) -> Result<String> {
        self.get_strings(sel)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::invalid("empty string sample"))
    }
}

/// Array property in an input archive.
#[derive(Clone)]
pub struct IArrayProperty {
    reader: Arc<dyn ArrayPropertyReader>,
}

impl IArrayProperty {
    pub fn new(reader: Arc<dyn ArrayPropertyReader>) -> Self {
        Self { reader }
    }

    pub fn header(&self) -> &PropertyHeader {
        self.reader.header()
    }

    pub fn data_type(&self) -> DataType {
        self.reader.header().data_type
    }

    pub fn num_samples(&self) -> usize {
        self.reader.num_samples()
    }

    pub fn is_constant(&self) -> bool {
        self.reader.is_constant()
    }

    pub fn is_homogenous(&self) -> bool {
        self.reader.is_homogenous()
    }

    pub fn is_scalar_like(&self) -> bool {
        self.reader.is_scalar_like()
    }

    pub fn time_sampling(&self) -> Arc<TimeSampling> {
        self.reader.time_sampling()
    }

    pub fn resolve(&self, sel: impl Into<SampleSelector>) -> usize {
        sel.into().resolve(&self.reader.time_sampling(), self.reader.num_samples())
    }

    pub fn sample_key(&self, sel: impl Into<SampleSelector>) -> Result<SampleKey> {
        self.reader.sample_key(self.resolve(sel))
    }

    pub fn dimensions(&self, sel: impl Into<SampleSelector>) -> Result<Dimensions> {
        self.reader.dimensions(self.resolve(sel))
    }

    pub fn sample(&self, sel: impl Into<SampleSelector>) -> Result<ArraySample> {
        self.reader.sample(self.resolve(sel))
    }

    /// Every stored value, flattened: `points * extent` elements.
    pub fn get_array<T: AlembicPod>(&self, sel: impl Into<SampleSelector>) -> Result<Vec<T>> {
        check_pod::<T>(self.data_type())?;
        let sample = self.sample(sel)?;
        decode_pods(sample.data_type(), sample.bytes())
    }

    pub fn get_strings(&self, sel: impl Into<SampleSelector>) -> Result<Vec<String>> {
        let sample = self.sample(sel)?;
        decode_strings(sample.data_type().pod, sample.bytes())
    }
}

// ============================================================================
// Writers
// ============================================================================

/// Compound property in an output archive.
#[derive(Clone)]
pub struct OCompoundProperty {
    writer: Arc<dyn CompoundPropertyWriter>,
}

impl OCompoundProperty {
    pub fn new(writer: Arc<dyn CompoundPropertyWriter>) -> Self {
        Self { writer }
    }

    pub fn as_writer(&self) -> &Arc<dyn CompoundPropertyWriter> {
        &self.writer
    }

    pub fn header(&self) -> PropertyHeader {
        self.writer.header()
    }

    pub fn create_scalar(&self, name: &str, data_type: DataType, time_sampling_index: u32) -> Result<OScalarProperty> {
        self.create_scalar_with(name, data_type, MetaData::new(), time_sampling_index)
    }

    pub fn create_scalar_with(
        &self,
        name: &str,
        data_type: DataType,
        meta_data: MetaData,
        time_sampling_index: u32,
    ) -> Result<OScalarProperty> {
        let writer = self
            .writer
            .create_scalar(name, data_type, meta_data, time_sampling_index)?;
        Ok(OScalarProperty { writer })
    }

    pub fn create_array(&self, name: &str, data_type: DataType, time_sampling_index: u32) -> Result<OArrayProperty> {
        self.create_array_with(name, data_type, MetaData::new(), time_sampling_index)
    }

    pub fn create_array_with(
        &self,
        name: &str,
        data_type: DataType,
        meta_data: MetaData,
        time_sampling_index: u32,
    ) -> Result<OArrayProperty> {
        let writer = self
            .writer
            .create_array(name, data_type, meta_data, time_sampling_index)?;
        Ok(OArrayProperty { writer })
    }

    pub fn create_compound(&self, name: &str) -> Result<OCompoundProperty> {
        self.create_compound_with(name, MetaData::new())
    }

    pub fn create_compound_with(&self, name: &str, meta_data: MetaData) -> Result<OCompoundProperty> {
        Ok(OCompoundProperty::new(self.writer.create_compound(name, meta_data)?))
    }

    pub fn num_properties(&self) -> usize {
        self.writer.num_properties()
    }

    /// The handle created under `name`, while some copy of it is alive.
    pub fn property(&self, name: &str) -> Option<PropertyWriter> {
        self.writer.property(name)
    }

    pub fn close(&self) {
        self.writer.close();
    }
}

/// Scalar property in an output archive.
#[derive(Clone)]
pub struct OScalarProperty {
    writer: Arc<dyn ScalarPropertyWriter>,
}

impl OScalarProperty {
    pub fn new(writer: Arc<dyn ScalarPropertyWriter>) -> Self {
        Self { writer }
    }

    pub fn header(&self) -> PropertyHeader {
        self.writer.header()
    }

    pub fn num_samples(&self) -> usize {
        self.writer.num_samples()
    }

    pub fn set_bytes(&self, bytes: &[u8]) -> Result<()> {
        self.writer.set_sample(bytes)
    }

    /// Write a value of a property with extent 1.
    pub fn set<T: AlembicPod>(&self, value: T) -> Result<()> {
        self.set_values(&[value])
    }

    /// Write all `extent` values of one sample.
    pub fn set_values<T: AlembicPod>(&self, values: &[T]) -> Result<()> {
        check_pod::<T>(self.writer.header().data_type)?;
        self.writer.set_sample(bytemuck::cast_slice(values))
    }

    pub fn set_strings<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        let bytes = encode_any_strings(self.writer.header().data_type, values)?;
        self.writer.set_sample(&bytes)
    }

    pub fn set_string(&self, value: &str) -> Result<()> {
        self.set_strings(&[value])
    }

    pub fn set_from_previous(&self) -> Result<()> {
        self.writer.set_from_previous()
    }

    pub fn set_time_sampling(&self, index: u32) -> Result<()> {
        self.writer.set_time_sampling(index)
    }
}

/// Array property in an output archive.
#[derive(Clone)]
pub struct OArrayProperty {
    writer: Arc<dyn ArrayPropertyWriter>,
}

impl OArrayProperty {
    pub fn new(writer: Arc<dyn ArrayPropertyWriter>) -> Self {
        Self { writer }
    }

    pub fn header(&self) -> PropertyHeader {
        self.writer.header()
    }

    pub fn num_samples(&self) -> usize {
        self.writer.num_samples()
    }

    pub fn set_sample(&self, sample: &ArraySample) -> Result<()> {
        self.writer.set_sample(sample)
    }

    /// Write a flat run of values; `values.len()` must be a multiple of the
    /// extent.
    pub fn set_array<T: AlembicPod>(&self, values: &[T]) -> Result<()> {
        let data_type = self.writer.header().data_type;
        check_pod::<T>(data_type)?;
        self.writer.set_sample(&ArraySample::from_pods(data_type.extent, values)?)
    }

    /// Write values with an explicit shape, e.g. a 2D grid.
    pub fn set_shaped<T: AlembicPod>(&self, dimensions: Dimensions, values: &[T]) -> Result<()> {
        let data_type = self.writer.header().data_type;
        check_pod::<T>(data_type)?;
        let bytes = bytemuck::cast_slice(values).to_vec();
        self.writer.set_sample(&ArraySample::new(data_type, dimensions, bytes)?)
    }

    pub fn set_strings<S: AsRef<str>>(&self, values: &[S]) -> Result<()> {
        let data_type = self.writer.header().data_type;
        let bytes = encode_any_strings(data_type, values)?;
        let points = values.len() / data_type.strings_per_element().max(1);
        self.writer
            .set_sample(&ArraySample::new(data_type, Dimensions::d1(points), bytes)?)
    }

    pub fn set_from_previous(&self) -> Result<()> {
        self.writer.set_from_previous()
    }

    pub fn set_time_sampling(&self, index: u32) -> Result<()> {
        self.writer.set_time_sampling(index)
    }
}
