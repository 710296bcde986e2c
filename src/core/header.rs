//! Headers for objects and properties.

use super::MetaData;
use crate::util::DataType;

/// Name, path and metadata of an object.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ObjectHeader {
    /// Name among siblings.
    pub name: String,
    /// Full path from the top, e.g. `/root/parent/child`.
    pub full_name: String,
    pub meta_data: MetaData,
}

impl ObjectHeader {
    pub fn new(name: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            full_name: full_name.into(),
            meta_data: MetaData::new(),
        }
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    /// Header for a child named `name` under an object at `parent_path`.
    pub fn child_of(parent_path: &str, name: impl Into<String>, meta_data: MetaData) -> Self {
        let name = name.into();
        Self {
            full_name: child_path(parent_path, &name),
            name,
            meta_data,
        }
    }
}

/// Join a parent object path and a child name.
pub fn child_path(parent: &str, name: &str) -> String {
    if parent.is_empty() || parent == "/" {
        format!("/{name}")
    } else {
        format!("{parent}/{name}")
    }
}

/// Kind of property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PropertyType {
    Scalar,
    Array,
    Compound,
}

/// Name, kind, data type, metadata and time sampling of a property.
#[derive(Clone, Debug, PartialEq)]
pub struct PropertyHeader {
    pub name: String,
    pub property_type: PropertyType,
    /// Unknown for compounds.
    pub data_type: DataType,
    /// Index into the archive's time sampling table. Unused for compounds.
    pub time_sampling_index: u32,
    pub meta_data: MetaData,
}

impl PropertyHeader {
    pub fn scalar(name: impl Into<String>, data_type: DataType) -> Self {
        Self::leaf(name, PropertyType::Scalar, data_type)
    }

    pub fn array(name: impl Into<String>, data_type: DataType) -> Self {
        Self::leaf(name, PropertyType::Array, data_type)
    }

    pub fn compound(name: impl Into<String>) -> Self {
        Self::leaf(name, PropertyType::Compound, DataType::UNKNOWN)
    }

    fn leaf(name: impl Into<String>, property_type: PropertyType, data_type: DataType) -> Self {
        Self {
            name: name.into(),
            property_type,
            data_type,
            time_sampling_index: 0,
            meta_data: MetaData::new(),
        }
    }

    pub fn with_time_sampling(mut self, index: u32) -> Self {
        self.time_sampling_index = index;
        self
    }

    pub fn with_meta_data(mut self, meta_data: MetaData) -> Self {
        self.meta_data = meta_data;
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.property_type == PropertyType::Scalar
    }

    pub fn is_array(&self) -> bool {
        self.property_type == PropertyType::Array
    }

    pub fn is_compound(&self) -> bool {
        self.property_type == PropertyType::Compound
    }
}
