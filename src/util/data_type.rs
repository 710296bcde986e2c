//! DataType - POD kind plus extent.

use super::PlainOldDataType;
use std::fmt;

/// How one element of a sample is laid out.
///
/// A `Float32` with extent 3 is a 3-vector of floats. For the string kinds
/// the extent counts strings per element and the byte width is not fixed.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DataType {
    pub pod: PlainOldDataType,
    pub extent: u8,
}

impl DataType {
    #[inline]
    pub const fn new(pod: PlainOldDataType, extent: u8) -> Self {
        Self { pod, extent }
    }

    /// Extent 1.
    #[inline]
    pub const fn scalar(pod: PlainOldDataType) -> Self {
        Self { pod, extent: 1 }
    }

    /// Bytes per element; 0 for strings, whose width is data dependent.
    #[inline]
    pub const fn num_bytes(&self) -> usize {
        if self.pod.is_string() {
            0
        } else {
            self.pod.num_bytes() * self.extent as usize
        }
    }

    #[inline]
    pub const fn is_string(&self) -> bool {
        self.pod.is_string()
    }

    /// Known POD and a non-zero extent. Strings also accept extent 0,
    /// meaning one variable-length string per element.
    #[inline]
    pub const fn is_valid(&self) -> bool {
        !matches!(self.pod, PlainOldDataType::Unknown) && (self.extent > 0 || self.pod.is_string())
    }

    /// Strings per element, counting extent 0 as one.
    #[inline]
    pub const fn strings_per_element(&self) -> usize {
        if self.extent == 0 {
            1
        } else {
            self.extent as usize
        }
    }

    pub const UNKNOWN: Self = Self::new(PlainOldDataType::Unknown, 0);

    pub const BOOL: Self = Self::scalar(PlainOldDataType::Boolean);
    pub const UINT8: Self = Self::scalar(PlainOldDataType::Uint8);
    pub const INT8: Self = Self::scalar(PlainOldDataType::Int8);
    pub const UINT16: Self = Self::scalar(PlainOldDataType::Uint16);
    pub const INT16: Self = Self::scalar(PlainOldDataType::Int16);
    pub const UINT32: Self = Self::scalar(PlainOldDataType::Uint32);
    pub const INT32: Self = Self::scalar(PlainOldDataType::Int32);
    pub const UINT64: Self = Self::scalar(PlainOldDataType::Uint64);
    pub const INT64: Self = Self::scalar(PlainOldDataType::Int64);
    pub const FLOAT16: Self = Self::scalar(PlainOldDataType::Float16);
    pub const FLOAT32: Self = Self::scalar(PlainOldDataType::Float32);
    pub const FLOAT64: Self = Self::scalar(PlainOldDataType::Float64);
    pub const STRING: Self = Self::scalar(PlainOldDataType::String);
    pub const WSTRING: Self = Self::scalar(PlainOldDataType::Wstring);

    pub const VEC2F: Self = Self::new(PlainOldDataType::Float32, 2);
    pub const VEC3F: Self = Self::new(PlainOldDataType::Float32, 3);
    pub const VEC3D: Self = Self::new(PlainOldDataType::Float64, 3);
    pub const MAT44F: Self = Self::new(PlainOldDataType::Float32, 16);
    pub const MAT44D: Self = Self::new(PlainOldDataType::Float64, 16);
    pub const BOX3D: Self = Self::new(PlainOldDataType::Float64, 6);
}

impl fmt::Debug for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.extent == 1 {
            write!(f, "{}", self.pod.name())
        } else {
            write!(f, "{}[{}]", self.pod.name(), self.extent)
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_type_sizes() {
        assert_eq!(DataType::BOOL.num_bytes(), 1);
        assert_eq!(DataType::VEC3F.num_bytes(), 12);
        assert_eq!(DataType::MAT44F.num_bytes(), 64);
        assert_eq!(DataType::BOX3D.num_bytes(), 48);
        assert_eq!(DataType::STRING.num_bytes(), 0);
    }

    #[test]
    fn test_data_type_display() {
        assert_eq!(DataType::FLOAT32.to_string(), "float32_t");
        assert_eq!(DataType::VEC3F.to_string(), "float32_t[3]");
    }

    #[test]
    fn test_data_type_validity() {
        assert!(DataType::VEC3F.is_valid());
        assert!(DataType::WSTRING.is_valid());
        assert!(!DataType::UNKNOWN.is_valid());
        assert!(!DataType::new(PlainOldDataType::Float32, 0).is_valid());
        assert!(DataType::new(PlainOldDataType::String, 0).is_valid());
        assert_eq!(DataType::new(PlainOldDataType::String, 0).strings_per_element(), 1);
    }
}
