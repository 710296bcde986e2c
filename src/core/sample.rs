//! Sample values and sample selection.

use super::TimeSampling;
use crate::util::{Chrono, DataType, Dimensions, Error, PlainOldDataType, Result};

/// How to pick a sample: by index or by time.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SampleSelector {
    Index(usize),
    /// Largest index whose time is `<=` the given time.
    TimeFloor(Chrono),
    /// Smallest index whose time is `>=` the given time.
    TimeCeil(Chrono),
    TimeNear(Chrono),
}

impl SampleSelector {
    /// Resolve to an index in `[0, num_samples)`. Index selectors are not
    /// clamped, readers bounds-check them.
    pub fn resolve(&self, time_sampling: &TimeSampling, num_samples: usize) -> usize {
        match *self {
            Self::Index(i) => i,
            Self::TimeFloor(t) => time_sampling.floor_index(t, num_samples).0,
            Self::TimeCeil(t) => time_sampling.ceil_index(t, num_samples).0,
            Self::TimeNear(t) => time_sampling.near_index(t, num_samples).0,
        }
    }
}

impl Default for SampleSelector {
    fn default() -> Self {
        Self::Index(0)
    }
}

impl From<usize> for SampleSelector {
    fn from(index: usize) -> Self {
        Self::Index(index)
    }
}

/// One array sample: packed element bytes plus shape.
#[derive(Clone, Debug, PartialEq)]
pub struct ArraySample {
    data_type: DataType,
    dimensions: Dimensions,
    bytes: Vec<u8>,
}

impl ArraySample {
    /// Checks that `bytes` holds exactly the elements `dimensions` promises.
    pub fn new(data_type: DataType, dimensions: Dimensions, bytes: Vec<u8>) -> Result<Self> {
        check_sample_bytes(data_type, dimensions.num_points(), &bytes)?;
        Ok(Self {
            data_type,
            dimensions,
            bytes,
        })
    }

    /// Rank-1 sample built from typed values.
    pub fn from_pods<T: crate::util::AlembicPod>(extent: u8, values: &[T]) -> Result<Self> {
        let data_type = DataType::new(T::POD_TYPE, extent);
        let per_element = extent.max(1) as usize;
        if values.len() % per_element != 0 {
            return Err(Error::SampleSizeMismatch {
                expected: values.len() / per_element * per_element,
                actual: values.len(),
            });
        }
        let bytes = bytemuck::cast_slice(values).to_vec();
        Self::new(data_type, Dimensions::d1(values.len() / per_element), bytes)
    }

    /// Rank-1 sample of UTF-8 strings, one per element.
    pub fn from_strings<S: AsRef<str>>(values: &[S]) -> Result<Self> {
        Self::new(DataType::STRING, Dimensions::d1(values.len()), encode_strings(values)?)
    }

    pub fn data_type(&self) -> DataType {
        self.data_type
    }

    pub fn dimensions(&self) -> &Dimensions {
        &self.dimensions
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }

    pub fn num_points(&self) -> usize {
        self.dimensions.num_points()
    }
}

/// Verify that `bytes` holds `num_points` elements of `data_type`.
///
/// Numeric kinds must match exactly. String kinds must hold exactly one
/// terminated string per stored string and nothing after the last one.
pub fn check_sample_bytes(data_type: DataType, num_points: usize, bytes: &[u8]) -> Result<()> {
    if !data_type.is_valid() {
        return Err(Error::type_mismatch("valid data type", data_type));
    }
    if data_type.is_string() {
        let expected = num_points * data_type.strings_per_element();
        let unit = data_type.pod.num_bytes();
        if bytes.len() % unit != 0 {
            return Err(Error::SampleSizeMismatch {
                expected: bytes.len() / unit * unit,
                actual: bytes.len(),
            });
        }
        let terminators = bytes
            .chunks_exact(unit)
            .filter(|c| c.iter().all(|&b| b == 0))
            .count();
        let ends_terminated = bytes.is_empty() || bytes[bytes.len() - unit..].iter().all(|&b| b == 0);
        if terminators != expected || !ends_terminated {
            return Err(Error::SampleSizeMismatch {
                expected,
                actual: terminators,
            });
        }
        return Ok(());
    }
    let expected = num_points * data_type.num_bytes();
    if bytes.len() != expected {
        return Err(Error::SampleSizeMismatch {
            expected,
            actual: bytes.len(),
        });
    }
    Ok(())
}

/// Count of elements in a stored buffer when no shape was stored.
pub fn points_in_bytes(data_type: DataType, bytes: &[u8]) -> usize {
    if data_type.is_string() {
        let unit = data_type.pod.num_bytes();
        let strings = bytes
            .chunks_exact(unit)
            .filter(|c| c.iter().all(|&b| b == 0))
            .count();
        strings / data_type.strings_per_element()
    } else if data_type.num_bytes() == 0 {
        0
    } else {
        bytes.len() / data_type.num_bytes()
    }
}

/// Pack strings NUL-terminated. Interior NULs are rejected.
pub fn encode_strings<S: AsRef<str>>(values: &[S]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for s in values {
        let s = s.as_ref();
        if s.contains('\0') {
            return Err(Error::other(format!("string {s:?} contains NUL")));
        }
        out.extend_from_slice(s.as_bytes());
        out.push(0);
    }
    Ok(out)
}

/// Pack strings as little-endian UTF-32, each followed by a zero unit.
pub fn encode_wstrings<S: AsRef<str>>(values: &[S]) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    for s in values {
        let s = s.as_ref();
        if s.contains('\0') {
            return Err(Error::other(format!("string {s:?} contains NUL")));
        }
        for c in s.chars() {
            out.extend_from_slice(&(c as u32).to_le_bytes());
        }
        out.extend_from_slice(&0u32.to_le_bytes());
    }
    Ok(out)
}

/// Split a stored string buffer of either string kind.
pub fn decode_strings(pod: PlainOldDataType, bytes: &[u8]) -> Result<Vec<String>> {
    match pod {
        PlainOldDataType::String => split_terminated(bytes, 1)
            .map(|s| Ok::<_, Error>(String::from_utf8(s.to_vec())?))
            .collect(),
        PlainOldDataType::Wstring => split_terminated(bytes, 4)
            .map(|s| {
                s.chunks_exact(4)
                    .map(|c| {
                        let unit = u32::from_le_bytes([c[0], c[1], c[2], c[3]]);
                        char::from_u32(unit)
                            .ok_or_else(|| Error::invalid(format!("bad code point {unit:#x}")))
                    })
                    .collect::<Result<String>>()
            })
            .collect(),
        other => Err(Error::type_mismatch("string", other)),
    }
}

/// Iterate the strings of a terminated buffer, without their terminators.
pub(crate) fn split_terminated(bytes: &[u8], unit: usize) -> impl Iterator<Item = &[u8]> + '_ {
    let mut rest = bytes;
    std::iter::from_fn(move || {
        if rest.is_empty() {
            return None;
        }
        let end = rest
            .chunks_exact(unit)
            .position(|c| c.iter().all(|&b| b == 0))
            .map(|i| i * unit)
            .unwrap_or(rest.len());
        let (item, tail) = rest.split_at(end);
        rest = &tail[unit.min(tail.len())..];
        Some(item)
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_size_check() {
        let ok = ArraySample::new(DataType::VEC3F, Dimensions::d1(2), vec![0; 24]);
        assert!(ok.is_ok());
        let bad = ArraySample::new(DataType::VEC3F, Dimensions::d1(2), vec![0; 20]);
        assert!(matches!(
            bad,
            Err(Error::SampleSizeMismatch { expected: 24, actual: 20 })
        ));
    }

    #[test]
    fn test_string_samples() {
        let sample = ArraySample::from_strings(&["a", "", "xyz"]).unwrap();
        assert_eq!(sample.bytes(), b"a\0\0xyz\0");
        assert_eq!(points_in_bytes(DataType::STRING, sample.bytes()), 3);
        assert_eq!(
            decode_strings(PlainOldDataType::String, sample.bytes()).unwrap(),
            vec!["a", "", "xyz"]
        );
        // two strings claimed, three stored
        assert!(check_sample_bytes(DataType::STRING, 2, sample.bytes()).is_err());
        // missing final terminator
        assert!(check_sample_bytes(DataType::STRING, 1, b"abc").is_err());
        assert!(encode_strings(&["a\0b"]).is_err());
    }

    #[test]
    fn test_wide_strings() {
        let bytes = encode_wstrings(&["hé", "∑"]).unwrap();
        assert_eq!(bytes.len(), (3 + 2) * 4);
        check_sample_bytes(DataType::WSTRING, 2, &bytes).unwrap();
        assert_eq!(
            decode_strings(PlainOldDataType::Wstring, &bytes).unwrap(),
            vec!["hé", "∑"]
        );
    }

    #[test]
    fn test_from_pods_extent() {
        let sample = ArraySample::from_pods(3, &[1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0]).unwrap();
        assert_eq!(sample.num_points(), 2);
        assert_eq!(sample.data_type(), DataType::VEC3F);
        assert!(ArraySample::from_pods(3, &[1.0f32, 2.0]).is_err());
    }

    #[test]
    fn test_selector_resolve() {
        let ts = TimeSampling::uniform(0.5, 0.0).unwrap();
        assert_eq!(SampleSelector::TimeFloor(0.9).resolve(&ts, 10), 1);
        assert_eq!(SampleSelector::TimeCeil(0.9).resolve(&ts, 10), 2);
        assert_eq!(SampleSelector::Index(42).resolve(&ts, 10), 42);
    }
}
