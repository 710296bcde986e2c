//! The packed `u32` in front of every property header entry, and the
//! changed-sample range it describes.
//!
//! ```text
//! bits  0..2   kind: 0 compound, 1 scalar, 2 array, 3 array with one point per sample
//! bits  2..4   width of the sized fields that follow: 0 u8, 1 u16, 2 u32
//! bits  4..8   POD
//! bit   8      a time sampling index follows
//! bit   9      first/last changed indices follow
//! bit  10      every sample has the same point count
//! bit  11      every sample is the same
//! bits 12..20  extent
//! bits 20..28  metadata index, 0xff = inline
//! ```

use crate::core::PropertyType;
use crate::util::{DataType, Error, PlainOldDataType, Result};

const KIND_MASK: u32 = 0x0003;
const SIZE_HINT_MASK: u32 = 0x000c;
const POD_MASK: u32 = 0x00f0;
const HAS_TIME_SAMPLING: u32 = 0x0100;
const EXPLICIT_CHANGED: u32 = 0x0200;
const HOMOGENOUS: u32 = 0x0400;
const CONSTANT: u32 = 0x0800;
const EXTENT_MASK: u32 = 0x000f_f000;
const METADATA_MASK: u32 = 0x0ff0_0000;

/// Metadata index meaning "stored inline after the name".
pub const INLINE_METADATA: u8 = 0xff;

/// Decoded info word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PropertyInfo {
    pub property_type: PropertyType,
    /// Array whose samples all hold exactly one point.
    pub scalar_like: bool,
    pub size_hint: u8,
    pub data_type: DataType,
    pub has_time_sampling: bool,
    pub explicit_changed: bool,
    pub homogenous: bool,
    pub constant: bool,
    pub metadata_index: u8,
}

impl PropertyInfo {
    pub fn encode(&self) -> u32 {
        let kind = match self.property_type {
            PropertyType::Compound => 0,
            PropertyType::Scalar => 1,
            PropertyType::Array if self.scalar_like => 3,
            PropertyType::Array => 2,
        };
        let mut info = kind | (u32::from(self.size_hint) << 2) & SIZE_HINT_MASK;
        if self.property_type != PropertyType::Compound {
            info |= (u32::from(self.data_type.pod as u8) << 4) & POD_MASK;
            info |= (u32::from(self.data_type.extent) << 12) & EXTENT_MASK;
            if self.has_time_sampling {
                info |= HAS_TIME_SAMPLING;
            }
            if self.explicit_changed {
                info |= EXPLICIT_CHANGED;
            }
            if self.homogenous {
                info |= HOMOGENOUS;
            }
            if self.constant {
                info |= CONSTANT;
            }
        }
        info | (u32::from(self.metadata_index) << 20) & METADATA_MASK
    }

    pub fn decode(info: u32) -> Result<Self> {
        let kind = info & KIND_MASK;
        let property_type = match kind {
            0 => PropertyType::Compound,
            1 => PropertyType::Scalar,
            _ => PropertyType::Array,
        };
        let size_hint = ((info & SIZE_HINT_MASK) >> 2) as u8;
        if size_hint > 2 {
            return Err(Error::invalid(format!("bad size hint in property info {info:#x}")));
        }
        let data_type = if property_type == PropertyType::Compound {
            DataType::UNKNOWN
        } else {
            let pod = ((info & POD_MASK) >> 4) as u8;
            let pod = PlainOldDataType::from_u8(pod);
            if pod == PlainOldDataType::Unknown {
                return Err(Error::invalid(format!("bad POD in property info {info:#x}")));
            }
            DataType::new(pod, ((info & EXTENT_MASK) >> 12) as u8)
        };
        Ok(Self {
            property_type,
            scalar_like: kind == 3,
            size_hint,
            data_type,
            has_time_sampling: info & HAS_TIME_SAMPLING != 0,
            explicit_changed: info & EXPLICIT_CHANGED != 0,
            homogenous: info & HOMOGENOUS != 0,
            constant: info & CONSTANT != 0,
            metadata_index: ((info & METADATA_MASK) >> 20) as u8,
        })
    }
}

/// Smallest field width able to hold every value in `values`.
pub fn size_hint_for(values: impl IntoIterator<Item = u32>) -> u8 {
    match values.into_iter().max().unwrap_or(0) {
        0..=0xff => 0,
        0x100..=0xffff => 1,
        _ => 2,
    }
}

/// Which logical samples were actually stored.
///
/// Sample 0 is always stored. Samples `first..=last` are stored one each;
/// samples after `last` repeat sample `last` and are not stored. Both
/// indices are 0 when every sample equals sample 0.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ChangeRange {
    pub num_samples: u32,
    pub first_changed: u32,
    pub last_changed: u32,
}

impl ChangeRange {
    pub fn is_constant(&self) -> bool {
        self.first_changed == 0 && self.last_changed == 0
    }

    /// Range to assume when the info word carries no explicit indices.
    pub fn implied(num_samples: u32, constant: bool) -> Self {
        if constant {
            Self {
                num_samples,
                first_changed: 0,
                last_changed: 0,
            }
        } else {
            Self {
                num_samples,
                first_changed: 1,
                last_changed: num_samples.saturating_sub(1),
            }
        }
    }

    /// Reject indices that point outside the sample count or run backwards.
    pub fn validate(&self) -> Result<()> {
        let first = self.first_changed;
        let last = self.last_changed;
        let ordered = first >= 1 && first <= last && last < self.num_samples;
        if self.is_constant() || ordered || *self == Self::implied(self.num_samples, false) {
            Ok(())
        } else {
            Err(Error::invalid(format!(
                "change range {first}..={last} over {} samples",
                self.num_samples
            )))
        }
    }

    /// True when the indices cannot be implied from the count.
    pub fn needs_explicit(&self) -> bool {
        !self.is_constant()
            && (self.first_changed != 1 || self.last_changed != self.num_samples.saturating_sub(1))
    }

    /// Position among the stored samples of logical sample `index`.
    pub fn stored_index(&self, index: usize) -> usize {
        let first = self.first_changed as usize;
        let last = self.last_changed as usize;
        if self.is_constant() || index < first {
            0
        } else if index >= last {
            last.saturating_sub(first) + 1
        } else {
            index - first + 1
        }
    }

    /// Number of stored samples.
    pub fn num_stored(&self) -> usize {
        if self.num_samples == 0 {
            0
        } else {
            self.stored_index(self.num_samples as usize - 1) + 1
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(property_type: PropertyType) -> PropertyInfo {
        PropertyInfo {
            property_type,
            scalar_like: false,
            size_hint: 1,
            data_type: DataType::VEC3F,
            has_time_sampling: true,
            explicit_changed: false,
            homogenous: true,
            constant: false,
            metadata_index: 7,
        }
    }

    #[test]
    fn test_info_bits() {
        let scalar = info(PropertyType::Scalar);
        let bits = scalar.encode();
        assert_eq!(bits & 0x3, 1);
        assert_eq!((bits >> 2) & 0x3, 1);
        assert_eq!((bits >> 4) & 0xf, PlainOldDataType::Float32 as u32);
        assert_eq!((bits >> 12) & 0xff, 3);
        assert_eq!((bits >> 20) & 0xff, 7);
        assert_ne!(bits & 0x100, 0);
        assert_ne!(bits & 0x400, 0);
        assert_eq!(PropertyInfo::decode(bits).unwrap(), scalar);

        let mut array = info(PropertyType::Array);
        array.scalar_like = true;
        assert_eq!(array.encode() & 0x3, 3);
        assert_eq!(PropertyInfo::decode(array.encode()).unwrap(), array);
    }

    #[test]
    fn test_compound_carries_only_kind_and_metadata() {
        let compound = info(PropertyType::Compound);
        let bits = compound.encode();
        assert_eq!(bits, (1 << 2) | (7 << 20));
        let decoded = PropertyInfo::decode(bits).unwrap();
        assert_eq!(decoded.property_type, PropertyType::Compound);
        assert_eq!(decoded.metadata_index, 7);
    }

    #[test]
    fn test_bad_words() {
        assert!(PropertyInfo::decode(0x000c | 1).is_err());
        assert!(PropertyInfo::decode(0x00f0 | 1).is_err());
    }

    #[test]
    fn test_size_hints() {
        assert_eq!(size_hint_for([]), 0);
        assert_eq!(size_hint_for([3, 255]), 0);
        assert_eq!(size_hint_for([256]), 1);
        assert_eq!(size_hint_for([1, 70_000]), 2);
    }

    #[test]
    fn test_change_ranges() {
        // A A A
        let constant = ChangeRange { num_samples: 3, first_changed: 0, last_changed: 0 };
        assert!(constant.is_constant() && !constant.needs_explicit());
        assert_eq!(constant.num_stored(), 1);
        assert_eq!(constant.stored_index(2), 0);

        // A B C
        let all = ChangeRange::implied(3, false);
        assert!(!all.needs_explicit());
        assert_eq!((0..3).map(|i| all.stored_index(i)).collect::<Vec<_>>(), [0, 1, 2]);

        // A A B B C C
        let middle = ChangeRange { num_samples: 6, first_changed: 2, last_changed: 4 };
        assert!(middle.needs_explicit());
        assert_eq!(
            (0..6).map(|i| middle.stored_index(i)).collect::<Vec<_>>(),
            [0, 0, 1, 2, 3, 3]
        );
        assert_eq!(middle.num_stored(), 4);
        assert_eq!(ChangeRange::default().num_stored(), 0);
    }

    #[test]
    fn test_change_range_validation() {
        assert!(ChangeRange { num_samples: 6, first_changed: 2, last_changed: 4 }.validate().is_ok());
        assert!(ChangeRange { num_samples: 6, first_changed: 0, last_changed: 0 }.validate().is_ok());
        assert!(ChangeRange::implied(1, false).validate().is_ok());
        assert!(ChangeRange::implied(0, false).validate().is_ok());

        let backwards = ChangeRange { num_samples: 6, first_changed: 4, last_changed: 2 };
        assert!(matches!(backwards.validate(), Err(Error::InvalidStructure(_))));
        assert_eq!(backwards.stored_index(5), 1);
        let past_end = ChangeRange { num_samples: 6, first_changed: 2, last_changed: 6 };
        assert!(past_end.validate().is_err());
        let from_zero = ChangeRange { num_samples: 6, first_changed: 0, last_changed: 3 };
        assert!(from_zero.validate().is_err());
    }
}
