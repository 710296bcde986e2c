//! Container layout constants and child reference encoding.
//!
//! Header (16 bytes): magic `Ogawa`, frozen flag, big-endian u16 version,
//! little-endian u64 position of the root group.
//!
//! A group is `u64 count` followed by `count` child references. A data block
//! is `u64 size` followed by the bytes. A child reference with the top bit
//! set points at data, clear points at a group; offset 0 is an empty child.

pub const OGAWA_MAGIC: &[u8; 5] = b"Ogawa";

pub const HEADER_SIZE: usize = 16;

pub const FROZEN_OFFSET: usize = 5;

pub const VERSION_OFFSET: usize = 6;

pub const ROOT_POS_OFFSET: usize = 8;

/// Newest container version this crate reads and the one it writes.
pub const CURRENT_VERSION: u16 = 1;

pub const FROZEN_FLAG: u8 = 0xFF;

pub const NOT_FROZEN_FLAG: u8 = 0x00;

/// Top bit of a child reference: set = data.
pub const DATA_FLAG: u64 = 1 << 63;

pub const OFFSET_MASK: u64 = !DATA_FLAG;

/// Reference to an empty group.
pub const EMPTY_GROUP: u64 = 0;

/// Reference to an empty data block.
pub const EMPTY_DATA: u64 = DATA_FLAG;

#[inline]
pub const fn is_group_offset(reference: u64) -> bool {
    reference & DATA_FLAG == 0
}

#[inline]
pub const fn is_data_offset(reference: u64) -> bool {
    reference & DATA_FLAG != 0
}

#[inline]
pub const fn extract_offset(reference: u64) -> u64 {
    reference & OFFSET_MASK
}

#[inline]
pub const fn make_group_offset(pos: u64) -> u64 {
    pos & OFFSET_MASK
}

#[inline]
pub const fn make_data_offset(pos: u64) -> u64 {
    pos | DATA_FLAG
}

/// Empty group or empty data.
#[inline]
pub const fn is_empty_offset(reference: u64) -> bool {
    extract_offset(reference) == 0
}

/// Decoded container header.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContainerHeader {
    pub frozen: bool,
    pub version: u16,
    pub root_pos: u64,
}

impl ContainerHeader {
    /// Decode and check magic and version. The frozen flag is reported, not
    /// enforced, so that duplicate streams can be compared first.
    pub fn parse(bytes: &[u8; HEADER_SIZE]) -> crate::util::Result<Self> {
        use crate::util::Error;

        if &bytes[..OGAWA_MAGIC.len()] != OGAWA_MAGIC {
            return Err(Error::InvalidContainer);
        }
        let version = u16::from_be_bytes([bytes[VERSION_OFFSET], bytes[VERSION_OFFSET + 1]]);
        if version > CURRENT_VERSION {
            return Err(Error::VersionUnsupported(version));
        }
        let mut root = [0u8; 8];
        root.copy_from_slice(&bytes[ROOT_POS_OFFSET..]);
        Ok(Self {
            frozen: bytes[FROZEN_OFFSET] == FROZEN_FLAG,
            version,
            root_pos: u64::from_le_bytes(root),
        })
    }

    /// Bytes of a header as first written, before finalization.
    pub fn unfrozen_bytes() -> [u8; HEADER_SIZE] {
        let mut bytes = [0u8; HEADER_SIZE];
        bytes[..OGAWA_MAGIC.len()].copy_from_slice(OGAWA_MAGIC);
        bytes[FROZEN_OFFSET] = NOT_FROZEN_FLAG;
        bytes[VERSION_OFFSET..ROOT_POS_OFFSET].copy_from_slice(&CURRENT_VERSION.to_be_bytes());
        bytes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::util::Error;

    #[test]
    fn test_offsets() {
        let group = make_group_offset(0x1234);
        assert!(is_group_offset(group));
        assert_eq!(group, 0x1234);

        let data = make_data_offset(0x5678);
        assert!(is_data_offset(data));
        assert_eq!(extract_offset(data), 0x5678);
        assert_eq!(data, 0x8000_0000_0000_5678);

        assert!(is_empty_offset(EMPTY_GROUP));
        assert!(is_empty_offset(EMPTY_DATA));
        assert!(!is_empty_offset(0x100));
    }

    #[test]
    fn test_header_parse() {
        let mut bytes = ContainerHeader::unfrozen_bytes();
        assert_eq!(&bytes[6..8], &[0, 1]);
        let header = ContainerHeader::parse(&bytes).unwrap();
        assert!(!header.frozen);
        assert_eq!(header.version, 1);

        bytes[FROZEN_OFFSET] = FROZEN_FLAG;
        bytes[ROOT_POS_OFFSET..].copy_from_slice(&99u64.to_le_bytes());
        let header = ContainerHeader::parse(&bytes).unwrap();
        assert!(header.frozen);
        assert_eq!(header.root_pos, 99);
    }

    #[test]
    fn test_header_rejects() {
        let mut bytes = ContainerHeader::unfrozen_bytes();
        bytes[0] = b'X';
        assert!(matches!(ContainerHeader::parse(&bytes), Err(Error::InvalidContainer)));

        let mut bytes = ContainerHeader::unfrozen_bytes();
        bytes[VERSION_OFFSET..ROOT_POS_OFFSET].copy_from_slice(&2u16.to_be_bytes());
        assert!(matches!(
            ContainerHeader::parse(&bytes),
            Err(Error::VersionUnsupported(2))
        ));
    }
}
