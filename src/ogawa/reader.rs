//! Group and data nodes of an open container.

use std::path::Path;
use std::sync::Arc;

use super::format::*;
use super::streams::IStreams;
use super::ReadOptions;
use crate::util::{Error, Result};

/// An open container and its root group.
pub struct IArchive {
    streams: Arc<IStreams>,
    root: IGroup,
}

impl IArchive {
    pub fn open(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        Self::from_streams(Arc::new(IStreams::open(path, options)?))
    }

    pub fn from_streams(streams: Arc<IStreams>) -> Result<Self> {
        let root = IGroup::new(streams.clone(), streams.root_pos(), 0)?;
        Ok(Self { streams, root })
    }

    pub fn version(&self) -> u16 {
        self.streams.version()
    }

    pub fn root(&self) -> &IGroup {
        &self.root
    }

    pub fn streams(&self) -> &Arc<IStreams> {
        &self.streams
    }
}

/// A group: an ordered list of child references.
#[derive(Clone)]
pub struct IGroup {
    streams: Arc<IStreams>,
    pos: u64,
    child_offsets: Vec<u64>,
}

impl IGroup {
    /// Read the group at `pos` through `slot`. Position 0 is the empty group.
    pub fn new(streams: Arc<IStreams>, pos: u64, slot: usize) -> Result<Self> {
        let child_offsets = if pos == 0 {
            Vec::new()
        } else {
            let count = streams.read_u64(slot, pos)?;
            let bytes = count
                .checked_mul(8)
                .filter(|&b| block_end(pos, b).is_some_and(|end| end <= streams.size()))
                .ok_or_else(|| Error::invalid(format!("group at {pos} claims {count} children")))?;
            let raw = streams.read(slot, pos + 8, bytes as usize)?;
            raw.chunks_exact(8)
                .map(|c| u64::from_le_bytes([c[0], c[1], c[2], c[3], c[4], c[5], c[6], c[7]]))
                .collect()
        };
        Ok(Self {
            streams,
            pos,
            child_offsets,
        })
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn num_children(&self) -> usize {
        self.child_offsets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.child_offsets.is_empty()
    }

    /// Raw child reference, flag bit included.
    pub fn child_offset(&self, index: usize) -> Result<u64> {
        self.child_offsets
            .get(index)
            .copied()
            .ok_or(Error::ChildOutOfBounds {
                index,
                count: self.child_offsets.len(),
            })
    }

    pub fn is_child_group(&self, index: usize) -> Result<bool> {
        Ok(is_group_offset(self.child_offset(index)?))
    }

    pub fn is_child_data(&self, index: usize) -> Result<bool> {
        Ok(is_data_offset(self.child_offset(index)?))
    }

    pub fn is_empty_child(&self, index: usize) -> Result<bool> {
        Ok(is_empty_offset(self.child_offset(index)?))
    }

    pub fn group(&self, index: usize, slot: usize) -> Result<IGroup> {
        let offset = self.child_offset(index)?;
        if !is_group_offset(offset) {
            return Err(Error::type_mismatch("group", "data"));
        }
        IGroup::new(self.streams.clone(), extract_offset(offset), slot)
    }

    pub fn data(&self, index: usize, slot: usize) -> Result<IData> {
        let offset = self.child_offset(index)?;
        if !is_data_offset(offset) {
            return Err(Error::type_mismatch("data", "group"));
        }
        IData::new(self.streams.clone(), extract_offset(offset), slot)
    }
}

/// A length-prefixed byte block.
pub struct IData {
    streams: Arc<IStreams>,
    pos: u64,
    size: u64,
}

impl IData {
    /// Read the size of the block at `pos`. Position 0 is the empty block.
    pub fn new(streams: Arc<IStreams>, pos: u64, slot: usize) -> Result<Self> {
        let size = if pos == 0 { 0 } else { streams.read_u64(slot, pos)? };
        if pos != 0 {
            match block_end(pos, size) {
                Some(end) if end <= streams.size() => {}
                Some(end) => return Err(Error::UnexpectedEof(end)),
                None => return Err(Error::invalid(format!("data at {pos} claims {size} bytes"))),
            }
        }
        Ok(Self { streams, pos, size })
    }

    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn read_all(&self, slot: usize) -> Result<Vec<u8>> {
        if self.size == 0 {
            return Ok(Vec::new());
        }
        self.streams.read(slot, self.pos + 8, self.size as usize)
    }

    /// Read `len` bytes starting `offset` bytes into the block.
    pub fn read_range(&self, slot: usize, offset: u64, len: usize) -> Result<Vec<u8>> {
        match offset.checked_add(len as u64) {
            Some(end) if end <= self.size => {}
            _ => {
                return Err(Error::UnexpectedEof(
                    self.pos.saturating_add(8).saturating_add(offset).saturating_add(len as u64),
                ))
            }
        }
        self.streams.read(slot, self.pos + 8 + offset, len)
    }
}

/// End of a block whose `len` payload bytes follow an 8-byte prefix at `pos`.
fn block_end(pos: u64, len: u64) -> Option<u64> {
    pos.checked_add(8)?.checked_add(len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogawa::writer::{OGroup, OStream, SharedBuffer};

    #[test]
    fn test_group_and_data_nodes() -> Result<()> {
        let buffer = SharedBuffer::new();
        let mut stream = OStream::memory(buffer.clone())?;
        let hello = stream.add_data(&[b"hello"])?;
        let mut inner = OGroup::new();
        inner.add_child(hello);
        let inner = inner.write(&mut stream)?;
        let mut root = OGroup::new();
        root.add_child(inner);
        root.add_child(EMPTY_DATA);
        root.add_child(EMPTY_GROUP);
        let root = root.write(&mut stream)?;
        stream.finalize(root)?;

        let streams = Arc::new(IStreams::from_bytes(buffer.to_vec().into(), 2)?);
        let archive = IArchive::from_streams(streams)?;
        let root = archive.root();
        assert_eq!(root.num_children(), 3);
        assert!(root.is_child_group(0)?);
        assert!(root.is_child_data(1)? && root.is_empty_child(1)?);
        assert!(root.is_child_group(2)? && root.is_empty_child(2)?);
        assert!(root.group(2, 0)?.is_empty());
        assert!(root.data(1, 1)?.is_empty());
        assert!(matches!(root.data(0, 0), Err(Error::TypeMismatch { .. })));
        assert!(matches!(root.group(3, 0), Err(Error::ChildOutOfBounds { index: 3, count: 3 })));

        let data = root.group(0, 1)?.data(0, 1)?;
        assert_eq!(data.read_all(0)?, b"hello");
        assert_eq!(data.read_range(1, 1, 3)?, b"ell");
        assert!(data.read_range(1, 3, 3).is_err());
        assert!(matches!(data.read_range(0, u64::MAX, 2), Err(Error::UnexpectedEof(_))));
        Ok(())
    }

    /// A frozen container whose root holds one child of the given kind at
    /// offset 16, followed by that child's size or count word.
    fn container_with_claim(child_is_data: bool, claim: u64) -> Result<IArchive> {
        let mut bytes = ContainerHeader::unfrozen_bytes().to_vec();
        bytes[FROZEN_OFFSET] = FROZEN_FLAG;
        let child = if child_is_data {
            make_data_offset(HEADER_SIZE as u64)
        } else {
            make_group_offset(HEADER_SIZE as u64)
        };
        bytes.extend_from_slice(&claim.to_le_bytes());
        let root = bytes.len() as u64;
        bytes.extend_from_slice(&1u64.to_le_bytes());
        bytes.extend_from_slice(&child.to_le_bytes());
        bytes[ROOT_POS_OFFSET..HEADER_SIZE].copy_from_slice(&root.to_le_bytes());
        IArchive::from_streams(Arc::new(IStreams::from_bytes(bytes.into(), 1)?))
    }

    #[test]
    fn test_sizes_past_the_address_space() -> Result<()> {
        let archive = container_with_claim(true, u64::MAX - 20)?;
        assert!(matches!(archive.root().data(0, 0), Err(Error::InvalidStructure(_))));

        let archive = container_with_claim(true, 1 << 20)?;
        assert!(matches!(archive.root().data(0, 0), Err(Error::UnexpectedEof(_))));

        let archive = container_with_claim(false, u64::MAX / 8)?;
        assert!(matches!(archive.root().group(0, 0), Err(Error::InvalidStructure(_))));

        let archive = container_with_claim(false, u64::MAX)?;
        assert!(matches!(archive.root().group(0, 0), Err(Error::InvalidStructure(_))));
        Ok(())
    }
}
