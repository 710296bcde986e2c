//! Append-only output stream and group builder.

use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Cursor, Seek, SeekFrom, Write};
use std::path::Path;
use std::sync::Arc;

use byteorder::{LittleEndian, WriteBytesExt};
use parking_lot::Mutex;

use crate::ogawa::format::*;
use crate::util::{Error, Result};

/// Where an [`OStream`] puts its bytes.
pub trait WriteSink: Write + Seek + Send {}

impl<T: Write + Seek + Send> WriteSink for T {}

/// Growable in-memory sink that can be inspected after writing.
#[derive(Clone, Default)]
pub struct SharedBuffer {
    inner: Arc<Mutex<Cursor<Vec<u8>>>>,
}

impl SharedBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything written so far.
    pub fn to_vec(&self) -> Vec<u8> {
        self.inner.lock().get_ref().clone()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().get_ref().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.inner.lock().write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for SharedBuffer {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        self.inner.lock().seek(pos)
    }
}

/// Single writer over a container.
///
/// Bytes are only ever appended, except for the two header fields patched
/// by [`OStream::finalize`]: the root position, then the frozen flag as the
/// very last write.
pub struct OStream {
    sink: Box<dyn WriteSink>,
    pos: u64,
    frozen: bool,
    last_write: Option<(u64, usize)>,
}

impl OStream {
    /// Create (truncating) a file and write the unfrozen header.
    pub fn create(path: impl AsRef<Path>) -> Result<Self> {
        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        Self::with_sink(Box::new(BufWriter::with_capacity(2 * 1024 * 1024, file)))
    }

    pub fn memory(buffer: SharedBuffer) -> Result<Self> {
        Self::with_sink(Box::new(buffer))
    }

    pub fn with_sink(sink: Box<dyn WriteSink>) -> Result<Self> {
        let mut stream = Self {
            sink,
            pos: 0,
            frozen: false,
            last_write: None,
        };
        stream.write_bytes(&ContainerHeader::unfrozen_bytes())?;
        Ok(stream)
    }

    #[inline]
    pub fn pos(&self) -> u64 {
        self.pos
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen
    }

    /// Position and length of the most recent write.
    pub fn last_write(&self) -> Option<(u64, usize)> {
        self.last_write
    }

    fn write_bytes(&mut self, bytes: &[u8]) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        if let Err(err) = self.sink.write_all(bytes) {
            // a partial block is overwritten by the next append
            self.sink.seek(SeekFrom::Start(self.pos))?;
            return Err(err.into());
        }
        self.last_write = Some((self.pos, bytes.len()));
        self.pos += bytes.len() as u64;
        Ok(())
    }

    /// Append a data block holding the concatenation of `parts` and return
    /// its child reference. No bytes at all gives the empty-data reference.
    pub fn add_data(&mut self, parts: &[&[u8]]) -> Result<u64> {
        let size: usize = parts.iter().map(|p| p.len()).sum();
        if size == 0 {
            return Ok(EMPTY_DATA);
        }
        let start = self.pos;
        let mut block = Vec::with_capacity(8 + size);
        block.write_u64::<LittleEndian>(size as u64)?;
        for part in parts {
            block.extend_from_slice(part);
        }
        self.write_bytes(&block)?;
        Ok(make_data_offset(start))
    }

    /// Append a group of child references. No children gives the
    /// empty-group reference.
    pub fn add_group(&mut self, children: &[u64]) -> Result<u64> {
        if children.is_empty() {
            return Ok(EMPTY_GROUP);
        }
        let start = self.pos;
        let mut block = Vec::with_capacity(8 * (children.len() + 1));
        block.write_u64::<LittleEndian>(children.len() as u64)?;
        for &child in children {
            block.write_u64::<LittleEndian>(child)?;
        }
        self.write_bytes(&block)?;
        Ok(make_group_offset(start))
    }

    /// Point the header at `root` and set the frozen flag, in that order.
    pub fn finalize(&mut self, root: u64) -> Result<()> {
        if self.frozen {
            return Err(Error::Frozen);
        }
        if !is_group_offset(root) {
            return Err(Error::invalid("root must be a group"));
        }
        let end = self.pos;
        if let Err(err) = self.patch_header(root) {
            // appends resume at the old end
            self.sink.seek(SeekFrom::Start(end))?;
            return Err(err);
        }
        self.last_write = Some((FROZEN_OFFSET as u64, 1));

        self.sink.seek(SeekFrom::Start(end))?;
        self.frozen = true;
        tracing::debug!(size = end, root = extract_offset(root), "container frozen");
        Ok(())
    }

    fn patch_header(&mut self, root: u64) -> Result<()> {
        self.sink.flush()?;

        self.sink.seek(SeekFrom::Start(ROOT_POS_OFFSET as u64))?;
        self.sink.write_u64::<LittleEndian>(extract_offset(root))?;
        self.sink.flush()?;

        self.sink.seek(SeekFrom::Start(FROZEN_OFFSET as u64))?;
        self.sink.write_u8(FROZEN_FLAG)?;
        self.sink.flush()?;
        Ok(())
    }
}

/// Collects child references and writes them as one group after the
/// children themselves are in the stream.
#[derive(Clone, Debug, Default)]
pub struct OGroup {
    children: Vec<u64>,
}

impl OGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_child(&mut self, reference: u64) {
        self.children.push(reference);
    }

    pub fn add_empty_group(&mut self) {
        self.children.push(EMPTY_GROUP);
    }

    pub fn add_empty_data(&mut self) {
        self.children.push(EMPTY_DATA);
    }

    pub fn len(&self) -> usize {
        self.children.len()
    }

    pub fn is_empty(&self) -> bool {
        self.children.is_empty()
    }

    pub fn write(self, stream: &mut OStream) -> Result<u64> {
        stream.add_group(&self.children)
    }
}
