//! Duplicate read streams over one container and the slot pool that hands
//! them out.
//!
//! Every reader call names a slot. In mapped mode all slots read the same
//! shared map. Otherwise each slot owns an independently seekable handle
//! behind its own lock, so callers on different slots never contend.

use std::fs::File;
use std::io::{self, Cursor, Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[cfg(feature = "mmap")]
use memmap2::Mmap;
use parking_lot::Mutex;

use super::format::{ContainerHeader, HEADER_SIZE};
use super::ReadOptions;
use crate::util::{Error, Result};

/// Anything a slot can read from.
pub trait ReadSeek: Read + Seek + Send {}

impl<T: Read + Seek + Send> ReadSeek for T {}

enum Backing {
    #[cfg(feature = "mmap")]
    Mapped(Mmap),
    Handles(Vec<Mutex<Box<dyn ReadSeek>>>),
}

/// The container's byte sources, one per slot.
pub struct IStreams {
    name: String,
    backing: Backing,
    /// slot -> handle; a slot whose handle failed to open reads through 0
    slot_handles: Vec<usize>,
    size: u64,
    header: ContainerHeader,
}

impl IStreams {
    /// Open a file with `options.num_streams` slots.
    pub fn open(path: impl AsRef<Path>, options: &ReadOptions) -> Result<Self> {
        let path = path.as_ref();
        let name = path.display().to_string();
        let num_streams = options.num_streams.max(1);

        if options.use_mmap {
            if let Some(mapped) = Self::open_mapped(path, &name, num_streams)? {
                return Ok(mapped);
            }
        }

        Self::open_with(name, num_streams, |_| {
            open_file(path).map(|f| Box::new(f) as Box<dyn ReadSeek>)
        })
    }

    #[cfg(feature = "mmap")]
    fn open_mapped(path: &Path, name: &str, num_streams: usize) -> Result<Option<Self>> {
        let file = open_file(path)?;
        let size = file.metadata()?.len();
        if size < HEADER_SIZE as u64 {
            return Err(Error::InvalidContainer);
        }
        // Safety: the map is read-only and archives are never rewritten in place.
        let map = unsafe { Mmap::map(&file) }.map_err(|e| Error::MmapFailed(e.to_string()))?;
        let mut header = [0u8; HEADER_SIZE];
        header.copy_from_slice(&map[..HEADER_SIZE]);
        let header = ContainerHeader::parse(&header)?;
        check_frozen(&header)?;
        tracing::debug!(archive = %name, size, slots = num_streams, "mapped container");
        Ok(Some(Self {
            name: name.to_string(),
            backing: Backing::Mapped(map),
            slot_handles: vec![0; num_streams],
            size,
            header,
        }))
    }

    #[cfg(not(feature = "mmap"))]
    fn open_mapped(_path: &Path, _name: &str, _num_streams: usize) -> Result<Option<Self>> {
        Ok(None)
    }

    /// `num_streams` cursors over one shared buffer.
    pub fn from_bytes(bytes: Arc<[u8]>, num_streams: usize) -> Result<Self> {
        Self::open_with("<memory>".to_string(), num_streams.max(1), |_| {
            Ok(Box::new(Cursor::new(bytes.clone())) as Box<dyn ReadSeek>)
        })
    }

    /// Pre-opened sources, one per slot. They must all show the same
    /// container.
    pub fn from_sources(name: impl Into<String>, sources: Vec<Box<dyn ReadSeek>>) -> Result<Self> {
        if sources.is_empty() {
            return Err(Error::other("at least one stream is required"));
        }
        let mut sources = sources.into_iter().map(Some).collect::<Vec<_>>();
        let count = sources.len();
        Self::open_with(name.into(), count, |slot| {
            sources[slot]
                .take()
                .ok_or_else(|| Error::other(format!("stream {slot} already taken")))
        })
    }

    /// Open `num_streams` handles with `opener`. Slot 0 must open; later
    /// slots that fail are served by slot 0.
    pub fn open_with<F>(name: String, num_streams: usize, mut opener: F) -> Result<Self>
    where
        F: FnMut(usize) -> Result<Box<dyn ReadSeek>>,
    {
        let mut first = opener(0)?;
        let size = first.seek(SeekFrom::End(0))?;
        if size < HEADER_SIZE as u64 {
            return Err(Error::InvalidContainer);
        }
        let header = read_header(&mut first)?;

        let mut handles = vec![Mutex::new(first)];
        let mut slot_handles = vec![0];
        for slot in 1..num_streams {
            match opener(slot) {
                Ok(mut handle) => {
                    if read_header(&mut handle)? != header {
                        return Err(Error::InconsistentStreams { slot });
                    }
                    slot_handles.push(handles.len());
                    handles.push(Mutex::new(handle));
                }
                Err(err) => {
                    tracing::warn!(archive = %name, slot, error = %err, "stream failed to open, using slot 0");
                    slot_handles.push(0);
                }
            }
        }
        check_frozen(&header)?;
        tracing::debug!(archive = %name, size, slots = num_streams, handles = handles.len(), "opened container");

        Ok(Self {
            name,
            backing: Backing::Handles(handles),
            slot_handles,
            size,
            header,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn num_slots(&self) -> usize {
        self.slot_handles.len()
    }

    pub fn header(&self) -> &ContainerHeader {
        &self.header
    }

    pub fn version(&self) -> u16 {
        self.header.version
    }

    pub fn is_frozen(&self) -> bool {
        self.header.frozen
    }

    pub fn root_pos(&self) -> u64 {
        self.header.root_pos
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    /// True when slot `slot` reads through a handle of its own.
    pub fn has_own_handle(&self, slot: usize) -> bool {
        match &self.backing {
            #[cfg(feature = "mmap")]
            Backing::Mapped(_) => true,
            Backing::Handles(_) => slot == 0 || self.slot_handles.get(slot).is_some_and(|&h| h != 0),
        }
    }

    /// Read `len` bytes at `pos` through `slot`.
    pub fn read(&self, slot: usize, pos: u64, len: usize) -> Result<Vec<u8>> {
        let mut buf = vec![0u8; len];
        self.read_into(slot, pos, &mut buf)?;
        Ok(buf)
    }

    pub fn read_into(&self, slot: usize, pos: u64, buf: &mut [u8]) -> Result<()> {
        let end = pos
            .checked_add(buf.len() as u64)
            .filter(|&end| end <= self.size)
            .ok_or(Error::UnexpectedEof(pos.saturating_add(buf.len() as u64)))?;

        match &self.backing {
            #[cfg(feature = "mmap")]
            Backing::Mapped(map) => {
                buf.copy_from_slice(&map[pos as usize..end as usize]);
                Ok(())
            }
            Backing::Handles(handles) => {
                let handle = self.slot_handles[slot % self.slot_handles.len()];
                let mut source = handles[handle].lock();
                source.seek(SeekFrom::Start(pos))?;
                source.read_exact(buf).map_err(|e| match e.kind() {
                    io::ErrorKind::UnexpectedEof => Error::UnexpectedEof(end),
                    _ => Error::Io(e),
                })
            }
        }
    }

    pub fn read_u64(&self, slot: usize, pos: u64) -> Result<u64> {
        let mut buf = [0u8; 8];
        self.read_into(slot, pos, &mut buf)?;
        Ok(u64::from_le_bytes(buf))
    }
}

fn open_file(path: &Path) -> Result<File> {
    File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            Error::FileNotFound(path.to_path_buf())
        } else {
            Error::Io(e)
        }
    })
}

fn read_header(source: &mut Box<dyn ReadSeek>) -> Result<ContainerHeader> {
    let mut bytes = [0u8; HEADER_SIZE];
    source.seek(SeekFrom::Start(0))?;
    source.read_exact(&mut bytes).map_err(|e| match e.kind() {
        io::ErrorKind::UnexpectedEof => Error::InvalidContainer,
        _ => Error::Io(e),
    })?;
    ContainerHeader::parse(&bytes)
}

fn check_frozen(header: &ContainerHeader) -> Result<()> {
    if header.frozen {
        Ok(())
    } else {
        Err(Error::NotFrozen)
    }
}

/// Pool of slot numbers for one open archive.
///
/// Free slots are handed out first; when all are taken callers share slots
/// round-robin, which stays correct because each slot serializes its reads.
pub struct StreamManager {
    free: Mutex<Vec<usize>>,
    next: AtomicUsize,
    num_slots: usize,
}

impl StreamManager {
    pub fn new(num_slots: usize) -> Self {
        let num_slots = num_slots.max(1);
        Self {
            free: Mutex::new((0..num_slots).rev().collect()),
            next: AtomicUsize::new(0),
            num_slots,
        }
    }

    pub fn num_slots(&self) -> usize {
        self.num_slots
    }

    /// Take a slot until the guard drops.
    pub fn checkout(&self) -> SlotGuard<'_> {
        if let Some(slot) = self.free.lock().pop() {
            tracing::trace!(slot, "slot checked out");
            return SlotGuard {
                manager: self,
                slot,
                pooled: true,
            };
        }
        let slot = self.next.fetch_add(1, Ordering::Relaxed) % self.num_slots;
        tracing::trace!(slot, "all slots busy, sharing");
        SlotGuard {
            manager: self,
            slot,
            pooled: false,
        }
    }

    pub fn num_free(&self) -> usize {
        self.free.lock().len()
    }
}

/// A checked-out slot.
pub struct SlotGuard<'a> {
    manager: &'a StreamManager,
    slot: usize,
    pooled: bool,
}

impl SlotGuard<'_> {
    pub fn slot(&self) -> usize {
        self.slot
    }
}

impl Drop for SlotGuard<'_> {
    fn drop(&mut self) {
        if self.pooled {
            self.manager.free.lock().push(self.slot);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ogawa::format::{FROZEN_FLAG, FROZEN_OFFSET, ROOT_POS_OFFSET};

    fn frozen_bytes(root: u64) -> Vec<u8> {
        let mut bytes = ContainerHeader::unfrozen_bytes().to_vec();
        bytes[FROZEN_OFFSET] = FROZEN_FLAG;
        bytes[ROOT_POS_OFFSET..].copy_from_slice(&root.to_le_bytes());
        bytes.extend_from_slice(&0u64.to_le_bytes());
        bytes
    }

    #[test]
    fn test_read_through_slots() {
        let bytes: Arc<[u8]> = frozen_bytes(16).into();
        let streams = IStreams::from_bytes(bytes, 3).unwrap();
        assert_eq!(streams.num_slots(), 3);
        assert_eq!(streams.root_pos(), 16);
        for slot in 0..3 {
            assert_eq!(streams.read_u64(slot, 16).unwrap(), 0);
            assert_eq!(streams.read(slot, 0, 5).unwrap(), b"Ogawa");
        }
        assert!(matches!(streams.read(0, 20, 8), Err(Error::UnexpectedEof(28))));
    }

    #[test]
    fn test_failed_slot_falls_back() {
        let bytes: Arc<[u8]> = frozen_bytes(16).into();
        let streams = IStreams::open_with("t".into(), 3, |slot| {
            if slot == 1 {
                Err(Error::other("no handle"))
            } else {
                Ok(Box::new(Cursor::new(bytes.clone())) as Box<dyn ReadSeek>)
            }
        })
        .unwrap();
        assert!(!streams.has_own_handle(1));
        assert!(streams.has_own_handle(2));
        assert_eq!(streams.read(1, 0, 5).unwrap(), b"Ogawa");
    }

    #[test]
    fn test_first_slot_must_open() {
        let result = IStreams::open_with("t".into(), 2, |_| Err(Error::other("no handle")));
        assert!(result.is_err());
    }

    #[test]
    fn test_inconsistent_streams() {
        let a: Arc<[u8]> = frozen_bytes(16).into();
        let b: Arc<[u8]> = frozen_bytes(8).into();
        let sources: Vec<Box<dyn ReadSeek>> = vec![
            Box::new(Cursor::new(a.clone())),
            Box::new(Cursor::new(a)),
            Box::new(Cursor::new(b)),
        ];
        assert!(matches!(
            IStreams::from_sources("t", sources),
            Err(Error::InconsistentStreams { slot: 2 })
        ));
    }

    #[test]
    fn test_not_frozen_and_garbage() {
        let mut bytes = frozen_bytes(16);
        bytes[FROZEN_OFFSET] = 0;
        assert!(matches!(
            IStreams::from_bytes(bytes.into(), 1),
            Err(Error::NotFrozen)
        ));
        assert!(matches!(
            IStreams::from_bytes(Arc::from(&b"short"[..]), 1),
            Err(Error::InvalidContainer)
        ));
    }

    #[test]
    fn test_manager_hands_out_distinct_slots() {
        let manager = StreamManager::new(2);
        let a = manager.checkout();
        let b = manager.checkout();
        assert_ne!(a.slot(), b.slot());
        assert_eq!(manager.num_free(), 0);
        let c = manager.checkout();
        assert!(c.slot() < 2);
        drop(c);
        assert_eq!(manager.num_free(), 0);
        drop(a);
        assert_eq!(manager.num_free(), 1);
        drop(b);
        assert_eq!(manager.num_free(), 2);
    }
}
