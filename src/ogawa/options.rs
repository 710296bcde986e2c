//! Open and create options.

use super::writer::constants::ALEMBIC_LIBRARY_VERSION;

/// How an archive is opened for reading.
#[derive(Clone, Debug)]
pub struct ReadOptions {
    /// Number of independent read slots. Threads beyond this share slots.
    pub num_streams: usize,
    /// Memory-map files instead of opening one handle per slot.
    pub use_mmap: bool,
    /// Rehash every sample read and compare it with its stored key.
    pub verify_sample_keys: bool,
}

impl Default for ReadOptions {
    fn default() -> Self {
        Self {
            num_streams: 1,
            use_mmap: cfg!(feature = "mmap"),
            verify_sample_keys: false,
        }
    }
}

impl ReadOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn num_streams(mut self, n: usize) -> Self {
        self.num_streams = n.max(1);
        self
    }

    pub fn use_mmap(mut self, enabled: bool) -> Self {
        self.use_mmap = enabled;
        self
    }

    pub fn verify_sample_keys(mut self, enabled: bool) -> Self {
        self.verify_sample_keys = enabled;
        self
    }
}

/// How an archive is written.
#[derive(Clone, Debug)]
pub struct WriteOptions {
    /// Store identical samples once per archive.
    pub dedup: bool,
    /// Recorded as `_ai_Application` unless the archive metadata sets it.
    pub application_writer: Option<String>,
    /// Library version stored in the root group, e.g. `10810`.
    pub library_version: i32,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            dedup: true,
            application_writer: None,
            library_version: ALEMBIC_LIBRARY_VERSION,
        }
    }
}

impl WriteOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dedup(mut self, enabled: bool) -> Self {
        self.dedup = enabled;
        self
    }

    pub fn application_writer(mut self, name: impl Into<String>) -> Self {
        self.application_writer = Some(name.into());
        self
    }

    pub fn library_version(mut self, version: i32) -> Self {
        self.library_version = version;
        self
    }
}
