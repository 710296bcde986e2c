//! Helpers shared by the integration tests.

#![allow(dead_code)]

use alembic::prelude::*;
use tracing_subscriber::EnvFilter;

/// Route library logs to the test output. Set `RUST_LOG=alembic=debug` to see them.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Write an archive into memory with `build` and open it again.
pub fn write_and_read<F>(options: WriteOptions, build: F) -> Result<IArchive>
where
    F: FnOnce(&OArchive) -> Result<()>,
{
    let buffer = SharedBuffer::new();
    let archive = OArchive::in_memory(buffer.clone(), options)?;
    build(&archive)?;
    archive.finalize()?;
    drop(archive);
    IArchive::from_bytes(buffer.to_vec(), &ReadOptions::default())
}

/// Size of an archive after `build` and finalize.
pub fn written_size<F>(build: F) -> Result<usize>
where
    F: FnOnce(&OArchive) -> Result<()>,
{
    let buffer = SharedBuffer::new();
    let archive = OArchive::in_memory(buffer.clone(), WriteOptions::default())?;
    build(&archive)?;
    archive.finalize()?;
    Ok(buffer.len())
}
