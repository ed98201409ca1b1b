//! Sequential writer for `.downloading` files.

use std::fs::{self, File};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use super::partial_path;

/// Partial download file, owned by exactly one item. Bytes are appended in
/// offset order; `finalize` makes them durable and renames to the final path.
#[derive(Debug)]
pub struct PartialFile {
    file: File,
    partial_path: PathBuf,
    final_path: PathBuf,
    position: u64,
}

impl PartialFile {
    /// Opens (or creates) the partial file for `final_path` without truncating
    /// and positions the cursor at `resume_offset`. Offset 0 starts over.
    pub fn open(final_path: &Path, resume_offset: u64) -> io::Result<Self> {
        let partial_path = partial_path(final_path);
        let mut file = File::options()
            .create(true)
            .write(true)
            .truncate(false)
            .open(&partial_path)?;
        if resume_offset == 0 {
            file.set_len(0)?;
        }
        file.seek(SeekFrom::Start(resume_offset))?;
        Ok(Self {
            file,
            partial_path,
            final_path: final_path.to_path_buf(),
            position: resume_offset,
        })
    }

    /// Partial file on a read-only handle; every write fails.
    #[cfg(test)]
    pub(crate) fn read_only(final_path: &Path) -> io::Result<Self> {
        let partial_path = partial_path(final_path);
        fs::write(&partial_path, b"")?;
        let file = File::open(&partial_path)?;
        Ok(Self {
            file,
            partial_path,
            final_path: final_path.to_path_buf(),
            position: 0,
        })
    }

    pub fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        self.file.write_all(data)?;
        self.position += data.len() as u64;
        Ok(())
    }

    /// Offset of the next byte to be written.
    pub fn position(&self) -> u64 {
        self.position
    }

    pub fn partial_path(&self) -> &Path {
        &self.partial_path
    }

    /// fsync, close, then atomically rename to the final path.
    pub fn finalize(self) -> io::Result<PathBuf> {
        let PartialFile {
            file,
            partial_path,
            final_path,
            ..
        } = self;
        file.sync_all()?;
        drop(file);
        fs::rename(&partial_path, &final_path)?;
        Ok(final_path)
    }
}

/// Completes an item whose partial file already holds every byte.
pub fn finalize_partial(final_path: &Path) -> io::Result<PathBuf> {
    let partial = partial_path(final_path);
    File::options().write(true).open(&partial)?.sync_all()?;
    fs::rename(&partial, final_path)?;
    Ok(final_path.to_path_buf())
}
