//! Partial-file lifecycle: resume detection, sequential writes and atomic
//! finalize (rename from `.downloading` to the final name).

mod writer;

pub use writer::{finalize_partial, PartialFile};

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

/// Suffix of the in-progress file; its size is the resume cursor.
pub const PARTIAL_SUFFIX: &str = ".downloading";

/// Path for the partial file: appends `.downloading` to the final path
/// (e.g. `0.flv` → `0.flv.downloading`).
pub fn partial_path(final_path: &Path) -> PathBuf {
    let mut o = final_path.as_os_str().to_owned();
    o.push(PARTIAL_SUFFIX);
    PathBuf::from(o)
}

/// On-disk state of an item before any network call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResumeState {
    /// Final file exists with exactly the expected size; skip the item.
    Complete,
    /// Partial file has the expected size; only the rename is left.
    PartialComplete,
    /// Partial file holds the first `k` bytes.
    Resume(u64),
    /// Nothing usable on disk.
    Fresh,
}

/// Inspects the final and partial files for an item of `expected` bytes.
///
/// Idempotent except for one repair: a partial file larger than `expected`
/// cannot belong to this resource and is truncated to zero.
pub fn stat_expected_size(final_path: &Path, expected: u64) -> io::Result<ResumeState> {
    if let Some(len) = file_len(final_path)? {
        if len == expected {
            return Ok(ResumeState::Complete);
        }
    }
    let partial = partial_path(final_path);
    match file_len(&partial)? {
        Some(len) if len == expected => Ok(ResumeState::PartialComplete),
        Some(0) | None => Ok(ResumeState::Fresh),
        Some(len) if len < expected => Ok(ResumeState::Resume(len)),
        Some(len) => {
            tracing::warn!(
                path = %partial.display(),
                len,
                expected,
                "partial file larger than expected size, restarting"
            );
            fs::OpenOptions::new().write(true).open(&partial)?.set_len(0)?;
            Ok(ResumeState::Fresh)
        }
    }
}

fn file_len(path: &Path) -> io::Result<Option<u64>> {
    match fs::metadata(path) {
        Ok(m) if m.is_file() => Ok(Some(m.len())),
        Ok(_) => Ok(None),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_path_appends_suffix() {
        let p = partial_path(Path::new("0.flv"));
        assert_eq!(p.to_string_lossy(), "0.flv.downloading");
        let p2 = partial_path(Path::new("/tmp/show/1.mp4"));
        assert_eq!(p2.to_string_lossy(), "/tmp/show/1.mp4.downloading");
    }

    #[test]
    fn stat_fresh_when_nothing_exists() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.flv");
        assert_eq!(stat_expected_size(&f, 100).unwrap(), ResumeState::Fresh);
    }

    #[test]
    fn stat_complete_final_file() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.flv");
        fs::write(&f, vec![1u8; 100]).unwrap();
        assert_eq!(stat_expected_size(&f, 100).unwrap(), ResumeState::Complete);
        // Wrong size on the final file is not trusted.
        assert_eq!(stat_expected_size(&f, 101).unwrap(), ResumeState::Fresh);
    }

    #[test]
    fn stat_partial_states() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.flv");
        let p = partial_path(&f);
        fs::write(&p, vec![1u8; 40]).unwrap();
        assert_eq!(stat_expected_size(&f, 100).unwrap(), ResumeState::Resume(40));
        assert_eq!(stat_expected_size(&f, 40).unwrap(), ResumeState::PartialComplete);
    }

    #[test]
    fn stat_oversized_partial_restarts() {
        let dir = tempfile::tempdir().unwrap();
        let f = dir.path().join("a.flv");
        let p = partial_path(&f);
        fs::write(&p, vec![1u8; 150]).unwrap();
        assert_eq!(stat_expected_size(&f, 100).unwrap(), ResumeState::Fresh);
        assert_eq!(fs::metadata(&p).unwrap().len(), 0);
    }
}
