//! On-disk layout of a session's segments and merged output.

use std::path::{Path, PathBuf};

use crate::merge::ContainerKind;

/// Name used when sanitising leaves nothing.
const FALLBACK_NAME: &str = "output";

/// NAME_MAX minus room for `.mp4.downloading`.
const MAX_NAME_BYTES: usize = 255 - 16;

/// Removes characters that are unsafe in file names (and dots, so the name
/// cannot carry its own extension).
pub fn sanitize_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .filter(|c| {
            !c.is_control()
                && !matches!(c, ':' | '\\' | '/' | '*' | '?' | '"' | '<' | '>' | '|' | '.')
        })
        .collect();
    let mut cleaned = cleaned.trim();
    if cleaned.len() > MAX_NAME_BYTES {
        let mut end = MAX_NAME_BYTES;
        while !cleaned.is_char_boundary(end) {
            end -= 1;
        }
        cleaned = cleaned[..end].trim_end();
    }
    if cleaned.is_empty() {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// Where a session writes its segments and its merged output.
///
/// Single-item sessions write `<dest>/<name>.<ext>`; multi-item sessions use a
/// work directory `<dest>/download/<name>/<index>.<ext>`. The merged output is
/// always `<dest>/<name>.mp4`.
#[derive(Debug, Clone)]
pub(crate) struct SessionLayout {
    dest: PathBuf,
    name: String,
    multi: bool,
}

impl SessionLayout {
    pub(crate) fn new(dest: &Path, name: &str, item_count: usize) -> Self {
        Self {
            dest: dest.to_path_buf(),
            name: sanitize_name(name),
            multi: item_count > 1,
        }
    }

    pub(crate) fn work_dir(&self) -> Option<PathBuf> {
        self.multi
            .then(|| self.dest.join("download").join(&self.name))
    }

    /// Directory that must exist before the first segment is written.
    pub(crate) fn segment_dir(&self) -> PathBuf {
        self.work_dir().unwrap_or_else(|| self.dest.clone())
    }

    pub(crate) fn segment_path(&self, index: usize, container: ContainerKind) -> PathBuf {
        match self.work_dir() {
            Some(dir) => dir.join(format!("{}.{}", index, container.extension())),
            None => self
                .dest
                .join(format!("{}.{}", self.name, container.extension())),
        }
    }

    pub(crate) fn merged_path(&self) -> PathBuf {
        self.dest
            .join(format!("{}.{}", self.name, ContainerKind::Mp4.extension()))
    }

    /// A single MP4 segment already is the output.
    pub(crate) fn needs_merge(&self, containers: &[ContainerKind]) -> bool {
        !matches!(containers, [ContainerKind::Mp4])
    }
}
