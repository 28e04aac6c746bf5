//! Enumerates ingestible images in a directory.

use std::path::{Path, PathBuf};

/// File extensions accepted for ingestion, compared case-insensitively
pub const IMAGE_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "webp"];

/// A file that passed the extension filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub file_name: String,
    pub path: PathBuf,
}

/// Non-recursive listing of one directory.
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Image files in directory listing order.
    ///
    /// Failing to list the directory is an error; unreadable entries are
    /// skipped.
    pub fn candidates(&self) -> std::io::Result<Vec<Candidate>> {
        let entries = std::fs::read_dir(&self.dir)?;

        Ok(entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let path = entry.path();
                if !path.is_file() || !is_image_file(&path) {
                    return None;
                }
                let file_name = path.file_name()?.to_string_lossy().into_owned();
                Some(Candidate { file_name, path })
            })
            .collect())
    }
}

pub fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            IMAGE_EXTENSIONS
                .iter()
                .any(|allowed| ext.eq_ignore_ascii_case(allowed))
        })
        .unwrap_or(false)
}
