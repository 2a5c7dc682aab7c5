//! Media Collection
//!
//! Flat index of playable files found under the configured media directories.

use log::{info, warn};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// File extensions omxplayer can play
pub const SUPPORTED_EXTENSIONS: &[&str] = &[
    "mp4", "m4v", "mkv", "mov", "avi", "ts", "mpg", "mpeg", "mp3", "m4a", "flac", "ogg", "wav",
];

/// Indexed media files
#[derive(Debug, Clone, Default)]
pub struct MediaCollection {
    files: Vec<PathBuf>,
}

impl MediaCollection {
    /// Walk every directory recursively and collect supported files.
    ///
    /// Unreadable entries are logged and skipped.
    pub fn index(directories: &[PathBuf]) -> Self {
        let mut files = Vec::new();

        for dir in directories {
            info!("Indexing media collection, dir={}", dir.display());
            for entry in WalkDir::new(dir).follow_links(true).sort_by_file_name() {
                match entry {
                    Ok(entry) if entry.file_type().is_file() && is_supported(entry.path()) => {
                        files.push(entry.into_path());
                    }
                    Ok(_) => {}
                    Err(e) => warn!("Error indexing media directory, dir={}: {}", dir.display(), e),
                }
            }
        }

        info!("Indexing complete, entries={}", files.len());
        Self { files }
    }

    pub fn files(&self) -> &[PathBuf] {
        &self.files
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Log every indexed file
    pub fn log_contents(&self) {
        info!("Media collection:");
        for file in &self.files {
            info!("\t-> {}", file.display());
        }
    }
}

/// Check the extension against the supported list, case-insensitively
pub fn is_supported(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SUPPORTED_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}
