use std::path::{Path, PathBuf};

use thiserror::Error;
use walkdir::{DirEntry, WalkDir};

#[derive(Debug, Error)]
pub enum ScanError {
    #[error("path not found: {0}")]
    RootNotFound(PathBuf),
    #[error("not a directory: {0}")]
    NotADirectory(PathBuf),
}

/// Decides which paths under the watched root are MIDI files worth
/// processing. Shared by the startup sweep and live notifications.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanFilter {
    ignore_filename_contains: Vec<String>,
    ignore_folders: Vec<String>,
}

impl ScanFilter {
    pub fn new(ignore_filename_contains: &[String], ignore_folders: &[String]) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            ignore_filename_contains: lower(ignore_filename_contains),
            ignore_folders: lower(ignore_folders),
        }
    }

    pub fn is_midi_name(name: &str) -> bool {
        let name = name.to_lowercase();
        name.ends_with(".mid") || name.ends_with(".midi")
    }

    fn ignores_folder(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.ignore_folders.iter().any(|folder| *folder == name)
    }

    fn ignores_file(&self, name: &str) -> bool {
        let name = name.to_lowercase();
        self.ignore_filename_contains
            .iter()
            .any(|pattern| name.contains(pattern.as_str()))
    }

    /// Whether a notification for `path` (somewhere below `root`) should be
    /// acted on.
    pub fn accepts(&self, root: &Path, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|n| n.to_string_lossy()) else {
            return false;
        };
        if !Self::is_midi_name(&name) || self.ignores_file(&name) {
            return false;
        }
        let relative = path.strip_prefix(root).unwrap_or(path);
        relative
            .parent()
            .into_iter()
            .flat_map(Path::components)
            .all(|c| !self.ignores_folder(&c.as_os_str().to_string_lossy()))
    }

    fn descend(&self, entry: &DirEntry) -> bool {
        entry.depth() == 0
            || !entry.file_type().is_dir()
            || !self.ignores_folder(&entry.file_name().to_string_lossy())
    }

    /// Recursively lists MIDI files under `root`, sorted.
    pub fn scan(&self, root: &Path) -> Result<Vec<PathBuf>, ScanError> {
        if !root.exists() {
            return Err(ScanError::RootNotFound(root.to_path_buf()));
        }
        if !root.is_dir() {
            return Err(ScanError::NotADirectory(root.to_path_buf()));
        }

        let mut files = Vec::new();
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| self.descend(e));
        for entry in walker {
            match entry {
                Ok(entry) => {
                    let wanted = {
                        let name = entry.file_name().to_string_lossy();
                        entry.file_type().is_file()
                            && Self::is_midi_name(&name)
                            && !self.ignores_file(&name)
                    };
                    if wanted {
                        files.push(entry.into_path());
                    }
                }
                Err(e) => tracing::warn!("error accessing entry: {}", e),
            }
        }

        files.sort();
        tracing::debug!("found {} MIDI file(s) under {}", files.len(), root.display());
        Ok(files)
    }
}
