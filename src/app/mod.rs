//! Source-tree snapshot and environment abstractions.

mod environment;
mod fs;

pub use environment::{Environment, CONFIG_VARIABLE_PREFIX};
pub use fs::{FileSystem, FileType, FsEntry, MockFileSystem, RealFileSystem};

use anyhow::{Context, Result};
use glob::{MatchOptions, Pattern};
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::Arc;

/// A snapshot of an application source directory.
///
/// All paths are relative to the app root; every operation is idempotent and
/// side-effect free.
#[derive(Clone)]
pub struct App {
    fs: Arc<dyn FileSystem>,
    entries: Arc<Vec<FsEntry>>,
}

impl App {
    /// Snapshot a real directory.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_fs(Arc::new(RealFileSystem::new(path.as_ref().to_path_buf())?))
    }

    /// Wrap an arbitrary filesystem backend (in-memory trees in tests).
    pub fn from_fs(fs: Arc<dyn FileSystem>) -> Result<Self> {
        let entries = fs.walk()?;
        Ok(Self {
            fs,
            entries: Arc::new(entries),
        })
    }

    /// Whether any file or directory matches the glob pattern.
    pub fn has_match(&self, pattern: &str) -> bool {
        if self.entries.iter().any(|e| e.path == pattern) {
            return true;
        }

        let Ok(compiled) = Pattern::new(pattern) else {
            return false;
        };
        self.entries
            .iter()
            .any(|e| compiled.matches_with(&e.path, glob_options()))
    }

    pub fn read_file(&self, name: &str) -> Result<String> {
        self.fs.read_to_string(name)
    }

    pub fn read_json<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let contents = self.read_file(name)?;
        serde_json::from_str(&contents).with_context(|| format!("failed to parse JSON in {name}"))
    }

    pub fn read_yaml<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let contents = self.read_file(name)?;
        serde_yaml::from_str(&contents).with_context(|| format!("failed to parse YAML in {name}"))
    }

    pub fn read_toml<T: DeserializeOwned>(&self, name: &str) -> Result<T> {
        let contents = self.read_file(name)?;
        toml::from_str(&contents).with_context(|| format!("failed to parse TOML in {name}"))
    }

    /// All files matching the glob pattern, sorted.
    pub fn find_files(&self, pattern: &str) -> Result<Vec<String>> {
        self.find(pattern, FileType::File)
    }

    /// All directories matching the glob pattern, sorted.
    pub fn find_directories(&self, pattern: &str) -> Result<Vec<String>> {
        self.find(pattern, FileType::Directory)
    }

    fn find(&self, pattern: &str, file_type: FileType) -> Result<Vec<String>> {
        let compiled =
            Pattern::new(pattern).with_context(|| format!("invalid glob pattern `{pattern}`"))?;

        Ok(self
            .entries
            .iter()
            .filter(|e| e.file_type == file_type)
            .filter(|e| e.path == pattern || compiled.matches_with(&e.path, glob_options()))
            .map(|e| e.path.clone())
            .collect())
    }
}

fn glob_options() -> MatchOptions {
    MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    }
}
