//! Filesystem backends for the app snapshot.

use anyhow::{anyhow, Context, Result};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    File,
    Directory,
}

/// A single entry in the source tree, with a `/`-separated path relative to
/// the app root.
#[derive(Debug, Clone)]
pub struct FsEntry {
    pub path: String,
    pub file_type: FileType,
}

/// Abstraction over the source tree for testability. Implementations are
/// read-only snapshots: `walk` and `read_to_string` are idempotent.
pub trait FileSystem: Send + Sync {
    /// All entries in the tree, relative paths, files and directories.
    fn walk(&self) -> Result<Vec<FsEntry>>;

    /// Read a file's contents by relative path.
    fn read_to_string(&self, path: &str) -> Result<String>;
}

/// Real directory-backed filesystem.
pub struct RealFileSystem {
    root: PathBuf,
}

impl RealFileSystem {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        if !root.is_dir() {
            return Err(anyhow!("app directory not found: {}", root.display()));
        }
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn relative(&self, path: &Path) -> Option<String> {
        let rel = path.strip_prefix(&self.root).ok()?;
        let s = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        if s.is_empty() {
            None
        } else {
            Some(s)
        }
    }
}

impl FileSystem for RealFileSystem {
    fn walk(&self) -> Result<Vec<FsEntry>> {
        let mut entries = Vec::new();

        for entry in WalkDir::new(&self.root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| e.file_name() != ".git")
        {
            let entry = entry.with_context(|| {
                format!("failed to walk app directory {}", self.root.display())
            })?;

            let Some(path) = self.relative(entry.path()) else {
                continue;
            };

            let file_type = if entry.file_type().is_dir() {
                FileType::Directory
            } else {
                FileType::File
            };

            entries.push(FsEntry { path, file_type });
        }

        entries.sort_by(|a, b| a.path.cmp(&b.path));
        Ok(entries)
    }

    fn read_to_string(&self, path: &str) -> Result<String> {
        let full = self.root.join(path);
        std::fs::read_to_string(&full)
            .with_context(|| format!("failed to read file {}", full.display()))
    }
}

/// In-memory filesystem for tests. Parent directories are created
/// implicitly, mirroring how a real tree would look.
#[derive(Default)]
pub struct MockFileSystem {
    entries: BTreeMap<String, Option<String>>,
}

impl MockFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: impl Into<String>, content: impl Into<String>) {
        let path = path.into();
        self.ensure_parents(&path);
        self.entries.insert(path, Some(content.into()));
    }

    pub fn add_dir(&mut self, path: impl Into<String>) {
        let path = path.into();
        self.ensure_parents(&path);
        self.entries.insert(path, None);
    }

    fn ensure_parents(&mut self, path: &str) {
        let components: Vec<&str> = path.split('/').collect();
        let mut current = String::new();
        for component in &components[..components.len().saturating_sub(1)] {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(component);
            self.entries.entry(current.clone()).or_insert(None);
        }
    }
}

impl FileSystem for MockFileSystem {
    fn walk(&self) -> Result<Vec<FsEntry>> {
        Ok(self
            .entries
            .iter()
            .map(|(path, content)| FsEntry {
                path: path.clone(),
                file_type: if content.is_some() {
                    FileType::File
                } else {
                    FileType::Directory
                },
            })
            .collect())
    }

    fn read_to_string(&self, path: &str) -> Result<String> {
        match self.entries.get(path) {
            Some(Some(content)) => Ok(content.clone()),
            Some(None) => Err(anyhow!("not a file: {path}")),
            None => Err(anyhow!("file not found: {path}")),
        }
    }
}
