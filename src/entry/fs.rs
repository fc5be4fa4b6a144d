//! Local filesystem entries.
//!
//! Lets paths given on the command line (or by a desktop shell's drop event)
//! go through the same traversal as browser drops. Hidden files and known
//! system files found inside dropped directories are skipped, and so are
//! symlinks found there; paths the user picked explicitly are always kept.

use std::path::{Path, PathBuf};

use futures::future::BoxFuture;
use futures::FutureExt;
use tokio::fs::ReadDir;
use tracing::debug;

use super::{DirectoryEntry, DirectoryReader, Entry, FileEntry, FileHandle};
use crate::{DroploadError, Result};

/// Number of children returned per listing page.
pub const DEFAULT_PAGE_SIZE: usize = 100;

/// System file names that should be filtered out regardless of location.
const SYSTEM_FILES: &[&str] = &[".DS_Store", "Thumbs.db", "desktop.ini"];

/// Directory names that should be skipped during traversal.
const SYSTEM_DIRS: &[&str] = &["__MACOSX"];

/// Returns true if the given file/directory name should be excluded.
fn is_hidden_or_system(name: &str) -> bool {
    name.starts_with('.') || SYSTEM_FILES.contains(&name) || SYSTEM_DIRS.contains(&name)
}

/// A file on disk.
#[derive(Debug, Clone)]
pub struct LocalFile {
    path: PathBuf,
    full_path: String,
}

impl LocalFile {
    /// Create a file entry for `path`, reported as `full_path` in the drop.
    pub fn new(path: impl Into<PathBuf>, full_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            full_path: full_path.into(),
        }
    }
}

impl FileEntry for LocalFile {
    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn file(&self) -> BoxFuture<'_, Result<FileHandle>> {
        async move {
            let metadata = tokio::fs::metadata(&self.path).await?;
            if !metadata.is_file() {
                return Err(DroploadError::Validation(format!(
                    "'{}' is not a regular file",
                    self.path.display()
                )));
            }
            Ok(FileHandle::from_path(
                &self.path,
                &self.full_path,
                metadata.len(),
            ))
        }
        .boxed()
    }
}

/// A directory on disk.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    path: PathBuf,
    full_path: String,
    page_size: usize,
}

impl LocalDirectory {
    /// Create a directory entry for `path`, reported as `full_path` in the drop.
    pub fn new(path: impl Into<PathBuf>, full_path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            full_path: full_path.into(),
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Change how many children each listing page holds.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }
}

impl DirectoryEntry for LocalDirectory {
    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn create_reader(&self) -> Box<dyn DirectoryReader> {
        Box::new(LocalDirectoryReader {
            path: self.path.clone(),
            full_path: self.full_path.clone(),
            page_size: self.page_size,
            read_dir: None,
            done: false,
        })
    }
}

struct LocalDirectoryReader {
    path: PathBuf,
    full_path: String,
    page_size: usize,
    read_dir: Option<ReadDir>,
    done: bool,
}

impl LocalDirectoryReader {
    async fn next_page(&mut self) -> Result<Vec<Entry>> {
        if self.done {
            return Ok(Vec::new());
        }
        if self.read_dir.is_none() {
            self.read_dir = Some(tokio::fs::read_dir(&self.path).await?);
        }
        let Some(read_dir) = self.read_dir.as_mut() else {
            return Ok(Vec::new());
        };

        let mut page = Vec::new();
        while page.len() < self.page_size {
            let Some(child) = read_dir.next_entry().await? else {
                self.done = true;
                break;
            };
            let name = child.file_name().to_string_lossy().to_string();
            if is_hidden_or_system(&name) {
                continue;
            }

            let child_path = child.path();
            let full_path = format!("{}/{}", self.full_path, name);
            // does not follow symlinks
            let file_type = child.file_type().await?;
            if file_type.is_symlink() {
                debug!("skipping symlink '{}'", full_path);
                continue;
            }
            if file_type.is_dir() {
                page.push(Entry::Directory(Box::new(
                    LocalDirectory::new(child_path, full_path).with_page_size(self.page_size),
                )));
            } else if file_type.is_file() {
                page.push(Entry::File(Box::new(LocalFile::new(child_path, full_path))));
            }
        }

        if self.done {
            self.read_dir = None;
        }
        Ok(page)
    }
}

impl DirectoryReader for LocalDirectoryReader {
    fn read_entries(&mut self) -> BoxFuture<'_, Result<Vec<Entry>>> {
        self.next_page().boxed()
    }
}

/// Turn one user-picked path into a top-level entry.
pub async fn entry_from_path(path: &Path) -> Result<Entry> {
    let metadata = match tokio::fs::metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DroploadError::NotFound(format!("'{}'", path.display())));
        }
        Err(e) => return Err(e.into()),
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .ok_or_else(|| DroploadError::Validation(format!("'{}' has no name", path.display())))?;

    if metadata.is_dir() {
        Ok(Entry::Directory(Box::new(LocalDirectory::new(path, name))))
    } else {
        Ok(Entry::File(Box::new(LocalFile::new(path, name))))
    }
}

/// Turn user-picked paths into top-level entries, keeping their order.
pub async fn entries_from_paths<P: AsRef<Path>>(paths: &[P]) -> Result<Vec<Entry>> {
    let mut entries = Vec::with_capacity(paths.len());
    for path in paths {
        entries.push(entry_from_path(path.as_ref()).await?);
    }
    Ok(entries)
}
