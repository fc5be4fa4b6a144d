//! Dropped entries and their traversal.
//!
//! A drop (or a file picker selection) hands over a list of top-level
//! entries, each either a file or a directory. Directories are listed page by
//! page: a single listing call is not guaranteed to return every child, so
//! readers are polled until they return an empty page.
//!
//! [`collect_files`] flattens such a payload into [`FileHandle`]s in
//! breadth-first order, keeping each file's path relative to the drop.

pub mod fs;
pub mod memory;

use std::collections::VecDeque;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use futures::future::BoxFuture;
use tracing::debug;

use crate::paths::canonical_path;
use crate::{DroploadError, Result};

pub use fs::{entries_from_paths, entry_from_path, LocalDirectory, LocalFile, DEFAULT_PAGE_SIZE};
pub use memory::{MemoryNode, MemoryTree};

/// Where a file's bytes come from.
#[derive(Clone)]
pub enum FileSource {
    /// A file on the local filesystem, read when the batch is packaged.
    Path(PathBuf),
    /// Bytes already in memory.
    Memory(Arc<[u8]>),
}

impl fmt::Debug for FileSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileSource::Path(path) => f.debug_tuple("Path").field(path).finish(),
            FileSource::Memory(data) => write!(f, "Memory({} bytes)", data.len()),
        }
    }
}

/// A file collected from a drop, valid for the duration of one submission.
#[derive(Debug, Clone)]
pub struct FileHandle {
    /// Base name of the file.
    pub name: String,
    /// Size in bytes.
    pub size: u64,
    /// Path relative to the drop, e.g. `subdir/nested/file.txt`.
    pub relative_path: String,
    source: FileSource,
}

impl FileHandle {
    /// Create a handle for a file on disk.
    pub fn from_path(path: impl Into<PathBuf>, relative_path: &str, size: u64) -> Self {
        let relative_path = canonical_path(relative_path);
        Self {
            name: base_name(&relative_path).to_string(),
            size,
            relative_path,
            source: FileSource::Path(path.into()),
        }
    }

    /// Create a handle for in-memory content.
    pub fn from_bytes(relative_path: &str, data: impl Into<Arc<[u8]>>) -> Self {
        let data = data.into();
        let relative_path = canonical_path(relative_path);
        Self {
            name: base_name(&relative_path).to_string(),
            size: data.len() as u64,
            relative_path,
            source: FileSource::Memory(data),
        }
    }

    /// Where the content of this file lives.
    pub fn source(&self) -> &FileSource {
        &self.source
    }

    /// Read the whole file.
    pub async fn read(&self) -> Result<Vec<u8>> {
        match &self.source {
            FileSource::Path(path) => Ok(tokio::fs::read(path).await?),
            FileSource::Memory(data) => Ok(data.to_vec()),
        }
    }
}

fn base_name(path: &str) -> &str {
    path.rsplit('/').next().unwrap_or(path)
}

/// A file entry that still has to be turned into a readable [`FileHandle`].
pub trait FileEntry: Send + Sync {
    /// Path of the entry relative to the drop.
    fn full_path(&self) -> &str;

    /// Materialize the entry into a handle.
    fn file(&self) -> BoxFuture<'_, Result<FileHandle>>;
}

/// A directory entry whose children are listed through a [`DirectoryReader`].
pub trait DirectoryEntry: Send + Sync {
    /// Path of the entry relative to the drop.
    fn full_path(&self) -> &str;

    /// Start a new listing of this directory's immediate children.
    fn create_reader(&self) -> Box<dyn DirectoryReader>;
}

/// Paginated listing of one directory.
pub trait DirectoryReader: Send {
    /// Return the next page of children. An empty page means the listing is
    /// exhausted.
    fn read_entries(&mut self) -> BoxFuture<'_, Result<Vec<Entry>>>;
}

/// One item of a drop payload.
pub enum Entry {
    /// A regular file.
    File(Box<dyn FileEntry>),
    /// A directory to expand.
    Directory(Box<dyn DirectoryEntry>),
}

impl Entry {
    /// Path of the entry relative to the drop.
    pub fn full_path(&self) -> &str {
        match self {
            Entry::File(file) => file.full_path(),
            Entry::Directory(dir) => dir.full_path(),
        }
    }

    /// Whether this is a file entry.
    pub fn is_file(&self) -> bool {
        matches!(self, Entry::File(_))
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Entry::File(file) => f.debug_tuple("File").field(&file.full_path()).finish(),
            Entry::Directory(dir) => f.debug_tuple("Directory").field(&dir.full_path()).finish(),
        }
    }
}

fn traversal_error(path: &str, err: DroploadError) -> DroploadError {
    match err {
        DroploadError::Traversal(_) => err,
        other => DroploadError::Traversal(format!("'{path}': {other}")),
    }
}

/// Expand a drop payload into a flat list of files.
///
/// Breadth-first: the queue starts with the top-level entries, a directory's
/// children are appended to the back of the queue once its listing is
/// exhausted. A failing listing or materialization aborts the whole
/// traversal; a partial file list is never returned.
pub async fn collect_files(entries: Vec<Entry>) -> Result<Vec<FileHandle>> {
    let mut queue: VecDeque<Entry> = entries.into();
    let mut files = Vec::new();

    while let Some(entry) = queue.pop_front() {
        match entry {
            Entry::File(file) => {
                let handle = file
                    .file()
                    .await
                    .map_err(|e| traversal_error(file.full_path(), e))?;
                files.push(handle);
            }
            Entry::Directory(dir) => {
                let mut reader = dir.create_reader();
                let mut pages = 0usize;
                let mut children = 0usize;
                loop {
                    let page = reader
                        .read_entries()
                        .await
                        .map_err(|e| traversal_error(dir.full_path(), e))?;
                    if page.is_empty() {
                        break;
                    }
                    pages += 1;
                    children += page.len();
                    queue.extend(page);
                }
                debug!(
                    "listed '{}': {} entries in {} pages",
                    dir.full_path(),
                    children,
                    pages
                );
            }
        }
    }

    debug!("collected {} files", files.len());
    Ok(files)
}
