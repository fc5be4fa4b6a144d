//! In-memory drop payloads.
//!
//! Builds entry trees without touching the filesystem, with a configurable
//! listing page size and per-directory failure injection. Used by tests and
//! by embedders that already hold file contents in memory.

use std::collections::HashSet;
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use futures::future::{self, BoxFuture};
use futures::FutureExt;

use super::{DirectoryEntry, DirectoryReader, Entry, FileEntry, FileHandle};
use crate::{DroploadError, Result};

/// A file or directory in an in-memory tree.
#[derive(Debug, Clone)]
pub enum MemoryNode {
    /// A file with its content.
    File { name: String, data: Arc<[u8]> },
    /// A directory with its children, in listing order.
    Directory {
        name: String,
        children: Vec<MemoryNode>,
    },
}

impl MemoryNode {
    /// A file with the given content.
    pub fn file(name: &str, data: impl AsRef<[u8]>) -> Self {
        MemoryNode::File {
            name: name.to_string(),
            data: Arc::from(data.as_ref()),
        }
    }

    /// A zero-filled file of `size` bytes.
    pub fn sized(name: &str, size: usize) -> Self {
        MemoryNode::File {
            name: name.to_string(),
            data: Arc::from(vec![0u8; size]),
        }
    }

    /// A directory.
    pub fn dir(name: &str, children: Vec<MemoryNode>) -> Self {
        MemoryNode::Directory {
            name: name.to_string(),
            children,
        }
    }

    fn into_entry(self, parent: Option<&str>, shared: &Arc<Shared>) -> Entry {
        let join = |name: &str| match parent {
            Some(parent) => format!("{parent}/{name}"),
            None => name.to_string(),
        };
        match self {
            MemoryNode::File { name, data } => Entry::File(Box::new(MemoryFile {
                full_path: join(&name),
                data,
            })),
            MemoryNode::Directory { name, children } => {
                Entry::Directory(Box::new(MemoryDirectory {
                    full_path: join(&name),
                    children: Arc::new(children),
                    shared: shared.clone(),
                }))
            }
        }
    }
}

#[derive(Debug)]
struct Shared {
    page_size: usize,
    failing: HashSet<String>,
    listing_calls: Arc<AtomicUsize>,
}

/// A drop payload held in memory.
#[derive(Debug, Clone)]
pub struct MemoryTree {
    roots: Vec<MemoryNode>,
    page_size: usize,
    failing: HashSet<String>,
    listing_calls: Arc<AtomicUsize>,
}

impl MemoryTree {
    /// Create a tree from its top-level nodes.
    pub fn new(roots: Vec<MemoryNode>) -> Self {
        Self {
            roots,
            page_size: super::DEFAULT_PAGE_SIZE,
            failing: HashSet::new(),
            listing_calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Change how many children each listing page holds.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Make every listing of the directory at `full_path` fail.
    pub fn fail_listing(mut self, full_path: &str) -> Self {
        self.failing.insert(full_path.to_string());
        self
    }

    /// Number of `read_entries` calls made so far on any payload of this
    /// tree.
    pub fn listing_calls(&self) -> usize {
        self.listing_calls.load(Ordering::SeqCst)
    }

    /// Produce a fresh payload of top-level entries.
    pub fn entries(&self) -> Vec<Entry> {
        let shared = Arc::new(Shared {
            page_size: self.page_size,
            failing: self.failing.clone(),
            listing_calls: self.listing_calls.clone(),
        });
        self.roots
            .iter()
            .cloned()
            .map(|node| node.into_entry(None, &shared))
            .collect()
    }
}

struct MemoryFile {
    full_path: String,
    data: Arc<[u8]>,
}

impl FileEntry for MemoryFile {
    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn file(&self) -> BoxFuture<'_, Result<FileHandle>> {
        future::ready(Ok(FileHandle::from_bytes(&self.full_path, self.data.clone()))).boxed()
    }
}

struct MemoryDirectory {
    full_path: String,
    children: Arc<Vec<MemoryNode>>,
    shared: Arc<Shared>,
}

impl DirectoryEntry for MemoryDirectory {
    fn full_path(&self) -> &str {
        &self.full_path
    }

    fn create_reader(&self) -> Box<dyn DirectoryReader> {
        Box::new(MemoryDirectoryReader {
            full_path: self.full_path.clone(),
            children: self.children.clone(),
            offset: 0,
            shared: self.shared.clone(),
        })
    }
}

struct MemoryDirectoryReader {
    full_path: String,
    children: Arc<Vec<MemoryNode>>,
    offset: usize,
    shared: Arc<Shared>,
}

impl MemoryDirectoryReader {
    fn next_page(&mut self) -> Result<Vec<Entry>> {
        self.shared.listing_calls.fetch_add(1, Ordering::SeqCst);
        if self.shared.failing.contains(&self.full_path) {
            return Err(DroploadError::Io(io::Error::new(
                io::ErrorKind::Other,
                "directory listing failed",
            )));
        }

        let end = (self.offset + self.shared.page_size).min(self.children.len());
        let page = self.children[self.offset..end]
            .iter()
            .cloned()
            .map(|node| node.into_entry(Some(self.full_path.as_str()), &self.shared))
            .collect();
        self.offset = end;
        Ok(page)
    }
}

impl DirectoryReader for MemoryDirectoryReader {
    fn read_entries(&mut self) -> BoxFuture<'_, Result<Vec<Entry>>> {
        future::ready(self.next_page()).boxed()
    }
}
