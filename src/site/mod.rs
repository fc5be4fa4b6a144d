//! Hosted sites created from uploads.
//!
//! Each successful upload becomes a [`Site`]: a random short name, the files
//! it holds and where they are stored. Sites are kept in a [`SiteRegistry`]
//! for the lifetime of the server process. Uploaded zip archives are
//! unpacked into the site they arrive with.

mod storage;
mod unpack;

use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::admission::ExtensionPolicy;
use crate::paths::{canonical_path, trim_common_dir_prefix, trim_slash_prefix};

pub use storage::SiteStorage;
pub use unpack::{is_zip_file, unpack_archives, unpack_zip, UNPACK_SIZE_LIMIT};

/// Length of generated site names.
pub const SITE_NAME_LEN: usize = 8;

/// Generate a random site name.
pub fn generate_site_name() -> String {
    let mut name = Uuid::new_v4().simple().to_string();
    name.truncate(SITE_NAME_LEN);
    name
}

/// One file of a site.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SiteFile {
    /// Path relative to the site root.
    pub path: String,
    /// Size in bytes.
    pub size: u64,
}

/// An uploaded site.
#[derive(Debug, Clone, Serialize)]
pub struct Site {
    pub name: String,
    pub files: Vec<SiteFile>,
    pub total_size: u64,
    pub created_at: DateTime<Utc>,
}

impl Site {
    /// Create a site record for stored files.
    pub fn new(name: impl Into<String>, files: Vec<SiteFile>) -> Self {
        let total_size = files.iter().map(|f| f.size).sum();
        Self {
            name: name.into(),
            files,
            total_size,
            created_at: Utc::now(),
        }
    }

    /// Whether the site has a file at `path`.
    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f.path == path)
    }

    /// Path part of the site's public URI.
    ///
    /// A single-file site links straight to its file; otherwise the link
    /// points at the site root.
    pub fn uri_path(&self) -> String {
        match self.files.as_slice() {
            [only] => format!("/p/{}/{}", self.name, only.path),
            _ => format!("/p/{}/", self.name),
        }
    }
}

/// A file received by the upload endpoint, before it is stored.
#[derive(Debug, Clone)]
pub struct IncomingFile {
    /// Path as named by the uploader.
    pub path: String,
    pub data: Vec<u8>,
}

/// Turn received files into the files of a new site.
///
/// Paths are canonicalized, files refused by `extensions` are dropped,
/// repeated paths keep their first occurrence and the directory shared by
/// all files is removed so a dropped folder is hosted at the site root.
pub fn prepare_files(files: Vec<IncomingFile>, extensions: &ExtensionPolicy) -> Vec<IncomingFile> {
    let mut seen = HashSet::new();
    let mut kept: Vec<IncomingFile> = files
        .into_iter()
        .map(|f| IncomingFile {
            path: canonical_path(&f.path),
            data: f.data,
        })
        .filter(|f| {
            let name = f.path.rsplit('/').next().unwrap_or_default();
            let allowed = extensions.permits(name);
            if !allowed {
                tracing::debug!("skipping blocked file '{}'", f.path);
            }
            allowed
        })
        .filter(|f| !f.path.is_empty() && seen.insert(f.path.clone()))
        .collect();

    let mut paths: Vec<String> = kept.iter().map(|f| f.path.clone()).collect();
    trim_slash_prefix(&mut paths);
    trim_common_dir_prefix(&mut paths);
    for (file, path) in kept.iter_mut().zip(paths) {
        file.path = path;
    }
    kept
}

/// Sites known to the running server.
#[derive(Debug, Default)]
pub struct SiteRegistry {
    sites: RwLock<HashMap<String, Site>>,
}

impl SiteRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a site, replacing any previous site with the same name.
    pub async fn insert(&self, site: Site) {
        self.sites.write().await.insert(site.name.clone(), site);
    }

    /// Look up a site by name.
    pub async fn get(&self, name: &str) -> Option<Site> {
        self.sites.read().await.get(name).cloned()
    }

    /// All sites, oldest first.
    pub async fn list(&self) -> Vec<Site> {
        let mut sites: Vec<Site> = self.sites.read().await.values().cloned().collect();
        sites.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.name.cmp(&b.name)));
        sites
    }

    /// Number of sites.
    pub async fn len(&self) -> usize {
        self.sites.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sites.read().await.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn incoming(path: &str, data: &[u8]) -> IncomingFile {
        IncomingFile {
            path: path.to_string(),
            data: data.to_vec(),
        }
    }

    fn paths(files: &[IncomingFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    #[test]
    fn test_generate_site_name() {
        let a = generate_site_name();
        let b = generate_site_name();
        assert_eq!(a.len(), SITE_NAME_LEN);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_uri_path() {
        let single = Site::new(
            "abcd1234",
            vec![SiteFile {
                path: "notes.txt".to_string(),
                size: 3,
            }],
        );
        assert_eq!(single.uri_path(), "/p/abcd1234/notes.txt");

        let multi = Site::new(
            "abcd1234",
            vec![
                SiteFile {
                    path: "a.txt".to_string(),
                    size: 1,
                },
                SiteFile {
                    path: "b.txt".to_string(),
                    size: 2,
                },
            ],
        );
        assert_eq!(multi.uri_path(), "/p/abcd1234/");
        assert_eq!(multi.total_size, 3);
        assert!(multi.contains("b.txt"));
        assert!(!multi.contains("c.txt"));
    }

    #[test]
    fn test_prepare_trims_common_folder() {
        let files = vec![
            incoming("folder/index.html", b"<html>"),
            incoming("folder/img/logo.png", b"png"),
        ];
        let prepared = prepare_files(files, &ExtensionPolicy::deny(["exe"]));
        assert_eq!(paths(&prepared), vec!["index.html", "img/logo.png"]);
    }

    #[test]
    fn test_prepare_canonicalizes_windows_paths() {
        let files = vec![incoming("\\docs\\a.txt", b"a"), incoming("/docs/b.txt", b"b")];
        let prepared = prepare_files(files, &ExtensionPolicy::deny(["exe"]));
        assert_eq!(paths(&prepared), vec!["a.txt", "b.txt"]);
    }

    #[test]
    fn test_prepare_skips_blocked_and_duplicates() {
        let files = vec![
            incoming("site/a.txt", b"first"),
            incoming("site/setup.EXE", b"mz"),
            incoming("site/a.txt", b"second"),
            incoming("site/b.txt", b"b"),
        ];
        let prepared = prepare_files(files, &ExtensionPolicy::deny(["exe"]));
        assert_eq!(paths(&prepared), vec!["a.txt", "b.txt"]);
        assert_eq!(prepared[0].data, b"first");
    }

    #[test]
    fn test_prepare_single_file_keeps_path() {
        let prepared = prepare_files(
            vec![incoming("folder/only.txt", b"x")],
            &ExtensionPolicy::deny(["exe"]),
        );
        assert_eq!(paths(&prepared), vec!["folder/only.txt"]);
    }

    #[tokio::test]
    async fn test_registry() {
        let registry = SiteRegistry::new();
        assert!(registry.is_empty().await);

        registry.insert(Site::new("aaaa0000", Vec::new())).await;
        registry.insert(Site::new("bbbb1111", Vec::new())).await;

        assert_eq!(registry.len().await, 2);
        assert!(registry.get("aaaa0000").await.is_some());
        assert!(registry.get("cccc2222").await.is_none());
        let names: Vec<String> = registry.list().await.into_iter().map(|s| s.name).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&"bbbb1111".to_string()));
    }
}
