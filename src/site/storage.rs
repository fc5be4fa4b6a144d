//! On-disk storage for uploaded sites.
//!
//! Every site gets its own directory and keeps the relative paths it was
//! uploaded with:
//! ```text
//! {base_path}/
//! ├── 3f9a0c1e/
//! │   ├── index.html
//! │   └── img/logo.png
//! └── 7b21d4aa/
//!     └── notes.txt
//! ```

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};

use crate::{DroploadError, Result};

/// Storage for site files.
#[derive(Debug, Clone)]
pub struct SiteStorage {
    /// Base directory for all sites.
    base_path: PathBuf,
}

impl SiteStorage {
    /// Create a new SiteStorage with the given base path.
    ///
    /// The base directory will be created if it doesn't exist.
    pub fn new(base_path: impl Into<PathBuf>) -> Result<Self> {
        let base_path = base_path.into();
        fs::create_dir_all(&base_path)?;

        Ok(Self { base_path })
    }

    /// Get the base path of this storage.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Directory holding one site's files.
    pub fn site_dir(&self, site: &str) -> PathBuf {
        self.base_path.join(site)
    }

    /// Resolve a site-relative path, refusing anything that would leave the
    /// site directory.
    pub fn file_path(&self, site: &str, path: &str) -> Result<PathBuf> {
        let relative = Path::new(path);
        let safe = !path.is_empty()
            && relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)));
        if !safe || site.is_empty() || site.contains(['/', '\\', '.']) {
            return Err(DroploadError::Validation(format!("invalid path: {site}/{path}")));
        }
        Ok(self.site_dir(site).join(relative))
    }

    /// Save one file of a site.
    pub fn save(&self, site: &str, path: &str, content: &[u8]) -> Result<()> {
        let file_path = self.file_path(site, path)?;

        if let Some(parent) = file_path.parent() {
            fs::create_dir_all(parent)?;
        }

        fs::write(&file_path, content)?;

        Ok(())
    }

    /// Load one file of a site.
    pub fn load(&self, site: &str, path: &str) -> Result<Vec<u8>> {
        let file_path = self.file_path(site, path)?;

        match fs::read(&file_path) {
            Ok(content) => Ok(content),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                Err(DroploadError::NotFound(format!("File: {site}/{path}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Check if a site file exists.
    pub fn exists(&self, site: &str, path: &str) -> bool {
        self.file_path(site, path)
            .map(|p| p.is_file())
            .unwrap_or(false)
    }

    /// Remove a site and all its files.
    ///
    /// Returns `false` if the site didn't exist.
    pub fn delete_site(&self, site: &str) -> Result<bool> {
        if site.is_empty() || site.contains(['/', '\\', '.']) {
            return Err(DroploadError::Validation(format!("invalid site name: {site}")));
        }
        match fs::remove_dir_all(self.site_dir(site)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup_storage() -> (TempDir, SiteStorage) {
        let temp_dir = TempDir::new().unwrap();
        let storage = SiteStorage::new(temp_dir.path()).unwrap();
        (temp_dir, storage)
    }

    #[test]
    fn test_new_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let storage_path = temp_dir.path().join("sites");

        assert!(!storage_path.exists());

        let storage = SiteStorage::new(&storage_path).unwrap();

        assert!(storage_path.exists());
        assert_eq!(storage.base_path(), storage_path);
    }

    #[test]
    fn test_save_and_load_nested() {
        let (_temp_dir, storage) = setup_storage();

        storage.save("abcd1234", "img/logo.png", b"png").unwrap();

        assert!(storage.exists("abcd1234", "img/logo.png"));
        assert_eq!(storage.load("abcd1234", "img/logo.png").unwrap(), b"png");
        assert!(storage.site_dir("abcd1234").join("img").is_dir());
    }

    #[test]
    fn test_load_not_found() {
        let (_temp_dir, storage) = setup_storage();

        let result = storage.load("abcd1234", "missing.txt");

        assert!(matches!(result, Err(DroploadError::NotFound(_))));
    }

    #[test]
    fn test_rejects_escaping_paths() {
        let (_temp_dir, storage) = setup_storage();

        for path in ["../secret", "/etc/passwd", "a/../../b", ""] {
            assert!(
                matches!(
                    storage.save("abcd1234", path, b"x"),
                    Err(DroploadError::Validation(_))
                ),
                "{path} should be rejected"
            );
        }
        assert!(storage.file_path("..", "a.txt").is_err());
        assert!(!storage.exists("abcd1234", "../secret"));
    }

    #[test]
    fn test_delete_site() {
        let (_temp_dir, storage) = setup_storage();
        storage.save("abcd1234", "a.txt", b"a").unwrap();

        assert!(storage.delete_site("abcd1234").unwrap());
        assert!(!storage.exists("abcd1234", "a.txt"));
        assert!(!storage.delete_site("abcd1234").unwrap());
    }

    #[test]
    fn test_binary_content() {
        let (_temp_dir, storage) = setup_storage();
        let content: Vec<u8> = (0..=255).collect();

        storage.save("abcd1234", "binary.bin", &content).unwrap();

        assert_eq!(storage.load("abcd1234", "binary.bin").unwrap(), content);
    }

    #[test]
    fn test_unicode_path() {
        let (_temp_dir, storage) = setup_storage();

        storage.save("abcd1234", "日本語/ファイル.txt", b"data").unwrap();

        assert!(storage.exists("abcd1234", "日本語/ファイル.txt"));
    }
}
