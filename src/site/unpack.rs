//! Unpacking of uploaded zip archives.
//!
//! A `.zip` part of an upload is kept as a file of the site and its contents
//! are added next to it, with the folder shared by all archive entries
//! removed. Uploading `site.zip` holding `site/index.html` therefore serves
//! `index.html` at the site root.

use std::collections::HashSet;
use std::io::{Cursor, Read};

use tracing::{debug, warn};
use zip::ZipArchive;

use super::IncomingFile;
use crate::admission::{extension_of, ExtensionPolicy};
use crate::paths::{canonical_path, trim_common_dir_prefix, trim_slash_prefix};
use crate::Result;

/// Upper bound on the bytes unpacked from one archive.
pub const UNPACK_SIZE_LIMIT: u64 = 256 * 1024 * 1024;

/// Whether `path` names a zip archive.
pub fn is_zip_file(path: &str) -> bool {
    let name = path.rsplit('/').next().unwrap_or_default();
    extension_of(name).as_deref() == Some("zip")
}

/// Read the files of a zip archive.
///
/// Directory entries, entries whose path leaves the archive root and files
/// refused by `extensions` are skipped. Entries that cannot be read, or that
/// would take the archive past [`UNPACK_SIZE_LIMIT`], are skipped with a
/// warning. Fails only when `data` is not a readable archive.
pub fn unpack_zip(data: &[u8], extensions: &ExtensionPolicy) -> Result<Vec<IncomingFile>> {
    let mut archive = ZipArchive::new(Cursor::new(data))?;

    let mut selected = Vec::new();
    for index in 0..archive.len() {
        let entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable zip entry {}: {}", index, e);
                continue;
            }
        };
        if entry.is_dir() {
            continue;
        }
        if entry.enclosed_name().is_none() {
            warn!("skipping zip entry with unsafe path '{}'", entry.name());
            continue;
        }
        let path = canonical_path(entry.name());
        let name = path.rsplit('/').next().unwrap_or_default();
        if !extensions.permits(name) {
            debug!("skipping blocked zip entry '{}'", path);
            continue;
        }
        selected.push((index, path));
    }

    let mut paths: Vec<String> = selected.iter().map(|(_, p)| p.clone()).collect();
    trim_slash_prefix(&mut paths);
    trim_common_dir_prefix(&mut paths);

    let mut files = Vec::with_capacity(selected.len());
    let mut unpacked = 0u64;
    for ((index, original), path) in selected.into_iter().zip(paths) {
        let mut entry = match archive.by_index(index) {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping zip entry '{}': {}", original, e);
                continue;
            }
        };
        let remaining = UNPACK_SIZE_LIMIT - unpacked;
        if entry.size() > remaining {
            warn!("skipping zip entry '{}': unpack size limit reached", original);
            continue;
        }

        let mut data = Vec::with_capacity(entry.size() as usize);
        // the declared size is not trusted
        if let Err(e) = (&mut entry).take(remaining + 1).read_to_end(&mut data) {
            warn!("skipping zip entry '{}': {}", original, e);
            continue;
        }
        if data.len() as u64 > remaining {
            warn!("skipping zip entry '{}': unpack size limit reached", original);
            continue;
        }

        unpacked += data.len() as u64;
        files.push(IncomingFile { path, data });
    }

    Ok(files)
}

/// Add the contents of every zip archive among `files` to the upload.
///
/// Archives stay in the list. Unpacked files never replace a file that is
/// already present, and an archive that cannot be opened is kept as a plain
/// file.
pub fn unpack_archives(files: Vec<IncomingFile>, extensions: &ExtensionPolicy) -> Vec<IncomingFile> {
    let mut seen: HashSet<String> = files.iter().map(|f| f.path.clone()).collect();
    let mut unpacked = Vec::new();

    for archive in files.iter().filter(|f| is_zip_file(&f.path)) {
        let contents = match unpack_zip(&archive.data, extensions) {
            Ok(contents) => contents,
            Err(e) => {
                warn!("failed to unpack '{}': {}", archive.path, e);
                continue;
            }
        };
        debug!("unpacked {} files from '{}'", contents.len(), archive.path);
        for file in contents {
            if file.path.is_empty() || !seen.insert(file.path.clone()) {
                debug!("skipping unpacked '{}': path already taken", file.path);
                continue;
            }
            unpacked.push(file);
        }
    }

    let mut files = files;
    files.extend(unpacked);
    files
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use zip::write::SimpleFileOptions;
    use zip::ZipWriter;

    fn build_zip(entries: &[(&str, &str)]) -> Vec<u8> {
        let mut zip = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default();
        for (name, content) in entries {
            if name.ends_with('/') {
                zip.add_directory(*name, options).unwrap();
            } else {
                zip.start_file(*name, options).unwrap();
                zip.write_all(content.as_bytes()).unwrap();
            }
        }
        zip.finish().unwrap().into_inner()
    }

    fn paths(files: &[IncomingFile]) -> Vec<&str> {
        files.iter().map(|f| f.path.as_str()).collect()
    }

    fn policy() -> ExtensionPolicy {
        ExtensionPolicy::deny(["exe"])
    }

    #[test]
    fn test_is_zip_file() {
        assert!(is_zip_file("site.zip"));
        assert!(is_zip_file("dir/Site.ZIP"));
        assert!(!is_zip_file("zip"));
        assert!(!is_zip_file("archive.tar.gz"));
    }

    #[test]
    fn test_unpack_trims_common_folder() {
        let data = build_zip(&[
            ("www/", ""),
            ("www/index.html", "<h1>hi</h1>"),
            ("www/css/site.css", "body{}"),
        ]);

        let files = unpack_zip(&data, &policy()).unwrap();

        assert_eq!(paths(&files), vec!["index.html", "css/site.css"]);
        assert_eq!(files[0].data, b"<h1>hi</h1>");
    }

    #[test]
    fn test_unpack_skips_blocked_and_unsafe_entries() {
        let data = build_zip(&[
            ("a.txt", "a"),
            ("setup.exe", "MZ"),
            ("../escape.txt", "x"),
        ]);

        let files = unpack_zip(&data, &policy()).unwrap();

        assert_eq!(paths(&files), vec!["a.txt"]);
    }

    #[test]
    fn test_unpack_invalid_archive() {
        let result = unpack_zip(b"not a zip", &policy());
        assert!(result.is_err());
    }

    #[test]
    fn test_unpack_archives_keeps_archive_and_existing_files() {
        let archive = build_zip(&[("pkg/readme.txt", "from zip"), ("pkg/new.txt", "new")]);
        let files = vec![
            IncomingFile {
                path: "bundle.zip".to_string(),
                data: archive,
            },
            IncomingFile {
                path: "readme.txt".to_string(),
                data: b"uploaded".to_vec(),
            },
        ];

        let files = unpack_archives(files, &policy());

        assert_eq!(paths(&files), vec!["bundle.zip", "readme.txt", "new.txt"]);
        assert_eq!(files[1].data, b"uploaded");
    }

    #[test]
    fn test_unpack_archives_broken_zip_kept_as_file() {
        let files = vec![IncomingFile {
            path: "broken.zip".to_string(),
            data: b"nope".to_vec(),
        }];

        let files = unpack_archives(files, &policy());

        assert_eq!(paths(&files), vec!["broken.zip"]);
    }
}
