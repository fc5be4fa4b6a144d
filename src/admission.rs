//! Admission policy for collected files.
//!
//! Decides which files of a drop are uploaded:
//!
//! 1. the extension filter (allow-list *or* deny-list, never both),
//! 2. the file count limit, applied to the files that passed step 1 and
//!    rejecting the whole drop when exceeded,
//! 3. the per-file size limit,
//! 4. the aggregate size limit, filled greedily smallest file first.
//!
//! Step 4 maximizes the number of admitted files rather than the number of
//! admitted bytes: one large file loses to many small ones.

use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use crate::config::PolicyConfig;
use crate::entry::FileHandle;
use crate::{DroploadError, Result};

/// Normalize a configured extension: trimmed, lowercase, no leading dot.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim().trim_start_matches('.').to_lowercase()
}

/// Extension of a file name: the part after the last `.`, lowercased.
///
/// `"a.b.PNG"` => `Some("png")`, `"archive"` => `None`.
pub fn extension_of(name: &str) -> Option<String> {
    name.rsplit_once('.').map(|(_, ext)| ext.to_lowercase())
}

/// Which extensions may be uploaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtensionPolicy {
    /// Only these extensions pass; files without an extension fail.
    Allow(BTreeSet<String>),
    /// These extensions fail; files without an extension pass.
    Deny(BTreeSet<String>),
}

impl ExtensionPolicy {
    /// Build an allow-list from extension names.
    pub fn allow<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ExtensionPolicy::Allow(
            extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
        )
    }

    /// Build a deny-list from extension names.
    pub fn deny<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ExtensionPolicy::Deny(
            extensions
                .into_iter()
                .map(|e| normalize_extension(e.as_ref()))
                .collect(),
        )
    }

    /// Whether a file with this name passes the extension filter.
    pub fn permits(&self, name: &str) -> bool {
        let ext = extension_of(name);
        match self {
            ExtensionPolicy::Allow(set) => ext.is_some_and(|e| set.contains(&e)),
            ExtensionPolicy::Deny(set) => !ext.is_some_and(|e| set.contains(&e)),
        }
    }
}

/// Why a file was left out of the upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// The extension filter refused the file.
    DisallowedExtension,
    /// The file alone is larger than the per-file limit.
    ExceedsPerFileSizeLimit,
    /// The file does not fit in what is left of the aggregate limit.
    ExceedsAggregateSizeLimit,
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            RejectReason::DisallowedExtension => "disallowed-extension",
            RejectReason::ExceedsPerFileSizeLimit => "exceeds-per-file-size-limit",
            RejectReason::ExceedsAggregateSizeLimit => "exceeds-aggregate-size-limit",
        };
        f.write_str(s)
    }
}

/// Outcome of the per-file checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdmissionDecision {
    Admit,
    Reject(RejectReason),
}

/// A file that will not be uploaded.
#[derive(Debug, Clone)]
pub struct Rejection {
    pub file: FileHandle,
    pub reason: RejectReason,
}

/// Files selected for one upload.
#[derive(Debug, Clone)]
pub struct UploadBatch {
    /// Admitted files, in traversal order.
    pub admitted: Vec<FileHandle>,
    /// Rejected files with their reasons, in decision order.
    pub rejected: Vec<Rejection>,
    /// Sum of the admitted files' sizes.
    pub total_size: u64,
}

impl UploadBatch {
    /// Number of admitted files.
    pub fn len(&self) -> usize {
        self.admitted.len()
    }

    /// Whether nothing was admitted.
    pub fn is_empty(&self) -> bool {
        self.admitted.is_empty()
    }
}

/// Limits applied to every drop.
#[derive(Debug, Clone)]
pub struct AdmissionPolicy {
    pub extensions: ExtensionPolicy,
    pub per_file_size_limit: u64,
    pub aggregate_size_limit: u64,
    pub file_count_limit: usize,
}

impl Default for AdmissionPolicy {
    fn default() -> Self {
        PolicyConfig::default().to_policy()
    }
}

impl AdmissionPolicy {
    /// Per-file decision: extension first, then the per-file size limit.
    ///
    /// The aggregate limit depends on the rest of the batch and is only
    /// applied by [`AdmissionPolicy::admit`].
    pub fn decide(&self, file: &FileHandle) -> AdmissionDecision {
        if !self.extensions.permits(&file.name) {
            AdmissionDecision::Reject(RejectReason::DisallowedExtension)
        } else if file.size > self.per_file_size_limit {
            AdmissionDecision::Reject(RejectReason::ExceedsPerFileSizeLimit)
        } else {
            AdmissionDecision::Admit
        }
    }

    /// Partition collected files into an upload batch.
    ///
    /// Fails without a batch when no file passes the extension filter, when
    /// more files pass it than the count limit allows, or when every eligible
    /// file is rejected by a size limit.
    pub fn admit(&self, files: Vec<FileHandle>) -> Result<UploadBatch> {
        let total = files.len();
        let mut rejected = Vec::new();

        let mut eligible = Vec::with_capacity(total);
        for file in files {
            if self.extensions.permits(&file.name) {
                eligible.push(file);
            } else {
                debug!("skipping '{}': disallowed extension", file.relative_path);
                rejected.push(Rejection {
                    file,
                    reason: RejectReason::DisallowedExtension,
                });
            }
        }

        if eligible.is_empty() {
            return Err(DroploadError::NoEligibleFiles { total });
        }
        if eligible.len() > self.file_count_limit {
            return Err(DroploadError::TooManyFiles {
                count: eligible.len(),
                limit: self.file_count_limit,
            });
        }
        let eligible_count = eligible.len();

        let mut candidates = Vec::with_capacity(eligible_count);
        for (index, file) in eligible.into_iter().enumerate() {
            if file.size > self.per_file_size_limit {
                debug!(
                    "skipping '{}': {} bytes exceeds per-file limit",
                    file.relative_path, file.size
                );
                rejected.push(Rejection {
                    file,
                    reason: RejectReason::ExceedsPerFileSizeLimit,
                });
            } else {
                candidates.push((index, file));
            }
        }

        // stable: equal sizes keep traversal order
        candidates.sort_by_key(|(_, file)| file.size);

        let mut total_size = 0u64;
        let mut admitted = Vec::with_capacity(candidates.len());
        let mut full = false;
        for (index, file) in candidates {
            let next = total_size.saturating_add(file.size);
            if !full && next <= self.aggregate_size_limit {
                total_size = next;
                admitted.push((index, file));
            } else {
                full = true;
                debug!(
                    "skipping '{}': aggregate limit reached",
                    file.relative_path
                );
                rejected.push(Rejection {
                    file,
                    reason: RejectReason::ExceedsAggregateSizeLimit,
                });
            }
        }

        if admitted.is_empty() {
            return Err(DroploadError::NoFilesWithinLimits {
                eligible: eligible_count,
            });
        }

        admitted.sort_by_key(|(index, _)| *index);
        Ok(UploadBatch {
            admitted: admitted.into_iter().map(|(_, file)| file).collect(),
            rejected,
            total_size,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KB: u64 = 1024;
    const MB: u64 = 1024 * KB;

    fn file(path: &str, size: u64) -> FileHandle {
        FileHandle::from_path(format!("/tmp/{path}"), path, size)
    }

    fn policy(extensions: ExtensionPolicy) -> AdmissionPolicy {
        AdmissionPolicy {
            extensions,
            per_file_size_limit: 5 * MB,
            aggregate_size_limit: 10 * MB,
            file_count_limit: 250,
        }
    }

    fn admitted_paths(batch: &UploadBatch) -> Vec<&str> {
        batch
            .admitted
            .iter()
            .map(|f| f.relative_path.as_str())
            .collect()
    }

    #[test]
    fn test_extension_of() {
        assert_eq!(extension_of("a.b.png"), Some("png".to_string()));
        assert_eq!(extension_of("Photo.JPG"), Some("jpg".to_string()));
        assert_eq!(extension_of("archive"), None);
        assert_eq!(extension_of("trailing."), Some(String::new()));
    }

    #[test]
    fn test_normalize_extension() {
        assert_eq!(normalize_extension(".PNG"), "png");
        assert_eq!(normalize_extension(" txt "), "txt");
    }

    #[test]
    fn test_allow_list() {
        let allow = ExtensionPolicy::allow(["png"]);
        assert!(allow.permits("a.b.png"));
        assert!(allow.permits("UPPER.PNG"));
        assert!(!allow.permits("archive"));
        assert!(!allow.permits("notes.txt"));
    }

    #[test]
    fn test_deny_list() {
        let deny = ExtensionPolicy::deny(["exe"]);
        assert!(!deny.permits("virus.exe"));
        assert!(!deny.permits("VIRUS.EXE"));
        assert!(deny.permits("archive"));
        assert!(deny.permits("notes.txt"));
    }

    #[test]
    fn test_decide() {
        let p = policy(ExtensionPolicy::allow(["txt"]));
        assert_eq!(p.decide(&file("a.txt", KB)), AdmissionDecision::Admit);
        assert_eq!(
            p.decide(&file("a.bin", KB)),
            AdmissionDecision::Reject(RejectReason::DisallowedExtension)
        );
        assert_eq!(
            p.decide(&file("big.txt", 6 * MB)),
            AdmissionDecision::Reject(RejectReason::ExceedsPerFileSizeLimit)
        );
    }

    #[test]
    fn test_extension_uses_base_name() {
        let p = policy(ExtensionPolicy::allow(["txt"]));
        assert_eq!(
            p.decide(&file("v1.txt/readme", KB)),
            AdmissionDecision::Reject(RejectReason::DisallowedExtension)
        );
    }

    #[test]
    fn test_admit_folder_scenario() {
        let p = policy(ExtensionPolicy::allow(["txt", "png"]));
        let files = vec![
            file("folder/notes.txt", KB),
            file("folder/photo.png", 2 * MB),
            file("folder/video.exe", 50 * MB),
        ];

        let batch = p.admit(files).unwrap();

        assert_eq!(
            admitted_paths(&batch),
            vec!["folder/notes.txt", "folder/photo.png"]
        );
        assert_eq!(batch.rejected.len(), 1);
        assert_eq!(batch.rejected[0].file.name, "video.exe");
        assert_eq!(batch.rejected[0].reason, RejectReason::DisallowedExtension);
        assert_eq!(batch.total_size, KB + 2 * MB);
    }

    #[test]
    fn test_admit_no_eligible_files() {
        let p = policy(ExtensionPolicy::allow(["png"]));
        let result = p.admit(vec![file("a.txt", 1), file("b", 1)]);
        assert!(matches!(
            result,
            Err(DroploadError::NoEligibleFiles { total: 2 })
        ));
    }

    #[test]
    fn test_admit_empty_input() {
        let p = policy(ExtensionPolicy::deny(["exe"]));
        assert!(matches!(
            p.admit(Vec::new()),
            Err(DroploadError::NoEligibleFiles { total: 0 })
        ));
    }

    #[test]
    fn test_admit_too_many_files() {
        let p = policy(ExtensionPolicy::deny(["exe"]));
        let files: Vec<FileHandle> = (0..251).map(|i| file(&format!("{i}.txt"), 1)).collect();

        let result = p.admit(files);

        assert!(matches!(
            result,
            Err(DroploadError::TooManyFiles {
                count: 251,
                limit: 250
            })
        ));
    }

    #[test]
    fn test_count_limit_ignores_extension_rejects() {
        let p = policy(ExtensionPolicy::deny(["exe"]));
        let mut files: Vec<FileHandle> = (0..250).map(|i| file(&format!("{i}.txt"), 1)).collect();
        files.extend((0..10).map(|i| file(&format!("{i}.exe"), 1)));

        let batch = p.admit(files).unwrap();

        assert_eq!(batch.len(), 250);
        assert_eq!(batch.rejected.len(), 10);
    }

    #[test]
    fn test_admit_per_file_limit() {
        let p = policy(ExtensionPolicy::deny(["exe"]));
        let batch = p
            .admit(vec![file("small.txt", KB), file("huge.iso", 6 * MB)])
            .unwrap();

        assert_eq!(admitted_paths(&batch), vec!["small.txt"]);
        assert_eq!(
            batch.rejected[0].reason,
            RejectReason::ExceedsPerFileSizeLimit
        );
    }

    #[test]
    fn test_admit_all_too_large() {
        let p = policy(ExtensionPolicy::deny(["exe"]));
        let result = p.admit(vec![
            file("a.iso", 6 * MB),
            file("b.iso", 7 * MB),
            file("c.exe", 1),
        ]);
        assert!(matches!(
            result,
            Err(DroploadError::NoFilesWithinLimits { eligible: 2 })
        ));
    }

    #[test]
    fn test_admit_smallest_first_under_aggregate() {
        let p = policy(ExtensionPolicy::deny(["exe"]));
        let files = vec![
            file("a.bin", 4 * MB),
            file("b.bin", 3 * MB),
            file("c.bin", 2 * MB),
            file("d.bin", 5 * MB),
            file("e.bin", MB),
        ];

        let batch = p.admit(files).unwrap();

        // 1 + 2 + 3 + 4 fills the 10MB cap exactly, the 5MB file no longer fits
        assert_eq!(
            admitted_paths(&batch),
            vec!["a.bin", "b.bin", "c.bin", "e.bin"]
        );
        assert_eq!(batch.total_size, 10 * MB);
        let rejected: Vec<&str> = batch
            .rejected
            .iter()
            .map(|r| r.file.relative_path.as_str())
            .collect();
        assert_eq!(rejected, vec!["d.bin"]);
        assert!(batch
            .rejected
            .iter()
            .all(|r| r.reason == RejectReason::ExceedsAggregateSizeLimit));
    }

    #[test]
    fn test_aggregate_cap_invariant() {
        let p = AdmissionPolicy {
            extensions: ExtensionPolicy::deny(["exe"]),
            per_file_size_limit: 1000,
            aggregate_size_limit: 2500,
            file_count_limit: 250,
        };
        let files: Vec<FileHandle> = (0..40)
            .map(|i| file(&format!("{i}.dat"), (i * 37 % 900) + 1))
            .collect();

        let batch = p.admit(files).unwrap();

        let sum: u64 = batch.admitted.iter().map(|f| f.size).sum();
        assert_eq!(sum, batch.total_size);
        assert!(sum <= 2500);
        for r in &batch.rejected {
            assert_eq!(r.reason, RejectReason::ExceedsAggregateSizeLimit);
            assert!(sum + r.file.size > 2500);
        }
    }

    #[test]
    fn test_admit_is_deterministic() {
        let p = policy(ExtensionPolicy::deny(["exe"]));
        let build = || {
            vec![
                file("x.txt", 3 * MB),
                file("y.txt", 3 * MB),
                file("z.txt", 3 * MB),
                file("w.txt", 3 * MB),
                file("v.exe", 1),
            ]
        };

        let first = p.admit(build()).unwrap();
        let second = p.admit(build()).unwrap();

        assert_eq!(admitted_paths(&first), admitted_paths(&second));
        assert_eq!(first.total_size, second.total_size);
        // equal sizes: traversal order breaks the tie
        assert_eq!(admitted_paths(&first), vec!["x.txt", "y.txt", "z.txt"]);
        assert_eq!(first.rejected[1].file.relative_path, "w.txt");
    }

    #[test]
    fn test_reject_reason_display() {
        assert_eq!(
            RejectReason::DisallowedExtension.to_string(),
            "disallowed-extension"
        );
        assert_eq!(
            RejectReason::ExceedsAggregateSizeLimit.to_string(),
            "exceeds-aggregate-size-limit"
        );
    }
}
