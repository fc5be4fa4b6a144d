//! Error types for dropload.

use thiserror::Error;

/// Common error type for dropload.
///
/// The `Display` text of the submission variants is what the reporting
/// surface shows to the user, so keep it short and human readable.
#[derive(Error, Debug)]
pub enum DroploadError {
    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// An uploaded archive could not be read.
    #[error("invalid zip archive: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// A directory listing or file materialization failed mid-traversal.
    #[error("failed to read dropped files: {0}")]
    Traversal(String),

    /// Nothing passed the extension filter.
    #[error("no files to submit out of {total}")]
    NoEligibleFiles {
        /// Number of files collected before filtering.
        total: usize,
    },

    /// More eligible files than the count limit allows.
    #[error("too many files: {count} (limit is {limit})")]
    TooManyFiles {
        /// Number of eligible files.
        count: usize,
        /// Configured file count limit.
        limit: usize,
    },

    /// Every eligible file was rejected by a size limit.
    #[error("none of the {eligible} eligible files fit within the size limits")]
    NoFilesWithinLimits {
        /// Number of files that passed the extension filter.
        eligible: usize,
    },

    /// The upload request could not be completed.
    #[error("failed to upload: {0}")]
    Transport(String),

    /// The server answered with a non-success status.
    #[error("failed to upload, status code: {0}")]
    Server(u16),

    /// Another submission is still in flight.
    #[error("an upload is already in progress")]
    Busy,
}

/// Result type alias for dropload operations.
pub type Result<T> = std::result::Result<T, DroploadError>;
