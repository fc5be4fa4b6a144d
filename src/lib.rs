//! dropload - drag-and-drop upload core
//!
//! Turns a drop of files and folders into a single multipart upload:
//! traverse the dropped entries, apply the admission policy, submit what
//! passed and report the outcome. The `web` module is the matching server
//! that stores each upload as a small hosted site.

pub mod admission;
pub mod config;
pub mod entry;
pub mod error;
pub mod humanize;
pub mod logging;
pub mod paths;
pub mod report;
pub mod site;
pub mod upload;
pub mod web;

pub use admission::{
    AdmissionDecision, AdmissionPolicy, ExtensionPolicy, RejectReason, Rejection, UploadBatch,
};
pub use config::Config;
pub use entry::{collect_files, DirectoryEntry, DirectoryReader, Entry, FileEntry, FileHandle};
pub use error::{DroploadError, Result};
pub use report::{ConsoleReporter, MemoryReporter, Report, Reporter};
pub use upload::{
    HttpUploader, SubmissionController, SubmissionFailure, SubmissionResult, SubmissionState,
    UploadPart, Uploaded, Uploader,
};
