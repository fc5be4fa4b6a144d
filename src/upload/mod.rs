//! Submission of one drop.
//!
//! [`SubmissionController`] drives a single upload transaction: collect the
//! dropped entries, run them through the admission policy, package the
//! admitted files into one multipart request, send it and report the
//! outcome. Every attempt ends with exactly one report, and only one attempt
//! can be in flight at a time.
//!
//! The network call goes through the [`Uploader`] trait; [`HttpUploader`] is
//! the implementation used outside of tests.

pub mod http;

use std::future::Future;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use futures::future::BoxFuture;
use tracing::{info, warn};

use crate::admission::{AdmissionPolicy, UploadBatch};
use crate::entry::{collect_files, entries_from_paths, Entry};
use crate::humanize;
use crate::report::Reporter;
use crate::{DroploadError, Result};

pub use http::HttpUploader;

/// One file of the multipart request body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadPart {
    /// Part name: the file's path relative to the drop.
    pub name: String,
    /// File name sent with the part.
    pub file_name: String,
    /// File content.
    pub data: Vec<u8>,
}

/// Why an upload call failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionFailure {
    /// The server answered with this non-success status.
    Status(u16),
    /// The request could not be completed.
    Transport(String),
}

/// Outcome of one upload call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionResult {
    /// The server stored the upload at this locator.
    Success(String),
    /// The upload failed.
    Failure(SubmissionFailure),
}

/// Sends a packaged upload to the server.
pub trait Uploader: Send + Sync {
    /// Send all parts in a single request.
    fn send(&self, parts: Vec<UploadPart>) -> BoxFuture<'_, SubmissionResult>;
}

impl<U: Uploader + ?Sized> Uploader for Arc<U> {
    fn send(&self, parts: Vec<UploadPart>) -> BoxFuture<'_, SubmissionResult> {
        (**self).send(parts)
    }
}

/// Where a submission is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmissionState {
    Idle,
    Collecting,
    Filtering,
    Submitting,
    /// No file passed the extension filter.
    RejectedNoEligible,
    /// More eligible files than the count limit.
    RejectedTooMany,
    Succeeded,
    Failed,
}

/// A completed upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    /// Where the server made the upload available.
    pub locator: String,
    /// Number of files sent.
    pub file_count: usize,
    /// Total bytes sent.
    pub total_size: u64,
    /// Number of files left out by the admission policy.
    pub skipped: usize,
    /// Time from request start to response.
    pub elapsed: Duration,
}

/// Clears the in-flight flag when the submission ends, however it ends.
struct InFlightGuard<'a>(&'a AtomicBool);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

fn count_noun(count: usize, noun: &str) -> String {
    if count == 1 {
        format!("1 {noun}")
    } else {
        format!("{count} {noun}s")
    }
}

/// Read every admitted file into a multipart part named by its relative path.
pub async fn package(batch: &UploadBatch) -> Result<Vec<UploadPart>> {
    let mut parts = Vec::with_capacity(batch.len());
    for file in &batch.admitted {
        parts.push(UploadPart {
            name: file.relative_path.clone(),
            file_name: file.relative_path.clone(),
            data: file.read().await?,
        });
    }
    Ok(parts)
}

/// Drives one upload per drop and reports its outcome.
pub struct SubmissionController<U, R> {
    policy: AdmissionPolicy,
    uploader: U,
    reporter: R,
    expiry_hours: u32,
    in_flight: AtomicBool,
    state: Mutex<SubmissionState>,
}

impl<U: Uploader, R: Reporter> SubmissionController<U, R> {
    /// Create a controller.
    pub fn new(policy: AdmissionPolicy, uploader: U, reporter: R) -> Self {
        Self {
            policy,
            uploader,
            reporter,
            expiry_hours: 24,
            in_flight: AtomicBool::new(false),
            state: Mutex::new(SubmissionState::Idle),
        }
    }

    /// Set the retention shown in the success message.
    pub fn with_expiry_hours(mut self, hours: u32) -> Self {
        self.expiry_hours = hours;
        self
    }

    /// The admission policy in use.
    pub fn policy(&self) -> &AdmissionPolicy {
        &self.policy
    }

    /// The reporting surface.
    pub fn reporter(&self) -> &R {
        &self.reporter
    }

    /// Current lifecycle state.
    pub fn state(&self) -> SubmissionState {
        self.state
            .lock()
            .map(|s| *s)
            .unwrap_or(SubmissionState::Idle)
    }

    /// Whether a submission is running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Upload a drop payload.
    ///
    /// Returns [`DroploadError::Busy`] without reporting anything when
    /// another submission is still running. Every other outcome is reported
    /// exactly once.
    pub async fn submit(&self, entries: Vec<Entry>) -> Result<Uploaded> {
        self.submit_with(async { Ok(entries) }).await
    }

    /// Upload files and directories picked from the local filesystem.
    pub async fn submit_paths<P: AsRef<Path> + Sync>(&self, paths: &[P]) -> Result<Uploaded> {
        self.submit_with(entries_from_paths(paths)).await
    }

    async fn submit_with<F>(&self, entries: F) -> Result<Uploaded>
    where
        F: Future<Output = Result<Vec<Entry>>>,
    {
        let _guard = self.acquire()?;

        let result = self.run(entries).await;
        match &result {
            Ok(uploaded) => {
                info!(
                    "uploaded {} files ({} bytes) in {:?}: {}",
                    uploaded.file_count, uploaded.total_size, uploaded.elapsed, uploaded.locator
                );
                self.set_state(SubmissionState::Succeeded);
                self.reporter.report_status(&self.success_message(uploaded));
            }
            Err(e) => {
                warn!("submission failed: {}", e);
                self.set_state(match e {
                    DroploadError::NoEligibleFiles { .. } => SubmissionState::RejectedNoEligible,
                    DroploadError::TooManyFiles { .. } => SubmissionState::RejectedTooMany,
                    _ => SubmissionState::Failed,
                });
                self.reporter.report_error(&e.to_string());
            }
        }
        result
    }

    fn acquire(&self) -> Result<InFlightGuard<'_>> {
        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            warn!("drop ignored: an upload is already in progress");
            return Err(DroploadError::Busy);
        }
        Ok(InFlightGuard(&self.in_flight))
    }

    async fn run<F>(&self, entries: F) -> Result<Uploaded>
    where
        F: Future<Output = Result<Vec<Entry>>>,
    {
        self.set_state(SubmissionState::Collecting);
        let files = collect_files(entries.await?).await?;

        self.set_state(SubmissionState::Filtering);
        let batch = self.policy.admit(files)?;

        self.set_state(SubmissionState::Submitting);
        let parts = package(&batch).await?;
        info!(
            "submitting {} files ({} bytes), skipping {}",
            batch.len(),
            batch.total_size,
            batch.rejected.len()
        );

        let started = Instant::now();
        let result = self.uploader.send(parts).await;
        let elapsed = started.elapsed();

        match result {
            SubmissionResult::Success(locator) => Ok(Uploaded {
                locator,
                file_count: batch.len(),
                total_size: batch.total_size,
                skipped: batch.rejected.len(),
                elapsed,
            }),
            SubmissionResult::Failure(SubmissionFailure::Status(code)) => {
                Err(DroploadError::Server(code))
            }
            SubmissionResult::Failure(SubmissionFailure::Transport(reason)) => {
                Err(DroploadError::Transport(reason))
            }
        }
    }

    fn set_state(&self, state: SubmissionState) {
        if let Ok(mut current) = self.state.lock() {
            *current = state;
        }
    }

    fn success_message(&self, uploaded: &Uploaded) -> String {
        let mut message = format!(
            "Uploaded {} ({}) in {}: {}\nThe upload expires in {}.",
            count_noun(uploaded.file_count, "file"),
            humanize::size(uploaded.total_size),
            humanize::duration(uploaded.elapsed),
            uploaded.locator,
            count_noun(self.expiry_hours as usize, "hour"),
        );
        if uploaded.skipped > 0 {
            message.push_str(&format!(
                "\nSkipping {} that did not pass the upload policy.",
                count_noun(uploaded.skipped, "file")
            ));
        }
        message
    }
}
