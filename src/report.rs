//! Reporting surface for submission outcomes.
//!
//! The controller talks to the user through two calls only: a status line
//! for success and an error line for everything else. Showing one always
//! replaces the other.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::{Arc, Mutex};

/// Receives the user-facing outcome of a submission.
pub trait Reporter: Send + Sync {
    /// Show a status message, clearing any error.
    fn report_status(&self, message: &str);

    /// Show an error message, clearing any status.
    fn report_error(&self, message: &str);
}

impl<R: Reporter + ?Sized> Reporter for Arc<R> {
    fn report_status(&self, message: &str) {
        (**self).report_status(message)
    }

    fn report_error(&self, message: &str) {
        (**self).report_error(message)
    }
}

/// What the reporting surface currently shows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Report {
    /// Nothing shown yet.
    #[default]
    Empty,
    /// A status message.
    Status(String),
    /// An error message.
    Error(String),
}

impl Report {
    /// The status message, if one is shown.
    pub fn status(&self) -> Option<&str> {
        match self {
            Report::Status(s) => Some(s),
            _ => None,
        }
    }

    /// The error message, if one is shown.
    pub fn error(&self) -> Option<&str> {
        match self {
            Report::Error(s) => Some(s),
            _ => None,
        }
    }
}

/// Number of past reports a [`MemoryReporter`] remembers.
pub const HISTORY_LIMIT: usize = 64;

/// Keeps the displayed report in memory. Useful for tests and for embedding
/// the controller behind a UI that polls its state.
///
/// Only the last [`HISTORY_LIMIT`] reports are kept in the history.
#[derive(Debug, Default)]
pub struct MemoryReporter {
    current: Mutex<Report>,
    history: Mutex<VecDeque<Report>>,
}

impl MemoryReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// What is displayed right now.
    pub fn current(&self) -> Report {
        self.current
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    /// Recent reports, oldest first.
    pub fn history(&self) -> Vec<Report> {
        self.history
            .lock()
            .map(|h| h.iter().cloned().collect())
            .unwrap_or_default()
    }

    fn show(&self, report: Report) {
        if let Ok(mut history) = self.history.lock() {
            if history.len() == HISTORY_LIMIT {
                history.pop_front();
            }
            history.push_back(report.clone());
        }
        if let Ok(mut current) = self.current.lock() {
            *current = report;
        }
    }
}

impl Reporter for MemoryReporter {
    fn report_status(&self, message: &str) {
        self.show(Report::Status(message.to_string()));
    }

    fn report_error(&self, message: &str) {
        self.show(Report::Error(message.to_string()));
    }
}

/// Prints statuses to stdout and errors to stderr.
#[derive(Debug, Default, Clone, Copy)]
pub struct ConsoleReporter;

impl Reporter for ConsoleReporter {
    fn report_status(&self, message: &str) {
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{message}");
    }

    fn report_error(&self, message: &str) {
        let mut err = std::io::stderr().lock();
        let _ = writeln!(err, "Error: {message}");
    }
}
