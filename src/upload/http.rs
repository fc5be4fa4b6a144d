//! HTTP transport for uploads.

use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, StatusCode};

use super::{SubmissionFailure, SubmissionResult, UploadPart, Uploader};
use crate::config::ClientConfig;
use crate::{DroploadError, Result};

/// Maximum number of redirects to follow.
const MAX_REDIRECTS: usize = 5;

/// User agent string for uploads.
const USER_AGENT: &str = concat!("dropload/", env!("CARGO_PKG_VERSION"));

/// Posts uploads as a single multipart/form-data request.
#[derive(Debug, Clone)]
pub struct HttpUploader {
    client: Client,
    endpoint: String,
}

impl HttpUploader {
    /// Create an uploader for `endpoint`.
    ///
    /// Only connecting is bounded by `connect_timeout`; a large upload may
    /// take as long as it needs once the connection is up.
    pub fn new(endpoint: impl Into<String>, connect_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .redirect(reqwest::redirect::Policy::limited(MAX_REDIRECTS))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| DroploadError::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    /// Create an uploader from the `[client]` config section.
    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        Self::new(
            config.endpoint.clone(),
            Duration::from_secs(config.connect_timeout_secs),
        )
    }

    /// The URL uploads are posted to.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn post(&self, parts: Vec<UploadPart>) -> SubmissionResult {
        let form = match build_form(parts) {
            Ok(form) => form,
            Err(e) => return transport_failure(e),
        };

        let response = match self.client.post(&self.endpoint).multipart(form).send().await {
            Ok(response) => response,
            Err(e) => return transport_failure(e),
        };

        let status = response.status();
        if status != StatusCode::OK {
            return SubmissionResult::Failure(SubmissionFailure::Status(status.as_u16()));
        }

        match response.text().await {
            Ok(body) if !body.trim().is_empty() => SubmissionResult::Success(body.trim().to_string()),
            Ok(_) => transport_failure("server returned an empty response"),
            Err(e) => transport_failure(e),
        }
    }
}

impl Uploader for HttpUploader {
    fn send(&self, parts: Vec<UploadPart>) -> BoxFuture<'_, SubmissionResult> {
        self.post(parts).boxed()
    }
}

fn transport_failure(reason: impl ToString) -> SubmissionResult {
    SubmissionResult::Failure(SubmissionFailure::Transport(reason.to_string()))
}

/// Build the request body: one part per file, named by its relative path.
fn build_form(parts: Vec<UploadPart>) -> std::result::Result<Form, reqwest::Error> {
    let mut form = Form::new();
    for part in parts {
        let mime = mime_guess::from_path(&part.file_name).first_or_octet_stream();
        let body = Part::bytes(part.data)
            .file_name(part.file_name)
            .mime_str(mime.essence_str())?;
        form = form.part(part.name, body);
    }
    Ok(form)
}
