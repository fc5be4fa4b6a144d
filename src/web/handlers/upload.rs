//! Upload handler.

use axum::{
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
};
use std::sync::Arc;

use crate::humanize;
use crate::site::{
    generate_site_name, prepare_files, unpack_archives, IncomingFile, Site, SiteFile,
};
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// POST /api/upload - Store a multipart upload as a new site.
///
/// Every file field is one file; the field name is its path. Zip archives are
/// also unpacked into the site. Responds with the site's URI as plain text.
pub async fn upload(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<String, ApiError> {
    let mut received = Vec::new();

    while let Some(field) = multipart.next_field().await.map_err(|e| {
        tracing::error!("Failed to read multipart field: {}", e);
        if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::payload_too_large("Upload too large")
        } else {
            ApiError::bad_request("Invalid multipart data")
        }
    })? {
        if field.file_name().is_none() {
            continue;
        }
        let Some(path) = field.name().map(|s| s.to_string()) else {
            continue;
        };
        let data = field.bytes().await.map_err(|e| {
            tracing::error!("Failed to read file content: {}", e);
            if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
                ApiError::payload_too_large("Upload too large")
            } else {
                ApiError::bad_request("Failed to read file")
            }
        })?;
        received.push(IncomingFile {
            path,
            data: data.to_vec(),
        });
    }

    let files = prepare_files(received, &state.extensions);
    if files.is_empty() {
        return Err(ApiError::bad_request("no files"));
    }
    let files = unpack_archives(files, &state.extensions);

    let name = generate_site_name();
    let mut site_files = Vec::with_capacity(files.len());
    for file in &files {
        state.storage.save(&name, &file.path, &file.data).map_err(|e| {
            tracing::error!("Failed to save '{}' for site {}: {}", file.path, name, e);
            // partial sites are never registered
            let _ = state.storage.delete_site(&name);
            ApiError::from(e)
        })?;
        site_files.push(SiteFile {
            path: file.path.clone(),
            size: file.data.len() as u64,
        });
    }

    let site = Site::new(&name, site_files);
    tracing::info!(
        site = %site.name,
        files = site.files.len(),
        "stored upload of {}",
        humanize::size(site.total_size)
    );
    let uri = format!("{}{}", state.base_url_for(&headers), site.uri_path());
    state.registry.insert(site).await;

    Ok(uri)
}
