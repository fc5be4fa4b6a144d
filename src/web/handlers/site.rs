//! Serving stored sites.

use axum::{
    body::Body,
    extract::{Path, State},
    http::header,
    response::Response,
};
use std::fmt::Write;
use std::sync::Arc;

use crate::humanize;
use crate::site::Site;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

const INDEX_FILE: &str = "index.html";

async fn find_site(state: &AppState, name: &str) -> Result<Site, ApiError> {
    state
        .registry
        .get(name)
        .await
        .ok_or_else(|| ApiError::not_found("Site not found"))
}

fn file_response(state: &AppState, site: &Site, path: &str) -> Result<Response, ApiError> {
    if !site.contains(path) {
        return Err(ApiError::not_found("File not found"));
    }
    let content = state.storage.load(&site.name, path)?;
    let mime = mime_guess::from_path(path).first_or_octet_stream();

    Response::builder()
        .header(header::CONTENT_TYPE, mime.as_ref())
        .header(header::CONTENT_LENGTH, content.len())
        .body(Body::from(content))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// Plain-text listing of a site without an index page.
fn listing(site: &Site) -> String {
    let mut out = format!(
        "{} ({} files, {})\n\n",
        site.name,
        site.files.len(),
        humanize::size(site.total_size)
    );
    for file in &site.files {
        let _ = writeln!(out, "{}  {}", file.path, humanize::size(file.size));
    }
    out
}

/// GET /p/:site/ - Site root: `index.html` when present, a listing otherwise.
pub async fn serve_site_root(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Response, ApiError> {
    let site = find_site(&state, &name).await?;

    if site.contains(INDEX_FILE) {
        return file_response(&state, &site, INDEX_FILE);
    }

    Response::builder()
        .header(header::CONTENT_TYPE, "text/plain; charset=utf-8")
        .body(Body::from(listing(&site)))
        .map_err(|e| {
            tracing::error!("Failed to build response: {}", e);
            ApiError::internal("Failed to build response")
        })
}

/// GET /p/:site/*path - One file of a site.
pub async fn serve_site_file(
    State(state): State<Arc<AppState>>,
    Path((name, path)): Path<(String, String)>,
) -> Result<Response, ApiError> {
    let site = find_site(&state, &name).await?;
    let path = path.trim_start_matches('/');
    if path.is_empty() {
        return serve_site_root(State(state), Path(name)).await;
    }
    file_response(&state, &site, path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::site::SiteFile;

    #[test]
    fn test_listing() {
        let site = Site::new(
            "abcd1234",
            vec![
                SiteFile {
                    path: "a.txt".to_string(),
                    size: 12,
                },
                SiteFile {
                    path: "img/b.png".to_string(),
                    size: 3 * 1024 * 1024,
                },
            ],
        );

        let text = listing(&site);

        assert!(text.starts_with("abcd1234 (2 files, "));
        assert!(text.contains("a.txt  12 B\n"));
        assert!(text.contains("img/b.png  3 MB\n"));
    }
}
