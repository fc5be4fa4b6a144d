//! Summary handler.

use axum::{extract::State, Json};
use serde::Serialize;
use std::sync::Arc;

use crate::site::Site;
use crate::web::handlers::AppState;

/// One site in the summary.
#[derive(Debug, Clone, Serialize)]
pub struct SiteSummary {
    pub name: String,
    pub file_count: usize,
    pub total_size: u64,
    /// RFC 3339 creation time.
    pub created_at: String,
}

impl From<&Site> for SiteSummary {
    fn from(site: &Site) -> Self {
        Self {
            name: site.name.clone(),
            file_count: site.files.len(),
            total_size: site.total_size,
            created_at: site.created_at.to_rfc3339(),
        }
    }
}

/// Summary response.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryResponse {
    pub site_count: usize,
    pub sites: Vec<SiteSummary>,
}

/// GET /api/summary.json - Sites hosted by this server, oldest first.
pub async fn summary(State(state): State<Arc<AppState>>) -> Json<SummaryResponse> {
    let sites: Vec<SiteSummary> = state.registry.list().await.iter().map(Into::into).collect();
    Json(SummaryResponse {
        site_count: sites.len(),
        sites,
    })
}
