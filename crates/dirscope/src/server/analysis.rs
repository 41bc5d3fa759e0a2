//! Subtree statistics and duplicate paging endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::Deserialize;

use filesystem::DuplicatePage;

use crate::analysis::ScanReport;
use crate::server::error::ApiError;
use crate::server::ServerState;

const DEFAULT_PAGE_SIZE: usize = 50;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScanRequest {
    pub path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicatePageRequest {
    /// Scan to page through. Defaults to the most recent scan.
    pub scan_id: Option<String>,
    pub page_index: Option<usize>,
    pub page_size: Option<usize>,
}

#[tracing::instrument(skip_all)]
pub(crate) async fn scan_subtree(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<ScanRequest>,
) -> Result<Json<ScanReport>, ApiError> {
    let path = state.resolve(&request.path)?;
    let report = state.core.scan_subtree(&path).await?;
    Ok(Json(report.as_ref().clone()))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn duplicate_page(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DuplicatePageRequest>,
) -> Result<Json<DuplicatePage>, ApiError> {
    let page = state.core.get_duplicate_page(
        request.scan_id.as_deref(),
        request.page_index.unwrap_or(0),
        request.page_size.unwrap_or(DEFAULT_PAGE_SIZE),
    )?;
    Ok(Json(page))
}
