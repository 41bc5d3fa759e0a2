//! Directory listing endpoints.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use filesystem::DirectoryEntry;

use crate::server::error::ApiError;
use crate::server::ServerState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DirectoryRequest {
    pub path: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ListDirectoryResponse {
    pub path: String,
    pub entries: Vec<DirectoryEntry>,
    pub count: usize,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateResponse {
    pub invalidated: bool,
}

/// A completed rename, move, copy, delete or create. `destination` is set
/// for rename, move and copy.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationRequest {
    pub source: String,
    pub destination: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MutationResponse {
    pub invalidated: usize,
}

#[tracing::instrument(skip_all)]
pub(crate) async fn list_directory(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DirectoryRequest>,
) -> Result<Json<ListDirectoryResponse>, ApiError> {
    let path = state.resolve(&request.path)?;
    let listing = state.core.list_directory(&path).await?;
    let entries = listing.as_ref().clone();
    Ok(Json(ListDirectoryResponse {
        path: path.to_string_lossy().to_string(),
        count: entries.len(),
        entries,
    }))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn invalidate_directory(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<DirectoryRequest>,
) -> Result<Json<InvalidateResponse>, ApiError> {
    let path = state.resolve(&request.path)?;
    Ok(Json(InvalidateResponse {
        invalidated: state.core.invalidate_directory(&path),
    }))
}

#[tracing::instrument(skip_all)]
pub(crate) async fn record_mutation(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<MutationRequest>,
) -> Result<Json<MutationResponse>, ApiError> {
    let source = state.resolve(&request.source)?;
    let destination = request
        .destination
        .as_deref()
        .map(|raw| state.resolve(raw))
        .transpose()?;
    let invalidated = state
        .core
        .invalidate_for_mutation(&source, destination.as_deref());
    Ok(Json(MutationResponse { invalidated }))
}
