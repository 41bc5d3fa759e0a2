//! Installed applications endpoint.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::application::InstalledApp;
use crate::server::error::ApiError;
use crate::server::ServerState;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledAppsRequest {
    /// Bypass the freshness window and re-enumerate.
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstalledAppsResponse {
    pub apps: Vec<InstalledApp>,
    pub count: usize,
}

#[tracing::instrument(skip_all)]
pub(crate) async fn installed_apps(
    State(state): State<Arc<ServerState>>,
    Json(request): Json<InstalledAppsRequest>,
) -> Result<Json<InstalledAppsResponse>, ApiError> {
    let apps = state.core.get_installed_apps(request.force).await?;
    let apps = apps.as_ref().clone();
    Ok(Json(InstalledAppsResponse {
        count: apps.len(),
        apps,
    }))
}
