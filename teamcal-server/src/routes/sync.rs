//! Sync endpoints.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};
use teamcal_core::SyncResult;

use crate::routes::AppError;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/sync", post(sync_all))
        .route("/sync/{owner}", post(sync_owner))
}

/// GET /health
async fn health() -> &'static str {
    "ok"
}

/// POST /sync/:owner - Run one calendar's sync now
async fn sync_owner(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<SyncResult>, AppError> {
    let result = state.syncer.sync_one(&owner).await?;
    Ok(Json(result))
}

/// POST /sync - Run the all-calendars pass now
async fn sync_all(State(state): State<AppState>) -> Result<Json<SyncResult>, AppError> {
    let totals = state.syncer.sync_all().await?;
    Ok(Json(totals))
}
