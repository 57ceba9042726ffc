//! HTTP handlers for possible-portions snapshots

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::portions::{PortionSnapshot, RecalculationSummary};
use crate::services::PortionService;
use crate::AppState;

/// Stored snapshots, fewest portions first
pub async fn list_portions(State(state): State<AppState>) -> AppResult<Json<Vec<PortionSnapshot>>> {
    let service = PortionService::new(state.db, state.events);
    Ok(Json(service.list_snapshots().await?))
}

pub async fn recalculate_portions(
    State(state): State<AppState>,
) -> AppResult<Json<RecalculationSummary>> {
    let service = PortionService::new(state.db, state.events);
    Ok(Json(service.recalculate_all().await?))
}
