//! HTTP handlers for servings

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::serving::{ServeInput, Serving, ServingFilter, ServingSummary};
use crate::services::ServingService;
use crate::AppState;

fn service(state: AppState) -> ServingService {
    let low_stock_alerts = state.config.inventory.low_stock_notifications;
    ServingService::new(state.db, state.events, low_stock_alerts)
}

/// Serve a meal, debiting its ingredients
pub async fn serve_meal(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<ServeInput>,
) -> AppResult<(StatusCode, Json<Serving>)> {
    let serving = service(state).serve(&actor, input).await?;
    Ok((StatusCode::CREATED, Json(serving)))
}

pub async fn get_serving(
    State(state): State<AppState>,
    Path(serving_id): Path<Uuid>,
) -> AppResult<Json<Serving>> {
    Ok(Json(service(state).get(serving_id).await?))
}

pub async fn list_servings(
    State(state): State<AppState>,
    Query(filter): Query<ServingFilter>,
) -> AppResult<Json<Vec<ServingSummary>>> {
    Ok(Json(service(state).list(filter).await?))
}
