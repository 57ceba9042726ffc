//! HTTP handlers for deliveries

use axum::{
    extract::{Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::middleware::CurrentActor;
use crate::services::inventory::{Delivery, RecordDeliveryInput};
use crate::services::portions::spawn_recalculation;
use crate::services::InventoryService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct DeliveryQuery {
    pub product_id: Option<Uuid>,
}

/// Record a delivery; stock rises, so possible portions are refreshed
pub async fn record_delivery(
    State(state): State<AppState>,
    CurrentActor(actor): CurrentActor,
    Json(input): Json<RecordDeliveryInput>,
) -> AppResult<(StatusCode, Json<Delivery>)> {
    let service = InventoryService::new(state.db.clone(), state.events.clone());
    let delivery = service.record_delivery(actor.user_id, input).await?;
    spawn_recalculation(state.db, state.events);
    Ok((StatusCode::CREATED, Json(delivery)))
}

pub async fn list_deliveries(
    State(state): State<AppState>,
    Query(query): Query<DeliveryQuery>,
) -> AppResult<Json<Vec<Delivery>>> {
    let service = InventoryService::new(state.db, state.events);
    Ok(Json(service.list_deliveries(query.product_id).await?))
}
