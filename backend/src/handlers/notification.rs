//! HTTP handlers for notifications

use axum::{
    extract::{Path, Query, State},
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::notification::Notification;
use crate::services::NotificationService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct NotificationQuery {
    #[serde(default)]
    pub unread_only: bool,
}

#[derive(Serialize)]
pub struct MarkAllReadResponse {
    pub updated: u64,
}

pub async fn list_notifications(
    State(state): State<AppState>,
    Query(query): Query<NotificationQuery>,
) -> AppResult<Json<Vec<Notification>>> {
    let service = NotificationService::new(state.db, state.events);
    Ok(Json(service.list(query.unread_only).await?))
}

pub async fn mark_notification_read(
    State(state): State<AppState>,
    Path(notification_id): Path<Uuid>,
) -> AppResult<Json<Notification>> {
    let service = NotificationService::new(state.db, state.events);
    Ok(Json(service.mark_read(notification_id).await?))
}

pub async fn mark_all_read(State(state): State<AppState>) -> AppResult<Json<MarkAllReadResponse>> {
    let service = NotificationService::new(state.db, state.events);
    let updated = service.mark_all_read().await?;
    Ok(Json(MarkAllReadResponse { updated }))
}
