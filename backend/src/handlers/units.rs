//! HTTP handlers for measurement units

use axum::{extract::State, Json};

use crate::error::AppResult;
use crate::services::units::{CreateUnitInput, UnitRecord};
use crate::services::UnitService;
use crate::AppState;

pub async fn list_units(State(state): State<AppState>) -> AppResult<Json<Vec<UnitRecord>>> {
    let service = UnitService::new(state.db);
    Ok(Json(service.list().await?))
}

pub async fn create_unit(
    State(state): State<AppState>,
    Json(input): Json<CreateUnitInput>,
) -> AppResult<Json<UnitRecord>> {
    let service = UnitService::new(state.db);
    let unit = service.create(input).await?;
    Ok(Json(unit))
}
