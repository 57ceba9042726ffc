//! HTTP handlers for recipe endpoints
//!
//! Every change to a recipe refreshes the possible-portions snapshots.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::portions::{spawn_recalculation, PortionCalculation};
use crate::services::recipe::{CreateRecipeInput, Recipe, RecipeFilter, UpdateRecipeInput};
use crate::services::{PortionService, RecipeService};
use crate::AppState;

pub async fn list_recipes(
    State(state): State<AppState>,
    Query(filter): Query<RecipeFilter>,
) -> AppResult<Json<Vec<Recipe>>> {
    let service = RecipeService::new(state.db);
    Ok(Json(service.list(filter).await?))
}

pub async fn create_recipe(
    State(state): State<AppState>,
    Json(input): Json<CreateRecipeInput>,
) -> AppResult<(StatusCode, Json<Recipe>)> {
    let service = RecipeService::new(state.db.clone());
    let recipe = service.create(input).await?;
    spawn_recalculation(state.db, state.events);
    Ok((StatusCode::CREATED, Json(recipe)))
}

pub async fn get_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<Recipe>> {
    let service = RecipeService::new(state.db);
    Ok(Json(service.get(recipe_id).await?))
}

pub async fn update_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
    Json(input): Json<UpdateRecipeInput>,
) -> AppResult<Json<Recipe>> {
    let service = RecipeService::new(state.db.clone());
    let recipe = service.update(recipe_id, input).await?;
    spawn_recalculation(state.db, state.events);
    Ok(Json(recipe))
}

pub async fn delete_recipe(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = RecipeService::new(state.db.clone());
    service.delete(recipe_id).await?;
    spawn_recalculation(state.db, state.events);
    Ok(StatusCode::NO_CONTENT)
}

/// Live possible portions for one recipe
pub async fn get_possible_portions(
    State(state): State<AppState>,
    Path(recipe_id): Path<Uuid>,
) -> AppResult<Json<PortionCalculation>> {
    let service = PortionService::new(state.db, state.events);
    Ok(Json(service.calculate_for_recipe(recipe_id).await?))
}
