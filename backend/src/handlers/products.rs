//! HTTP handlers for product (ingredient) endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Serialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::inventory::current_quantity;
use crate::services::portions::spawn_recalculation;
use crate::services::product::{CreateProductInput, Product, ProductFilter, UpdateProductInput};
use crate::services::ProductService;
use crate::AppState;

#[derive(Serialize)]
pub struct ProductQuantity {
    pub product_id: Uuid,
    pub unit: String,
    pub current_quantity: Decimal,
}

/// List products with live balances
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> AppResult<Json<Vec<Product>>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.list(filter).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Json(input): Json<CreateProductInput>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let service = ProductService::new(state.db);
    let product = service.create(input).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db);
    Ok(Json(service.get(product_id).await?))
}

/// Live ledger balance of a product
pub async fn get_product_quantity(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<Json<ProductQuantity>> {
    let product = ProductService::new(state.db.clone()).get(product_id).await?;
    let current_quantity = current_quantity(&state.db, product_id).await?;
    Ok(Json(ProductQuantity {
        product_id,
        unit: product.unit,
        current_quantity,
    }))
}

/// Update a product; a unit change affects possible portions
pub async fn update_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
    Json(input): Json<UpdateProductInput>,
) -> AppResult<Json<Product>> {
    let service = ProductService::new(state.db.clone());
    let product = service.update(product_id, input).await?;
    spawn_recalculation(state.db, state.events);
    Ok(Json(product))
}

pub async fn delete_product(
    State(state): State<AppState>,
    Path(product_id): Path<Uuid>,
) -> AppResult<StatusCode> {
    let service = ProductService::new(state.db.clone());
    service.delete(product_id).await?;
    spawn_recalculation(state.db, state.events);
    Ok(StatusCode::NO_CONTENT)
}
