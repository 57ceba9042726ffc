//! Inventory service: deliveries and stock ledger queries
//!
//! On-hand stock is never stored. It is always the sum of deliveries minus
//! the sum of serving details for a product, both in the product's base unit.
//! The ledger queries accept any executor so they can run inside the
//! transaction that acts on their result.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{validate_delivery_quantity, validate_price, KitchenEvent, StockLevels};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use super::notification::EventBus;
use crate::error::{AppError, AppResult};

/// Inventory service for recording deliveries
#[derive(Clone)]
pub struct InventoryService {
    db: PgPool,
    events: EventBus,
}

/// Delivery (receipt) record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Delivery {
    pub id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub quantity: Decimal,
    pub supplier: Option<String>,
    pub price: Option<Decimal>,
    pub delivered_at: DateTime<Utc>,
    pub received_by: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a delivery; quantity is in the product's base unit
#[derive(Debug, Deserialize)]
pub struct RecordDeliveryInput {
    pub product_id: Uuid,
    pub quantity: Decimal,
    pub supplier: Option<String>,
    pub price: Option<Decimal>,
    pub delivered_at: Option<DateTime<Utc>>,
}

/// Row for balance queries
#[derive(Debug, FromRow)]
struct BalanceRow {
    product_id: Uuid,
    quantity: Decimal,
}

#[derive(Debug, FromRow)]
struct DeliveredProductRow {
    name: String,
    unit: String,
}

impl InventoryService {
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Record a delivery and broadcast the new stock level
    pub async fn record_delivery(
        &self,
        received_by: Uuid,
        input: RecordDeliveryInput,
    ) -> AppResult<Delivery> {
        validate_delivery_quantity(input.quantity).map_err(|msg| {
            AppError::validation("quantity", msg, "Miqdor 0 dan katta va 1 000 000 000 dan oshmasligi kerak")
        })?;
        validate_price(input.price)
            .map_err(|msg| AppError::validation("price", msg, "Narx 0 va 1 000 000 000 oralig'ida bo'lishi kerak"))?;

        let product = sqlx::query_as::<_, DeliveredProductRow>(
            r#"
            SELECT p.name, u.short_name AS unit
            FROM products p
            JOIN units u ON u.id = p.unit_id
            WHERE p.id = $1 AND p.deleted_at IS NULL
            "#,
        )
        .bind(input.product_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let delivered_at = input.delivered_at.unwrap_or_else(Utc::now);

        let delivery = sqlx::query_as::<_, Delivery>(
            r#"
            INSERT INTO deliveries (product_id, quantity, supplier, price, delivered_at, received_by)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING id, product_id, $7::text AS product_name, $8::text AS unit, quantity,
                      supplier, price, delivered_at, received_by, created_at
            "#,
        )
        .bind(input.product_id)
        .bind(input.quantity)
        .bind(input.supplier.as_deref().map(str::trim))
        .bind(input.price)
        .bind(delivered_at)
        .bind(received_by)
        .bind(&product.name)
        .bind(&product.unit)
        .fetch_one(&self.db)
        .await?;

        let new_total_quantity = current_quantity(&self.db, input.product_id).await?;

        tracing::info!(
            delivery_id = %delivery.id,
            product_id = %delivery.product_id,
            quantity = %delivery.quantity,
            new_total = %new_total_quantity,
            "Delivery recorded"
        );

        self.events.publish(KitchenEvent::StockReceived {
            delivery_id: delivery.id,
            product_id: delivery.product_id,
            quantity: delivery.quantity,
            new_total_quantity,
            unit: delivery.unit.clone(),
        });

        Ok(delivery)
    }

    /// List deliveries, newest first, optionally for one product
    pub async fn list_deliveries(&self, product_id: Option<Uuid>) -> AppResult<Vec<Delivery>> {
        let deliveries = sqlx::query_as::<_, Delivery>(
            r#"
            SELECT d.id, d.product_id, p.name AS product_name, u.short_name AS unit, d.quantity,
                   d.supplier, d.price, d.delivered_at, d.received_by, d.created_at
            FROM deliveries d
            JOIN products p ON p.id = d.product_id
            JOIN units u ON u.id = p.unit_id
            WHERE ($1::uuid IS NULL OR d.product_id = $1)
            ORDER BY d.delivered_at DESC
            "#,
        )
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(deliveries)
    }
}

// ============================================================================
// Ledger queries
// ============================================================================

/// Live balance of one product; zero when it has no history
pub async fn current_quantity<'e, E>(executor: E, product_id: Uuid) -> AppResult<Decimal>
where
    E: PgExecutor<'e>,
{
    let levels = current_quantities(executor, &[product_id]).await?;
    Ok(shared::stock_of(&levels, product_id))
}

/// Live balances for `product_ids`
pub async fn current_quantities<'e, E>(executor: E, product_ids: &[Uuid]) -> AppResult<StockLevels>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, BalanceRow>(
        r#"
        SELECT p.id AS product_id,
               COALESCE((SELECT SUM(d.quantity) FROM deliveries d WHERE d.product_id = p.id), 0)
             - COALESCE((SELECT SUM(sd.quantity_used) FROM serving_details sd WHERE sd.product_id = p.id), 0)
               AS quantity
        FROM products p
        WHERE p.id = ANY($1)
        "#,
    )
    .bind(product_ids)
    .fetch_all(executor)
    .await?;

    Ok(into_levels(rows))
}

/// Balances from facts strictly before `cutoff`
pub async fn quantities_as_of<'e, E>(
    executor: E,
    product_ids: &[Uuid],
    cutoff: DateTime<Utc>,
) -> AppResult<StockLevels>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, BalanceRow>(
        r#"
        SELECT p.id AS product_id,
               COALESCE((SELECT SUM(d.quantity) FROM deliveries d
                         WHERE d.product_id = p.id AND d.delivered_at < $2), 0)
             - COALESCE((SELECT SUM(sd.quantity_used) FROM serving_details sd
                         JOIN servings s ON s.id = sd.serving_id
                         WHERE sd.product_id = p.id AND s.served_at < $2), 0)
               AS quantity
        FROM products p
        WHERE p.id = ANY($1)
        "#,
    )
    .bind(product_ids)
    .bind(cutoff)
    .fetch_all(executor)
    .await?;

    Ok(into_levels(rows))
}

/// Delivered quantity per product within `[start, end)`
pub async fn received_between<'e, E>(
    executor: E,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AppResult<HashMap<Uuid, Decimal>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, BalanceRow>(
        r#"
        SELECT product_id, SUM(quantity) AS quantity
        FROM deliveries
        WHERE delivered_at >= $1 AND delivered_at < $2
        GROUP BY product_id
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(executor)
    .await?;

    Ok(into_levels(rows))
}

/// Debited quantity per product by servings within `[start, end)`
pub async fn consumed_between<'e, E>(
    executor: E,
    start: DateTime<Utc>,
    end: DateTime<Utc>,
) -> AppResult<HashMap<Uuid, Decimal>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, BalanceRow>(
        r#"
        SELECT sd.product_id, SUM(sd.quantity_used) AS quantity
        FROM serving_details sd
        JOIN servings s ON s.id = sd.serving_id
        WHERE s.served_at >= $1 AND s.served_at < $2
        GROUP BY sd.product_id
        "#,
    )
    .bind(start)
    .bind(end)
    .fetch_all(executor)
    .await?;

    Ok(into_levels(rows))
}

fn into_levels(rows: Vec<BalanceRow>) -> StockLevels {
    rows.into_iter()
        .map(|row| (row.product_id, row.quantity))
        .collect()
}
