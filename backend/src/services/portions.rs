//! Possible-portions snapshots
//!
//! One row per active recipe, refreshed by [`PortionService::recalculate_all`]
//! (scheduler, recipe changes, servings). The monthly report reads these rows
//! as "possible portions at report time".

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use shared::{possible_portions, KitchenEvent};
use sqlx::{FromRow, PgExecutor, PgPool};
use uuid::Uuid;

use super::inventory::current_quantities;
use super::notification::EventBus;
use super::recipe::{load_active_definitions, load_definition};
use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct PortionService {
    db: PgPool,
    events: EventBus,
}

/// Live calculation for one recipe
#[derive(Debug, Clone, Serialize)]
pub struct PortionCalculation {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub portions: i64,
    pub limiting_product_id: Option<Uuid>,
    pub limiting_product_name: Option<String>,
    pub calculated_at: DateTime<Utc>,
}

/// Stored snapshot row
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PortionSnapshot {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub portions: i64,
    pub limiting_product_id: Option<Uuid>,
    pub limiting_product_name: Option<String>,
    pub limiting_product_unit: Option<String>,
    pub calculated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecalculationSummary {
    pub recipes: usize,
    pub recalculated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct SnapshotValueRow {
    recipe_id: Uuid,
    portions: i64,
}

impl PortionService {
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Compute possible portions of one recipe from live balances; nothing is stored
    pub async fn calculate_for_recipe(&self, recipe_id: Uuid) -> AppResult<PortionCalculation> {
        let definition = load_definition(&self.db, recipe_id)
            .await?
            .filter(|definition| !definition.is_deleted)
            .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        let product_ids: Vec<Uuid> = definition.requirements.iter().map(|r| r.product_id).collect();
        let stock = current_quantities(&self.db, &product_ids).await?;
        let availability = possible_portions(&definition, &stock);

        let limiting_product_name = availability.limiting_product_id.and_then(|id| {
            definition
                .requirements
                .iter()
                .find(|r| r.product_id == id)
                .map(|r| r.product_name.clone())
        });

        Ok(PortionCalculation {
            recipe_id,
            recipe_name: definition.name,
            portions: availability.portions,
            limiting_product_id: availability.limiting_product_id,
            limiting_product_name,
            calculated_at: Utc::now(),
        })
    }

    /// Recompute every active recipe and replace the snapshot table.
    ///
    /// Recipes that are no longer active lose their row.
    pub async fn recalculate_all(&self) -> AppResult<RecalculationSummary> {
        let mut tx = self.db.begin().await?;

        let definitions = load_active_definitions(&mut *tx).await?;
        let mut product_ids: Vec<Uuid> = definitions
            .iter()
            .flat_map(|d| d.requirements.iter().map(|r| r.product_id))
            .collect();
        product_ids.sort();
        product_ids.dedup();

        let stock = current_quantities(&mut *tx, &product_ids).await?;
        let recalculated_at = Utc::now();

        for definition in &definitions {
            let availability = possible_portions(definition, &stock);
            sqlx::query(
                r#"
                INSERT INTO possible_portions (recipe_id, portions, limiting_product_id, calculated_at)
                VALUES ($1, $2, $3, $4)
                ON CONFLICT (recipe_id) DO UPDATE
                SET portions = EXCLUDED.portions,
                    limiting_product_id = EXCLUDED.limiting_product_id,
                    calculated_at = EXCLUDED.calculated_at
                "#,
            )
            .bind(definition.id)
            .bind(availability.portions)
            .bind(availability.limiting_product_id)
            .bind(recalculated_at)
            .execute(&mut *tx)
            .await?;
        }

        let active_ids: Vec<Uuid> = definitions.iter().map(|d| d.id).collect();
        sqlx::query("DELETE FROM possible_portions WHERE NOT (recipe_id = ANY($1))")
            .bind(&active_ids)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        tracing::info!(recipes = definitions.len(), "Possible portions recalculated");

        self.events
            .publish(KitchenEvent::PossiblePortionsRecalculated { recalculated_at });

        Ok(RecalculationSummary {
            recipes: definitions.len(),
            recalculated_at,
        })
    }

    /// Stored snapshots, fewest portions first
    pub async fn list_snapshots(&self) -> AppResult<Vec<PortionSnapshot>> {
        let snapshots = sqlx::query_as::<_, PortionSnapshot>(
            r#"
            SELECT pp.recipe_id, r.name AS recipe_name, pp.portions, pp.limiting_product_id,
                   p.name AS limiting_product_name, u.short_name AS limiting_product_unit,
                   pp.calculated_at
            FROM possible_portions pp
            JOIN recipes r ON r.id = pp.recipe_id
            LEFT JOIN products p ON p.id = pp.limiting_product_id
            LEFT JOIN units u ON u.id = p.unit_id
            WHERE r.deleted_at IS NULL
            ORDER BY pp.portions ASC, r.name
            "#,
        )
        .fetch_all(&self.db)
        .await?;

        Ok(snapshots)
    }
}

/// Snapshot value per recipe; recipes without a row are absent
pub async fn snapshot_values<'e, E>(executor: E) -> AppResult<HashMap<Uuid, i64>>
where
    E: PgExecutor<'e>,
{
    let rows = sqlx::query_as::<_, SnapshotValueRow>(
        "SELECT recipe_id, portions FROM possible_portions",
    )
    .fetch_all(executor)
    .await?;

    Ok(rows.into_iter().map(|row| (row.recipe_id, row.portions)).collect())
}

/// Recompute in the background; failures are logged only
pub fn spawn_recalculation(db: PgPool, events: EventBus) {
    tokio::spawn(async move {
        if let Err(e) = PortionService::new(db, events).recalculate_all().await {
            tracing::warn!(error = %e, "Possible portions recalculation failed");
        }
    });
}
