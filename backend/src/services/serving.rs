//! Serving service: debits stock for served meals
//!
//! A serving is planned and written inside one transaction holding row locks
//! on every consumed product, so concurrent servings of shared products are
//! applied one after another and never oversell.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{plan_serving, validate_portions, KitchenEvent, ServingPlan};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use super::inventory::current_quantities;
use super::notification::{EventBus, NotificationService};
use super::portions::spawn_recalculation;
use super::product::ProductService;
use super::recipe::load_definition;
use crate::error::{AppError, AppResult};
use crate::middleware::Actor;

#[derive(Clone)]
pub struct ServingService {
    db: PgPool,
    events: EventBus,
    low_stock_alerts: bool,
}

#[derive(Debug, Deserialize)]
pub struct ServeInput {
    pub recipe_id: Uuid,
    pub portions: i32,
    pub notes: Option<String>,
}

/// Serving with the debits it made
#[derive(Debug, Clone, Serialize)]
pub struct Serving {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub portions_served: i32,
    pub served_at: DateTime<Utc>,
    pub served_by: Uuid,
    pub notes: Option<String>,
    pub details: Vec<ServingDetail>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ServingDetail {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub quantity_used: Decimal,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ServingSummary {
    pub id: Uuid,
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub portions_served: i32,
    pub served_at: DateTime<Utc>,
    pub served_by: Uuid,
    pub notes: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ServingFilter {
    pub recipe_id: Option<Uuid>,
    pub served_by: Option<Uuid>,
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl ServingService {
    pub fn new(db: PgPool, events: EventBus, low_stock_alerts: bool) -> Self {
        Self {
            db,
            events,
            low_stock_alerts,
        }
    }

    /// Serve `portions` of a recipe, debiting every ingredient or nothing
    pub async fn serve(&self, actor: &Actor, input: ServeInput) -> AppResult<Serving> {
        validate_portions(input.portions).map_err(|msg| {
            AppError::validation("portions", msg, "Porsiyalar soni 1 va 100 000 oralig'ida bo'lishi kerak")
        })?;

        let mut tx = self.db.begin().await?;

        // Shared lock: servings may run side by side, recipe edits wait
        let recipe_exists: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM recipes WHERE id = $1 AND deleted_at IS NULL FOR SHARE",
        )
        .bind(input.recipe_id)
        .fetch_optional(&mut *tx)
        .await?;
        if recipe_exists.is_none() {
            return Err(AppError::NotFound("Recipe".to_string()));
        }

        // Lock every product the recipe uses before reading any of them, in
        // ascending id order so concurrent servings cannot deadlock
        let product_ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            SELECT p.id
            FROM products p
            WHERE p.id IN (SELECT product_id FROM recipe_ingredients WHERE recipe_id = $1)
            ORDER BY p.id
            FOR UPDATE
            "#,
        )
        .bind(input.recipe_id)
        .fetch_all(&mut *tx)
        .await?;

        // Base units and removal flags are read under the locks, so a
        // concurrent product edit either lands before this or waits for commit
        let definition = load_definition(&mut *tx, input.recipe_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        let stock = current_quantities(&mut *tx, &product_ids).await?;

        let plan = match plan_serving(&definition, input.portions, &stock) {
            Ok(plan) => plan,
            Err(e) => {
                tracing::info!(
                    recipe_id = %input.recipe_id,
                    portions = input.portions,
                    reason = %e,
                    "Serving rejected"
                );
                return Err(e.into());
            }
        };

        // Stamped under the product locks so servings of one product follow commit order
        let served_at = Utc::now();
        let notes = input.notes.as_deref().map(str::trim).filter(|n| !n.is_empty());

        let serving_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO servings (recipe_id, portions_served, served_at, served_by, notes)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(plan.recipe_id)
        .bind(plan.portions)
        .bind(served_at)
        .bind(actor.user_id)
        .bind(notes)
        .fetch_one(&mut *tx)
        .await?;

        for planned in &plan.consumption {
            sqlx::query(
                r#"
                INSERT INTO serving_details (serving_id, product_id, quantity_used)
                VALUES ($1, $2, $3)
                "#,
            )
            .bind(serving_id)
            .bind(planned.product_id)
            .bind(planned.quantity)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;

        tracing::info!(
            %serving_id,
            recipe_id = %plan.recipe_id,
            portions = plan.portions,
            products = plan.consumption.len(),
            "Serving accepted"
        );

        self.after_serving(serving_id, &definition.name, served_at, &plan);

        Ok(Serving {
            id: serving_id,
            recipe_id: plan.recipe_id,
            recipe_name: definition.name,
            portions_served: plan.portions,
            served_at,
            served_by: actor.user_id,
            notes: notes.map(str::to_string),
            details: plan
                .consumption
                .into_iter()
                .map(|planned| ServingDetail {
                    product_id: planned.product_id,
                    product_name: planned.product_name,
                    unit: planned.unit,
                    quantity_used: planned.quantity,
                })
                .collect(),
        })
    }

    /// Best-effort follow-ups; the serving is already committed
    fn after_serving(
        &self,
        serving_id: Uuid,
        recipe_name: &str,
        served_at: DateTime<Utc>,
        plan: &ServingPlan,
    ) {
        self.events.publish(KitchenEvent::MealServed {
            serving_id,
            recipe_id: plan.recipe_id,
            recipe_name: recipe_name.to_string(),
            portions_served: plan.portions,
            served_at,
        });

        if self.low_stock_alerts {
            let db = self.db.clone();
            let events = self.events.clone();
            let product_ids = plan.product_ids();
            tokio::spawn(async move {
                if let Err(e) = check_low_stock(db, events, &product_ids).await {
                    tracing::warn!(error = %e, %serving_id, "Low-stock check failed");
                }
            });
        }

        spawn_recalculation(self.db.clone(), self.events.clone());
    }

    pub async fn get(&self, serving_id: Uuid) -> AppResult<Serving> {
        let summary = sqlx::query_as::<_, ServingSummary>(
            r#"
            SELECT s.id, s.recipe_id, r.name AS recipe_name, s.portions_served,
                   s.served_at, s.served_by, s.notes
            FROM servings s
            JOIN recipes r ON r.id = s.recipe_id
            WHERE s.id = $1
            "#,
        )
        .bind(serving_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Serving".to_string()))?;

        let details = sqlx::query_as::<_, ServingDetail>(
            r#"
            SELECT sd.product_id, p.name AS product_name, u.short_name AS unit, sd.quantity_used
            FROM serving_details sd
            JOIN products p ON p.id = sd.product_id
            JOIN units u ON u.id = p.unit_id
            WHERE sd.serving_id = $1
            ORDER BY p.name
            "#,
        )
        .bind(serving_id)
        .fetch_all(&self.db)
        .await?;

        Ok(Serving {
            id: summary.id,
            recipe_id: summary.recipe_id,
            recipe_name: summary.recipe_name,
            portions_served: summary.portions_served,
            served_at: summary.served_at,
            served_by: summary.served_by,
            notes: summary.notes,
            details,
        })
    }

    /// Servings newest first; `start` inclusive, `end` exclusive
    pub async fn list(&self, filter: ServingFilter) -> AppResult<Vec<ServingSummary>> {
        let servings = sqlx::query_as::<_, ServingSummary>(
            r#"
            SELECT s.id, s.recipe_id, r.name AS recipe_name, s.portions_served,
                   s.served_at, s.served_by, s.notes
            FROM servings s
            JOIN recipes r ON r.id = s.recipe_id
            WHERE ($1::uuid IS NULL OR s.recipe_id = $1)
              AND ($2::uuid IS NULL OR s.served_by = $2)
              AND ($3::timestamptz IS NULL OR s.served_at >= $3)
              AND ($4::timestamptz IS NULL OR s.served_at < $4)
            ORDER BY s.served_at DESC
            "#,
        )
        .bind(filter.recipe_id)
        .bind(filter.served_by)
        .bind(filter.start)
        .bind(filter.end)
        .fetch_all(&self.db)
        .await?;

        Ok(servings)
    }
}

async fn check_low_stock(db: PgPool, events: EventBus, product_ids: &[Uuid]) -> AppResult<()> {
    let low = ProductService::new(db.clone())
        .low_stock_among(product_ids)
        .await?;
    let notifications = NotificationService::new(db, events);
    for stock in &low {
        notifications.notify_low_stock(stock).await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::UnitService;
    use std::time::Duration;

    async fn unit_id(pool: &PgPool, short_name: &str) -> Uuid {
        sqlx::query_scalar("SELECT id FROM units WHERE short_name = $1")
            .bind(short_name)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    // Needs Postgres: DATABASE_URL=postgres://... cargo test -- --ignored unit_change
    #[tokio::test]
    #[ignore]
    async fn test_serving_uses_unit_change_committed_while_it_waits() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();
        UnitService::new(pool.clone()).seed_default_units().await.unwrap();
        let kg = unit_id(&pool, "kg").await;
        let gr = unit_id(&pool, "gr").await;

        let product_id: Uuid = sqlx::query_scalar(
            "INSERT INTO products (name, unit_id) VALUES ($1, $2) RETURNING id",
        )
        .bind(format!("Guruch {}", Uuid::new_v4()))
        .bind(kg)
        .fetch_one(&pool)
        .await
        .unwrap();
        sqlx::query("INSERT INTO deliveries (product_id, quantity) VALUES ($1, 10)")
            .bind(product_id)
            .execute(&pool)
            .await
            .unwrap();
        let recipe_id: Uuid = sqlx::query_scalar("INSERT INTO recipes (name) VALUES ($1) RETURNING id")
            .bind(format!("Osh {}", Uuid::new_v4()))
            .fetch_one(&pool)
            .await
            .unwrap();
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, product_id, quantity_per_portion, unit_id, position)
            VALUES ($1, $2, 6, $3, 0)
            "#,
        )
        .bind(recipe_id)
        .bind(product_id)
        .bind(kg)
        .execute(&pool)
        .await
        .unwrap();

        // Stock is re-counted in grams while the serving is queued on the row lock
        let mut editor = pool.begin().await.unwrap();
        sqlx::query("UPDATE products SET unit_id = $1 WHERE id = $2")
            .bind(gr)
            .bind(product_id)
            .execute(&mut *editor)
            .await
            .unwrap();

        let service = ServingService::new(pool.clone(), EventBus::new(16), false);
        let actor = Actor {
            user_id: Uuid::new_v4(),
        };
        let serving = tokio::spawn(async move {
            service
                .serve(
                    &actor,
                    ServeInput {
                        recipe_id,
                        portions: 1,
                        notes: None,
                    },
                )
                .await
        });

        tokio::time::sleep(Duration::from_millis(300)).await;
        editor.commit().await.unwrap();

        // 6 kg is 6000 gr against 10 gr on hand
        let result = serving.await.unwrap();
        assert!(matches!(
            result,
            Err(AppError::InsufficientStock { ref unit, required, .. })
                if unit == "gr" && required == Decimal::from(6000)
        ));
    }
}
