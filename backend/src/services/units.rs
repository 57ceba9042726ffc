//! Measurement unit reference data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shared::{validate_name, DEFAULT_UNITS};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult};

/// Unit service for listing and registering units
#[derive(Clone)]
pub struct UnitService {
    db: PgPool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UnitRecord {
    pub id: Uuid,
    pub name: String,
    pub short_name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateUnitInput {
    #[validate(length(min = 1, max = 50))]
    pub name: String,
    #[validate(length(min = 1, max = 20))]
    pub short_name: String,
}

impl UnitService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> AppResult<Vec<UnitRecord>> {
        let units = sqlx::query_as::<_, UnitRecord>(
            "SELECT id, name, short_name, created_at FROM units ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        Ok(units)
    }

    pub async fn get(&self, unit_id: Uuid) -> AppResult<UnitRecord> {
        sqlx::query_as::<_, UnitRecord>(
            "SELECT id, name, short_name, created_at FROM units WHERE id = $1",
        )
        .bind(unit_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Unit".to_string()))
    }

    pub async fn create(&self, input: CreateUnitInput) -> AppResult<UnitRecord> {
        input.validate()?;
        validate_name(&input.name)
            .map_err(|msg| AppError::validation("name", msg, "Birlik nomi noto'g'ri"))?;

        sqlx::query_as::<_, UnitRecord>(
            r#"
            INSERT INTO units (name, short_name)
            VALUES ($1, $2)
            RETURNING id, name, short_name, created_at
            "#,
        )
        .bind(input.name.trim())
        .bind(input.short_name.trim())
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "unit"))
    }

    /// Insert the default unit set; existing units are left alone
    pub async fn seed_default_units(&self) -> AppResult<u64> {
        let mut inserted = 0;
        for (name, short_name) in DEFAULT_UNITS {
            let result = sqlx::query(
                "INSERT INTO units (name, short_name) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(name)
            .bind(short_name)
            .execute(&self.db)
            .await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }
}
