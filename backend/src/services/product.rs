//! Product (ingredient) management service

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{is_below_minimum, validate_min_quantity, validate_name, ProductStock};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult};

/// Product service for managing ingredients
#[derive(Clone)]
pub struct ProductService {
    db: PgPool,
}

/// Product with its live balance
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: Uuid,
    pub name: String,
    pub unit_id: Uuid,
    pub unit: String,
    pub min_quantity: Decimal,
    pub current_quantity: Decimal,
    pub is_low_stock: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: Uuid,
    name: String,
    unit_id: Uuid,
    unit: String,
    min_quantity: Decimal,
    current_quantity: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            is_low_stock: is_below_minimum(row.current_quantity, row.min_quantity),
            id: row.id,
            name: row.name,
            unit_id: row.unit_id,
            unit: row.unit,
            min_quantity: row.min_quantity,
            current_quantity: row.current_quantity,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

impl From<&Product> for ProductStock {
    fn from(product: &Product) -> Self {
        Self {
            product_id: product.id,
            name: product.name.clone(),
            unit: product.unit.clone(),
            min_quantity: product.min_quantity,
            current_quantity: product.current_quantity,
        }
    }
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateProductInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub unit_id: Uuid,
    pub min_quantity: Option<Decimal>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateProductInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub unit_id: Option<Uuid>,
    pub min_quantity: Option<Decimal>,
}

/// List filters
#[derive(Debug, Default, Deserialize)]
pub struct ProductFilter {
    pub name: Option<String>,
    #[serde(default)]
    pub low_stock: bool,
}

const PRODUCT_SELECT: &str = r#"
    SELECT p.id, p.name, p.unit_id, u.short_name AS unit, p.min_quantity,
           COALESCE(d.total, 0) - COALESCE(c.total, 0) AS current_quantity,
           p.created_at, p.updated_at
    FROM products p
    JOIN units u ON u.id = p.unit_id
    LEFT JOIN (SELECT product_id, SUM(quantity) AS total FROM deliveries GROUP BY product_id) d
           ON d.product_id = p.id
    LEFT JOIN (SELECT product_id, SUM(quantity_used) AS total FROM serving_details GROUP BY product_id) c
           ON c.product_id = p.id
    WHERE p.deleted_at IS NULL
"#;

impl ProductService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a new product
    pub async fn create(&self, input: CreateProductInput) -> AppResult<Product> {
        input.validate()?;
        validate_name(&input.name)
            .map_err(|msg| AppError::validation("name", msg, "Mahsulot nomi noto'g'ri"))?;
        let min_quantity = input.min_quantity.unwrap_or(Decimal::ZERO);
        validate_min_quantity(min_quantity).map_err(|msg| {
            AppError::validation("min_quantity", msg, "Minimal miqdor 0 va 1 000 000 000 oralig'ida bo'lishi kerak")
        })?;
        self.ensure_unit_exists(input.unit_id).await?;

        let product_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO products (name, unit_id, min_quantity)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(input.unit_id)
        .bind(min_quantity)
        .fetch_one(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "name"))?;

        tracing::info!(%product_id, name = %input.name.trim(), "Product created");

        self.get(product_id).await
    }

    /// Get a non-deleted product with its balance
    pub async fn get(&self, product_id: Uuid) -> AppResult<Product> {
        let query = format!("{PRODUCT_SELECT} AND p.id = $1");
        sqlx::query_as::<_, ProductRow>(&query)
            .bind(product_id)
            .fetch_optional(&self.db)
            .await?
            .map(Product::from)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// List products ordered by name
    pub async fn list(&self, filter: ProductFilter) -> AppResult<Vec<Product>> {
        let query = format!(
            "{PRODUCT_SELECT} AND ($1::text IS NULL OR p.name ILIKE '%' || $1 || '%') ORDER BY p.name"
        );
        let rows = sqlx::query_as::<_, ProductRow>(&query)
            .bind(filter.name.as_deref().map(str::trim).filter(|name| !name.is_empty()))
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(Product::from)
            .filter(|product| !filter.low_stock || product.is_low_stock)
            .collect())
    }

    /// Products among `product_ids` strictly below their minimum
    pub async fn low_stock_among(&self, product_ids: &[Uuid]) -> AppResult<Vec<ProductStock>> {
        let query = format!("{PRODUCT_SELECT} AND p.id = ANY($1)");
        let rows = sqlx::query_as::<_, ProductRow>(&query)
            .bind(product_ids)
            .fetch_all(&self.db)
            .await?;

        Ok(rows
            .into_iter()
            .map(Product::from)
            .filter(|product| product.is_low_stock)
            .map(|product| ProductStock::from(&product))
            .collect())
    }

    /// Update name, unit or minimum quantity; changes apply to future computations
    pub async fn update(&self, product_id: Uuid, input: UpdateProductInput) -> AppResult<Product> {
        input.validate()?;
        if let Some(name) = &input.name {
            validate_name(name)
                .map_err(|msg| AppError::validation("name", msg, "Mahsulot nomi noto'g'ri"))?;
        }
        if let Some(min_quantity) = input.min_quantity {
            validate_min_quantity(min_quantity).map_err(|msg| {
                AppError::validation(
                    "min_quantity",
                    msg,
                    "Minimal miqdor 0 va 1 000 000 000 oralig'ida bo'lishi kerak",
                )
            })?;
        }
        if let Some(unit_id) = input.unit_id {
            self.ensure_unit_exists(unit_id).await?;
        }

        let result = sqlx::query(
            r#"
            UPDATE products
            SET name = COALESCE($1, name),
                unit_id = COALESCE($2, unit_id),
                min_quantity = COALESCE($3, min_quantity),
                updated_at = NOW()
            WHERE id = $4 AND deleted_at IS NULL
            "#,
        )
        .bind(input.name.as_deref().map(str::trim))
        .bind(input.unit_id)
        .bind(input.min_quantity)
        .bind(product_id)
        .execute(&self.db)
        .await
        .map_err(|e| map_unique_violation(e, "name"))?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        self.get(product_id).await
    }

    /// Soft delete; history (deliveries, servings) is kept
    pub async fn delete(&self, product_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE products SET deleted_at = NOW() WHERE id = $1 AND deleted_at IS NULL",
        )
        .bind(product_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        tracing::info!(%product_id, "Product deleted");
        Ok(())
    }

    async fn ensure_unit_exists(&self, unit_id: Uuid) -> AppResult<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM units WHERE id = $1)")
            .bind(unit_id)
            .fetch_one(&self.db)
            .await?;

        if !exists {
            return Err(AppError::NotFound("Unit".to_string()));
        }
        Ok(())
    }
}
