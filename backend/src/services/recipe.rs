//! Recipe management service
//!
//! Recipes own an ordered list of ingredient lines. Updating the lines
//! replaces the whole list in one transaction.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{validate_name, validate_quantity_per_portion, IngredientRequirement, RecipeDefinition};
use sqlx::{FromRow, PgExecutor, PgPool, Postgres, Transaction};
use uuid::Uuid;
use validator::Validate;

use crate::error::{map_unique_violation, AppError, AppResult};

/// Recipe service for managing meals and their ingredients
#[derive(Clone)]
pub struct RecipeService {
    db: PgPool,
}

/// Recipe with its ingredient lines
#[derive(Debug, Clone, Serialize)]
pub struct Recipe {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub ingredients: Vec<RecipeIngredient>,
}

#[derive(Debug, FromRow)]
struct RecipeRow {
    id: Uuid,
    name: String,
    description: Option<String>,
    is_active: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

/// One ingredient line as shown to clients
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipeIngredient {
    #[serde(skip)]
    pub recipe_id: Uuid,
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_per_portion: Decimal,
    pub unit_id: Uuid,
    pub unit: String,
    /// Unit the product's stock is tracked in
    pub base_unit: String,
    pub position: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IngredientInput {
    pub product_id: Uuid,
    pub quantity_per_portion: Decimal,
    pub unit_id: Uuid,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateRecipeInput {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    #[serde(default)]
    pub ingredients: Vec<IngredientInput>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateRecipeInput {
    #[validate(length(min = 1, max = 100))]
    pub name: Option<String>,
    pub description: Option<String>,
    pub is_active: Option<bool>,
    /// When present, replaces every ingredient line
    pub ingredients: Option<Vec<IngredientInput>>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecipeFilter {
    pub active: Option<bool>,
    pub name: Option<String>,
}

const RECIPE_COLUMNS: &str = "id, name, description, is_active, created_at, updated_at";

impl RecipeService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Create a recipe together with its ingredient lines
    pub async fn create(&self, input: CreateRecipeInput) -> AppResult<Recipe> {
        input.validate()?;
        validate_name(&input.name)
            .map_err(|msg| AppError::validation("name", msg, "Taom nomi noto'g'ri"))?;
        self.validate_ingredients(&input.ingredients).await?;

        let mut tx = self.db.begin().await?;

        let recipe_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO recipes (name, description, is_active)
            VALUES ($1, $2, $3)
            RETURNING id
            "#,
        )
        .bind(input.name.trim())
        .bind(&input.description)
        .bind(input.is_active.unwrap_or(true))
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "name"))?;

        insert_ingredients(&mut tx, recipe_id, &input.ingredients).await?;

        tx.commit().await?;

        tracing::info!(%recipe_id, ingredients = input.ingredients.len(), "Recipe created");

        self.get(recipe_id).await
    }

    /// Get a non-deleted recipe with its ingredient lines
    pub async fn get(&self, recipe_id: Uuid) -> AppResult<Recipe> {
        let query = format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes WHERE id = $1 AND deleted_at IS NULL"
        );
        let row = sqlx::query_as::<_, RecipeRow>(&query)
            .bind(recipe_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe".to_string()))?;

        let ingredients = self.ingredients_for(&[recipe_id]).await?;
        Ok(assemble(row, ingredients))
    }

    /// List non-deleted recipes ordered by name
    pub async fn list(&self, filter: RecipeFilter) -> AppResult<Vec<Recipe>> {
        let query = format!(
            r#"
            SELECT {RECIPE_COLUMNS} FROM recipes
            WHERE deleted_at IS NULL
              AND ($1::boolean IS NULL OR is_active = $1)
              AND ($2::text IS NULL OR name ILIKE '%' || $2 || '%')
            ORDER BY name
            "#
        );
        let rows = sqlx::query_as::<_, RecipeRow>(&query)
            .bind(filter.active)
            .bind(filter.name.as_deref().map(str::trim).filter(|name| !name.is_empty()))
            .fetch_all(&self.db)
            .await?;

        let ids: Vec<Uuid> = rows.iter().map(|row| row.id).collect();
        let mut ingredients = self.ingredients_for(&ids).await?;

        Ok(rows
            .into_iter()
            .map(|row| {
                let (own, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut ingredients)
                    .into_iter()
                    .partition(|line| line.recipe_id == row.id);
                ingredients = rest;
                assemble(row, own)
            })
            .collect())
    }

    /// Update fields and, when given, replace the whole ingredient list atomically
    pub async fn update(&self, recipe_id: Uuid, input: UpdateRecipeInput) -> AppResult<Recipe> {
        input.validate()?;
        if let Some(name) = &input.name {
            validate_name(name)
                .map_err(|msg| AppError::validation("name", msg, "Taom nomi noto'g'ri"))?;
        }
        if let Some(ingredients) = &input.ingredients {
            self.validate_ingredients(ingredients).await?;
        }

        let mut tx = self.db.begin().await?;

        // Blocks concurrent servings of this recipe until the new lines are in place
        let locked: Option<Uuid> = sqlx::query_scalar(
            "SELECT id FROM recipes WHERE id = $1 AND deleted_at IS NULL FOR UPDATE",
        )
        .bind(recipe_id)
        .fetch_optional(&mut *tx)
        .await?;
        if locked.is_none() {
            return Err(AppError::NotFound("Recipe".to_string()));
        }

        sqlx::query(
            r#"
            UPDATE recipes
            SET name = COALESCE($1, name),
                description = COALESCE($2, description),
                is_active = COALESCE($3, is_active),
                updated_at = NOW()
            WHERE id = $4
            "#,
        )
        .bind(input.name.as_deref().map(str::trim))
        .bind(&input.description)
        .bind(input.is_active)
        .bind(recipe_id)
        .execute(&mut *tx)
        .await
        .map_err(|e| map_unique_violation(e, "name"))?;

        if let Some(ingredients) = &input.ingredients {
            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(recipe_id)
                .execute(&mut *tx)
                .await?;
            insert_ingredients(&mut tx, recipe_id, ingredients).await?;
        }

        tx.commit().await?;

        tracing::info!(%recipe_id, replaced_ingredients = input.ingredients.is_some(), "Recipe updated");

        self.get(recipe_id).await
    }

    /// Soft delete; the recipe is also deactivated
    pub async fn delete(&self, recipe_id: Uuid) -> AppResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE recipes SET deleted_at = NOW(), is_active = FALSE, updated_at = NOW()
            WHERE id = $1 AND deleted_at IS NULL
            "#,
        )
        .bind(recipe_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::NotFound("Recipe".to_string()));
        }

        tracing::info!(%recipe_id, "Recipe deleted");
        Ok(())
    }

    async fn ingredients_for(&self, recipe_ids: &[Uuid]) -> AppResult<Vec<RecipeIngredient>> {
        let lines = sqlx::query_as::<_, RecipeIngredient>(
            r#"
            SELECT ri.recipe_id, ri.product_id, p.name AS product_name, ri.quantity_per_portion,
                   ri.unit_id, ru.short_name AS unit, pu.short_name AS base_unit, ri.position
            FROM recipe_ingredients ri
            JOIN products p ON p.id = ri.product_id
            JOIN units ru ON ru.id = ri.unit_id
            JOIN units pu ON pu.id = p.unit_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.recipe_id, ri.position
            "#,
        )
        .bind(recipe_ids)
        .fetch_all(&self.db)
        .await?;

        Ok(lines)
    }

    /// Products must exist and not be deleted, units must exist, quantities must be >= 0
    async fn validate_ingredients(&self, ingredients: &[IngredientInput]) -> AppResult<()> {
        for (index, line) in ingredients.iter().enumerate() {
            validate_quantity_per_portion(line.quantity_per_portion).map_err(|msg| {
                AppError::validation(
                    &format!("ingredients[{}].quantity_per_portion", index),
                    msg,
                    "Bir porsiya uchun miqdor 0 va 1 000 000 000 oralig'ida bo'lishi kerak",
                )
            })?;
        }

        let product_ids: Vec<Uuid> = distinct(ingredients.iter().map(|line| line.product_id));
        let found_products: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM products WHERE id = ANY($1) AND deleted_at IS NULL",
        )
        .bind(&product_ids)
        .fetch_one(&self.db)
        .await?;
        if found_products != product_ids.len() as i64 {
            return Err(AppError::NotFound("Product".to_string()));
        }

        let unit_ids: Vec<Uuid> = distinct(ingredients.iter().map(|line| line.unit_id));
        let found_units: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM units WHERE id = ANY($1)")
            .bind(&unit_ids)
            .fetch_one(&self.db)
            .await?;
        if found_units != unit_ids.len() as i64 {
            return Err(AppError::NotFound("Unit".to_string()));
        }

        Ok(())
    }
}

async fn insert_ingredients(
    tx: &mut Transaction<'_, Postgres>,
    recipe_id: Uuid,
    ingredients: &[IngredientInput],
) -> AppResult<()> {
    for (position, line) in ingredients.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, product_id, quantity_per_portion, unit_id, position)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(recipe_id)
        .bind(line.product_id)
        .bind(line.quantity_per_portion)
        .bind(line.unit_id)
        .bind(position as i32)
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

fn assemble(row: RecipeRow, ingredients: Vec<RecipeIngredient>) -> Recipe {
    Recipe {
        id: row.id,
        name: row.name,
        description: row.description,
        is_active: row.is_active,
        created_at: row.created_at,
        updated_at: row.updated_at,
        ingredients,
    }
}

fn distinct(ids: impl Iterator<Item = Uuid>) -> Vec<Uuid> {
    ids.collect::<HashSet<_>>().into_iter().collect()
}

// ============================================================================
// Stock engine definitions
// ============================================================================

/// Flat row of the recipe/ingredient join; ingredient columns are NULL for
/// recipes without lines
#[derive(Debug, FromRow)]
struct DefinitionRow {
    recipe_id: Uuid,
    recipe_name: String,
    is_active: bool,
    recipe_deleted: bool,
    product_id: Option<Uuid>,
    product_name: Option<String>,
    quantity_per_portion: Option<Decimal>,
    unit: Option<String>,
    base_unit: Option<String>,
    product_deleted: Option<bool>,
}

const DEFINITION_SELECT: &str = r#"
    SELECT r.id AS recipe_id, r.name AS recipe_name, r.is_active,
           (r.deleted_at IS NOT NULL) AS recipe_deleted,
           ri.product_id, p.name AS product_name, ri.quantity_per_portion,
           ru.short_name AS unit, pu.short_name AS base_unit,
           (p.deleted_at IS NOT NULL) AS product_deleted
    FROM recipes r
    LEFT JOIN recipe_ingredients ri ON ri.recipe_id = r.id
    LEFT JOIN products p ON p.id = ri.product_id
    LEFT JOIN units ru ON ru.id = ri.unit_id
    LEFT JOIN units pu ON pu.id = p.unit_id
"#;

/// Definitions for the given recipes, deleted ones included
pub async fn load_definitions<'e, E>(executor: E, recipe_ids: &[Uuid]) -> AppResult<Vec<RecipeDefinition>>
where
    E: PgExecutor<'e>,
{
    let query = format!("{DEFINITION_SELECT} WHERE r.id = ANY($1) ORDER BY r.name, r.id, ri.position");
    let rows = sqlx::query_as::<_, DefinitionRow>(&query)
        .bind(recipe_ids)
        .fetch_all(executor)
        .await?;
    Ok(group_definitions(rows))
}

pub async fn load_definition<'e, E>(executor: E, recipe_id: Uuid) -> AppResult<Option<RecipeDefinition>>
where
    E: PgExecutor<'e>,
{
    Ok(load_definitions(executor, &[recipe_id]).await?.into_iter().next())
}

/// Definitions of every active, non-deleted recipe
pub async fn load_active_definitions<'e, E>(executor: E) -> AppResult<Vec<RecipeDefinition>>
where
    E: PgExecutor<'e>,
{
    let query = format!(
        "{DEFINITION_SELECT} WHERE r.deleted_at IS NULL AND r.is_active ORDER BY r.name, r.id, ri.position"
    );
    let rows = sqlx::query_as::<_, DefinitionRow>(&query)
        .fetch_all(executor)
        .await?;
    Ok(group_definitions(rows))
}

/// Rows arrive ordered by recipe, then by line position
fn group_definitions(rows: Vec<DefinitionRow>) -> Vec<RecipeDefinition> {
    let mut definitions: Vec<RecipeDefinition> = Vec::new();

    for row in rows {
        let starts_new = definitions
            .last()
            .map_or(true, |current| current.id != row.recipe_id);
        if starts_new {
            definitions.push(RecipeDefinition {
                id: row.recipe_id,
                name: row.recipe_name.clone(),
                is_active: row.is_active,
                is_deleted: row.recipe_deleted,
                requirements: Vec::new(),
            });
        }

        let line = match (row.product_id, row.quantity_per_portion, row.unit, row.base_unit) {
            (Some(product_id), Some(quantity_per_portion), Some(unit), Some(base_unit)) => {
                IngredientRequirement {
                    product_id,
                    product_name: row.product_name.unwrap_or_default(),
                    quantity_per_portion,
                    unit,
                    base_unit,
                    product_deleted: row.product_deleted.unwrap_or(false),
                }
            }
            _ => continue,
        };

        if let Some(current) = definitions.last_mut() {
            current.requirements.push(line);
        }
    }

    definitions
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(recipe_id: Uuid, product_id: Option<Uuid>) -> DefinitionRow {
        DefinitionRow {
            recipe_id,
            recipe_name: "Osh".to_string(),
            is_active: true,
            recipe_deleted: false,
            product_id,
            product_name: product_id.map(|_| "Guruch".to_string()),
            quantity_per_portion: product_id.map(|_| Decimal::from(120)),
            unit: product_id.map(|_| "gr".to_string()),
            base_unit: product_id.map(|_| "kg".to_string()),
            product_deleted: product_id.map(|_| false),
        }
    }

    #[test]
    fn test_group_definitions_keeps_line_order() {
        let osh = Uuid::new_v4();
        let rice = Uuid::new_v4();
        let carrot = Uuid::new_v4();
        let definitions = group_definitions(vec![row(osh, Some(rice)), row(osh, Some(carrot))]);

        assert_eq!(definitions.len(), 1);
        let ids: Vec<Uuid> = definitions[0].requirements.iter().map(|r| r.product_id).collect();
        assert_eq!(ids, vec![rice, carrot]);
    }

    #[test]
    fn test_recipe_without_lines_has_empty_requirements() {
        let soup = Uuid::new_v4();
        let osh = Uuid::new_v4();
        let definitions = group_definitions(vec![row(soup, None), row(osh, Some(Uuid::new_v4()))]);

        assert_eq!(definitions.len(), 2);
        assert!(definitions[0].requirements.is_empty());
        assert_eq!(definitions[1].requirements.len(), 1);
    }
}
