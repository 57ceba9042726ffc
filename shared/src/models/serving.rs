//! Serving planning: validate a requested serving and compute the debit per product

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{stock_of, RecipeDefinition, StockLevels};
use crate::error::{NotPreparableReason, StockError};
use crate::types::is_negligible;

/// The debit one product takes from a serving
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedConsumption {
    pub product_id: Uuid,
    pub product_name: String,
    /// Base unit of the product
    pub unit: String,
    pub quantity: Decimal,
}

/// A validated serving, ready to be persisted as one serving and its details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServingPlan {
    pub recipe_id: Uuid,
    pub portions: i32,
    /// One entry per distinct product, in first-appearance order
    pub consumption: Vec<PlannedConsumption>,
}

impl ServingPlan {
    pub fn product_ids(&self) -> Vec<Uuid> {
        self.consumption.iter().map(|c| c.product_id).collect()
    }
}

/// Validate serving `portions` of `recipe` against `stock`.
///
/// Checks run in a fixed order and the first failure wins:
/// portions, recipe availability, unit conversion for every line,
/// then aggregated demand per product against its balance. Demand that
/// leaves the decimal range is rejected as `QuantityOutOfRange`.
/// Nothing here mutates `stock`.
pub fn plan_serving(
    recipe: &RecipeDefinition,
    portions: i32,
    stock: &StockLevels,
) -> Result<ServingPlan, StockError> {
    if portions <= 0 {
        return Err(StockError::InvalidPortions {
            requested: i64::from(portions),
        });
    }

    if !recipe.is_active || recipe.is_deleted {
        return Err(not_preparable(recipe, NotPreparableReason::Inactive));
    }
    if recipe.requirements.is_empty() {
        return Err(not_preparable(recipe, NotPreparableReason::NoIngredients));
    }

    let multiplier = Decimal::from(portions);
    let mut consumption: Vec<PlannedConsumption> = Vec::new();

    for requirement in &recipe.requirements {
        if requirement.is_zero_demand() {
            continue;
        }
        if requirement.product_deleted {
            return Err(StockError::ProductRemoved {
                product_id: requirement.product_id,
                product_name: requirement.product_name.clone(),
            });
        }

        let per_portion = requirement.per_portion_in_base_unit().map_err(|error| {
            StockError::from_conversion(requirement.product_id, &requirement.product_name, error)
        })?;
        let out_of_range = || StockError::QuantityOutOfRange {
            product_id: requirement.product_id,
        };
        let demand = per_portion.checked_mul(multiplier).ok_or_else(out_of_range)?;

        match consumption
            .iter_mut()
            .find(|planned| planned.product_id == requirement.product_id)
        {
            Some(planned) => {
                planned.quantity = planned.quantity.checked_add(demand).ok_or_else(out_of_range)?;
            }
            None => consumption.push(PlannedConsumption {
                product_id: requirement.product_id,
                product_name: requirement.product_name.clone(),
                unit: requirement.base_unit.clone(),
                quantity: demand,
            }),
        }
    }

    consumption.retain(|planned| !is_negligible(planned.quantity));
    if consumption.is_empty() {
        return Err(not_preparable(
            recipe,
            NotPreparableReason::NoEffectiveIngredients,
        ));
    }

    for planned in &consumption {
        let available = stock_of(stock, planned.product_id);
        if planned.quantity > available {
            return Err(StockError::InsufficientStock {
                product_id: planned.product_id,
                product_name: planned.product_name.clone(),
                unit: planned.unit.clone(),
                required: planned.quantity,
                available,
            });
        }
    }

    Ok(ServingPlan {
        recipe_id: recipe.id,
        portions,
        consumption,
    })
}

fn not_preparable(recipe: &RecipeDefinition, reason: NotPreparableReason) -> StockError {
    StockError::NotPreparable {
        recipe_id: recipe.id,
        recipe_name: recipe.name.clone(),
        reason,
    }
}
