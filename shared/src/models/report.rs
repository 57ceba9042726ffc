//! Monthly reconciliation arithmetic

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{ConversionError, RecipeDefinition};
use crate::error::StockError;
use crate::types::is_near_zero;

/// Default discrepancy threshold, in percent
pub const DEFAULT_SUSPICIOUS_THRESHOLD_PERCENT: Decimal = Decimal::from_parts(15, 0, 0, false, 0);

/// Which balance counts as a product's actual ending stock
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndingStockBasis {
    /// Balance at generation time
    #[default]
    Live,
    /// Balance strictly before the end of the month
    MonthEnd,
}

/// Served vs. possible portions for one recipe
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecipePerformance {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub portions_served: i64,
    pub possible_portions: i64,
    pub difference_percentage: Decimal,
    pub is_suspicious: bool,
}

impl RecipePerformance {
    pub fn assess(
        recipe_id: Uuid,
        recipe_name: String,
        portions_served: i64,
        possible_portions: i64,
        threshold_percent: Decimal,
    ) -> Self {
        let (difference_percentage, is_suspicious) =
            assess_recipe_performance(portions_served, possible_portions, threshold_percent);
        Self {
            recipe_id,
            recipe_name,
            portions_served,
            possible_portions,
            difference_percentage,
            is_suspicious,
        }
    }
}

/// Difference percentage and suspicious flag for a recipe's month.
///
/// `|possible - served| / possible * 100` when possible > 0, otherwise 100
/// if anything was served and 0 if not. Serving more than possible is
/// always suspicious.
pub fn assess_recipe_performance(
    portions_served: i64,
    possible_portions: i64,
    threshold_percent: Decimal,
) -> (Decimal, bool) {
    let served = Decimal::from(portions_served);
    let possible = Decimal::from(possible_portions);

    let percentage = if possible_portions > 0 {
        (possible - served).abs() / possible * Decimal::ONE_HUNDRED
    } else if portions_served > 0 {
        Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    let suspicious = portions_served > possible_portions || percentage > threshold_percent;
    (percentage, suspicious)
}

/// Inputs gathered for one product's monthly balance
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct BalanceInputs {
    pub opening_stock: Decimal,
    pub total_received: Decimal,
    pub theoretical_consumption: Decimal,
    pub actual_consumption: Decimal,
    pub actual_ending_stock: Decimal,
}

/// One product's reconciled month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductBalance {
    pub product_id: Uuid,
    pub opening_stock: Decimal,
    pub total_received: Decimal,
    pub total_available: Decimal,
    pub theoretical_consumption: Decimal,
    pub actual_consumption: Decimal,
    pub theoretical_ending_stock: Decimal,
    pub actual_ending_stock: Decimal,
    pub discrepancy: Decimal,
    pub discrepancy_percentage: Decimal,
    pub is_suspicious: bool,
}

/// Reconcile a product's month.
///
/// Suspicious when `|discrepancy_percentage|` exceeds the threshold, or when
/// actual ending stock went negative while the theoretical one did not.
/// Fails only when the arithmetic leaves the decimal range.
pub fn reconcile_product(
    product_id: Uuid,
    inputs: BalanceInputs,
    threshold_percent: Decimal,
) -> Result<ProductBalance, StockError> {
    let out_of_range = || StockError::QuantityOutOfRange { product_id };

    let total_available = inputs
        .opening_stock
        .checked_add(inputs.total_received)
        .ok_or_else(out_of_range)?;
    let theoretical_ending_stock = total_available
        .checked_sub(inputs.theoretical_consumption)
        .ok_or_else(out_of_range)?;
    let discrepancy = theoretical_ending_stock
        .checked_sub(inputs.actual_ending_stock)
        .ok_or_else(out_of_range)?;

    let discrepancy_percentage = if !is_near_zero(total_available) {
        discrepancy
            .checked_div(total_available)
            .and_then(|ratio| ratio.checked_mul(Decimal::ONE_HUNDRED))
            .ok_or_else(out_of_range)?
    } else if !is_near_zero(discrepancy) {
        if discrepancy.is_sign_negative() {
            -Decimal::ONE_HUNDRED
        } else {
            Decimal::ONE_HUNDRED
        }
    } else {
        Decimal::ZERO
    };

    let sign_flip =
        inputs.actual_ending_stock < Decimal::ZERO && theoretical_ending_stock >= Decimal::ZERO;
    let is_suspicious = discrepancy_percentage.abs() > threshold_percent || sign_flip;

    Ok(ProductBalance {
        product_id,
        opening_stock: inputs.opening_stock,
        total_received: inputs.total_received,
        total_available,
        theoretical_consumption: inputs.theoretical_consumption,
        actual_consumption: inputs.actual_consumption,
        theoretical_ending_stock,
        actual_ending_stock: inputs.actual_ending_stock,
        discrepancy,
        discrepancy_percentage,
        is_suspicious,
    })
}

/// What each product should have lost according to current recipe definitions.
///
/// `servings` yields a recipe and the portions served from it. Lines whose
/// unit does not convert to the product's base unit are skipped. A total
/// outside the decimal range fails with `QuantityOutOfRange`.
pub fn theoretical_consumption_by_product<'a, I>(
    servings: I,
) -> Result<HashMap<Uuid, Decimal>, StockError>
where
    I: IntoIterator<Item = (&'a RecipeDefinition, i64)>,
{
    let mut totals: HashMap<Uuid, Decimal> = HashMap::new();

    for (recipe, portions) in servings {
        let multiplier = Decimal::from(portions);
        for requirement in &recipe.requirements {
            let per_portion = match requirement.per_portion_in_base_unit() {
                Ok(quantity) => quantity,
                Err(ConversionError::Incompatible { .. }) => continue,
                Err(ConversionError::Overflow { .. }) => {
                    return Err(StockError::QuantityOutOfRange {
                        product_id: requirement.product_id,
                    })
                }
            };

            let total = totals.entry(requirement.product_id).or_insert(Decimal::ZERO);
            let so_far = *total;
            *total = per_portion
                .checked_mul(multiplier)
                .and_then(|used| so_far.checked_add(used))
                .ok_or(StockError::QuantityOutOfRange {
                    product_id: requirement.product_id,
                })?;
        }
    }

    Ok(totals)
}

/// True when any recipe row or product row is suspicious
pub fn is_overall_suspicious(recipes: &[RecipePerformance], balances: &[ProductBalance]) -> bool {
    recipes.iter().any(|r| r.is_suspicious) || balances.iter().any(|b| b.is_suspicious)
}
