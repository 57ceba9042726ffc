//! Portion availability: how many portions of a recipe the stock allows right now

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{stock_of, RecipeDefinition, StockLevels};
use crate::types::is_negligible;

/// Result of a portion calculation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortionAvailability {
    pub portions: i64,
    /// Product that produced the minimum, when one exists
    pub limiting_product_id: Option<Uuid>,
}

impl PortionAvailability {
    pub fn none() -> Self {
        Self {
            portions: 0,
            limiting_product_id: None,
        }
    }

    fn blocked_by(product_id: Uuid) -> Self {
        Self {
            portions: 0,
            limiting_product_id: Some(product_id),
        }
    }
}

/// Maximum number of portions of `recipe` preparable from `stock`.
///
/// Requirements are visited in order:
/// - zero-demand lines are skipped,
/// - a removed product or an unconvertible unit vetoes the whole recipe,
/// - an empty (or negative) balance short-circuits to zero for that product,
/// - otherwise the floor of balance / per-portion is a candidate minimum.
///
/// Ties keep the earlier requirement as the limiting product. A recipe whose
/// lines are all zero demand yields zero portions, never an unbounded count.
pub fn possible_portions(recipe: &RecipeDefinition, stock: &StockLevels) -> PortionAvailability {
    if !recipe.is_available() {
        return PortionAvailability::none();
    }

    let mut best: Option<PortionAvailability> = None;

    for requirement in &recipe.requirements {
        if requirement.is_zero_demand() {
            continue;
        }

        if requirement.product_deleted {
            return PortionAvailability::blocked_by(requirement.product_id);
        }

        let per_portion = match requirement.per_portion_in_base_unit() {
            Ok(quantity) => quantity,
            Err(_) => return PortionAvailability::blocked_by(requirement.product_id),
        };

        // e.g. 0.0000001 kg after scaling down from a tiny gram amount
        if is_negligible(per_portion) {
            continue;
        }

        let balance = stock_of(stock, requirement.product_id);
        if is_negligible(balance) {
            return PortionAvailability::blocked_by(requirement.product_id);
        }

        let portions = whole_portions(balance, per_portion);
        let is_new_minimum = best.map_or(true, |current| portions < current.portions);
        if is_new_minimum {
            best = Some(PortionAvailability {
                portions,
                limiting_product_id: Some(requirement.product_id),
            });
        }
    }

    best.unwrap_or_else(PortionAvailability::none)
}

fn whole_portions(balance: Decimal, per_portion: Decimal) -> i64 {
    match balance.checked_div(per_portion) {
        Some(ratio) => ratio.floor().to_i64().unwrap_or(i64::MAX),
        None => i64::MAX,
    }
}
