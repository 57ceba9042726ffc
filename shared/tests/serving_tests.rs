//! Serving planning tests
//!
//! Tests for serving validation including:
//! - Scenario C: overselling is rejected and stock is untouched
//! - Scenario D: a successful serving debits the converted quantity
//! - Property 7: a rejected plan debits nothing
//! - Property 8: a successful plan never demands more than available

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{
    plan_serving, possible_portions, IngredientRequirement, NotPreparableReason, RecipeDefinition,
    StockError, StockLevels,
};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn requirement(product_id: Uuid, name: &str, qty: &str, unit: &str, base: &str) -> IngredientRequirement {
    IngredientRequirement {
        product_id,
        product_name: name.to_string(),
        quantity_per_portion: dec(qty),
        unit: unit.to_string(),
        base_unit: base.to_string(),
        product_deleted: false,
    }
}

fn bread(flour: Uuid) -> RecipeDefinition {
    RecipeDefinition {
        id: Uuid::new_v4(),
        name: "Bread".to_string(),
        is_active: true,
        is_deleted: false,
        requirements: vec![requirement(flour, "Flour", "200", "gr", "kg")],
    }
}

/// Apply a plan to in-memory stock the way the persisted details would
fn apply(stock: &mut StockLevels, plan: &shared::ServingPlan) {
    for planned in &plan.consumption {
        *stock.entry(planned.product_id).or_insert(Decimal::ZERO) -= planned.quantity;
    }
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    /// Scenario C
    #[test]
    fn test_oversell_rejected_with_numbers() {
        let flour = Uuid::new_v4();
        let recipe = bread(flour);
        let stock: StockLevels = [(flour, dec("10"))].into_iter().collect();

        let err = plan_serving(&recipe, 51, &stock).unwrap_err();
        match err {
            StockError::InsufficientStock {
                product_id,
                product_name,
                unit,
                required,
                available,
            } => {
                assert_eq!(product_id, flour);
                assert_eq!(product_name, "Flour");
                assert_eq!(unit, "kg");
                assert_eq!(required, dec("10.2"));
                assert_eq!(available, dec("10"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(stock[&flour], dec("10"));
    }

    /// Scenario D
    #[test]
    fn test_serving_debits_and_updates_portions() {
        let flour = Uuid::new_v4();
        let recipe = bread(flour);
        let mut stock: StockLevels = [(flour, dec("10"))].into_iter().collect();

        let plan = plan_serving(&recipe, 30, &stock).unwrap();
        assert_eq!(plan.portions, 30);
        assert_eq!(plan.consumption.len(), 1);
        assert_eq!(plan.consumption[0].quantity, dec("6"));
        assert_eq!(plan.consumption[0].unit, "kg");

        apply(&mut stock, &plan);
        assert_eq!(stock[&flour], dec("4"));
        assert_eq!(possible_portions(&recipe, &stock).portions, 20);
    }

    #[test]
    fn test_exact_stock_is_enough() {
        let flour = Uuid::new_v4();
        let recipe = bread(flour);
        let stock: StockLevels = [(flour, dec("10"))].into_iter().collect();
        assert!(plan_serving(&recipe, 50, &stock).is_ok());
    }

    #[test]
    fn test_repeated_product_lines_are_aggregated() {
        let flour = Uuid::new_v4();
        let mut recipe = bread(flour);
        recipe
            .requirements
            .push(requirement(flour, "Flour", "0.1", "kg", "kg"));
        // 0.2 + 0.1 = 0.3 kg per portion; 30 portions need 9kg
        let stock: StockLevels = [(flour, dec("10"))].into_iter().collect();

        let plan = plan_serving(&recipe, 30, &stock).unwrap();
        assert_eq!(plan.consumption.len(), 1);
        assert_eq!(plan.consumption[0].quantity, dec("9"));

        // each line alone fits 40 portions, together they do not
        let err = plan_serving(&recipe, 40, &stock).unwrap_err();
        assert!(matches!(err, StockError::InsufficientStock { required, .. } if required == dec("12")));
    }

    #[test]
    fn test_unit_mismatch_names_the_product() {
        let flour = Uuid::new_v4();
        let eggs = Uuid::new_v4();
        let mut recipe = bread(flour);
        recipe
            .requirements
            .push(requirement(eggs, "Eggs", "1", "kg", "dona"));
        let stock: StockLevels = [(flour, dec("10")), (eggs, dec("100"))].into_iter().collect();

        let err = plan_serving(&recipe, 1, &stock).unwrap_err();
        assert_eq!(
            err,
            StockError::UnitMismatch {
                product_id: eggs,
                product_name: "Eggs".to_string(),
                from_unit: "kg".to_string(),
                to_unit: "dona".to_string(),
            }
        );
    }

    #[test]
    fn test_unit_mismatch_wins_over_shortage() {
        let flour = Uuid::new_v4();
        let eggs = Uuid::new_v4();
        let mut recipe = bread(flour);
        recipe
            .requirements
            .push(requirement(eggs, "Eggs", "1", "kg", "dona"));
        // flour is short too, but conversion is checked for every line first
        let err = plan_serving(&recipe, 1000, &StockLevels::new()).unwrap_err();
        assert!(matches!(err, StockError::UnitMismatch { .. }));
    }

    #[test]
    fn test_inactive_recipe_not_preparable() {
        let flour = Uuid::new_v4();
        let mut recipe = bread(flour);
        recipe.is_active = false;
        let err = plan_serving(&recipe, 1, &StockLevels::new()).unwrap_err();
        assert!(matches!(
            err,
            StockError::NotPreparable {
                reason: NotPreparableReason::Inactive,
                ..
            }
        ));
    }

    #[test]
    fn test_recipe_without_lines_not_preparable() {
        let mut recipe = bread(Uuid::new_v4());
        recipe.requirements.clear();
        let err = plan_serving(&recipe, 1, &StockLevels::new()).unwrap_err();
        assert!(matches!(
            err,
            StockError::NotPreparable {
                reason: NotPreparableReason::NoIngredients,
                ..
            }
        ));
    }

    #[test]
    fn test_all_zero_demand_not_preparable() {
        let water = Uuid::new_v4();
        let mut recipe = bread(water);
        recipe.requirements = vec![requirement(water, "Water", "0", "l", "l")];
        let err = plan_serving(&recipe, 3, &StockLevels::new()).unwrap_err();
        assert!(matches!(
            err,
            StockError::NotPreparable {
                reason: NotPreparableReason::NoEffectiveIngredients,
                ..
            }
        ));
    }

    #[test]
    fn test_non_positive_portions_rejected() {
        let flour = Uuid::new_v4();
        let recipe = bread(flour);
        let stock: StockLevels = [(flour, dec("10"))].into_iter().collect();
        assert_eq!(
            plan_serving(&recipe, 0, &stock).unwrap_err(),
            StockError::InvalidPortions { requested: 0 }
        );
        assert!(plan_serving(&recipe, -2, &stock).is_err());
    }

    #[test]
    fn test_demand_beyond_decimal_range_rejected() {
        let flour = Uuid::new_v4();
        let recipe = RecipeDefinition {
            requirements: vec![requirement(flour, "Flour", "1000000000000000000000000000", "kg", "kg")],
            ..bread(flour)
        };
        let stock: StockLevels = [(flour, dec("10"))].into_iter().collect();
        assert_eq!(
            plan_serving(&recipe, 100, &stock).unwrap_err(),
            StockError::QuantityOutOfRange { product_id: flour }
        );

        let grams = RecipeDefinition {
            requirements: vec![requirement(flour, "Flour", "100000000000000000000000000", "kg", "gr")],
            ..bread(flour)
        };
        assert_eq!(
            plan_serving(&grams, 1, &stock).unwrap_err(),
            StockError::QuantityOutOfRange { product_id: flour }
        );
    }

    #[test]
    fn test_removed_product_rejected() {
        let flour = Uuid::new_v4();
        let mut recipe = bread(flour);
        recipe.requirements[0].product_deleted = true;
        let stock: StockLevels = [(flour, dec("10"))].into_iter().collect();
        assert!(matches!(
            plan_serving(&recipe, 1, &stock).unwrap_err(),
            StockError::ProductRemoved { product_id, .. } if product_id == flour
        ));
    }

    #[test]
    fn test_error_messages_are_actionable() {
        let flour = Uuid::new_v4();
        let recipe = bread(flour);
        let stock: StockLevels = [(flour, dec("10"))].into_iter().collect();
        let message = plan_serving(&recipe, 51, &stock).unwrap_err().to_string();
        assert!(message.contains("Flour"));
        assert!(message.contains("10.2"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    fn stock_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=200i64).prop_map(|n| Decimal::new(n, 1)) // 0.0 to 20.0 kg
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property 7 and 8 on the planning level
        #[test]
        fn prop_plan_never_oversells(
            initial in stock_strategy(),
            requests in prop::collection::vec(1i32..=40, 1..10)
        ) {
            let flour = Uuid::new_v4();
            let recipe = bread(flour);
            let mut stock: StockLevels = [(flour, initial)].into_iter().collect();
            let mut consumed = Decimal::ZERO;

            for portions in requests {
                let before = stock[&flour];
                match plan_serving(&recipe, portions, &stock) {
                    Ok(plan) => {
                        prop_assert!(plan.consumption[0].quantity <= before);
                        consumed += plan.consumption[0].quantity;
                        apply(&mut stock, &plan);
                    }
                    Err(_) => prop_assert_eq!(stock[&flour], before),
                }
                prop_assert!(stock[&flour] >= Decimal::ZERO);
            }

            prop_assert!(consumed <= initial);
            prop_assert_eq!(stock[&flour], initial - consumed);
        }

        /// A plan succeeds exactly when portions do not exceed possible portions
        #[test]
        fn prop_plan_agrees_with_possible_portions(
            initial in stock_strategy(),
            portions in 1i32..=120
        ) {
            let flour = Uuid::new_v4();
            let recipe = bread(flour);
            let stock: StockLevels = [(flour, initial)].into_iter().collect();
            let possible = possible_portions(&recipe, &stock).portions;

            let planned = plan_serving(&recipe, portions, &stock);
            prop_assert_eq!(planned.is_ok(), i64::from(portions) <= possible);
        }
    }
}
