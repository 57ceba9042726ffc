//! WebAssembly module for the kitchen inventory client
//!
//! Provides client-side previews for:
//! - Unit conversion
//! - Possible portions of a recipe against a stock snapshot
//! - Serving checks before submitting
//! - Report percentages
//!
//! Quantities cross the boundary as decimal strings so no precision is lost.

use std::str::FromStr;

use rust_decimal::Decimal;
use wasm_bindgen::prelude::*;

pub use shared::models::*;
pub use shared::types::*;
pub use shared::validation::*;

/// Initialize the WASM module
#[wasm_bindgen(start)]
pub fn init() {
    web_sys::console::debug_1(&JsValue::from_str("kitchen inventory module loaded"));
}

fn parse_decimal(value: &str) -> Result<Decimal, String> {
    Decimal::from_str(value.trim()).map_err(|e| format!("Invalid number '{}': {}", value, e))
}

fn convert_quantity_str(quantity: &str, from_unit: &str, to_unit: &str) -> Result<String, String> {
    let quantity = parse_decimal(quantity)?;
    convert(quantity, from_unit, to_unit)
        .map(|converted| converted.normalize().to_string())
        .map_err(|e| e.to_string())
}

fn preview_portions_json(recipe_json: &str, stock_json: &str) -> Result<String, String> {
    let recipe: RecipeDefinition =
        serde_json::from_str(recipe_json).map_err(|e| format!("Invalid recipe JSON: {}", e))?;
    let stock: StockLevels =
        serde_json::from_str(stock_json).map_err(|e| format!("Invalid stock JSON: {}", e))?;
    serde_json::to_string(&possible_portions(&recipe, &stock)).map_err(|e| e.to_string())
}

fn check_serving_json(recipe_json: &str, portions: i32, stock_json: &str) -> Result<String, String> {
    let recipe: RecipeDefinition =
        serde_json::from_str(recipe_json).map_err(|e| format!("Invalid recipe JSON: {}", e))?;
    let stock: StockLevels =
        serde_json::from_str(stock_json).map_err(|e| format!("Invalid stock JSON: {}", e))?;
    let plan = plan_serving(&recipe, portions, &stock).map_err(|e| e.to_string())?;
    serde_json::to_string(&plan).map_err(|e| e.to_string())
}

/// Convert a quantity between units; throws for incompatible units
#[wasm_bindgen]
pub fn convert_quantity(quantity: &str, from_unit: &str, to_unit: &str) -> Result<String, JsValue> {
    convert_quantity_str(quantity, from_unit, to_unit).map_err(|e| JsValue::from_str(&e))
}

/// Possible portions as `{"portions": n, "limiting_product_id": ...}`
///
/// `stock_json` maps product ids to balances in each product's base unit.
#[wasm_bindgen]
pub fn preview_possible_portions(recipe_json: &str, stock_json: &str) -> Result<String, JsValue> {
    preview_portions_json(recipe_json, stock_json).map_err(|e| JsValue::from_str(&e))
}

/// Serving plan for `portions`, or the reason it would be rejected
#[wasm_bindgen]
pub fn preview_serving(recipe_json: &str, portions: i32, stock_json: &str) -> Result<String, JsValue> {
    check_serving_json(recipe_json, portions, stock_json).map_err(|e| JsValue::from_str(&e))
}

/// Percentage difference between served and possible portions
#[wasm_bindgen]
pub fn recipe_difference_percentage(portions_served: i64, possible_portions: i64) -> String {
    let (percentage, _) = assess_recipe_performance(
        portions_served,
        possible_portions,
        DEFAULT_SUSPICIOUS_THRESHOLD_PERCENT,
    );
    percentage.round_dp(2).normalize().to_string()
}

/// Discrepancy percentage of a product balance, or an error for unparsable input
#[wasm_bindgen]
pub fn discrepancy_percentage(
    opening_stock: &str,
    total_received: &str,
    theoretical_consumption: &str,
    actual_ending_stock: &str,
) -> Result<String, JsValue> {
    let inputs = (|| -> Result<BalanceInputs, String> {
        Ok(BalanceInputs {
            opening_stock: parse_decimal(opening_stock)?,
            total_received: parse_decimal(total_received)?,
            theoretical_consumption: parse_decimal(theoretical_consumption)?,
            actual_consumption: Decimal::ZERO,
            actual_ending_stock: parse_decimal(actual_ending_stock)?,
        })
    })()
    .map_err(|e| JsValue::from_str(&e))?;

    let balance = reconcile_product(
        Default::default(),
        inputs,
        DEFAULT_SUSPICIOUS_THRESHOLD_PERCENT,
    )
    .map_err(|e| JsValue::from_str(&e.to_string()))?;
    Ok(balance.discrepancy_percentage.round_dp(2).normalize().to_string())
}

/// Validation messages for a delivery form; empty when valid
#[wasm_bindgen]
pub fn validate_delivery_form(name: &str, quantity: &str) -> js_sys::Array {
    let messages = js_sys::Array::new();
    for message in delivery_form_errors(name, quantity) {
        messages.push(&JsValue::from_str(&message));
    }
    messages
}

fn delivery_form_errors(name: &str, quantity: &str) -> Vec<String> {
    let mut errors = Vec::new();
    if let Err(msg) = validate_name(name) {
        errors.push(msg.to_string());
    }
    match parse_decimal(quantity) {
        Ok(value) => {
            if let Err(msg) = validate_delivery_quantity(value) {
                errors.push(msg.to_string());
            }
        }
        Err(e) => errors.push(e),
    }
    errors
}
