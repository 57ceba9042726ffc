//! Recipe definitions as consumed by the stock engine

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{convert, ConversionError};
use crate::types::is_negligible;

/// A recipe with its ordered bill of materials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecipeDefinition {
    pub id: Uuid,
    pub name: String,
    pub is_active: bool,
    #[serde(default)]
    pub is_deleted: bool,
    pub requirements: Vec<IngredientRequirement>,
}

impl RecipeDefinition {
    /// Active, not deleted and with at least one requirement line
    pub fn is_available(&self) -> bool {
        self.is_active && !self.is_deleted && !self.requirements.is_empty()
    }
}

/// One requirement line: how much of a product one portion needs
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngredientRequirement {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity_per_portion: Decimal,
    /// Unit the per-portion quantity is expressed in
    pub unit: String,
    /// Unit the product's stock is tracked in
    pub base_unit: String,
    #[serde(default)]
    pub product_deleted: bool,
}

impl IngredientRequirement {
    /// Per-portion quantity at or below epsilon; such lines never constrain anything
    pub fn is_zero_demand(&self) -> bool {
        is_negligible(self.quantity_per_portion)
    }

    pub fn per_portion_in_base_unit(&self) -> Result<Decimal, ConversionError> {
        convert(self.quantity_per_portion, &self.unit, &self.base_unit)
    }
}
