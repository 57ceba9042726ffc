//! Product (ingredient) stock status

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A product together with its current ledger balance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductStock {
    pub product_id: Uuid,
    pub name: String,
    /// Base unit short name
    pub unit: String,
    pub min_quantity: Decimal,
    pub current_quantity: Decimal,
}

impl ProductStock {
    /// Strictly below the minimum threshold
    pub fn is_low_stock(&self) -> bool {
        is_below_minimum(self.current_quantity, self.min_quantity)
    }
}

pub fn is_below_minimum(current_quantity: Decimal, min_quantity: Decimal) -> bool {
    current_quantity < min_quantity
}
