//! Stock engine error taxonomy

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::models::ConversionError;

/// Failures raised by the stock engine while validating a serving.
///
/// Every variant carries enough detail for a caller to render an actionable
/// message without re-deriving anything.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum StockError {
    #[error("Recipe '{recipe_name}' cannot be prepared: {reason}")]
    NotPreparable {
        recipe_id: Uuid,
        recipe_name: String,
        reason: NotPreparableReason,
    },

    #[error("Units for '{product_name}' do not convert: '{from_unit}' -> '{to_unit}'")]
    UnitMismatch {
        product_id: Uuid,
        product_name: String,
        from_unit: String,
        to_unit: String,
    },

    #[error("Not enough '{product_name}': required {required} {unit}, available {available} {unit}")]
    InsufficientStock {
        product_id: Uuid,
        product_name: String,
        unit: String,
        required: Decimal,
        available: Decimal,
    },

    #[error("Product '{product_name}' referenced by the recipe has been removed")]
    ProductRemoved { product_id: Uuid, product_name: String },

    #[error("Portions must be positive, got {requested}")]
    InvalidPortions { requested: i64 },

    #[error("Quantities for product {product_id} exceed the supported range")]
    QuantityOutOfRange { product_id: Uuid },
}

/// Why a recipe is not preparable
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotPreparableReason {
    Inactive,
    NoIngredients,
    NoEffectiveIngredients,
}

impl NotPreparableReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotPreparableReason::Inactive => "recipe is inactive",
            NotPreparableReason::NoIngredients => "recipe has no ingredients",
            NotPreparableReason::NoEffectiveIngredients => {
                "every ingredient has zero quantity per portion"
            }
        }
    }
}

impl std::fmt::Display for NotPreparableReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl StockError {
    pub(crate) fn from_conversion(
        product_id: Uuid,
        product_name: &str,
        error: ConversionError,
    ) -> Self {
        match error {
            ConversionError::Incompatible { from, to } => StockError::UnitMismatch {
                product_id,
                product_name: product_name.to_string(),
                from_unit: from,
                to_unit: to,
            },
            ConversionError::Overflow { .. } => StockError::QuantityOutOfRange { product_id },
        }
    }
}
