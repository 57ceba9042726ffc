//! Measurement units and conversion between them

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// A measurement unit (gram, kilogram, litre, piece, ...)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Unit {
    pub id: Uuid,
    pub name: String,
    pub short_name: String,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateUnit {
    pub name: String,
    pub short_name: String,
}

/// Units seeded on first start, as `(name, short_name)`
pub const DEFAULT_UNITS: [(&str, &str); 7] = [
    ("gramm", "gr"),
    ("kilogramm", "kg"),
    ("litr", "l"),
    ("millilitr", "ml"),
    ("dona", "dona"),
    ("qoshiq", "qoshiq"),
    ("stakan", "stakan"),
];

const GRAM_ALIASES: [&str; 5] = ["gr", "gramm", "g", "грамм", "гр"];
const KILOGRAM_ALIASES: [&str; 4] = ["kg", "kilogramm", "килограмм", "кг"];
const MILLILITRE_ALIASES: [&str; 4] = ["ml", "millilitr", "мл", "миллилитр"];
const LITRE_ALIASES: [&str; 4] = ["l", "litr", "литр", "л"];

/// Canonical spelling of a unit label.
///
/// Known aliases for gram, kilogram, millilitre and litre (Latin and
/// Cyrillic) collapse to `gr`, `kg`, `ml` and `l`. Any other label is
/// returned trimmed and lowercased.
pub fn normalize_unit(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let lookup = lowered.as_str();

    if GRAM_ALIASES.contains(&lookup) {
        "gr".to_string()
    } else if KILOGRAM_ALIASES.contains(&lookup) {
        "kg".to_string()
    } else if MILLILITRE_ALIASES.contains(&lookup) {
        "ml".to_string()
    } else if LITRE_ALIASES.contains(&lookup) {
        "l".to_string()
    } else {
        lowered
    }
}

/// Why a quantity could not be expressed in another unit
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConversionError {
    /// The two units have no known relation
    #[error("Cannot convert '{from}' to '{to}'")]
    Incompatible { from: String, to: String },

    #[error("Quantity {quantity} '{from}' does not fit in '{to}'")]
    Overflow {
        quantity: Decimal,
        from: String,
        to: String,
    },
}

/// Convert `quantity` expressed in `from` into `to`.
///
/// Same canonical unit is the identity; gr/kg and ml/l scale by 1000.
/// Every other pair, including cross-dimension ones such as kg -> l, fails.
/// Scaling never panics: a result outside the decimal range is an error.
pub fn convert(quantity: Decimal, from: &str, to: &str) -> Result<Decimal, ConversionError> {
    let from_canonical = normalize_unit(from);
    let to_canonical = normalize_unit(to);

    if from_canonical == to_canonical {
        return Ok(quantity);
    }

    let thousand = Decimal::ONE_THOUSAND;
    let scaled = match (from_canonical.as_str(), to_canonical.as_str()) {
        ("kg", "gr") | ("l", "ml") => quantity.checked_mul(thousand),
        ("gr", "kg") | ("ml", "l") => quantity.checked_div(thousand),
        _ => {
            return Err(ConversionError::Incompatible {
                from: from.to_string(),
                to: to.to_string(),
            })
        }
    };

    scaled.ok_or_else(|| ConversionError::Overflow {
        quantity,
        from: from.to_string(),
        to: to.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_cyrillic_aliases() {
        assert_eq!(normalize_unit("Грамм"), "gr");
        assert_eq!(normalize_unit(" КГ "), "kg");
        assert_eq!(normalize_unit("литр"), "l");
        assert_eq!(normalize_unit("мл"), "ml");
    }

    #[test]
    fn test_normalize_unknown_label_is_lowercased() {
        assert_eq!(normalize_unit("  Dona "), "dona");
    }

    #[test]
    fn test_scaling_out_of_range_is_an_error() {
        let huge = Decimal::from_i128_with_scale(10i128.pow(26), 0);
        assert!(matches!(
            convert(huge, "kg", "gr"),
            Err(ConversionError::Overflow { .. })
        ));
        assert_eq!(convert(huge, "gr", "kg").unwrap(), huge / Decimal::ONE_THOUSAND);
    }

    #[test]
    fn test_default_units_are_canonical() {
        for (_, short_name) in DEFAULT_UNITS {
            assert_eq!(normalize_unit(short_name), short_name);
        }
    }
}
