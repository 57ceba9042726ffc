//! Unit conversion tests
//!
//! Tests for the unit resolver including:
//! - Property 2: Unit Identity
//! - Property 3: Unit Round-Trip
//! - Property 4: Incompatible Units

use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{convert, normalize_unit, ConversionError};
use std::str::FromStr;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_kilogram_to_gram() {
        assert_eq!(convert(dec("10"), "kg", "gr").unwrap(), dec("10000"));
        assert_eq!(convert(dec("0.25"), "kilogramm", "g").unwrap(), dec("250"));
    }

    #[test]
    fn test_gram_to_kilogram() {
        assert_eq!(convert(dec("200"), "gr", "kg").unwrap(), dec("0.2"));
        assert_eq!(convert(dec("1"), "грамм", "кг").unwrap(), dec("0.001"));
    }

    #[test]
    fn test_volume_family() {
        assert_eq!(convert(dec("1.5"), "l", "ml").unwrap(), dec("1500"));
        assert_eq!(convert(dec("250"), "миллилитр", "литр").unwrap(), dec("0.25"));
    }

    #[test]
    fn test_normalization_is_case_and_whitespace_insensitive() {
        assert_eq!(convert(dec("3"), " KG ", "Gramm").unwrap(), dec("3000"));
        assert_eq!(normalize_unit("GR"), normalize_unit("g"));
    }

    #[test]
    fn test_identity_for_unknown_units() {
        assert_eq!(convert(dec("4"), "dona", "Dona").unwrap(), dec("4"));
        assert_eq!(convert(dec("2"), "stakan", "stakan").unwrap(), dec("2"));
    }

    #[test]
    fn test_cross_dimension_is_incompatible() {
        let err = convert(dec("1"), "kg", "l").unwrap_err();
        assert_eq!(
            err,
            ConversionError::Incompatible {
                from: "kg".to_string(),
                to: "l".to_string()
            }
        );
        assert!(convert(dec("1"), "ml", "gr").is_err());
    }

    #[test]
    fn test_count_units_never_convert_to_weight() {
        assert!(convert(dec("1"), "dona", "kg").is_err());
        assert!(convert(dec("1"), "qoshiq", "gr").is_err());
        assert!(convert(dec("1"), "stakan", "ml").is_err());
    }

    #[test]
    fn test_kilograms_near_decimal_limit_do_not_fit_in_grams() {
        let err = convert(dec("100000000000000000000000000"), "kg", "gr").unwrap_err();
        assert!(matches!(err, ConversionError::Overflow { .. }));
        assert!(convert(dec("100000000000000000000000000"), "l", "ml").is_err());
    }

    #[test]
    fn test_no_rounding_applied() {
        assert_eq!(convert(dec("1"), "gr", "kg").unwrap(), dec("0.001"));
        assert_eq!(convert(dec("0.333"), "gr", "kg").unwrap(), dec("0.000333"));
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for non-negative quantities with up to three decimals
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (0i64..=100_000_000i64).prop_map(|n| Decimal::new(n, 3))
    }

    fn unit_strategy() -> impl Strategy<Value = String> {
        prop_oneof![
            Just("gr".to_string()),
            Just("kg".to_string()),
            Just("ml".to_string()),
            Just("l".to_string()),
            Just("dona".to_string()),
            "[a-z]{1,8}",
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property 2: convert(x, u, u) == x
        #[test]
        fn prop_unit_identity(x in quantity_strategy(), unit in unit_strategy()) {
            prop_assert_eq!(convert(x, &unit, &unit).unwrap(), x);
        }

        /// Property 3: gr -> kg -> gr returns the original quantity
        #[test]
        fn prop_mass_round_trip(x in quantity_strategy()) {
            let kilograms = convert(x, "gr", "kg").unwrap();
            let grams = convert(kilograms, "kg", "gr").unwrap();
            prop_assert_eq!(grams, x);
        }

        /// Property 3 for the volume family
        #[test]
        fn prop_volume_round_trip(x in quantity_strategy()) {
            let litres = convert(x, "ml", "l").unwrap();
            prop_assert_eq!(convert(litres, "l", "ml").unwrap(), x);
        }

        /// Property 4: pieces never convert to kilograms
        #[test]
        fn prop_dona_to_kg_incompatible(x in quantity_strategy()) {
            prop_assert!(convert(x, "dona", "kg").is_err());
        }
    }
}
