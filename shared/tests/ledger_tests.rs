//! Stock ledger tests
//!
//! Tests for ledger folding including:
//! - Property 1: Conservation
//! - Time-bounded balances used for opening stock

use chrono::{DateTime, Duration, TimeZone, Utc};
use proptest::prelude::*;
use rust_decimal::Decimal;
use shared::{current_quantity, quantity_as_of, stock_levels, stock_of, LedgerEntry};
use std::str::FromStr;
use uuid::Uuid;

// Helper to create Decimal from string
fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn at(day: u32, hour: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 3, day, hour, 0, 0).unwrap()
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_empty_ledger_is_zero() {
        assert_eq!(current_quantity(&Vec::<LedgerEntry>::new(), Uuid::new_v4()), Decimal::ZERO);
    }

    #[test]
    fn test_receipts_minus_consumption() {
        let flour = Uuid::new_v4();
        let entries = vec![
            LedgerEntry::receipt(flour, dec("10"), at(1, 8)),
            LedgerEntry::consumption(flour, dec("6"), at(2, 12)),
            LedgerEntry::receipt(flour, dec("2.5"), at(3, 8)),
        ];
        assert_eq!(current_quantity(&entries, flour), dec("6.5"));
    }

    #[test]
    fn test_other_products_ignored() {
        let flour = Uuid::new_v4();
        let sugar = Uuid::new_v4();
        let entries = vec![
            LedgerEntry::receipt(flour, dec("10"), at(1, 8)),
            LedgerEntry::receipt(sugar, dec("3"), at(1, 8)),
            LedgerEntry::consumption(sugar, dec("1"), at(1, 9)),
        ];
        assert_eq!(current_quantity(&entries, flour), dec("10"));
        assert_eq!(current_quantity(&entries, sugar), dec("2"));
    }

    #[test]
    fn test_negative_balance_not_clamped() {
        let milk = Uuid::new_v4();
        let entries = vec![
            LedgerEntry::consumption(milk, dec("4"), at(1, 8)),
            LedgerEntry::receipt(milk, dec("1"), at(1, 9)),
        ];
        assert_eq!(current_quantity(&entries, milk), dec("-3"));
    }

    #[test]
    fn test_quantity_as_of_excludes_cutoff_instant() {
        let rice = Uuid::new_v4();
        let entries = vec![
            LedgerEntry::receipt(rice, dec("5"), at(1, 0)),
            LedgerEntry::receipt(rice, dec("7"), at(2, 0)),
            LedgerEntry::consumption(rice, dec("1"), at(2, 0) - Duration::seconds(1)),
        ];
        assert_eq!(quantity_as_of(&entries, rice, at(2, 0)), dec("4"));
        assert_eq!(quantity_as_of(&entries, rice, at(1, 0)), Decimal::ZERO);
        assert_eq!(quantity_as_of(&entries, rice, at(3, 0)), dec("11"));
    }

    #[test]
    fn test_stock_levels_and_missing_product() {
        let flour = Uuid::new_v4();
        let entries = vec![
            LedgerEntry::receipt(flour, dec("10"), at(1, 8)),
            LedgerEntry::consumption(flour, dec("0.2"), at(1, 9)),
        ];
        let levels = stock_levels(&entries);
        assert_eq!(stock_of(&levels, flour), dec("9.8"));
        assert_eq!(stock_of(&levels, Uuid::new_v4()), Decimal::ZERO);
    }
}

// ============================================================================
// Property-Based Tests
// ============================================================================

#[cfg(test)]
mod property_tests {
    use super::*;

    /// Strategy for generating valid quantities (positive decimals)
    fn quantity_strategy() -> impl Strategy<Value = Decimal> {
        (1i64..=10000i64).prop_map(|n| Decimal::new(n, 1)) // 0.1 to 1000.0
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(100))]

        /// Property 1: currentQuantity == sum(receipts) - sum(consumption), in any order
        #[test]
        fn prop_conservation(
            movements in prop::collection::vec((any::<bool>(), quantity_strategy(), 0i64..10_000), 0..30)
        ) {
            let product = Uuid::new_v4();
            let base = at(1, 0);
            let entries: Vec<LedgerEntry> = movements
                .iter()
                .map(|(is_receipt, qty, minutes)| {
                    let when = base + Duration::minutes(*minutes);
                    if *is_receipt {
                        LedgerEntry::receipt(product, *qty, when)
                    } else {
                        LedgerEntry::consumption(product, *qty, when)
                    }
                })
                .collect();

            let received: Decimal = movements.iter().filter(|m| m.0).map(|m| m.1).sum();
            let consumed: Decimal = movements.iter().filter(|m| !m.0).map(|m| m.1).sum();

            prop_assert_eq!(current_quantity(&entries, product), received - consumed);

            let mut reversed = entries.clone();
            reversed.reverse();
            prop_assert_eq!(current_quantity(&reversed, product), received - consumed);
        }

        /// The time-bounded balance far in the future equals the live balance
        #[test]
        fn prop_as_of_future_equals_current(
            movements in prop::collection::vec((any::<bool>(), quantity_strategy()), 0..20)
        ) {
            let product = Uuid::new_v4();
            let entries: Vec<LedgerEntry> = movements
                .iter()
                .enumerate()
                .map(|(i, (is_receipt, qty))| {
                    let when = at(1, 0) + Duration::hours(i as i64);
                    if *is_receipt {
                        LedgerEntry::receipt(product, *qty, when)
                    } else {
                        LedgerEntry::consumption(product, *qty, when)
                    }
                })
                .collect();

            let far_future = at(1, 0) + Duration::days(365);
            prop_assert_eq!(
                quantity_as_of(&entries, product, far_future),
                current_quantity(&entries, product)
            );
        }
    }
}
