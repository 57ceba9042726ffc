//! Validation utilities for the Kindergarten Kitchen Management Platform

use rust_decimal::Decimal;

// ============================================================================
// Names
// ============================================================================

pub const MAX_NAME_LENGTH: usize = 100;

/// Validate a product, recipe or unit name (non-blank, bounded length)
pub fn validate_name(name: &str) -> Result<(), &'static str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err("Name cannot be empty");
    }
    if trimmed.chars().count() > MAX_NAME_LENGTH {
        return Err("Name is too long");
    }
    Ok(())
}

// ============================================================================
// Quantities
// ============================================================================

/// Upper bound for any stored quantity, price or per-portion amount.
///
/// Keeps `quantity * 1000 * MAX_PORTIONS` and month-long ledger sums far
/// inside the decimal range. Mirrored by CHECK constraints in the schema.
pub const MAX_QUANTITY: Decimal = Decimal::from_parts(1_000_000_000, 0, 0, false, 0);

/// Upper bound for portions in one serving
pub const MAX_PORTIONS: i32 = 100_000;

/// Delivered quantities must be strictly positive
pub fn validate_delivery_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity <= Decimal::ZERO {
        return Err("Quantity must be greater than zero");
    }
    if quantity > MAX_QUANTITY {
        return Err("Quantity is too large");
    }
    Ok(())
}

/// Per-portion quantities may be zero (no demand) but not negative
pub fn validate_quantity_per_portion(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Quantity per portion cannot be negative");
    }
    if quantity > MAX_QUANTITY {
        return Err("Quantity per portion is too large");
    }
    Ok(())
}

pub fn validate_min_quantity(quantity: Decimal) -> Result<(), &'static str> {
    if quantity < Decimal::ZERO {
        return Err("Minimum quantity cannot be negative");
    }
    if quantity > MAX_QUANTITY {
        return Err("Minimum quantity is too large");
    }
    Ok(())
}

/// Optional money amounts (delivery price) must not be negative
pub fn validate_price(price: Option<Decimal>) -> Result<(), &'static str> {
    match price {
        Some(value) if value < Decimal::ZERO => Err("Price cannot be negative"),
        Some(value) if value > MAX_QUANTITY => Err("Price is too large"),
        _ => Ok(()),
    }
}

pub fn validate_portions(portions: i32) -> Result<(), &'static str> {
    if portions <= 0 {
        return Err("Portions must be a positive integer");
    }
    if portions > MAX_PORTIONS {
        return Err("Too many portions for one serving");
    }
    Ok(())
}

// ============================================================================
// Reports
// ============================================================================

pub fn validate_report_month(year: i32, month: u32) -> Result<(), &'static str> {
    if !(2000..=2100).contains(&year) {
        return Err("Year must be between 2000 and 2100");
    }
    if !(1..=12).contains(&month) {
        return Err("Month must be between 1 and 12");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_name() {
        assert!(validate_name("Guruch").is_ok());
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name(&"ш".repeat(100)).is_ok());
    }

    #[test]
    fn test_validate_quantities() {
        assert!(validate_delivery_quantity(Decimal::ONE).is_ok());
        assert!(validate_delivery_quantity(Decimal::ZERO).is_err());
        assert!(validate_quantity_per_portion(Decimal::ZERO).is_ok());
        assert!(validate_quantity_per_portion(Decimal::NEGATIVE_ONE).is_err());
        assert!(validate_min_quantity(Decimal::NEGATIVE_ONE).is_err());
        assert!(validate_price(None).is_ok());
        assert!(validate_price(Some(Decimal::NEGATIVE_ONE)).is_err());
    }

    #[test]
    fn test_quantities_are_bounded() {
        let above = MAX_QUANTITY + Decimal::ONE;
        assert_eq!(MAX_QUANTITY, Decimal::from(1_000_000_000));
        assert!(validate_delivery_quantity(MAX_QUANTITY).is_ok());
        assert!(validate_delivery_quantity(above).is_err());
        assert!(validate_quantity_per_portion(above).is_err());
        assert!(validate_min_quantity(above).is_err());
        assert!(validate_price(Some(above)).is_err());
        assert!(validate_portions(MAX_PORTIONS).is_ok());
        assert!(validate_portions(MAX_PORTIONS + 1).is_err());
    }

    #[test]
    fn test_validate_portions() {
        assert!(validate_portions(1).is_ok());
        assert!(validate_portions(0).is_err());
        assert!(validate_portions(-4).is_err());
    }

    #[test]
    fn test_validate_report_month() {
        assert!(validate_report_month(2024, 12).is_ok());
        assert!(validate_report_month(2024, 13).is_err());
        assert!(validate_report_month(1999, 1).is_err());
    }
}
