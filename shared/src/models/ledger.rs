//! Stock ledger: on-hand quantity as a fold over append-only facts

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Current balance per product, in each product's base unit.
///
/// A product missing from the map has a balance of zero.
pub type StockLevels = HashMap<Uuid, Decimal>;

/// Balance lookup with the missing-means-zero rule applied
pub fn stock_of(levels: &StockLevels, product_id: Uuid) -> Decimal {
    levels.get(&product_id).copied().unwrap_or(Decimal::ZERO)
}

/// Direction of a ledger movement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LedgerEntryKind {
    /// A delivery adding stock
    Receipt,
    /// A serving detail debiting stock
    Consumption,
}

/// One immutable ledger fact, already expressed in the product's base unit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub product_id: Uuid,
    pub kind: LedgerEntryKind,
    pub quantity: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl LedgerEntry {
    pub fn receipt(product_id: Uuid, quantity: Decimal, occurred_at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            kind: LedgerEntryKind::Receipt,
            quantity,
            occurred_at,
        }
    }

    pub fn consumption(product_id: Uuid, quantity: Decimal, occurred_at: DateTime<Utc>) -> Self {
        Self {
            product_id,
            kind: LedgerEntryKind::Consumption,
            quantity,
            occurred_at,
        }
    }

    fn signed_quantity(&self) -> Decimal {
        match self.kind {
            LedgerEntryKind::Receipt => self.quantity,
            LedgerEntryKind::Consumption => -self.quantity,
        }
    }
}

/// Receipts minus consumption for `product_id`. Negative balances are returned as-is.
pub fn current_quantity<'a, I>(entries: I, product_id: Uuid) -> Decimal
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries
        .into_iter()
        .filter(|entry| entry.product_id == product_id)
        .map(LedgerEntry::signed_quantity)
        .sum()
}

/// Like [`current_quantity`], restricted to entries strictly before `cutoff`
pub fn quantity_as_of<'a, I>(entries: I, product_id: Uuid, cutoff: DateTime<Utc>) -> Decimal
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    entries
        .into_iter()
        .filter(|entry| entry.product_id == product_id && entry.occurred_at < cutoff)
        .map(LedgerEntry::signed_quantity)
        .sum()
}

/// Balances of every product appearing in `entries`
pub fn stock_levels<'a, I>(entries: I) -> StockLevels
where
    I: IntoIterator<Item = &'a LedgerEntry>,
{
    let mut levels = StockLevels::new();
    for entry in entries {
        *levels.entry(entry.product_id).or_insert(Decimal::ZERO) += entry.signed_quantity();
    }
    levels
}
