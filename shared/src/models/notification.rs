//! Kitchen events relayed to connected clients

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Fire-and-forget events emitted after core operations complete.
///
/// Serialized with a `type` discriminator and camelCase payload fields:
/// `{"type":"meal_served","servingId":"...","portionsServed":30,...}`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case", rename_all_fields = "camelCase")]
pub enum KitchenEvent {
    LowStockAlert {
        product_id: Uuid,
        product_name: String,
        current_quantity: Decimal,
        min_quantity: Decimal,
        unit: String,
    },
    MealServed {
        serving_id: Uuid,
        recipe_id: Uuid,
        recipe_name: String,
        portions_served: i32,
        served_at: DateTime<Utc>,
    },
    SuspiciousReportAlert {
        report_id: Uuid,
        month: NaiveDate,
        is_overall_suspicious: bool,
    },
    PossiblePortionsRecalculated {
        recalculated_at: DateTime<Utc>,
    },
    StockReceived {
        delivery_id: Uuid,
        product_id: Uuid,
        quantity: Decimal,
        new_total_quantity: Decimal,
        unit: String,
    },
}

impl KitchenEvent {
    pub fn event_type(&self) -> &'static str {
        match self {
            KitchenEvent::LowStockAlert { .. } => "low_stock_alert",
            KitchenEvent::MealServed { .. } => "meal_served",
            KitchenEvent::SuspiciousReportAlert { .. } => "suspicious_report_alert",
            KitchenEvent::PossiblePortionsRecalculated { .. } => "possible_portions_recalculated",
            KitchenEvent::StockReceived { .. } => "stock_received",
        }
    }
}

/// Kinds of persisted notifications
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    LowStock,
    SuspiciousReport,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::LowStock => "low_stock",
            NotificationKind::SuspiciousReport => "suspicious_report",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_is_tagged_with_snake_case_type() {
        let event = KitchenEvent::PossiblePortionsRecalculated {
            recalculated_at: Utc::now(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "possible_portions_recalculated");
        assert!(json.get("recalculatedAt").is_some());
        assert_eq!(event.event_type(), "possible_portions_recalculated");
    }

    #[test]
    fn test_low_stock_payload_uses_camel_case() {
        let product_id = Uuid::new_v4();
        let event = KitchenEvent::LowStockAlert {
            product_id,
            product_name: "Sut".to_string(),
            current_quantity: Decimal::new(25, 1),
            min_quantity: Decimal::from(5),
            unit: "l".to_string(),
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "low_stock_alert");
        assert_eq!(json["productId"], product_id.to_string());
        assert_eq!(json["currentQuantity"], "2.5");
        assert_eq!(json["minQuantity"], "5");

        let back: KitchenEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back, event);
    }
}
