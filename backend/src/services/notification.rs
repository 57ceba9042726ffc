//! Notification service: persisted kitchen alerts and the in-process event relay
//!
//! Supports:
//! - Low-stock notifications, one unread per product
//! - Suspicious monthly report notifications
//! - Broadcasting [`KitchenEvent`]s to WebSocket subscribers

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use shared::{KitchenEvent, NotificationKind, ProductStock};
use sqlx::{FromRow, PgPool};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

/// Fan-out of kitchen events to every connected subscriber.
///
/// Publishing never fails: with no subscribers the event is dropped, and a
/// slow subscriber lags instead of blocking the publisher.
#[derive(Clone)]
pub struct EventBus {
    sender: broadcast::Sender<KitchenEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn publish(&self, event: KitchenEvent) {
        let event_type = event.event_type();
        match self.sender.send(event) {
            Ok(receivers) => tracing::debug!(event_type, receivers, "Event published"),
            Err(_) => tracing::debug!(event_type, "Event dropped, no subscribers"),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<KitchenEvent> {
        self.sender.subscribe()
    }
}

/// Persisted notification
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Notification {
    pub id: Uuid,
    pub kind: String,
    pub message: String,
    pub product_id: Option<Uuid>,
    pub report_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Notification service for managing notifications
#[derive(Clone)]
pub struct NotificationService {
    db: PgPool,
    events: EventBus,
}

impl NotificationService {
    pub fn new(db: PgPool, events: EventBus) -> Self {
        Self { db, events }
    }

    /// Record a low-stock alert unless the product already has an unread one.
    ///
    /// Returns true when a new notification was created (and broadcast).
    pub async fn notify_low_stock(&self, stock: &ProductStock) -> AppResult<bool> {
        let message = format!(
            "'{}' kam qoldi: {} {} (minimum {} {})",
            stock.name, stock.current_quantity, stock.unit, stock.min_quantity, stock.unit
        );

        let created: Option<Uuid> = sqlx::query_scalar(
            r#"
            INSERT INTO notifications (kind, message, product_id)
            VALUES ($1, $2, $3)
            ON CONFLICT (product_id) WHERE kind = 'low_stock' AND is_read = FALSE
            DO NOTHING
            RETURNING id
            "#,
        )
        .bind(NotificationKind::LowStock.as_str())
        .bind(&message)
        .bind(stock.product_id)
        .fetch_optional(&self.db)
        .await?;

        if created.is_none() {
            tracing::debug!(product_id = %stock.product_id, "Unread low-stock notification already exists");
            return Ok(false);
        }

        tracing::info!(
            product_id = %stock.product_id,
            current = %stock.current_quantity,
            minimum = %stock.min_quantity,
            "Low stock detected"
        );

        self.events.publish(KitchenEvent::LowStockAlert {
            product_id: stock.product_id,
            product_name: stock.name.clone(),
            current_quantity: stock.current_quantity,
            min_quantity: stock.min_quantity,
            unit: stock.unit.clone(),
        });

        Ok(true)
    }

    /// Record and broadcast a suspicious monthly report
    pub async fn notify_suspicious_report(
        &self,
        report_id: Uuid,
        month: NaiveDate,
    ) -> AppResult<Notification> {
        let message = format!(
            "{} oyi hisobotida shubhali farqlar aniqlandi. Iltimos, tekshiring.",
            month.format("%Y-%m")
        );

        let notification = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (kind, message, report_id)
            VALUES ($1, $2, $3)
            RETURNING id, kind, message, product_id, report_id, is_read, created_at
            "#,
        )
        .bind(NotificationKind::SuspiciousReport.as_str())
        .bind(&message)
        .bind(report_id)
        .fetch_one(&self.db)
        .await?;

        self.events.publish(KitchenEvent::SuspiciousReportAlert {
            report_id,
            month,
            is_overall_suspicious: true,
        });

        Ok(notification)
    }

    /// List notifications, newest first
    pub async fn list(&self, unread_only: bool) -> AppResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            r#"
            SELECT id, kind, message, product_id, report_id, is_read, created_at
            FROM notifications
            WHERE ($1 = FALSE OR is_read = FALSE)
            ORDER BY created_at DESC
            LIMIT 200
            "#,
        )
        .bind(unread_only)
        .fetch_all(&self.db)
        .await?;

        Ok(notifications)
    }

    pub async fn mark_read(&self, notification_id: Uuid) -> AppResult<Notification> {
        sqlx::query_as::<_, Notification>(
            r#"
            UPDATE notifications SET is_read = TRUE
            WHERE id = $1
            RETURNING id, kind, message, product_id, report_id, is_read, created_at
            "#,
        )
        .bind(notification_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Notification".to_string()))
    }

    /// Mark every unread notification as read; returns how many changed
    pub async fn mark_all_read(&self) -> AppResult<u64> {
        let result = sqlx::query("UPDATE notifications SET is_read = TRUE WHERE is_read = FALSE")
            .execute(&self.db)
            .await?;
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_event_bus_delivers_to_every_subscriber() {
        let bus = EventBus::new(8);
        let mut first = bus.subscribe();
        let mut second = bus.subscribe();

        let event = KitchenEvent::PossiblePortionsRecalculated {
            recalculated_at: Utc::now(),
        };
        bus.publish(event.clone());

        assert_eq!(first.recv().await.unwrap(), event);
        assert_eq!(second.recv().await.unwrap(), event);
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(0);
        bus.publish(KitchenEvent::PossiblePortionsRecalculated {
            recalculated_at: Utc::now(),
        });
    }
}
