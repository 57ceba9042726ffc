//! Background jobs: periodic portion recalculation and month-end reports
//!
//! Failures are logged and the job waits for its next tick.

use std::time::Duration;

use chrono::Utc;
use shared::MonthWindow;
use sqlx::PgPool;
use tokio::time::{interval, sleep, MissedTickBehavior};

use super::notification::EventBus;
use super::portions::PortionService;
use super::reporting::ReportingService;
use crate::config::{InventoryConfig, SchedulerConfig};

/// Start the configured jobs on the current runtime
pub fn spawn(db: PgPool, events: EventBus, scheduler: &SchedulerConfig, inventory: InventoryConfig) {
    let portions = PortionService::new(db.clone(), events.clone());
    let period = Duration::from_secs(scheduler.portions_interval_secs.max(1));
    tokio::spawn(recalculate_portions(portions, period));

    if scheduler.monthly_report_enabled {
        let reporting = ReportingService::new(db, events, inventory.clone());
        tokio::spawn(generate_monthly_reports(reporting, inventory));
    }

    tracing::info!(
        portions_interval_secs = scheduler.portions_interval_secs,
        monthly_reports = scheduler.monthly_report_enabled,
        "Scheduler started"
    );
}

async fn recalculate_portions(service: PortionService, period: Duration) {
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        match service.recalculate_all().await {
            Ok(summary) => tracing::debug!(recipes = summary.recipes, "Scheduled portion recalculation done"),
            Err(e) => tracing::error!(error = %e, "Scheduled portion recalculation failed"),
        }
    }
}

/// Sleeps until each local month boundary, then reports on the month just closed
async fn generate_monthly_reports(service: ReportingService, inventory: InventoryConfig) {
    let offset = inventory.offset();

    loop {
        let Some(current) = MonthWindow::containing(Utc::now(), offset) else {
            tracing::error!("Could not determine the current month; monthly reports stopped");
            return;
        };

        let wait = (current.end - Utc::now()).to_std().unwrap_or(Duration::ZERO);
        tracing::debug!(next_run = %current.end, "Waiting for month end");
        sleep(wait).await;

        match service
            .generate_monthly_report(current.year, current.month)
            .await
        {
            Ok(report) => tracing::info!(
                report_id = %report.report.id,
                month = %current.label(),
                suspicious = report.report.is_overall_suspicious,
                "Scheduled monthly report generated"
            ),
            Err(e) => tracing::error!(error = %e, month = %current.label(), "Scheduled monthly report failed"),
        }

        // Past the boundary now; the next iteration targets the following month
        sleep(Duration::from_secs(1)).await;
    }
}
