//! Reporting service: monthly reconciliation, analytics and data export
//!
//! A monthly report compares what recipes say should have been consumed with
//! what the ledger actually lost, per recipe and per product. Generating a
//! report for a month that already has one replaces it.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use shared::{
    is_overall_suspicious, reconcile_product, stock_of, theoretical_consumption_by_product,
    validate_report_month, BalanceInputs, DateRange, EndingStockBasis, MonthWindow,
    ProductBalance, RecipePerformance,
};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use super::inventory::{consumed_between, current_quantities, quantities_as_of, received_between};
use super::notification::{EventBus, NotificationService};
use super::portions::snapshot_values;
use super::recipe::load_definitions;
use crate::config::InventoryConfig;
use crate::error::{AppError, AppResult};

/// Reporting service
#[derive(Clone)]
pub struct ReportingService {
    db: PgPool,
    events: EventBus,
    inventory: InventoryConfig,
}

/// Report header
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MonthlyReport {
    pub id: Uuid,
    pub report_month: NaiveDate,
    pub total_portions_served: i64,
    pub is_overall_suspicious: bool,
    pub suspicious_threshold_percent: Decimal,
    pub generated_at: DateTime<Utc>,
}

/// Report with every derived row
#[derive(Debug, Clone, Serialize)]
pub struct MonthlyReportDetail {
    #[serde(flatten)]
    pub report: MonthlyReport,
    pub recipe_performance: Vec<RecipePerformanceRow>,
    pub ingredient_usage: Vec<IngredientUsageRow>,
    pub product_balances: Vec<ProductBalanceRow>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct RecipePerformanceRow {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub portions_served: i64,
    pub possible_portions: i64,
    pub difference_percentage: Decimal,
    pub is_suspicious: bool,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct IngredientUsageRow {
    pub recipe_id: Uuid,
    pub recipe_name: String,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub total_used: Decimal,
}

/// Product balance row, also the CSV export record
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProductBalanceRow {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub opening_stock: Decimal,
    pub total_received: Decimal,
    pub total_available: Decimal,
    pub theoretical_consumption: Decimal,
    pub actual_consumption: Decimal,
    pub theoretical_ending_stock: Decimal,
    pub actual_ending_stock: Decimal,
    pub discrepancy: Decimal,
    pub discrepancy_percentage: Decimal,
    pub is_suspicious: bool,
}

/// Consumption of one product over a date range
#[derive(Debug, Serialize, FromRow)]
pub struct ConsumptionTotal {
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub total_used: Decimal,
    pub serving_count: i64,
}

/// Deliveries of one product on one local day
#[derive(Debug, Serialize, FromRow)]
pub struct DeliveryTrendPoint {
    pub day: NaiveDate,
    pub product_id: Uuid,
    pub product_name: String,
    pub unit: String,
    pub total_quantity: Decimal,
    pub delivery_count: i64,
}

/// Report list filter
#[derive(Debug, Default, Deserialize)]
pub struct ReportFilter {
    pub year: Option<i32>,
    pub month: Option<u32>,
}

/// Analytics filter; both dates inclusive, in local days
#[derive(Debug, Deserialize)]
pub struct AnalyticsFilter {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub product_id: Option<Uuid>,
}

#[derive(Debug, FromRow)]
struct ServedRow {
    recipe_id: Uuid,
    portions: i64,
}

#[derive(Debug, FromRow)]
struct NamedRecipeRow {
    id: Uuid,
    name: String,
}

#[derive(Debug, FromRow)]
struct UsageRow {
    recipe_id: Uuid,
    product_id: Uuid,
    total_used: Decimal,
}

/// Everything a report stores, computed before any write
struct ReportContents {
    total_portions_served: i64,
    recipe_performance: Vec<RecipePerformance>,
    ingredient_usage: Vec<UsageRow>,
    product_balances: Vec<ProductBalance>,
}

impl ReportingService {
    pub fn new(db: PgPool, events: EventBus, inventory: InventoryConfig) -> Self {
        Self {
            db,
            events,
            inventory,
        }
    }

    /// Generate (or regenerate) the report for a calendar month
    pub async fn generate_monthly_report(&self, year: i32, month: u32) -> AppResult<MonthlyReportDetail> {
        validate_report_month(year, month).map_err(|msg| {
            AppError::validation("month", msg, "Hisobot oyi noto'g'ri")
        })?;
        let window = MonthWindow::new(year, month, self.inventory.offset())
            .ok_or_else(|| AppError::validation("month", "Invalid report month", "Hisobot oyi noto'g'ri"))?;

        let threshold = self.inventory.suspicious_threshold_percent;
        let mut tx = self.db.begin().await?;

        // One generator per month at a time; the lock is released at commit or rollback
        sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
            .bind(report_lock_key(&window))
            .execute(&mut *tx)
            .await?;

        let contents = self.compute_contents(&mut tx, &window, threshold).await?;
        let overall_suspicious =
            is_overall_suspicious(&contents.recipe_performance, &contents.product_balances);

        sqlx::query("DELETE FROM monthly_reports WHERE report_month = $1")
            .bind(window.first_day())
            .execute(&mut *tx)
            .await?;

        let report_id: Uuid = sqlx::query_scalar(
            r#"
            INSERT INTO monthly_reports
                (report_month, total_portions_served, is_overall_suspicious, suspicious_threshold_percent)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(window.first_day())
        .bind(contents.total_portions_served)
        .bind(overall_suspicious)
        .bind(threshold)
        .fetch_one(&mut *tx)
        .await?;

        insert_rows(&mut tx, report_id, &contents).await?;

        tx.commit().await?;

        tracing::info!(
            %report_id,
            month = %window.label(),
            recipes = contents.recipe_performance.len(),
            products = contents.product_balances.len(),
            suspicious = overall_suspicious,
            "Monthly report generated"
        );

        if overall_suspicious {
            if let Err(e) = NotificationService::new(self.db.clone(), self.events.clone())
                .notify_suspicious_report(report_id, window.first_day())
                .await
            {
                tracing::warn!(error = %e, %report_id, "Suspicious report notification failed");
            }
        }

        self.get_report(report_id).await
    }

    /// Report for the month before the current local month
    pub async fn generate_previous_month(&self) -> AppResult<MonthlyReportDetail> {
        let window = MonthWindow::previous(Utc::now(), self.inventory.offset())
            .ok_or_else(|| AppError::Internal("Could not determine previous month".to_string()))?;
        self.generate_monthly_report(window.year, window.month).await
    }

    async fn compute_contents(
        &self,
        tx: &mut Transaction<'_, Postgres>,
        window: &MonthWindow,
        threshold: Decimal,
    ) -> AppResult<ReportContents> {
        // Recipe performance
        let served: HashMap<Uuid, i64> = sqlx::query_as::<_, ServedRow>(
            r#"
            SELECT recipe_id, SUM(portions_served)::BIGINT AS portions
            FROM servings
            WHERE served_at >= $1 AND served_at < $2
            GROUP BY recipe_id
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&mut **tx)
        .await?
        .into_iter()
        .map(|row| (row.recipe_id, row.portions))
        .collect();

        let snapshots = snapshot_values(&mut **tx).await?;
        let served_ids: Vec<Uuid> = served.keys().copied().collect();

        let recipes = sqlx::query_as::<_, NamedRecipeRow>(
            r#"
            SELECT id, name FROM recipes
            WHERE deleted_at IS NULL OR id = ANY($1)
            ORDER BY name, id
            "#,
        )
        .bind(&served_ids)
        .fetch_all(&mut **tx)
        .await?;

        let recipe_performance: Vec<RecipePerformance> = recipes
            .into_iter()
            .map(|recipe| {
                let portions_served = served.get(&recipe.id).copied().unwrap_or(0);
                let possible = snapshots.get(&recipe.id).copied().unwrap_or(0);
                RecipePerformance::assess(recipe.id, recipe.name, portions_served, possible, threshold)
            })
            .collect();

        // Ingredient usage
        let ingredient_usage = sqlx::query_as::<_, UsageRow>(
            r#"
            SELECT s.recipe_id, sd.product_id, SUM(sd.quantity_used) AS total_used
            FROM serving_details sd
            JOIN servings s ON s.id = sd.serving_id
            JOIN recipes r ON r.id = s.recipe_id
            JOIN products p ON p.id = sd.product_id
            WHERE s.served_at >= $1 AND s.served_at < $2
              AND r.deleted_at IS NULL AND p.deleted_at IS NULL
            GROUP BY s.recipe_id, sd.product_id
            ORDER BY s.recipe_id, sd.product_id
            "#,
        )
        .bind(window.start)
        .bind(window.end)
        .fetch_all(&mut **tx)
        .await?;

        // Product balances
        let product_ids: Vec<Uuid> = sqlx::query_scalar(
            "SELECT id FROM products WHERE deleted_at IS NULL ORDER BY name, id",
        )
        .fetch_all(&mut **tx)
        .await?;

        let opening = quantities_as_of(&mut **tx, &product_ids, window.start).await?;
        let received = received_between(&mut **tx, window.start, window.end).await?;
        let consumed = consumed_between(&mut **tx, window.start, window.end).await?;
        let ending = match self.inventory.ending_stock_basis {
            EndingStockBasis::Live => current_quantities(&mut **tx, &product_ids).await?,
            EndingStockBasis::MonthEnd => quantities_as_of(&mut **tx, &product_ids, window.end).await?,
        };

        let definitions = load_definitions(&mut **tx, &served_ids).await?;
        let theoretical = theoretical_consumption_by_product(definitions.iter().map(|definition| {
            (definition, served.get(&definition.id).copied().unwrap_or(0))
        }))?;

        let product_balances = product_ids
            .iter()
            .map(|&product_id| {
                let inputs = BalanceInputs {
                    opening_stock: stock_of(&opening, product_id),
                    total_received: stock_of(&received, product_id),
                    theoretical_consumption: stock_of(&theoretical, product_id),
                    actual_consumption: stock_of(&consumed, product_id),
                    actual_ending_stock: stock_of(&ending, product_id),
                };
                reconcile_product(product_id, inputs, threshold)
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(ReportContents {
            total_portions_served: served.values().sum(),
            recipe_performance,
            ingredient_usage,
            product_balances,
        })
    }

    /// Get a report with all of its rows
    pub async fn get_report(&self, report_id: Uuid) -> AppResult<MonthlyReportDetail> {
        let report = sqlx::query_as::<_, MonthlyReport>(
            r#"
            SELECT id, report_month, total_portions_served, is_overall_suspicious,
                   suspicious_threshold_percent, generated_at
            FROM monthly_reports
            WHERE id = $1
            "#,
        )
        .bind(report_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| AppError::NotFound("Report".to_string()))?;

        let recipe_performance = sqlx::query_as::<_, RecipePerformanceRow>(
            r#"
            SELECT rp.recipe_id, r.name AS recipe_name, rp.portions_served, rp.possible_portions,
                   rp.difference_percentage, rp.is_suspicious
            FROM report_recipe_performance rp
            JOIN recipes r ON r.id = rp.recipe_id
            WHERE rp.report_id = $1
            ORDER BY rp.is_suspicious DESC, r.name
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.db)
        .await?;

        let ingredient_usage = sqlx::query_as::<_, IngredientUsageRow>(
            r#"
            SELECT iu.recipe_id, r.name AS recipe_name, iu.product_id, p.name AS product_name,
                   u.short_name AS unit, iu.total_used
            FROM report_ingredient_usage iu
            JOIN recipes r ON r.id = iu.recipe_id
            JOIN products p ON p.id = iu.product_id
            JOIN units u ON u.id = p.unit_id
            WHERE iu.report_id = $1
            ORDER BY r.name, p.name
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.db)
        .await?;

        let product_balances = self.product_balances(report_id).await?;

        Ok(MonthlyReportDetail {
            report,
            recipe_performance,
            ingredient_usage,
            product_balances,
        })
    }

    pub async fn product_balances(&self, report_id: Uuid) -> AppResult<Vec<ProductBalanceRow>> {
        let balances = sqlx::query_as::<_, ProductBalanceRow>(
            r#"
            SELECT b.product_id, p.name AS product_name, u.short_name AS unit,
                   b.opening_stock, b.total_received, b.total_available,
                   b.theoretical_consumption, b.actual_consumption,
                   b.theoretical_ending_stock, b.actual_ending_stock,
                   b.discrepancy, b.discrepancy_percentage, b.is_suspicious
            FROM product_monthly_balances b
            JOIN products p ON p.id = b.product_id
            JOIN units u ON u.id = p.unit_id
            WHERE b.report_id = $1
            ORDER BY b.is_suspicious DESC, p.name
            "#,
        )
        .bind(report_id)
        .fetch_all(&self.db)
        .await?;

        Ok(balances)
    }

    /// List report headers, newest month first
    pub async fn list_reports(&self, filter: ReportFilter) -> AppResult<Vec<MonthlyReport>> {
        let reports = sqlx::query_as::<_, MonthlyReport>(
            r#"
            SELECT id, report_month, total_portions_served, is_overall_suspicious,
                   suspicious_threshold_percent, generated_at
            FROM monthly_reports
            WHERE ($1::int IS NULL OR EXTRACT(YEAR FROM report_month)::int = $1)
              AND ($2::int IS NULL OR EXTRACT(MONTH FROM report_month)::int = $2)
            ORDER BY report_month DESC
            "#,
        )
        .bind(filter.year)
        .bind(filter.month.map(|m| m as i32))
        .fetch_all(&self.db)
        .await?;

        Ok(reports)
    }

    /// Consumption per product over local days `[start, end]`
    pub async fn consumption_totals(&self, filter: &AnalyticsFilter) -> AppResult<Vec<ConsumptionTotal>> {
        let (start, end) = self.instants(filter)?;

        let totals = sqlx::query_as::<_, ConsumptionTotal>(
            r#"
            SELECT sd.product_id, p.name AS product_name, u.short_name AS unit,
                   SUM(sd.quantity_used) AS total_used,
                   COUNT(DISTINCT sd.serving_id) AS serving_count
            FROM serving_details sd
            JOIN servings s ON s.id = sd.serving_id
            JOIN products p ON p.id = sd.product_id
            JOIN units u ON u.id = p.unit_id
            WHERE s.served_at >= $1 AND s.served_at < $2
              AND ($3::uuid IS NULL OR sd.product_id = $3)
            GROUP BY sd.product_id, p.name, u.short_name
            ORDER BY total_used DESC
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(filter.product_id)
        .fetch_all(&self.db)
        .await?;

        Ok(totals)
    }

    /// Deliveries per local day and product over `[start, end]`
    pub async fn delivery_trends(&self, filter: &AnalyticsFilter) -> AppResult<Vec<DeliveryTrendPoint>> {
        let (start, end) = self.instants(filter)?;

        let points = sqlx::query_as::<_, DeliveryTrendPoint>(
            r#"
            SELECT ((d.delivered_at AT TIME ZONE 'UTC') + make_interval(mins => $4))::date AS day,
                   d.product_id, p.name AS product_name, u.short_name AS unit,
                   SUM(d.quantity) AS total_quantity,
                   COUNT(*) AS delivery_count
            FROM deliveries d
            JOIN products p ON p.id = d.product_id
            JOIN units u ON u.id = p.unit_id
            WHERE d.delivered_at >= $1 AND d.delivered_at < $2
              AND ($3::uuid IS NULL OR d.product_id = $3)
            GROUP BY day, d.product_id, p.name, u.short_name
            ORDER BY day, p.name
            "#,
        )
        .bind(start)
        .bind(end)
        .bind(filter.product_id)
        .bind(self.inventory.utc_offset_minutes)
        .fetch_all(&self.db)
        .await?;

        Ok(points)
    }

    fn instants(&self, filter: &AnalyticsFilter) -> AppResult<(DateTime<Utc>, DateTime<Utc>)> {
        if filter.end < filter.start {
            return Err(AppError::validation(
                "end",
                "End date must not be before start date",
                "Tugash sanasi boshlanish sanasidan oldin bo'lmasligi kerak",
            ));
        }
        DateRange {
            start: filter.start,
            end: filter.end,
        }
        .to_instants(self.inventory.offset())
        .ok_or_else(|| AppError::validation("end", "Date out of range", "Sana noto'g'ri"))
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let csv_data = String::from_utf8(
            wtr.into_inner()
                .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?,
        )
        .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))?;
        Ok(csv_data)
    }
}

async fn insert_rows(
    tx: &mut Transaction<'_, Postgres>,
    report_id: Uuid,
    contents: &ReportContents,
) -> AppResult<()> {
    for row in &contents.recipe_performance {
        sqlx::query(
            r#"
            INSERT INTO report_recipe_performance
                (report_id, recipe_id, portions_served, possible_portions, difference_percentage, is_suspicious)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(report_id)
        .bind(row.recipe_id)
        .bind(row.portions_served)
        .bind(row.possible_portions)
        .bind(row.difference_percentage)
        .bind(row.is_suspicious)
        .execute(&mut **tx)
        .await?;
    }

    for row in &contents.ingredient_usage {
        sqlx::query(
            r#"
            INSERT INTO report_ingredient_usage (report_id, recipe_id, product_id, total_used)
            VALUES ($1, $2, $3, $4)
            "#,
        )
        .bind(report_id)
        .bind(row.recipe_id)
        .bind(row.product_id)
        .bind(row.total_used)
        .execute(&mut **tx)
        .await?;
    }

    for balance in &contents.product_balances {
        sqlx::query(
            r#"
            INSERT INTO product_monthly_balances
                (report_id, product_id, opening_stock, total_received, total_available,
                 theoretical_consumption, actual_consumption, theoretical_ending_stock,
                 actual_ending_stock, discrepancy, discrepancy_percentage, is_suspicious)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
        )
        .bind(report_id)
        .bind(balance.product_id)
        .bind(balance.opening_stock)
        .bind(balance.total_received)
        .bind(balance.total_available)
        .bind(balance.theoretical_consumption)
        .bind(balance.actual_consumption)
        .bind(balance.theoretical_ending_stock)
        .bind(balance.actual_ending_stock)
        .bind(balance.discrepancy)
        .bind(balance.discrepancy_percentage)
        .bind(balance.is_suspicious)
        .execute(&mut **tx)
        .await?;
    }

    Ok(())
}

fn report_lock_key(window: &MonthWindow) -> String {
    format!("monthly_report:{}", window.label())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Row {
        product: &'static str,
        quantity: Decimal,
    }

    #[test]
    fn test_export_to_csv_writes_header_and_rows() {
        let csv = ReportingService::export_to_csv(&[
            Row { product: "Guruch", quantity: Decimal::new(125, 1) },
            Row { product: "Sabzi", quantity: Decimal::from(3) },
        ])
        .unwrap();

        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines, vec!["product,quantity", "Guruch,12.5", "Sabzi,3"]);
    }

    #[test]
    fn test_export_empty_is_empty() {
        let rows: Vec<Row> = Vec::new();
        assert_eq!(ReportingService::export_to_csv(&rows).unwrap(), "");
    }

    #[test]
    fn test_report_lock_key_is_per_month() {
        let offset = chrono::FixedOffset::east_opt(5 * 3600).unwrap();
        let march = MonthWindow::new(2024, 3, offset).unwrap();
        let april = MonthWindow::new(2024, 4, offset).unwrap();
        assert_eq!(report_lock_key(&march), "monthly_report:2024-03");
        assert_ne!(report_lock_key(&march), report_lock_key(&april));
    }

    // Needs Postgres: DATABASE_URL=postgres://... cargo test -- --ignored concurrent_generation
    #[tokio::test]
    #[ignore]
    async fn test_concurrent_generation_of_one_month_both_succeed() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL");
        let pool = PgPool::connect(&url).await.unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let inventory = InventoryConfig {
            suspicious_threshold_percent: Decimal::from(15),
            utc_offset_minutes: 300,
            ending_stock_basis: EndingStockBasis::MonthEnd,
            low_stock_notifications: false,
        };
        let service = ReportingService::new(pool.clone(), EventBus::new(16), inventory);

        let (first, second) = tokio::join!(
            service.generate_monthly_report(2031, 7),
            service.generate_monthly_report(2031, 7),
        );
        let first = first.unwrap();
        let second = second.unwrap();
        assert_ne!(first.report.id, second.report.id);

        let headers: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM monthly_reports WHERE report_month = '2031-07-01'",
        )
        .fetch_one(&pool)
        .await
        .unwrap();
        assert_eq!(headers, 1);
    }
}
