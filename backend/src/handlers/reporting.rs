//! Reporting handlers for monthly reconciliation, analytics and export

use axum::{
    extract::{Path, Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::reporting::{
    AnalyticsFilter, ConsumptionTotal, DeliveryTrendPoint, MonthlyReport, MonthlyReportDetail,
    ReportFilter,
};
use crate::services::ReportingService;
use crate::AppState;

#[derive(Debug, Deserialize)]
pub struct GenerateReportRequest {
    pub year: i32,
    pub month: u32,
}

fn service(state: AppState) -> ReportingService {
    ReportingService::new(state.db, state.events, state.config.inventory.clone())
}

/// Generate (or replace) a month's report
pub async fn generate_report(
    State(state): State<AppState>,
    Json(request): Json<GenerateReportRequest>,
) -> AppResult<Json<MonthlyReportDetail>> {
    let report = service(state)
        .generate_monthly_report(request.year, request.month)
        .await?;
    Ok(Json(report))
}

pub async fn generate_previous_month(
    State(state): State<AppState>,
) -> AppResult<Json<MonthlyReportDetail>> {
    Ok(Json(service(state).generate_previous_month().await?))
}

pub async fn list_reports(
    State(state): State<AppState>,
    Query(filter): Query<ReportFilter>,
) -> AppResult<Json<Vec<MonthlyReport>>> {
    Ok(Json(service(state).list_reports(filter).await?))
}

pub async fn get_report(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<Json<MonthlyReportDetail>> {
    Ok(Json(service(state).get_report(report_id).await?))
}

/// Product balances of a report as CSV
pub async fn export_balances_csv(
    State(state): State<AppState>,
    Path(report_id): Path<Uuid>,
) -> AppResult<impl IntoResponse> {
    let service = service(state);
    let report = service.get_report(report_id).await?;
    let csv = ReportingService::export_to_csv(&report.product_balances)?;
    let disposition = format!(
        "attachment; filename=balances_{}.csv",
        report.report.report_month.format("%Y-%m")
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/csv".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        csv,
    )
        .into_response())
}

pub async fn consumption_totals(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
) -> AppResult<Json<Vec<ConsumptionTotal>>> {
    Ok(Json(service(state).consumption_totals(&filter).await?))
}

pub async fn delivery_trends(
    State(state): State<AppState>,
    Query(filter): Query<AnalyticsFilter>,
) -> AppResult<Json<Vec<DeliveryTrendPoint>>> {
    Ok(Json(service(state).delivery_trends(&filter).await?))
}
