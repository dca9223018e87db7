//! Variance report handlers

use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    Json,
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::ReportingService;
use crate::AppState;

#[derive(Deserialize)]
pub struct PrVsPoQuery {
    pub pr_id: Uuid,
    pub format: Option<String>, // "json" or "csv"
}

#[derive(Deserialize)]
pub struct PoVsGrnQuery {
    pub po_id: Uuid,
    pub format: Option<String>,
}

fn render<T: Serialize>(
    rows: Vec<T>,
    format: Option<&str>,
    filename: &str,
) -> AppResult<axum::response::Response> {
    if format == Some("csv") {
        let csv = ReportingService::export_to_csv(&rows)?;
        let disposition = format!("attachment; filename=\"{}\"", filename);
        Ok((
            [
                (header::CONTENT_TYPE, "text/csv".to_string()),
                (header::CONTENT_DISPOSITION, disposition),
            ],
            csv,
        )
            .into_response())
    } else {
        Ok(Json(serde_json::json!({ "rows": rows })).into_response())
    }
}

/// Requested vs ordered quantities per PR item
pub async fn get_pr_vs_po_report(
    State(state): State<AppState>,
    Query(query): Query<PrVsPoQuery>,
) -> AppResult<impl IntoResponse> {
    let service = ReportingService::new(state.store.clone());
    let report = service.pr_vs_po(query.pr_id).await?;
    render(report.rows, query.format.as_deref(), "pr_vs_po.csv")
}

/// Ordered vs received quantities per PO line
pub async fn get_po_vs_grn_report(
    State(state): State<AppState>,
    Query(query): Query<PoVsGrnQuery>,
) -> AppResult<impl IntoResponse> {
    let service = ReportingService::new(state.store.clone());
    let report = service.po_vs_grn(query.po_id).await?;
    render(report.rows, query.format.as_deref(), "po_vs_grn.csv")
}
