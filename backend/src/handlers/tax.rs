//! Tax rate HTTP handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use shared::{AddTaxRateInput, TaxRate};

use crate::error::AppResult;
use crate::services::TaxService;
use crate::AppState;

#[derive(Deserialize)]
pub struct ResolveTaxQuery {
    pub code: String,
    /// Defaults to today
    pub as_of: Option<NaiveDate>,
}

/// Full rate history
pub async fn list_tax_rates(State(state): State<AppState>) -> impl IntoResponse {
    let service = TaxService::new(state.store.clone());

    match service.list_rates().await {
        Ok(rates) => (StatusCode::OK, Json(serde_json::json!({ "rates": rates }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Append a rate row
pub async fn add_tax_rate(
    State(state): State<AppState>,
    Json(input): Json<AddTaxRateInput>,
) -> impl IntoResponse {
    let service = TaxService::new(state.store.clone());

    match service.add_rate(input).await {
        Ok(rate) => (StatusCode::CREATED, Json(rate)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Rate in force for a code on a given day
pub async fn resolve_tax_rate(
    State(state): State<AppState>,
    Query(query): Query<ResolveTaxQuery>,
) -> AppResult<Json<TaxRate>> {
    let service = TaxService::new(state.store.clone());
    let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
    let rate = service.resolve(&query.code, as_of).await?;
    Ok(Json(rate))
}
