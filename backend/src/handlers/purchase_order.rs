//! Purchase order HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use shared::{CreatePurchaseOrderInput, OrderTotals};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::PurchaseOrderService;
use crate::AppState;

#[derive(Deserialize)]
pub struct TotalsQuery {
    pub tax_code: Option<String>,
    pub as_of: Option<NaiveDate>,
}

fn service(state: &AppState) -> PurchaseOrderService {
    PurchaseOrderService::new(state.store.clone(), state.config.tax.clone())
}

/// List purchase orders, newest first
pub async fn list_purchase_orders(State(state): State<AppState>) -> impl IntoResponse {
    match service(&state).list().await {
        Ok(pos) => (
            StatusCode::OK,
            Json(serde_json::json!({ "purchase_orders": pos })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a specific purchase order
pub async fn get_purchase_order(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
) -> impl IntoResponse {
    match service(&state).get(po_id).await {
        Ok(po) => (StatusCode::OK, Json(po)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Create a purchase order, directly or from a requisition
pub async fn create_purchase_order(
    State(state): State<AppState>,
    Json(input): Json<CreatePurchaseOrderInput>,
) -> impl IntoResponse {
    match service(&state).create(input).await {
        Ok(po) => (StatusCode::CREATED, Json(po)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Subtotal, tax and grand total
pub async fn get_purchase_order_totals(
    State(state): State<AppState>,
    Path(po_id): Path<Uuid>,
    Query(query): Query<TotalsQuery>,
) -> AppResult<Json<OrderTotals>> {
    let totals = service(&state)
        .totals(po_id, query.tax_code, query.as_of)
        .await?;
    Ok(Json(totals))
}
