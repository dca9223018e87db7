//! Goods receipt HTTP handlers

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::CreateGoodsReceiptInput;
use uuid::Uuid;

use crate::services::GoodsReceiptService;
use crate::AppState;

#[derive(Deserialize)]
pub struct GoodsReceiptQuery {
    pub po_id: Option<Uuid>,
}

/// List goods receipts, optionally for one PO
pub async fn list_goods_receipts(
    State(state): State<AppState>,
    Query(query): Query<GoodsReceiptQuery>,
) -> impl IntoResponse {
    let service = GoodsReceiptService::new(state.store.clone());

    match service.list(query.po_id).await {
        Ok(grns) => (StatusCode::OK, Json(serde_json::json!({ "grns": grns }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a specific goods receipt
pub async fn get_goods_receipt(
    State(state): State<AppState>,
    Path(grn_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = GoodsReceiptService::new(state.store.clone());

    match service.get(grn_id).await {
        Ok(grn) => (StatusCode::OK, Json(grn)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Record a goods receipt against a PO
pub async fn create_goods_receipt(
    State(state): State<AppState>,
    Json(input): Json<CreateGoodsReceiptInput>,
) -> impl IntoResponse {
    let service = GoodsReceiptService::new(state.store.clone());

    match service.create(input).await {
        Ok(grn) => (StatusCode::CREATED, Json(grn)).into_response(),
        Err(e) => e.into_response(),
    }
}
