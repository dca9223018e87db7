//! Item and supplier HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::{CreateItemInput, CreateSupplierInput};
use uuid::Uuid;

use crate::services::MasterDataService;
use crate::AppState;

/// List all items
pub async fn list_items(State(state): State<AppState>) -> impl IntoResponse {
    let service = MasterDataService::new(state.store.clone());

    match service.list_items().await {
        Ok(items) => (StatusCode::OK, Json(serde_json::json!({ "items": items }))).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a specific item
pub async fn get_item(State(state): State<AppState>, Path(item_id): Path<Uuid>) -> impl IntoResponse {
    let service = MasterDataService::new(state.store.clone());

    match service.get_item(item_id).await {
        Ok(item) => (StatusCode::OK, Json(item)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Register a new item
pub async fn create_item(
    State(state): State<AppState>,
    Json(input): Json<CreateItemInput>,
) -> impl IntoResponse {
    let service = MasterDataService::new(state.store.clone());

    match service.create_item(input).await {
        Ok(item) => (StatusCode::CREATED, Json(item)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// List all suppliers
pub async fn list_suppliers(State(state): State<AppState>) -> impl IntoResponse {
    let service = MasterDataService::new(state.store.clone());

    match service.list_suppliers().await {
        Ok(suppliers) => {
            (StatusCode::OK, Json(serde_json::json!({ "suppliers": suppliers }))).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Get a specific supplier
pub async fn get_supplier(
    State(state): State<AppState>,
    Path(supplier_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = MasterDataService::new(state.store.clone());

    match service.get_supplier(supplier_id).await {
        Ok(supplier) => (StatusCode::OK, Json(supplier)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Register a new supplier
pub async fn create_supplier(
    State(state): State<AppState>,
    Json(input): Json<CreateSupplierInput>,
) -> impl IntoResponse {
    let service = MasterDataService::new(state.store.clone());

    match service.create_supplier(input).await {
        Ok(supplier) => (StatusCode::CREATED, Json(supplier)).into_response(),
        Err(e) => e.into_response(),
    }
}
