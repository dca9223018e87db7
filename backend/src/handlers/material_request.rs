//! Material request and stock HTTP handlers

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Deserialize;
use shared::{CreateMaterialRequestInput, StockLevel};
use uuid::Uuid;

use crate::error::AppResult;
use crate::services::MaterialRequestService;
use crate::AppState;

#[derive(Deserialize)]
pub struct StockQuery {
    pub item_id: Uuid,
}

pub async fn list_material_requests(State(state): State<AppState>) -> impl IntoResponse {
    let service = MaterialRequestService::new(state.store.clone());

    match service.list().await {
        Ok(mrs) => (
            StatusCode::OK,
            Json(serde_json::json!({ "material_requests": mrs })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Issue received stock internally
pub async fn create_material_request(
    State(state): State<AppState>,
    Json(input): Json<CreateMaterialRequestInput>,
) -> impl IntoResponse {
    let service = MaterialRequestService::new(state.store.clone());

    match service.create(input).await {
        Ok(mr) => (StatusCode::CREATED, Json(mr)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Received minus issued for one item
pub async fn get_current_stock(
    State(state): State<AppState>,
    Query(query): Query<StockQuery>,
) -> AppResult<Json<StockLevel>> {
    let service = MaterialRequestService::new(state.store.clone());
    Ok(Json(service.current_stock(query.item_id).await?))
}
