//! Purchase requisition HTTP handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use shared::CreateRequisitionInput;
use uuid::Uuid;

use crate::services::RequisitionService;
use crate::AppState;

/// List purchase requisitions, newest first
pub async fn list_requisitions(State(state): State<AppState>) -> impl IntoResponse {
    let service = RequisitionService::new(state.store.clone());

    match service.list().await {
        Ok(prs) => (
            StatusCode::OK,
            Json(serde_json::json!({ "purchase_requisitions": prs })),
        )
            .into_response(),
        Err(e) => e.into_response(),
    }
}

/// Get a specific purchase requisition
pub async fn get_requisition(
    State(state): State<AppState>,
    Path(pr_id): Path<Uuid>,
) -> impl IntoResponse {
    let service = RequisitionService::new(state.store.clone());

    match service.get(pr_id).await {
        Ok(pr) => (StatusCode::OK, Json(pr)).into_response(),
        Err(e) => e.into_response(),
    }
}

/// Raise a purchase requisition
pub async fn create_requisition(
    State(state): State<AppState>,
    Json(input): Json<CreateRequisitionInput>,
) -> impl IntoResponse {
    let service = RequisitionService::new(state.store.clone());

    match service.create(input).await {
        Ok(pr) => (StatusCode::CREATED, Json(pr)).into_response(),
        Err(e) => e.into_response(),
    }
}
