//! Approval HTTP handlers

use axum::{extract::State, Json};
use shared::{ApprovalFlow, DocType, SaveFlowInput};

use crate::error::AppResult;
use crate::services::approval::{ApprovalService, DecidedDocument, DecisionInput};
use crate::AppState;

/// Approve or reject the next stage of a PR or PO
pub async fn decide(
    State(state): State<AppState>,
    Json(input): Json<DecisionInput>,
) -> AppResult<Json<DecidedDocument>> {
    let service = ApprovalService::new(state.store.clone());
    Ok(Json(service.decide(input).await?))
}

pub async fn get_pr_flow(State(state): State<AppState>) -> AppResult<Json<ApprovalFlow>> {
    let service = ApprovalService::new(state.store.clone());
    Ok(Json(service.get_flow(DocType::Pr).await?))
}

pub async fn save_pr_flow(
    State(state): State<AppState>,
    Json(input): Json<SaveFlowInput>,
) -> AppResult<Json<ApprovalFlow>> {
    let service = ApprovalService::new(state.store.clone());
    Ok(Json(service.save_flow(DocType::Pr, input).await?))
}

pub async fn get_po_flow(State(state): State<AppState>) -> AppResult<Json<ApprovalFlow>> {
    let service = ApprovalService::new(state.store.clone());
    Ok(Json(service.get_flow(DocType::Po).await?))
}

pub async fn save_po_flow(
    State(state): State<AppState>,
    Json(input): Json<SaveFlowInput>,
) -> AppResult<Json<ApprovalFlow>> {
    let service = ApprovalService::new(state.store.clone());
    Ok(Json(service.save_flow(DocType::Po, input).await?))
}
