//! Approval decisions and flow definitions

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use shared::{
    ApprovalFlow, Decision, DocType, PurchaseOrder, PurchaseRequisition, SaveFlowInput,
    StageInput,
};
use uuid::Uuid;

use crate::config::ApprovalsConfig;
use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

/// An approve or reject call on one document
#[derive(Debug, Clone, Deserialize)]
pub struct DecisionInput {
    pub doc_type: DocType,
    pub doc_id: Uuid,
    pub decision: Decision,
}

/// The document after a decision
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum DecidedDocument {
    Requisition(PurchaseRequisition),
    Order(PurchaseOrder),
}

#[derive(Clone)]
pub struct ApprovalService {
    store: Arc<dyn ProcurementStore>,
}

impl ApprovalService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Apply a decision; the stage count comes from the document's own
    /// snapshot, never from the current flow.
    pub async fn decide(&self, input: DecisionInput) -> AppResult<DecidedDocument> {
        let (document, approval) = match input.doc_type {
            DocType::Pr => {
                let pr = self.store.decide_requisition(input.doc_id, input.decision).await?;
                let approval = pr.approval.clone();
                (DecidedDocument::Requisition(pr), approval)
            }
            DocType::Po => {
                let po = self.store.decide_purchase_order(input.doc_id, input.decision).await?;
                let approval = po.approval.clone();
                (DecidedDocument::Order(po), approval)
            }
        };

        tracing::info!(
            doc_type = %input.doc_type,
            doc_id = %input.doc_id,
            decision = input.decision.as_str(),
            status = approval.approval_status.as_str(),
            level = approval.approval_level,
            final_level = approval.final_level(),
            "Approval decision applied"
        );
        Ok(document)
    }

    /// The current flow, or the implicit single stage when none is stored
    pub async fn get_flow(&self, doc_type: DocType) -> AppResult<ApprovalFlow> {
        Ok(self
            .store
            .current_flow(doc_type)
            .await?
            .unwrap_or_else(|| ApprovalFlow::implicit(doc_type)))
    }

    /// Replace the flow for `doc_type`. Existing documents keep their snapshot.
    pub async fn save_flow(&self, doc_type: DocType, input: SaveFlowInput) -> AppResult<ApprovalFlow> {
        if let Some(body_type) = input.doc_type {
            if body_type != doc_type {
                return Err(AppError::validation(
                    "doc_type",
                    format!("Expected {} flow, got {}", doc_type, body_type),
                ));
            }
        }

        let flow = self.store.save_flow(doc_type, input.stages).await?;
        tracing::info!(
            doc_type = %doc_type,
            version = flow.version,
            stages = flow.stages.len(),
            "Approval flow saved"
        );
        Ok(flow)
    }

    /// Store the configured flows for any document type that has none
    pub async fn seed_defaults(&self, config: &ApprovalsConfig) -> AppResult<()> {
        for (doc_type, stages) in [
            (DocType::Pr, &config.pr_stages),
            (DocType::Po, &config.po_stages),
        ] {
            if self.store.current_flow(doc_type).await?.is_some() || stages.is_empty() {
                continue;
            }
            let stages = stages.iter().map(|s| StageInput::from(s.as_str())).collect();
            let flow = self.store.save_flow(doc_type, stages).await?;
            tracing::info!(doc_type = %doc_type, stages = flow.stages.len(), "Seeded default approval flow");
        }
        Ok(())
    }
}
