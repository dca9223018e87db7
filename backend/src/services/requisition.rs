//! Purchase requisition service

use std::sync::Arc;

use shared::{CreateRequisitionInput, PurchaseRequisition};
use uuid::Uuid;

use super::TaxService;
use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

#[derive(Clone)]
pub struct RequisitionService {
    store: Arc<dyn ProcurementStore>,
}

impl RequisitionService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Raise a PR under the current PR approval flow.
    ///
    /// When a tax code is given, the rate in force on the requested date is
    /// copied onto the PR. A code with no rate leaves `tax_percent` empty.
    pub async fn create(&self, input: CreateRequisitionInput) -> AppResult<PurchaseRequisition> {
        let tax_percent = match input.tax_code.as_deref().map(str::trim) {
            Some(code) if !code.is_empty() => TaxService::new(self.store.clone())
                .try_resolve(code, input.requested_date)
                .await?
                .map(|rate| rate.rate_percent),
            _ => None,
        };

        let pr = self.store.create_requisition(input, tax_percent).await?;

        tracing::info!(
            pr_id = %pr.id,
            pr_number = %pr.pr_number,
            lines = pr.items.len(),
            flow_version = pr.approval.flow_version,
            "Purchase requisition created"
        );
        Ok(pr)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PurchaseRequisition> {
        self.store
            .get_requisition(id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase requisition", id))
    }

    pub async fn list(&self) -> AppResult<Vec<PurchaseRequisition>> {
        self.store.list_requisitions().await
    }
}
