//! Purchase order service: creation, lookups and totals

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use shared::{CreatePurchaseOrderInput, OrderTotals, PurchaseOrder};
use uuid::Uuid;

use super::TaxService;
use crate::config::TaxConfig;
use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

#[derive(Clone)]
pub struct PurchaseOrderService {
    store: Arc<dyn ProcurementStore>,
    tax: TaxConfig,
}

impl PurchaseOrderService {
    pub fn new(store: Arc<dyn ProcurementStore>, tax: TaxConfig) -> Self {
        Self { store, tax }
    }

    /// Create a PO directly against a supplier or derived from a PR.
    ///
    /// The ledger entries for every line are opened in the same step.
    pub async fn create(&self, input: CreatePurchaseOrderInput) -> AppResult<PurchaseOrder> {
        let po = self.store.create_purchase_order(input).await?;

        tracing::info!(
            po_id = %po.id,
            po_number = %po.po_number,
            pr_id = ?po.pr_id,
            lines = po.items.len(),
            flow_version = po.approval.flow_version,
            "Purchase order created"
        );
        Ok(po)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<PurchaseOrder> {
        self.store
            .get_purchase_order(id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order", id))
    }

    pub async fn list(&self) -> AppResult<Vec<PurchaseOrder>> {
        self.store.list_purchase_orders().await
    }

    /// Subtotal, tax and grand total of a PO.
    ///
    /// `tax_code` falls back to the PO's own code and `as_of` to its order
    /// date. A missing rate is an error unless the zero-rate fallback is on.
    pub async fn totals(
        &self,
        po_id: Uuid,
        tax_code: Option<String>,
        as_of: Option<NaiveDate>,
    ) -> AppResult<OrderTotals> {
        let po = self.get(po_id).await?;

        let code = tax_code
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty())
            .or_else(|| po.tax_code.clone())
            .ok_or_else(|| AppError::validation("tax_code", "Tax code is required"))?;
        let as_of = as_of.unwrap_or(po.order_date);

        let tax = TaxService::new(self.store.clone());
        let rate_percent = if self.tax.zero_rate_fallback {
            match tax.try_resolve(&code, as_of).await? {
                Some(rate) => rate.rate_percent,
                None => {
                    tracing::warn!(po_id = %po.id, code = %code, %as_of, "No tax rate in force, reporting 0%");
                    Decimal::ZERO
                }
            }
        } else {
            tax.resolve(&code, as_of).await?.rate_percent
        };

        Ok(OrderTotals::compute(&po, &code, rate_percent)?)
    }
}
