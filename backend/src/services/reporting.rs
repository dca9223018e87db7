//! Variance reports between procurement stages, with CSV export

use std::sync::Arc;

use serde::Serialize;
use shared::{po_vs_grn, pr_vs_po, PoVsGrnRow, PrVsPoRow, VarianceReport};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

#[derive(Clone)]
pub struct ReportingService {
    store: Arc<dyn ProcurementStore>,
}

impl ReportingService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Requested vs ordered quantities for one PR, summed over its POs
    pub async fn pr_vs_po(&self, pr_id: Uuid) -> AppResult<VarianceReport<PrVsPoRow>> {
        let pr = self
            .store
            .get_requisition(pr_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase requisition", pr_id))?;
        let orders = self.store.orders_for_requisition(pr_id).await?;

        let mut item_ids: Vec<Uuid> = pr.items.iter().map(|l| l.item_id).collect();
        item_ids.dedup();
        let items = self.store.items_by_id(&item_ids).await?;

        Ok(pr_vs_po(&pr, &orders, &items))
    }

    /// Ordered vs received quantities for one PO, read from the ledger
    pub async fn po_vs_grn(&self, po_id: Uuid) -> AppResult<VarianceReport<PoVsGrnRow>> {
        let po = self
            .store
            .get_purchase_order(po_id)
            .await?
            .ok_or_else(|| AppError::not_found("Purchase order", po_id))?;
        let ledger = self.store.ledger_for_order(po_id).await?;

        let item_ids: Vec<Uuid> = po.items.iter().map(|l| l.item_id).collect();
        let items = self.store.items_by_id(&item_ids).await?;

        Ok(po_vs_grn(&po, &ledger, &items))
    }

    /// Export data to CSV format
    pub fn export_to_csv<T: Serialize>(data: &[T]) -> AppResult<String> {
        let mut wtr = csv::Writer::from_writer(vec![]);
        for record in data {
            wtr.serialize(record)
                .map_err(|e| AppError::Internal(format!("CSV serialization error: {}", e)))?;
        }
        let bytes = wtr
            .into_inner()
            .map_err(|e| AppError::Internal(format!("CSV writer error: {}", e)))?;
        String::from_utf8(bytes)
            .map_err(|e| AppError::Internal(format!("UTF-8 conversion error: {}", e)))
    }
}
