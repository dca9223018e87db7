//! Goods receipt service

use std::sync::Arc;

use shared::{CreateGoodsReceiptInput, GoodsReceiptNote};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

#[derive(Clone)]
pub struct GoodsReceiptService {
    store: Arc<dyn ProcurementStore>,
}

impl GoodsReceiptService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Record a receipt against a PO.
    ///
    /// Every line is checked against the remaining ledger quantity before
    /// anything is written; one bad line rejects the whole receipt.
    pub async fn create(&self, input: CreateGoodsReceiptInput) -> AppResult<GoodsReceiptNote> {
        let grn = GoodsReceiptNote::create(input)?;
        let grn = self.store.create_goods_receipt(grn).await?;

        tracing::info!(
            grn_id = %grn.id,
            grn_number = %grn.grn_number,
            po_id = %grn.po_id,
            lines = grn.items.len(),
            "Goods receipt recorded"
        );
        Ok(grn)
    }

    pub async fn get(&self, id: Uuid) -> AppResult<GoodsReceiptNote> {
        self.store
            .get_goods_receipt(id)
            .await?
            .ok_or_else(|| AppError::not_found("Goods receipt", id))
    }

    pub async fn list(&self, po_id: Option<Uuid>) -> AppResult<Vec<GoodsReceiptNote>> {
        self.store.list_goods_receipts(po_id).await
    }
}
