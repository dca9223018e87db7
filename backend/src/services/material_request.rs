//! Material requests and current stock

use std::sync::Arc;

use shared::{CreateMaterialRequestInput, MaterialRequest, StockLevel};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

#[derive(Clone)]
pub struct MaterialRequestService {
    store: Arc<dyn ProcurementStore>,
}

impl MaterialRequestService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Record an internal issue. Issued quantities may not exceed what has
    /// been received and not yet issued.
    pub async fn create(&self, input: CreateMaterialRequestInput) -> AppResult<MaterialRequest> {
        let mr = MaterialRequest::create(input)?;
        let mr = self.store.create_material_request(mr).await?;

        tracing::info!(
            mr_id = %mr.id,
            mr_number = %mr.mr_number,
            lines = mr.items.len(),
            "Material request recorded"
        );
        Ok(mr)
    }

    pub async fn list(&self) -> AppResult<Vec<MaterialRequest>> {
        self.store.list_material_requests().await
    }

    pub async fn current_stock(&self, item_id: Uuid) -> AppResult<StockLevel> {
        if self.store.get_item(item_id).await?.is_none() {
            return Err(AppError::not_found("Item", item_id));
        }
        self.store.stock_level(item_id).await
    }
}
