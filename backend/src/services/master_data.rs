//! Item and supplier registries

use std::sync::Arc;

use shared::{CreateItemInput, CreateSupplierInput, Item, Supplier};
use uuid::Uuid;

use crate::error::{AppError, AppResult};
use crate::store::ProcurementStore;

#[derive(Clone)]
pub struct MasterDataService {
    store: Arc<dyn ProcurementStore>,
}

impl MasterDataService {
    pub fn new(store: Arc<dyn ProcurementStore>) -> Self {
        Self { store }
    }

    /// Register an item; the sku must be unused
    pub async fn create_item(&self, input: CreateItemInput) -> AppResult<Item> {
        let item = self.store.insert_item(Item::create(input)?).await?;
        tracing::info!(item_id = %item.id, sku = %item.sku, "Item registered");
        Ok(item)
    }

    pub async fn get_item(&self, id: Uuid) -> AppResult<Item> {
        self.store
            .get_item(id)
            .await?
            .ok_or_else(|| AppError::not_found("Item", id))
    }

    pub async fn list_items(&self) -> AppResult<Vec<Item>> {
        self.store.list_items().await
    }

    pub async fn create_supplier(&self, input: CreateSupplierInput) -> AppResult<Supplier> {
        let supplier = self.store.insert_supplier(Supplier::create(input)?).await?;
        tracing::info!(supplier_id = %supplier.id, name = %supplier.name, "Supplier registered");
        Ok(supplier)
    }

    pub async fn get_supplier(&self, id: Uuid) -> AppResult<Supplier> {
        self.store
            .get_supplier(id)
            .await?
            .ok_or_else(|| AppError::not_found("Supplier", id))
    }

    pub async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        self.store.list_suppliers().await
    }
}
