//! Persistence seam for procurement documents
//!
//! Every mutation is atomic: the adapter takes its lock or opens its
//! transaction, loads what the engine needs, runs the `shared` rules, and
//! writes the result. Nothing is written when a rule fails.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    ApprovalFlow, CreatePurchaseOrderInput, CreateRequisitionInput, Decision, DocType,
    DomainError, GoodsReceiptNote, Item, MaterialRequest, OrderSource, PurchaseOrder,
    PurchaseRequisition, QuantityLedger, StageInput, StockLevel, Supplier, TaxRate,
};
use uuid::Uuid;

use crate::error::AppResult;

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait ProcurementStore: Send + Sync {
    // ------------------------------------------------------------------
    // Master data
    // ------------------------------------------------------------------

    /// Fails with a conflict when the sku is taken
    async fn insert_item(&self, item: Item) -> AppResult<Item>;
    async fn get_item(&self, id: Uuid) -> AppResult<Option<Item>>;
    async fn list_items(&self) -> AppResult<Vec<Item>>;
    /// Registered items among `ids`; unknown ids are simply absent
    async fn items_by_id(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Item>>;

    async fn insert_supplier(&self, supplier: Supplier) -> AppResult<Supplier>;
    async fn get_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>>;
    async fn list_suppliers(&self) -> AppResult<Vec<Supplier>>;

    // ------------------------------------------------------------------
    // Tax rates
    // ------------------------------------------------------------------

    async fn append_tax_rate(&self, rate: TaxRate) -> AppResult<TaxRate>;
    /// Every row, in append order
    async fn tax_rates(&self) -> AppResult<Vec<TaxRate>>;

    // ------------------------------------------------------------------
    // Approval flows
    // ------------------------------------------------------------------

    async fn current_flow(&self, doc_type: DocType) -> AppResult<Option<ApprovalFlow>>;
    /// Replaces the current flow with the next version
    async fn save_flow(&self, doc_type: DocType, stages: Vec<StageInput>) -> AppResult<ApprovalFlow>;

    // ------------------------------------------------------------------
    // Documents
    // ------------------------------------------------------------------

    /// Snapshots the current PR flow and stores the new requisition
    async fn create_requisition(
        &self,
        input: CreateRequisitionInput,
        tax_percent: Option<Decimal>,
    ) -> AppResult<PurchaseRequisition>;
    async fn get_requisition(&self, id: Uuid) -> AppResult<Option<PurchaseRequisition>>;
    async fn list_requisitions(&self) -> AppResult<Vec<PurchaseRequisition>>;
    async fn decide_requisition(&self, id: Uuid, decision: Decision) -> AppResult<PurchaseRequisition>;

    /// Stores the order and opens its ledger entries in one step
    async fn create_purchase_order(&self, input: CreatePurchaseOrderInput) -> AppResult<PurchaseOrder>;
    async fn get_purchase_order(&self, id: Uuid) -> AppResult<Option<PurchaseOrder>>;
    async fn list_purchase_orders(&self) -> AppResult<Vec<PurchaseOrder>>;
    async fn orders_for_requisition(&self, pr_id: Uuid) -> AppResult<Vec<PurchaseOrder>>;
    async fn decide_purchase_order(&self, id: Uuid, decision: Decision) -> AppResult<PurchaseOrder>;

    /// Checks the receipt against the ledger and records it, all or nothing.
    /// Concurrent receipts against one order are serialized.
    async fn create_goods_receipt(&self, grn: GoodsReceiptNote) -> AppResult<GoodsReceiptNote>;
    async fn get_goods_receipt(&self, id: Uuid) -> AppResult<Option<GoodsReceiptNote>>;
    async fn list_goods_receipts(&self, po_id: Option<Uuid>) -> AppResult<Vec<GoodsReceiptNote>>;

    /// Ledger entries of one order
    async fn ledger_for_order(&self, po_id: Uuid) -> AppResult<QuantityLedger>;

    // ------------------------------------------------------------------
    // Material requests
    // ------------------------------------------------------------------

    /// Checks issued quantities against stock and records the request
    async fn create_material_request(&self, mr: MaterialRequest) -> AppResult<MaterialRequest>;
    async fn list_material_requests(&self) -> AppResult<Vec<MaterialRequest>>;
    async fn stock_level(&self, item_id: Uuid) -> AppResult<StockLevel>;
}

/// Fails on the first id that is not a registered item
pub(crate) fn ensure_items_exist(
    ids: impl IntoIterator<Item = Uuid>,
    known: impl Fn(&Uuid) -> bool,
) -> AppResult<()> {
    for id in ids {
        if !known(&id) {
            return Err(DomainError::not_found("Item", id).into());
        }
    }
    Ok(())
}

/// Picks the PO source from what the adapter loaded for `input`
pub(crate) fn build_purchase_order(
    input: CreatePurchaseOrderInput,
    requisition: Option<&PurchaseRequisition>,
    supplier: Option<&Supplier>,
    flow: &ApprovalFlow,
) -> AppResult<PurchaseOrder> {
    let source = match (input.pr_id, requisition, supplier) {
        (Some(pr_id), None, _) => {
            return Err(DomainError::not_found("Purchase requisition", pr_id).into())
        }
        (Some(_), Some(pr), _) => OrderSource::Derived(pr),
        (None, _, Some(supplier)) => OrderSource::Direct(supplier),
        (None, _, None) => {
            return Err(match input.supplier_id {
                Some(id) => DomainError::not_found("Supplier", id),
                None => DomainError::validation(
                    "supplier_id",
                    "Supplier is required when no requisition is referenced",
                ),
            }
            .into())
        }
    };

    Ok(PurchaseOrder::create(input, source, flow)?)
}

/// Opens one ledger entry per line; repeated items conflict
pub(crate) fn open_ledger(po: &PurchaseOrder) -> AppResult<QuantityLedger> {
    let mut ledger = QuantityLedger::new();
    for line in &po.items {
        ledger.record_order(po.id, line.item_id, line.qty_ordered)?;
    }
    Ok(ledger)
}

pub(crate) fn flow_or_implicit(flow: Option<ApprovalFlow>, doc_type: DocType) -> ApprovalFlow {
    flow.unwrap_or_else(|| ApprovalFlow::implicit(doc_type))
}

pub(crate) fn duplicate_number(resource: &str, field: &str, number: &str) -> DomainError {
    DomainError::conflict(field, format!("{} {} already exists", resource, number))
}
