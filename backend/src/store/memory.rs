//! In-memory store
//!
//! All state sits behind one `RwLock`. Mutations hold the write lock across
//! their whole check-then-write span; reads share it.

use std::collections::HashMap;

use async_trait::async_trait;
use rust_decimal::Decimal;
use shared::{
    ApprovalFlow, CreatePurchaseOrderInput, CreateRequisitionInput, Decision, DocType,
    DomainError, GoodsReceiptNote, Item, MaterialRequest, PurchaseOrder,
    PurchaseRequisition, QuantityLedger, StageInput, StockLevel, Supplier, TaxRate,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{
    build_purchase_order, duplicate_number, ensure_items_exist, flow_or_implicit, open_ledger,
    ProcurementStore,
};
use crate::error::AppResult;

#[derive(Default)]
struct State {
    items: Vec<Item>,
    suppliers: Vec<Supplier>,
    tax_rates: Vec<TaxRate>,
    flows: HashMap<DocType, ApprovalFlow>,
    requisitions: Vec<PurchaseRequisition>,
    orders: Vec<PurchaseOrder>,
    receipts: Vec<GoodsReceiptNote>,
    material_requests: Vec<MaterialRequest>,
    ledger: QuantityLedger,
}

impl State {
    fn has_item(&self, id: &Uuid) -> bool {
        self.items.iter().any(|i| i.id == *id)
    }

    fn stock_level(&self, item_id: Uuid) -> StockLevel {
        let issued: Decimal = self
            .material_requests
            .iter()
            .flat_map(|mr| mr.items.iter())
            .filter(|line| line.item_id == item_id)
            .map(|line| line.qty_issued)
            .sum();
        StockLevel::new(item_id, self.ledger.received_for_item(item_id), issued)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    state: RwLock<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ProcurementStore for MemoryStore {
    async fn insert_item(&self, item: Item) -> AppResult<Item> {
        let mut state = self.state.write().await;
        if state.items.iter().any(|i| i.sku == item.sku) {
            return Err(DomainError::conflict("sku", format!("Item sku {} already exists", item.sku)).into());
        }
        state.items.push(item.clone());
        Ok(item)
    }

    async fn get_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        let state = self.state.read().await;
        Ok(state.items.iter().find(|i| i.id == id).cloned())
    }

    async fn list_items(&self) -> AppResult<Vec<Item>> {
        let state = self.state.read().await;
        let mut items = state.items.clone();
        items.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(items)
    }

    async fn items_by_id(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Item>> {
        let state = self.state.read().await;
        Ok(state
            .items
            .iter()
            .filter(|i| ids.contains(&i.id))
            .map(|i| (i.id, i.clone()))
            .collect())
    }

    async fn insert_supplier(&self, supplier: Supplier) -> AppResult<Supplier> {
        let mut state = self.state.write().await;
        state.suppliers.push(supplier.clone());
        Ok(supplier)
    }

    async fn get_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>> {
        let state = self.state.read().await;
        Ok(state.suppliers.iter().find(|s| s.id == id).cloned())
    }

    async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let state = self.state.read().await;
        let mut suppliers = state.suppliers.clone();
        suppliers.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(suppliers)
    }

    async fn append_tax_rate(&self, rate: TaxRate) -> AppResult<TaxRate> {
        let mut state = self.state.write().await;
        state.tax_rates.push(rate.clone());
        Ok(rate)
    }

    async fn tax_rates(&self) -> AppResult<Vec<TaxRate>> {
        let state = self.state.read().await;
        Ok(state.tax_rates.clone())
    }

    async fn current_flow(&self, doc_type: DocType) -> AppResult<Option<ApprovalFlow>> {
        let state = self.state.read().await;
        Ok(state.flows.get(&doc_type).cloned())
    }

    async fn save_flow(&self, doc_type: DocType, stages: Vec<StageInput>) -> AppResult<ApprovalFlow> {
        let mut state = self.state.write().await;
        let previous = state.flows.get(&doc_type).map(|f| f.version);
        let flow = ApprovalFlow::define(doc_type, &stages, previous)?;
        state.flows.insert(doc_type, flow.clone());
        Ok(flow)
    }

    async fn create_requisition(
        &self,
        input: CreateRequisitionInput,
        tax_percent: Option<Decimal>,
    ) -> AppResult<PurchaseRequisition> {
        let mut state = self.state.write().await;
        let flow = flow_or_implicit(state.flows.get(&DocType::Pr).cloned(), DocType::Pr);
        let pr = PurchaseRequisition::create(input, &flow, tax_percent)?;

        ensure_items_exist(pr.items.iter().map(|l| l.item_id), |id| state.has_item(id))?;
        if state.requisitions.iter().any(|r| r.pr_number == pr.pr_number) {
            return Err(duplicate_number("Requisition", "pr_number", &pr.pr_number).into());
        }

        state.requisitions.push(pr.clone());
        Ok(pr)
    }

    async fn get_requisition(&self, id: Uuid) -> AppResult<Option<PurchaseRequisition>> {
        let state = self.state.read().await;
        Ok(state.requisitions.iter().find(|r| r.id == id).cloned())
    }

    async fn list_requisitions(&self) -> AppResult<Vec<PurchaseRequisition>> {
        let state = self.state.read().await;
        Ok(state.requisitions.iter().rev().cloned().collect())
    }

    async fn decide_requisition(&self, id: Uuid, decision: Decision) -> AppResult<PurchaseRequisition> {
        let mut state = self.state.write().await;
        let pr = state
            .requisitions
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| DomainError::not_found("Purchase requisition", id))?;
        pr.approval.apply(decision)?;
        Ok(pr.clone())
    }

    async fn create_purchase_order(&self, input: CreatePurchaseOrderInput) -> AppResult<PurchaseOrder> {
        let mut state = self.state.write().await;

        let requisition = input
            .pr_id
            .and_then(|id| state.requisitions.iter().find(|r| r.id == id));
        let supplier = input
            .supplier_id
            .and_then(|id| state.suppliers.iter().find(|s| s.id == id));
        let flow = flow_or_implicit(state.flows.get(&DocType::Po).cloned(), DocType::Po);
        let po = build_purchase_order(input, requisition, supplier, &flow)?;

        ensure_items_exist(po.items.iter().map(|l| l.item_id), |id| state.has_item(id))?;
        if state.orders.iter().any(|o| o.po_number == po.po_number) {
            return Err(duplicate_number("Purchase order", "po_number", &po.po_number).into());
        }
        open_ledger(&po)?;

        for line in &po.items {
            state.ledger.record_order(po.id, line.item_id, line.qty_ordered)?;
        }
        state.orders.push(po.clone());
        Ok(po)
    }

    async fn get_purchase_order(&self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn list_purchase_orders(&self) -> AppResult<Vec<PurchaseOrder>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().rev().cloned().collect())
    }

    async fn orders_for_requisition(&self, pr_id: Uuid) -> AppResult<Vec<PurchaseOrder>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.pr_id == Some(pr_id))
            .cloned()
            .collect())
    }

    async fn decide_purchase_order(&self, id: Uuid, decision: Decision) -> AppResult<PurchaseOrder> {
        let mut state = self.state.write().await;
        let po = state
            .orders
            .iter_mut()
            .find(|o| o.id == id)
            .ok_or_else(|| DomainError::not_found("Purchase order", id))?;
        po.approval.apply(decision)?;
        Ok(po.clone())
    }

    async fn create_goods_receipt(&self, grn: GoodsReceiptNote) -> AppResult<GoodsReceiptNote> {
        let mut state = self.state.write().await;

        if !state.orders.iter().any(|o| o.id == grn.po_id) {
            return Err(DomainError::not_found("Purchase order", grn.po_id).into());
        }
        if state.receipts.iter().any(|r| r.grn_number == grn.grn_number) {
            return Err(duplicate_number("Goods receipt", "grn_number", &grn.grn_number).into());
        }

        state.ledger.receive(grn.po_id, &grn.items)?;
        let status = state.ledger.order_status(grn.po_id);

        if let Some(po) = state.orders.iter_mut().find(|o| o.id == grn.po_id) {
            po.status = status;
        }
        state.receipts.push(grn.clone());
        Ok(grn)
    }

    async fn get_goods_receipt(&self, id: Uuid) -> AppResult<Option<GoodsReceiptNote>> {
        let state = self.state.read().await;
        Ok(state.receipts.iter().find(|r| r.id == id).cloned())
    }

    async fn list_goods_receipts(&self, po_id: Option<Uuid>) -> AppResult<Vec<GoodsReceiptNote>> {
        let state = self.state.read().await;
        Ok(state
            .receipts
            .iter()
            .rev()
            .filter(|r| po_id.map_or(true, |id| r.po_id == id))
            .cloned()
            .collect())
    }

    async fn ledger_for_order(&self, po_id: Uuid) -> AppResult<QuantityLedger> {
        let state = self.state.read().await;
        Ok(QuantityLedger::from_entries(
            state.ledger.entries_for_order(po_id),
        ))
    }

    async fn create_material_request(&self, mr: MaterialRequest) -> AppResult<MaterialRequest> {
        let mut state = self.state.write().await;

        ensure_items_exist(mr.items.iter().map(|l| l.item_id), |id| state.has_item(id))?;
        if state.material_requests.iter().any(|m| m.mr_number == mr.mr_number) {
            return Err(duplicate_number("Material request", "mr_number", &mr.mr_number).into());
        }

        let stock: HashMap<Uuid, StockLevel> = mr
            .issued_by_item()
            .into_keys()
            .map(|item_id| (item_id, state.stock_level(item_id)))
            .collect();
        mr.check_against_stock(&stock)?;

        state.material_requests.push(mr.clone());
        Ok(mr)
    }

    async fn list_material_requests(&self) -> AppResult<Vec<MaterialRequest>> {
        let state = self.state.read().await;
        Ok(state.material_requests.iter().rev().cloned().collect())
    }

    async fn stock_level(&self, item_id: Uuid) -> AppResult<StockLevel> {
        let state = self.state.read().await;
        Ok(state.stock_level(item_id))
    }
}
