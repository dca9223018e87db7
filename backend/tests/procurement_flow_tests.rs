//! End-to-end document flow tests against the in-memory store
//!
//! Covers:
//! - PR → PO derivation and partial conversion
//! - GRN validation against the quantity ledger (all-or-nothing)
//! - Staged approvals with snapshot semantics
//! - PO totals and variance reports

use std::str::FromStr;
use std::sync::Arc;

use procurement_backend::{
    config::{Config, TaxConfig},
    services::{
        approval::{DecidedDocument, DecisionInput},
        ApprovalService, GoodsReceiptService, MasterDataService, PurchaseOrderService,
        ReportingService, RequisitionService, TaxService,
    },
    AppError, AppResult, MemoryStore, ProcurementStore,
};
use rust_decimal::Decimal;
use serde_json::json;
use shared::{
    ApprovalStatus, Decision, DocType, DomainError, GoodsReceiptNote, Item, OrderStatus,
    PurchaseOrder, PurchaseRequisition, SaveFlowInput, Supplier,
};
use uuid::Uuid;

fn dec(s: &str) -> Decimal {
    Decimal::from_str(s).unwrap()
}

fn input<T: serde::de::DeserializeOwned>(value: serde_json::Value) -> T {
    serde_json::from_value(value).unwrap()
}

// ============================================================================
// Fixtures
// ============================================================================

fn new_store() -> Arc<dyn ProcurementStore> {
    Arc::new(MemoryStore::new())
}

async fn item(store: &Arc<dyn ProcurementStore>, sku: &str, name: &str) -> Item {
    MasterDataService::new(store.clone())
        .create_item(input(json!({ "sku": sku, "name": name, "uom": "kg" })))
        .await
        .unwrap()
}

async fn supplier(store: &Arc<dyn ProcurementStore>) -> Supplier {
    MasterDataService::new(store.clone())
        .create_supplier(input(json!({ "name": "Highland Traders", "address": "Chiang Mai" })))
        .await
        .unwrap()
}

async fn direct_po(
    store: &Arc<dyn ProcurementStore>,
    supplier: &Supplier,
    po_number: &str,
    lines: &[(Uuid, &str, &str)],
) -> AppResult<PurchaseOrder> {
    let items: Vec<_> = lines
        .iter()
        .map(|(item_id, qty, price)| json!({ "item_id": item_id, "qty_ordered": qty, "unit_price": price }))
        .collect();

    PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .create(input(json!({
            "po_number": po_number,
            "order_date": "2024-03-01",
            "supplier_id": supplier.id,
            "tax_code": "VAT",
            "items": items,
        })))
        .await
}

async fn receive(
    store: &Arc<dyn ProcurementStore>,
    po_id: Uuid,
    grn_number: &str,
    lines: &[(Uuid, &str)],
) -> AppResult<GoodsReceiptNote> {
    let items: Vec<_> = lines
        .iter()
        .map(|(item_id, qty)| json!({ "item_id": item_id, "qty_received": qty }))
        .collect();

    GoodsReceiptService::new(store.clone())
        .create(input(json!({
            "grn_number": grn_number,
            "po_id": po_id,
            "received_date": "2024-03-10",
            "items": items,
        })))
        .await
}

async fn requisition(
    store: &Arc<dyn ProcurementStore>,
    pr_number: &str,
    lines: serde_json::Value,
) -> AppResult<PurchaseRequisition> {
    RequisitionService::new(store.clone())
        .create(input(json!({
            "pr_number": pr_number,
            "requested_date": "2024-02-20",
            "customer_name": "Doi Chaang Roasters",
            "customer_ref_no": "CR-7781",
            "supplier_name": "Highland Traders",
            "tax_code": "VAT",
            "items": lines,
        })))
        .await
}

async fn decide(
    store: &Arc<dyn ProcurementStore>,
    doc_type: DocType,
    doc_id: Uuid,
    decision: Decision,
) -> AppResult<DecidedDocument> {
    ApprovalService::new(store.clone())
        .decide(DecisionInput {
            doc_type,
            doc_id,
            decision,
        })
        .await
}

async fn save_flow(store: &Arc<dyn ProcurementStore>, doc_type: DocType, stages: &[&str]) {
    let stages: Vec<_> = stages.iter().map(|s| json!({ "name": s })).collect();
    ApprovalService::new(store.clone())
        .save_flow(doc_type, input::<SaveFlowInput>(json!({ "stages": stages })))
        .await
        .unwrap();
}

async fn remaining(store: &Arc<dyn ProcurementStore>, po_id: Uuid, item_id: Uuid) -> Decimal {
    store
        .ledger_for_order(po_id)
        .await
        .unwrap()
        .remaining(po_id, item_id)
}

fn is_validation(err: &AppError) -> bool {
    matches!(err, AppError::Domain(DomainError::Validation { .. }))
}

fn is_conflict(err: &AppError) -> bool {
    matches!(err, AppError::Domain(DomainError::Conflict { .. }))
}

fn is_not_found(err: &AppError) -> bool {
    matches!(err, AppError::Domain(DomainError::NotFound { .. }))
}

fn is_invalid_state(err: &AppError) -> bool {
    matches!(err, AppError::Domain(DomainError::InvalidState { .. }))
}

// ============================================================================
// Goods receipts and the quantity ledger
// ============================================================================

#[tokio::test]
async fn test_partial_receipts_never_exceed_ordered() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "100", "10")])
        .await
        .unwrap();

    receive(&store, po.id, "GRN-001", &[(beans.id, "60")]).await.unwrap();
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("40"));

    let err = receive(&store, po.id, "GRN-002", &[(beans.id, "50")])
        .await
        .unwrap_err();
    assert!(is_validation(&err));
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("40"));

    receive(&store, po.id, "GRN-003", &[(beans.id, "40")]).await.unwrap();
    assert_eq!(remaining(&store, po.id, beans.id).await, Decimal::ZERO);

    let po = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .get(po.id)
        .await
        .unwrap();
    assert_eq!(po.status, OrderStatus::Received);
}

#[tokio::test]
async fn test_receipt_is_all_or_nothing() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let bags = item(&store, "JB-001", "Jute bags").await;
    let supplier = supplier(&store).await;
    let po = direct_po(
        &store,
        &supplier,
        "PO-001",
        &[(beans.id, "100", "10"), (bags.id, "50", "2")],
    )
    .await
    .unwrap();

    // Second line over-receives, so the first must not be recorded either
    let err = receive(&store, po.id, "GRN-001", &[(beans.id, "30"), (bags.id, "60")])
        .await
        .unwrap_err();
    assert!(is_validation(&err));
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("100"));
    assert_eq!(remaining(&store, po.id, bags.id).await, dec("50"));

    let receipts = GoodsReceiptService::new(store.clone()).list(Some(po.id)).await.unwrap();
    assert!(receipts.is_empty());
}

#[tokio::test]
async fn test_repeated_item_lines_checked_cumulatively() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "100", "10")])
        .await
        .unwrap();

    let err = receive(&store, po.id, "GRN-001", &[(beans.id, "60"), (beans.id, "50")])
        .await
        .unwrap_err();
    assert!(is_validation(&err));
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("100"));

    receive(&store, po.id, "GRN-002", &[(beans.id, "60"), (beans.id, "40")])
        .await
        .unwrap();
    assert_eq!(remaining(&store, po.id, beans.id).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_receipt_within_tolerance_is_accepted() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "100", "10")])
        .await
        .unwrap();

    receive(&store, po.id, "GRN-001", &[(beans.id, "100.0000000005")])
        .await
        .unwrap();
    assert_eq!(remaining(&store, po.id, beans.id).await, Decimal::ZERO);
}

#[tokio::test]
async fn test_receipt_rejections() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let other = item(&store, "RB-001", "Roasted beans").await;
    let supplier = supplier(&store).await;
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "100", "10")])
        .await
        .unwrap();

    // Item not on the order
    let err = receive(&store, po.id, "GRN-001", &[(other.id, "1")]).await.unwrap_err();
    assert!(is_validation(&err));

    // Non-positive quantity
    let err = receive(&store, po.id, "GRN-002", &[(beans.id, "0")]).await.unwrap_err();
    assert!(is_validation(&err));

    // Unknown order
    let err = receive(&store, Uuid::new_v4(), "GRN-003", &[(beans.id, "1")])
        .await
        .unwrap_err();
    assert!(is_not_found(&err));

    // Duplicate number
    receive(&store, po.id, "GRN-004", &[(beans.id, "10")]).await.unwrap();
    let err = receive(&store, po.id, "GRN-004", &[(beans.id, "10")]).await.unwrap_err();
    assert!(is_conflict(&err));
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("90"));

    let po = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .get(po.id)
        .await
        .unwrap();
    assert_eq!(po.status, OrderStatus::PartiallyReceived);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_receipts_are_serialized() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "100", "10")])
        .await
        .unwrap();

    let mut handles = Vec::new();
    for n in 0..10 {
        let store = store.clone();
        let (po_id, item_id) = (po.id, beans.id);
        handles.push(tokio::spawn(async move {
            receive(&store, po_id, &format!("GRN-{:03}", n), &[(item_id, "15")]).await
        }));
    }

    let mut accepted = 0;
    for handle in handles {
        if handle.await.unwrap().is_ok() {
            accepted += 1;
        }
    }

    // 6 × 15 = 90; a seventh would reach 105
    assert_eq!(accepted, 6);
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("10"));
}

// ============================================================================
// Purchase orders
// ============================================================================

#[tokio::test]
async fn test_derived_po_prefers_kilograms() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let sacks = item(&store, "JB-001", "Jute bags").await;

    let pr = requisition(
        &store,
        "PR-001",
        json!([
            { "item_id": beans.id, "qty_bags": "10", "qty_kgs": "600", "unit_price": "4.5" },
            { "item_id": sacks.id, "qty_bags": "12", "unit_price": "1.25" },
        ]),
    )
    .await
    .unwrap();

    let po = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .create(input(json!({ "po_number": "PO-100", "pr_id": pr.id })))
        .await
        .unwrap();

    assert_eq!(po.pr_id, Some(pr.id));
    assert_eq!(po.supplier_name.as_deref(), Some("Highland Traders"));
    assert_eq!(po.tax_code.as_deref(), Some("VAT"));
    assert_eq!(po.items.len(), 2);
    assert_eq!(po.items[0].qty_ordered, dec("600"));
    assert_eq!(po.items[0].unit_price, dec("4.5"));
    assert_eq!(po.items[1].qty_ordered, dec("12"));
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("600"));
}

#[tokio::test]
async fn test_po_creation_rejections() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let service = PurchaseOrderService::new(store.clone(), TaxConfig::default());

    // Neither a supplier nor a requisition
    let err = service
        .create(input(json!({
            "po_number": "PO-001",
            "items": [{ "item_id": beans.id, "qty_ordered": "1", "unit_price": "1" }],
        })))
        .await
        .unwrap_err();
    assert!(is_validation(&err));

    // Direct with no lines
    let err = direct_po(&store, &supplier, "PO-002", &[]).await.unwrap_err();
    assert!(is_validation(&err));

    // Unregistered item
    let err = direct_po(&store, &supplier, "PO-003", &[(Uuid::new_v4(), "1", "1")])
        .await
        .unwrap_err();
    assert!(is_not_found(&err));

    // Same item twice collides in the ledger
    let err = direct_po(
        &store,
        &supplier,
        "PO-004",
        &[(beans.id, "1", "1"), (beans.id, "2", "1")],
    )
    .await
    .unwrap_err();
    assert!(is_conflict(&err));

    // Unknown requisition
    let err = service
        .create(input(json!({ "po_number": "PO-005", "pr_id": Uuid::new_v4() })))
        .await
        .unwrap_err();
    assert!(is_not_found(&err));

    // Duplicate number
    direct_po(&store, &supplier, "PO-006", &[(beans.id, "1", "1")]).await.unwrap();
    let err = direct_po(&store, &supplier, "PO-006", &[(beans.id, "1", "1")])
        .await
        .unwrap_err();
    assert!(is_conflict(&err));

    assert_eq!(service.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_rejected_pr_cannot_be_converted() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let pr = requisition(&store, "PR-001", json!([{ "item_id": beans.id, "qty_kgs": "100" }]))
        .await
        .unwrap();

    decide(&store, DocType::Pr, pr.id, Decision::Reject).await.unwrap();

    let err = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .create(input(json!({ "po_number": "PO-001", "pr_id": pr.id })))
        .await
        .unwrap_err();
    assert!(is_invalid_state(&err));
}

// ============================================================================
// Requisitions
// ============================================================================

#[tokio::test]
async fn test_requisition_validation() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;

    let err = requisition(&store, "PR-001", json!([])).await.unwrap_err();
    assert!(is_validation(&err));

    let err = requisition(&store, "PR-001", json!([{ "item_id": beans.id }]))
        .await
        .unwrap_err();
    assert!(is_validation(&err));

    let err = requisition(&store, "PR-001", json!([{ "item_id": Uuid::new_v4(), "qty_kgs": "5" }]))
        .await
        .unwrap_err();
    assert!(is_not_found(&err));

    requisition(&store, "PR-001", json!([{ "item_id": beans.id, "qty_bags": "2" }]))
        .await
        .unwrap();
    let err = requisition(&store, "PR-001", json!([{ "item_id": beans.id, "qty_bags": "2" }]))
        .await
        .unwrap_err();
    assert!(is_conflict(&err));
}

#[tokio::test]
async fn test_requisition_copies_tax_rate_in_force() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    TaxService::new(store.clone())
        .add_rate(input(json!({ "code": "VAT", "rate_percent": "7", "effective_date": "2024-01-01" })))
        .await
        .unwrap();

    let pr = requisition(&store, "PR-001", json!([{ "item_id": beans.id, "qty_kgs": "5" }]))
        .await
        .unwrap();
    assert_eq!(pr.tax_percent, Some(dec("7")));
    assert_eq!(pr.approval.approval_status, ApprovalStatus::Pending);
    assert_eq!(pr.approval.approval_level, 0);
}

// ============================================================================
// Approvals
// ============================================================================

#[tokio::test]
async fn test_two_stage_po_approval() {
    let store = new_store();
    ApprovalService::new(store.clone())
        .seed_defaults(&Config::default().approvals)
        .await
        .unwrap();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "10", "1")])
        .await
        .unwrap();
    assert_eq!(po.approval.approval_stages.len(), 2);

    let DecidedDocument::Order(po) = decide(&store, DocType::Po, po.id, Decision::Approve).await.unwrap() else {
        panic!("expected a purchase order");
    };
    assert_eq!(po.approval.approval_level, 1);
    assert_eq!(po.approval.approval_status, ApprovalStatus::InProgress);

    let DecidedDocument::Order(po) = decide(&store, DocType::Po, po.id, Decision::Approve).await.unwrap() else {
        panic!("expected a purchase order");
    };
    assert_eq!(po.approval.approval_level, 2);
    assert_eq!(po.approval.approval_status, ApprovalStatus::Approved);

    let err = decide(&store, DocType::Po, po.id, Decision::Approve).await.unwrap_err();
    assert!(is_invalid_state(&err));
    let err = decide(&store, DocType::Po, po.id, Decision::Reject).await.unwrap_err();
    assert!(is_invalid_state(&err));
}

#[tokio::test]
async fn test_flow_change_does_not_touch_existing_documents() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    save_flow(&store, DocType::Pr, &["Manager", "Director"]).await;

    let pr = requisition(&store, "PR-001", json!([{ "item_id": beans.id, "qty_kgs": "5" }]))
        .await
        .unwrap();

    save_flow(&store, DocType::Pr, &["Manager", "Director", "CFO"]).await;

    decide(&store, DocType::Pr, pr.id, Decision::Approve).await.unwrap();
    let DecidedDocument::Requisition(pr) = decide(&store, DocType::Pr, pr.id, Decision::Approve).await.unwrap() else {
        panic!("expected a purchase requisition");
    };
    assert_eq!(pr.approval.approval_level, 2);
    assert_eq!(pr.approval.approval_status, ApprovalStatus::Approved);
    assert_eq!(pr.approval.flow_version, 1);

    let newer = requisition(&store, "PR-002", json!([{ "item_id": beans.id, "qty_kgs": "5" }]))
        .await
        .unwrap();
    assert_eq!(newer.approval.approval_stages.len(), 3);
    assert_eq!(newer.approval.flow_version, 2);
}

#[tokio::test]
async fn test_reject_is_terminal() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let pr = requisition(&store, "PR-001", json!([{ "item_id": beans.id, "qty_kgs": "5" }]))
        .await
        .unwrap();

    let DecidedDocument::Requisition(pr) = decide(&store, DocType::Pr, pr.id, Decision::Reject).await.unwrap() else {
        panic!("expected a purchase requisition");
    };
    assert_eq!(pr.approval.approval_status, ApprovalStatus::Rejected);

    let err = decide(&store, DocType::Pr, pr.id, Decision::Approve).await.unwrap_err();
    assert!(is_invalid_state(&err));

    let err = decide(&store, DocType::Pr, Uuid::new_v4(), Decision::Approve)
        .await
        .unwrap_err();
    assert!(is_not_found(&err));
}

#[tokio::test]
async fn test_flow_definition_rules() {
    let store = new_store();
    let service = ApprovalService::new(store.clone());

    // No stored flow: the implicit single stage
    let flow = service.get_flow(DocType::Po).await.unwrap();
    assert_eq!(flow.version, 0);
    assert_eq!(flow.stages[0].name, "Level 1");

    let err = service
        .save_flow(DocType::Po, input(json!({ "stages": [] })))
        .await
        .unwrap_err();
    assert!(is_validation(&err));

    let err = service
        .save_flow(DocType::Po, input(json!({ "doc_type": "PR", "stages": [{ "name": "A" }] })))
        .await
        .unwrap_err();
    assert!(is_validation(&err));

    let flow = service
        .save_flow(
            DocType::Po,
            input(json!({ "stages": [{ "level": 7, "name": "Buyer" }, { "name": "  " }] })),
        )
        .await
        .unwrap();
    assert_eq!(flow.version, 1);
    assert_eq!(flow.stages[0].level, 1);
    assert_eq!(flow.stages[1].level, 2);
    assert_eq!(flow.stages[1].name, "Level 2");

    // Seeding leaves a stored flow alone
    service.seed_defaults(&Config::default().approvals).await.unwrap();
    assert_eq!(service.get_flow(DocType::Po).await.unwrap().version, 1);
    assert_eq!(service.get_flow(DocType::Pr).await.unwrap().stages.len(), 1);
}

// ============================================================================
// Totals
// ============================================================================

#[tokio::test]
async fn test_totals_with_vat() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    TaxService::new(store.clone())
        .add_rate(input(json!({ "code": "VAT", "rate_percent": "5", "effective_date": "2024-01-01" })))
        .await
        .unwrap();
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "100", "10")])
        .await
        .unwrap();

    let totals = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .totals(po.id, None, None)
        .await
        .unwrap();
    assert_eq!(totals.subtotal, dec("1000"));
    assert_eq!(totals.tax_percent, dec("5"));
    assert_eq!(totals.tax_amount, dec("50.00"));
    assert_eq!(totals.grand_total, dec("1050.00"));
    assert_eq!(totals.tax.code, "VAT");
}

#[tokio::test]
async fn test_totals_use_rate_in_force_on_order_date() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let tax = TaxService::new(store.clone());
    for (rate, date) in [("7", "2024-01-01"), ("10", "2024-06-01")] {
        tax.add_rate(input(json!({ "code": "VAT", "rate_percent": rate, "effective_date": date })))
            .await
            .unwrap();
    }
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "3", "33.35")])
        .await
        .unwrap();
    let service = PurchaseOrderService::new(store.clone(), TaxConfig::default());

    // Order dated 2024-03-01
    let totals = service.totals(po.id, None, None).await.unwrap();
    assert_eq!(totals.tax_percent, dec("7"));
    assert_eq!(totals.subtotal, dec("100.05"));
    // 7.0035 rounds half away from zero
    assert_eq!(totals.tax_amount, dec("7.00"));

    let later = chrono::NaiveDate::from_ymd_opt(2024, 7, 1);
    let totals = service.totals(po.id, Some("VAT".into()), later).await.unwrap();
    assert_eq!(totals.tax_percent, dec("10"));
    assert_eq!(totals.tax_amount, dec("10.01"));
}

#[tokio::test]
async fn test_totals_missing_rate() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;
    let po = direct_po(&store, &supplier, "PO-001", &[(beans.id, "10", "10")])
        .await
        .unwrap();

    let err = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .totals(po.id, None, None)
        .await
        .unwrap_err();
    assert!(is_not_found(&err));

    let fallback = TaxConfig {
        zero_rate_fallback: true,
    };
    let totals = PurchaseOrderService::new(store.clone(), fallback)
        .totals(po.id, None, None)
        .await
        .unwrap();
    assert_eq!(totals.tax_percent, Decimal::ZERO);
    assert_eq!(totals.grand_total, dec("100"));
}

#[tokio::test]
async fn test_oversized_amounts_are_rejected() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let supplier = supplier(&store).await;

    let err = direct_po(
        &store,
        &supplier,
        "PO-001",
        &[(beans.id, "10000000000000000", "100000000000000")],
    )
    .await
    .unwrap_err();
    assert!(is_validation(&err));

    let err = TaxService::new(store.clone())
        .add_rate(input(json!({
            "code": "VAT",
            "rate_percent": "10000000000000",
            "effective_date": "2024-01-01",
        })))
        .await
        .unwrap_err();
    assert!(is_validation(&err));

    // Each amount is in range but the tax amount is not
    TaxService::new(store.clone())
        .add_rate(input(json!({ "code": "VAT", "rate_percent": "100000", "effective_date": "2024-01-01" })))
        .await
        .unwrap();
    let po = direct_po(
        &store,
        &supplier,
        "PO-002",
        &[(beans.id, "999999999999", "999999999999")],
    )
    .await
    .unwrap();
    let err = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .totals(po.id, None, None)
        .await
        .unwrap_err();
    assert!(is_validation(&err));
}

#[tokio::test]
async fn test_fine_quantities_are_kept_exactly() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let husk = item(&store, "HS-001", "Husk").await;
    let supplier = supplier(&store).await;

    let po = direct_po(
        &store,
        &supplier,
        "PO-001",
        &[(beans.id, "1.2345678", "1"), (husk.id, "0.0000004", "1")],
    )
    .await
    .unwrap();

    let stored = PurchaseOrderService::new(store.clone(), TaxConfig::default())
        .get(po.id)
        .await
        .unwrap();
    assert_eq!(stored.items[0].qty_ordered, dec("1.2345678"));
    assert_eq!(stored.items[1].qty_ordered, dec("0.0000004"));
    assert_eq!(remaining(&store, po.id, beans.id).await, dec("1.2345678"));

    receive(&store, po.id, "GRN-001", &[(husk.id, "0.0000004")]).await.unwrap();
    assert_eq!(remaining(&store, po.id, husk.id).await, Decimal::ZERO);
}

// ============================================================================
// Reports
// ============================================================================

#[tokio::test]
async fn test_pr_vs_po_sums_partial_conversions() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let pr = requisition(
        &store,
        "PR-001",
        json!([{ "item_id": beans.id, "qty_bags": "10", "qty_kgs": "600" }]),
    )
    .await
    .unwrap();

    let service = PurchaseOrderService::new(store.clone(), TaxConfig::default());
    for (po_number, qty) in [("PO-001", "200"), ("PO-002", "300")] {
        service
            .create(input(json!({
                "po_number": po_number,
                "pr_id": pr.id,
                "items": [{ "item_id": beans.id, "qty_ordered": qty, "unit_price": "4" }],
            })))
            .await
            .unwrap();
    }

    let report = ReportingService::new(store.clone()).pr_vs_po(pr.id).await.unwrap();
    assert_eq!(report.rows.len(), 1);
    let row = &report.rows[0];
    assert_eq!(row.item_name, "Green beans");
    assert_eq!(row.requested_qty, dec("600"));
    assert_eq!(row.ordered_qty, dec("500"));
    assert_eq!(row.variance, dec("-100"));
}

#[tokio::test]
async fn test_po_vs_grn_reads_the_ledger() {
    let store = new_store();
    let beans = item(&store, "GB-001", "Green beans").await;
    let bags = item(&store, "JB-001", "Jute bags").await;
    let supplier = supplier(&store).await;
    let po = direct_po(
        &store,
        &supplier,
        "PO-001",
        &[(beans.id, "100", "10"), (bags.id, "50", "2")],
    )
    .await
    .unwrap();
    receive(&store, po.id, "GRN-001", &[(beans.id, "60")]).await.unwrap();

    let reporting = ReportingService::new(store.clone());
    let report = reporting.po_vs_grn(po.id).await.unwrap();
    assert_eq!(report.rows.len(), 2);
    assert_eq!(report.rows[0].received_qty, dec("60"));
    assert_eq!(report.rows[0].variance, dec("40"));
    assert_eq!(report.rows[1].received_qty, Decimal::ZERO);
    assert_eq!(report.rows[1].variance, dec("50"));

    let err = reporting.po_vs_grn(Uuid::new_v4()).await.unwrap_err();
    assert!(is_not_found(&err));
    let err = reporting.pr_vs_po(Uuid::new_v4()).await.unwrap_err();
    assert!(is_not_found(&err));
}
