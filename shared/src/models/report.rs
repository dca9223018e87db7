//! Variance reports across the PR → PO → GRN chain

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{Item, PurchaseOrder, PurchaseRequisition, QuantityLedger};

/// Name shown for items missing from the registry
pub const UNKNOWN_ITEM: &str = "(unknown item)";

/// Requested vs. ordered quantity for one item of a PR
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PrVsPoRow {
    pub item_id: Uuid,
    pub item_name: String,
    pub requested_qty: Decimal,
    pub ordered_qty: Decimal,
    /// ordered − requested
    pub variance: Decimal,
}

/// Ordered vs. received quantity for one line of a PO
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PoVsGrnRow {
    pub item_id: Uuid,
    pub item_name: String,
    pub ordered_qty: Decimal,
    pub received_qty: Decimal,
    /// ordered − received
    pub variance: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VarianceReport<T> {
    pub rows: Vec<T>,
}

fn item_name(items: &HashMap<Uuid, Item>, item_id: Uuid) -> String {
    items
        .get(&item_id)
        .map(|i| i.name.clone())
        .unwrap_or_else(|| UNKNOWN_ITEM.to_string())
}

/// One row per PR item; ordered quantities are summed over every PO that
/// references the requisition.
pub fn pr_vs_po(
    pr: &PurchaseRequisition,
    orders: &[PurchaseOrder],
    items: &HashMap<Uuid, Item>,
) -> VarianceReport<PrVsPoRow> {
    let mut ordered: HashMap<Uuid, Decimal> = HashMap::new();
    for order in orders.iter().filter(|o| o.pr_id == Some(pr.id)) {
        for line in &order.items {
            *ordered.entry(line.item_id).or_insert(Decimal::ZERO) += line.qty_ordered;
        }
    }

    let rows = pr
        .requested_by_item()
        .into_iter()
        .map(|(item_id, requested_qty)| {
            let ordered_qty = ordered.get(&item_id).copied().unwrap_or(Decimal::ZERO);
            PrVsPoRow {
                item_id,
                item_name: item_name(items, item_id),
                requested_qty,
                ordered_qty,
                variance: ordered_qty - requested_qty,
            }
        })
        .collect();

    VarianceReport { rows }
}

/// One row per PO line, received quantities read from the ledger
pub fn po_vs_grn(
    po: &PurchaseOrder,
    ledger: &QuantityLedger,
    items: &HashMap<Uuid, Item>,
) -> VarianceReport<PoVsGrnRow> {
    let rows = po
        .items
        .iter()
        .map(|line| {
            let received_qty = ledger.received(po.id, line.item_id);
            PoVsGrnRow {
                item_id: line.item_id,
                item_name: item_name(items, line.item_id),
                ordered_qty: line.qty_ordered,
                received_qty,
                variance: line.qty_ordered - received_qty,
            }
        })
        .collect();

    VarianceReport { rows }
}
