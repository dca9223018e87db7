//! Ordered vs. received quantity ledger
//!
//! One entry per (PO, item). Ordered quantities are written once at PO
//! creation; received quantities only grow, and only through a validated
//! goods receipt. Cumulative receipts never exceed the ordered quantity by
//! more than [`QUANTITY_TOLERANCE`].

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{GoodsReceiptLine, OrderStatus};
use crate::error::{DomainError, DomainResult};
use crate::types::{within_tolerance, QUANTITY_TOLERANCE};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LedgerEntry {
    pub po_id: Uuid,
    pub item_id: Uuid,
    pub ordered_qty: Decimal,
    pub received_qty: Decimal,
}

impl LedgerEntry {
    /// Ordered minus received, clamped at zero
    pub fn remaining(&self) -> Decimal {
        self.outstanding().max(Decimal::ZERO)
    }

    /// Unclamped ordered minus received, for audit
    pub fn outstanding(&self) -> Decimal {
        self.ordered_qty - self.received_qty
    }

    pub fn is_fulfilled(&self) -> bool {
        self.remaining() <= QUANTITY_TOLERANCE
    }
}

#[derive(Debug, Clone, Default)]
pub struct QuantityLedger {
    entries: HashMap<(Uuid, Uuid), LedgerEntry>,
}

impl QuantityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_entries(entries: impl IntoIterator<Item = LedgerEntry>) -> Self {
        Self {
            entries: entries
                .into_iter()
                .map(|e| ((e.po_id, e.item_id), e))
                .collect(),
        }
    }

    /// Opens an entry for a PO line
    pub fn record_order(&mut self, po_id: Uuid, item_id: Uuid, qty: Decimal) -> DomainResult<()> {
        if self.entries.contains_key(&(po_id, item_id)) {
            return Err(DomainError::conflict(
                "ledger",
                format!("Item {} is already on purchase order {}", item_id, po_id),
            ));
        }
        self.entries.insert(
            (po_id, item_id),
            LedgerEntry {
                po_id,
                item_id,
                ordered_qty: qty,
                received_qty: Decimal::ZERO,
            },
        );
        Ok(())
    }

    /// Adds a received quantity to one entry after checking it fits
    pub fn record_receipt(&mut self, po_id: Uuid, item_id: Uuid, qty: Decimal) -> DomainResult<()> {
        self.check_quantity(po_id, item_id, qty)?;
        if let Some(entry) = self.entries.get_mut(&(po_id, item_id)) {
            entry.received_qty += qty;
        }
        Ok(())
    }

    /// Checks every line of a receipt against remaining quantities without
    /// changing anything. Lines repeating an item are checked on their sum.
    pub fn check_receipt(&self, po_id: Uuid, lines: &[GoodsReceiptLine]) -> DomainResult<()> {
        for (item_id, qty) in aggregate(lines) {
            self.check_quantity(po_id, item_id, qty)?;
        }
        Ok(())
    }

    /// Applies a whole receipt, or nothing if any line fails
    pub fn receive(&mut self, po_id: Uuid, lines: &[GoodsReceiptLine]) -> DomainResult<()> {
        self.check_receipt(po_id, lines)?;
        for (item_id, qty) in aggregate(lines) {
            self.record_receipt(po_id, item_id, qty)?;
        }
        Ok(())
    }

    fn check_quantity(&self, po_id: Uuid, item_id: Uuid, qty: Decimal) -> DomainResult<()> {
        if qty <= Decimal::ZERO {
            return Err(DomainError::validation(
                "qty_received",
                "Received quantity must be greater than zero",
            ));
        }

        let entry = self.entries.get(&(po_id, item_id)).ok_or_else(|| {
            DomainError::validation(
                "item_id",
                format!("Item {} is not on purchase order {}", item_id, po_id),
            )
        })?;

        let total = entry.received_qty.checked_add(qty).ok_or_else(|| {
            DomainError::validation("qty_received", "Received quantity is too large")
        })?;
        if !within_tolerance(total, entry.ordered_qty) {
            return Err(DomainError::validation(
                "qty_received",
                format!(
                    "Quantity {} exceeds remaining {} for item {}",
                    qty,
                    entry.remaining(),
                    item_id
                ),
            ));
        }
        Ok(())
    }

    pub fn entry(&self, po_id: Uuid, item_id: Uuid) -> Option<&LedgerEntry> {
        self.entries.get(&(po_id, item_id))
    }

    /// Missing entries count as zero
    pub fn remaining(&self, po_id: Uuid, item_id: Uuid) -> Decimal {
        self.entry(po_id, item_id)
            .map(LedgerEntry::remaining)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn received(&self, po_id: Uuid, item_id: Uuid) -> Decimal {
        self.entry(po_id, item_id)
            .map(|e| e.received_qty)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn entries_for_order(&self, po_id: Uuid) -> Vec<LedgerEntry> {
        let mut entries: Vec<_> = self
            .entries
            .values()
            .filter(|e| e.po_id == po_id)
            .cloned()
            .collect();
        entries.sort_by_key(|e| e.item_id);
        entries
    }

    /// Receipt progress derived from the entries of one PO
    pub fn order_status(&self, po_id: Uuid) -> OrderStatus {
        order_status(self.entries.values().filter(|e| e.po_id == po_id))
    }

    /// Received quantity of an item across every PO
    pub fn received_for_item(&self, item_id: Uuid) -> Decimal {
        self.entries
            .values()
            .filter(|e| e.item_id == item_id)
            .map(|e| e.received_qty)
            .sum()
    }
}

/// Status for a set of entries belonging to one PO
pub fn order_status<'a>(entries: impl IntoIterator<Item = &'a LedgerEntry>) -> OrderStatus {
    let mut any_received = false;
    let mut all_fulfilled = true;
    let mut seen = false;

    for entry in entries {
        seen = true;
        any_received |= entry.received_qty > Decimal::ZERO;
        all_fulfilled &= entry.is_fulfilled();
    }

    match (seen && all_fulfilled, any_received) {
        (true, _) => OrderStatus::Received,
        (false, true) => OrderStatus::PartiallyReceived,
        (false, false) => OrderStatus::Open,
    }
}

/// Sums line quantities per item, keeping first-seen order
pub fn aggregate(lines: &[GoodsReceiptLine]) -> Vec<(Uuid, Decimal)> {
    let mut totals: Vec<(Uuid, Decimal)> = Vec::new();
    for line in lines {
        match totals.iter_mut().find(|(id, _)| *id == line.item_id) {
            Some((_, total)) => *total = total.saturating_add(line.qty_received),
            None => totals.push((line.item_id, line.qty_received)),
        }
    }
    totals
}
