//! Purchase orders and PO totals

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ApprovalFlow, ApprovalState, ApprovalStatus, PurchaseRequisition, Supplier};
use crate::error::{DomainError, DomainResult};
use crate::types::round_money;
use crate::validation::{
    clean_optional, clean_required, not_blank, require_item, validate_non_negative,
    validate_positive,
};

/// Receipt progress of a PO
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    #[default]
    Open,
    PartiallyReceived,
    Received,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Open => "OPEN",
            OrderStatus::PartiallyReceived => "PARTIALLY_RECEIVED",
            OrderStatus::Received => "RECEIVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(OrderStatus::Open),
            "PARTIALLY_RECEIVED" => Some(OrderStatus::PartiallyReceived),
            "RECEIVED" => Some(OrderStatus::Received),
            _ => None,
        }
    }
}

/// An ordered item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOrderLine {
    pub item_id: Uuid,
    pub qty_ordered: Decimal,
    pub unit_price: Decimal,
}

impl PurchaseOrderLine {
    pub fn line_total(&self) -> DomainResult<Decimal> {
        self.qty_ordered
            .checked_mul(self.unit_price)
            .ok_or_else(|| amount_overflow("line_total"))
    }
}

/// A purchase order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseOrder {
    pub id: Uuid,
    pub po_number: String,
    pub order_date: NaiveDate,
    pub pr_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    pub supplier_name: Option<String>,
    pub tax_code: Option<String>,
    pub status: OrderStatus,
    #[serde(flatten)]
    pub approval: ApprovalState,
    pub items: Vec<PurchaseOrderLine>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PurchaseOrderLineInput {
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub qty_ordered: Decimal,
    #[serde(default)]
    pub unit_price: Decimal,
}

/// Input for creating a PO, either directly against a supplier or derived
/// from a requisition
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreatePurchaseOrderInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub po_number: String,
    pub order_date: Option<NaiveDate>,
    pub tax_code: Option<String>,
    pub pr_id: Option<Uuid>,
    pub supplier_id: Option<Uuid>,
    #[serde(default)]
    pub items: Vec<PurchaseOrderLineInput>,
}

impl CreatePurchaseOrderInput {
    pub fn item_ids(&self) -> Vec<Uuid> {
        self.items.iter().filter_map(|l| l.item_id).collect()
    }
}

/// Where a PO's supplier and default lines come from
#[derive(Debug, Clone, Copy)]
pub enum OrderSource<'a> {
    Direct(&'a Supplier),
    Derived(&'a PurchaseRequisition),
}

/// Copies PR lines into PO lines, reducing each requested quantity to
/// kilograms when present, otherwise bags
pub fn derive_lines(pr: &PurchaseRequisition) -> Vec<PurchaseOrderLine> {
    pr.items
        .iter()
        .map(|line| PurchaseOrderLine {
            item_id: line.item_id,
            qty_ordered: line.quantity.ordered_quantity(),
            unit_price: line.unit_price,
        })
        .collect()
}

impl PurchaseOrder {
    /// Validates the input and builds a PENDING, OPEN purchase order.
    ///
    /// Explicit lines are used as given even when a requisition is
    /// referenced; without them the requisition's lines are copied.
    pub fn create(
        input: CreatePurchaseOrderInput,
        source: OrderSource<'_>,
        flow: &ApprovalFlow,
    ) -> DomainResult<Self> {
        input.validate()?;

        let explicit = input
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let item_id = require_item(&format!("items[{}].item_id", idx), line.item_id)?;
                validate_positive(&format!("items[{}].qty_ordered", idx), line.qty_ordered)?;
                validate_non_negative(&format!("items[{}].unit_price", idx), line.unit_price)?;
                Ok(PurchaseOrderLine {
                    item_id,
                    qty_ordered: line.qty_ordered,
                    unit_price: line.unit_price,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        let (pr_id, supplier_id, supplier_name, default_tax_code, items) = match source {
            OrderSource::Direct(supplier) => {
                if input.pr_id.is_some() {
                    return Err(DomainError::validation(
                        "pr_id",
                        "A direct purchase order cannot reference a requisition",
                    ));
                }
                (None, Some(supplier.id), Some(supplier.name.clone()), None, explicit)
            }
            OrderSource::Derived(pr) => {
                if input.supplier_id.is_some() {
                    return Err(DomainError::validation(
                        "supplier_id",
                        "Supplier comes from the requisition and cannot be set",
                    ));
                }
                if pr.approval.approval_status == ApprovalStatus::Rejected {
                    return Err(DomainError::invalid_state(format!(
                        "requisition {} has been rejected",
                        pr.pr_number
                    )));
                }
                let items = if explicit.is_empty() {
                    derive_lines(pr)
                } else {
                    explicit
                };
                (
                    Some(pr.id),
                    None,
                    pr.supplier_name.clone(),
                    pr.tax_code.clone(),
                    items,
                )
            }
        };

        if items.is_empty() {
            return Err(DomainError::validation(
                "items",
                "At least one line item is required",
            ));
        }

        Ok(Self {
            id: Uuid::new_v4(),
            po_number: clean_required(&input.po_number),
            order_date: input.order_date.unwrap_or_else(|| Utc::now().date_naive()),
            pr_id,
            supplier_id,
            supplier_name,
            tax_code: clean_optional(input.tax_code).or(default_tax_code),
            status: OrderStatus::Open,
            approval: ApprovalState::snapshot(flow),
            items,
            created_at: Utc::now(),
        })
    }

    pub fn subtotal(&self) -> DomainResult<Decimal> {
        self.items.iter().try_fold(Decimal::ZERO, |acc, line| {
            acc.checked_add(line.line_total()?)
                .ok_or_else(|| amount_overflow("subtotal"))
        })
    }
}

fn amount_overflow(field: &str) -> DomainError {
    DomainError::validation(field, format!("{} is too large to compute", field))
}

/// The tax row applied to a totals computation
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AppliedTax {
    pub code: String,
    pub rate_percent: Decimal,
}

/// Monetary totals of a PO under one tax code
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OrderTotals {
    pub po_id: Uuid,
    pub subtotal: Decimal,
    pub tax_percent: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
    pub tax: AppliedTax,
}

impl OrderTotals {
    /// `tax_amount` is rounded to two places, half away from zero
    pub fn compute(order: &PurchaseOrder, code: &str, rate_percent: Decimal) -> DomainResult<Self> {
        let subtotal = order.subtotal()?;
        let tax_amount = subtotal
            .checked_mul(rate_percent)
            .map(|v| round_money(v / Decimal::ONE_HUNDRED))
            .ok_or_else(|| amount_overflow("tax_amount"))?;
        let grand_total = subtotal
            .checked_add(tax_amount)
            .ok_or_else(|| amount_overflow("grand_total"))?;

        Ok(Self {
            po_id: order.id,
            subtotal,
            tax_percent: rate_percent,
            tax_amount,
            grand_total,
            tax: AppliedTax {
                code: code.to_string(),
                rate_percent,
            },
        })
    }
}
