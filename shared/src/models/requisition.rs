//! Purchase requisitions

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use super::{ApprovalFlow, ApprovalState};
use crate::error::{DomainError, DomainResult};
use crate::validation::{
    clean_optional, clean_required, not_blank, require_item, validate_non_negative,
};

/// Quantity requested on a PR line, in bags, kilograms or both
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "QuantityParts", try_from = "QuantityParts")]
pub enum RequestedQuantity {
    Bags(Decimal),
    Kilograms(Decimal),
    Both { bags: Decimal, kgs: Decimal },
}

/// Wire and column shape of [`RequestedQuantity`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityParts {
    #[serde(default)]
    pub qty_bags: Option<Decimal>,
    #[serde(default)]
    pub qty_kgs: Option<Decimal>,
}

impl RequestedQuantity {
    /// Builds the variant from the two optional components. Zero components
    /// are treated as absent; at least one must be positive.
    pub fn from_parts(bags: Option<Decimal>, kgs: Option<Decimal>) -> DomainResult<Self> {
        let bags = bags.unwrap_or(Decimal::ZERO);
        let kgs = kgs.unwrap_or(Decimal::ZERO);
        validate_non_negative("qty_bags", bags)?;
        validate_non_negative("qty_kgs", kgs)?;

        match (bags > Decimal::ZERO, kgs > Decimal::ZERO) {
            (true, true) => Ok(RequestedQuantity::Both { bags, kgs }),
            (true, false) => Ok(RequestedQuantity::Bags(bags)),
            (false, true) => Ok(RequestedQuantity::Kilograms(kgs)),
            (false, false) => Err(DomainError::validation(
                "qty_kgs",
                "Enter a quantity in bags or kilograms",
            )),
        }
    }

    pub fn bags(&self) -> Option<Decimal> {
        match self {
            RequestedQuantity::Bags(bags) | RequestedQuantity::Both { bags, .. } => Some(*bags),
            RequestedQuantity::Kilograms(_) => None,
        }
    }

    pub fn kgs(&self) -> Option<Decimal> {
        match self {
            RequestedQuantity::Kilograms(kgs) | RequestedQuantity::Both { kgs, .. } => Some(*kgs),
            RequestedQuantity::Bags(_) => None,
        }
    }

    /// Single comparable quantity: kilograms when present, otherwise bags.
    /// Used both when deriving PO lines and in reconciliation.
    pub fn ordered_quantity(&self) -> Decimal {
        match self {
            RequestedQuantity::Kilograms(kgs) | RequestedQuantity::Both { kgs, .. } => *kgs,
            RequestedQuantity::Bags(bags) => *bags,
        }
    }
}

impl From<RequestedQuantity> for QuantityParts {
    fn from(qty: RequestedQuantity) -> Self {
        Self {
            qty_bags: qty.bags(),
            qty_kgs: qty.kgs(),
        }
    }
}

impl TryFrom<QuantityParts> for RequestedQuantity {
    type Error = DomainError;

    fn try_from(parts: QuantityParts) -> Result<Self, Self::Error> {
        RequestedQuantity::from_parts(parts.qty_bags, parts.qty_kgs)
    }
}

/// Business status of a PR; approval progress lives in [`ApprovalState`]
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RequisitionStatus {
    #[default]
    Open,
}

impl RequisitionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RequisitionStatus::Open => "OPEN",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "OPEN" => Some(RequisitionStatus::Open),
            _ => None,
        }
    }
}

/// A requested item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RequisitionLine {
    pub item_id: Uuid,
    #[serde(flatten)]
    pub quantity: RequestedQuantity,
    pub unit_price: Decimal,
    pub notes: Option<String>,
}

/// A purchase requisition
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseRequisition {
    pub id: Uuid,
    pub pr_number: String,
    pub requested_by: Option<String>,
    pub department: Option<String>,
    pub requested_date: NaiveDate,
    pub customer_name: String,
    pub customer_ref_no: String,
    pub supplier_name: Option<String>,
    pub supplier_address: Option<String>,
    pub tax_code: Option<String>,
    /// Rate resolved for `tax_code` on the requested date, for display
    pub tax_percent: Option<Decimal>,
    pub notes: Option<String>,
    pub status: RequisitionStatus,
    #[serde(flatten)]
    pub approval: ApprovalState,
    pub items: Vec<RequisitionLine>,
    pub created_at: DateTime<Utc>,
}

/// Line as submitted by a client
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequisitionLineInput {
    pub item_id: Option<Uuid>,
    pub qty_bags: Option<Decimal>,
    pub qty_kgs: Option<Decimal>,
    #[serde(default)]
    pub unit_price: Decimal,
    pub notes: Option<String>,
}

/// Input for raising a PR
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateRequisitionInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub pr_number: String,
    pub requested_by: Option<String>,
    pub department: Option<String>,
    pub requested_date: NaiveDate,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub customer_name: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub customer_ref_no: String,
    pub supplier_name: Option<String>,
    pub supplier_address: Option<String>,
    pub tax_code: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<RequisitionLineInput>,
}

impl CreateRequisitionInput {
    /// Item ids referenced by the lines, in order
    pub fn item_ids(&self) -> Vec<Uuid> {
        self.items.iter().filter_map(|l| l.item_id).collect()
    }
}

impl PurchaseRequisition {
    /// Validates the input and builds a PENDING requisition bound to `flow`.
    ///
    /// Item existence and pr_number uniqueness are registry concerns and are
    /// checked by the store.
    pub fn create(
        input: CreateRequisitionInput,
        flow: &ApprovalFlow,
        tax_percent: Option<Decimal>,
    ) -> DomainResult<Self> {
        input.validate()?;

        let items = input
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let item_id = require_item(&format!("items[{}].item_id", idx), line.item_id)?;
                let quantity = RequestedQuantity::from_parts(line.qty_bags, line.qty_kgs)
                    .map_err(|e| prefix_field(e, idx))?;
                validate_non_negative(&format!("items[{}].unit_price", idx), line.unit_price)?;

                Ok(RequisitionLine {
                    item_id,
                    quantity,
                    unit_price: line.unit_price,
                    notes: clean_optional(line.notes),
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(Self {
            id: Uuid::new_v4(),
            pr_number: clean_required(&input.pr_number),
            requested_by: clean_optional(input.requested_by),
            department: clean_optional(input.department),
            requested_date: input.requested_date,
            customer_name: clean_required(&input.customer_name),
            customer_ref_no: clean_required(&input.customer_ref_no),
            supplier_name: clean_optional(input.supplier_name),
            supplier_address: clean_optional(input.supplier_address),
            tax_code: clean_optional(input.tax_code),
            tax_percent,
            notes: clean_optional(input.notes),
            status: RequisitionStatus::Open,
            approval: ApprovalState::snapshot(flow),
            items,
            created_at: Utc::now(),
        })
    }

    /// Requested quantity per item, summed over lines in first-seen order
    pub fn requested_by_item(&self) -> Vec<(Uuid, Decimal)> {
        let mut totals: Vec<(Uuid, Decimal)> = Vec::new();
        for line in &self.items {
            let qty = line.quantity.ordered_quantity();
            match totals.iter_mut().find(|(id, _)| *id == line.item_id) {
                Some((_, total)) => *total += qty,
                None => totals.push((line.item_id, qty)),
            }
        }
        totals
    }
}

fn prefix_field(err: DomainError, idx: usize) -> DomainError {
    match err {
        DomainError::Validation { field, message } => {
            DomainError::validation(format!("items[{}].{}", idx, field), message)
        }
        other => other,
    }
}
