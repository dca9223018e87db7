//! Goods receipt notes

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};
use crate::validation::{clean_optional, clean_required, not_blank, require_item, validate_positive};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReceiptStatus {
    #[default]
    Received,
}

impl ReceiptStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ReceiptStatus::Received => "RECEIVED",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "RECEIVED" => Some(ReceiptStatus::Received),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoodsReceiptLine {
    pub item_id: Uuid,
    pub qty_received: Decimal,
}

/// A goods receipt against one purchase order. Immutable once recorded.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GoodsReceiptNote {
    pub id: Uuid,
    pub grn_number: String,
    pub po_id: Uuid,
    pub received_date: NaiveDate,
    pub notes: Option<String>,
    pub status: ReceiptStatus,
    pub items: Vec<GoodsReceiptLine>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoodsReceiptLineInput {
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub qty_received: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateGoodsReceiptInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub grn_number: String,
    pub po_id: Option<Uuid>,
    pub received_date: Option<NaiveDate>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<GoodsReceiptLineInput>,
}

impl GoodsReceiptNote {
    /// Validates the receipt on its own. Quantities against the order are
    /// checked by [`crate::QuantityLedger::receive`] inside the store.
    pub fn create(input: CreateGoodsReceiptInput) -> DomainResult<Self> {
        input.validate()?;
        let po_id = input
            .po_id
            .ok_or_else(|| DomainError::validation("po_id", "Purchase order is required"))?;

        let items = input
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let item_id = require_item(&format!("items[{}].item_id", idx), line.item_id)?;
                validate_positive(&format!("items[{}].qty_received", idx), line.qty_received)?;
                Ok(GoodsReceiptLine {
                    item_id,
                    qty_received: line.qty_received,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(Self {
            id: Uuid::new_v4(),
            grn_number: clean_required(&input.grn_number),
            po_id,
            received_date: input.received_date.unwrap_or_else(|| Utc::now().date_naive()),
            notes: clean_optional(input.notes),
            status: ReceiptStatus::Received,
            items,
            created_at: Utc::now(),
        })
    }
}
