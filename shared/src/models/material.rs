//! Material requests: internal issue of received stock

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::{DomainError, DomainResult};
use crate::types::within_tolerance;
use crate::validation::{clean_optional, clean_required, not_blank, require_item, validate_non_negative};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialRequestLine {
    pub item_id: Uuid,
    pub qty_requested: Decimal,
    pub qty_issued: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MaterialRequest {
    pub id: Uuid,
    pub mr_number: String,
    pub department: Option<String>,
    pub requested_by: Option<String>,
    pub notes: Option<String>,
    pub items: Vec<MaterialRequestLine>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MaterialRequestLineInput {
    pub item_id: Option<Uuid>,
    #[serde(default)]
    pub qty_requested: Decimal,
    #[serde(default)]
    pub qty_issued: Decimal,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateMaterialRequestInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub mr_number: String,
    pub department: Option<String>,
    pub requested_by: Option<String>,
    pub notes: Option<String>,
    #[serde(default)]
    #[validate(length(min = 1, message = "At least one line item is required"))]
    pub items: Vec<MaterialRequestLineInput>,
}

impl CreateMaterialRequestInput {
    pub fn item_ids(&self) -> Vec<Uuid> {
        self.items.iter().filter_map(|l| l.item_id).collect()
    }
}

/// On-hand quantity of an item: received through GRNs minus issued
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StockLevel {
    pub item_id: Uuid,
    pub received: Decimal,
    pub issued: Decimal,
    pub current_stock: Decimal,
}

impl StockLevel {
    pub fn new(item_id: Uuid, received: Decimal, issued: Decimal) -> Self {
        Self {
            item_id,
            received,
            issued,
            current_stock: received - issued,
        }
    }
}

impl MaterialRequest {
    pub fn create(input: CreateMaterialRequestInput) -> DomainResult<Self> {
        input.validate()?;

        let items = input
            .items
            .into_iter()
            .enumerate()
            .map(|(idx, line)| {
                let item_id = require_item(&format!("items[{}].item_id", idx), line.item_id)?;
                validate_non_negative(&format!("items[{}].qty_requested", idx), line.qty_requested)?;
                validate_non_negative(&format!("items[{}].qty_issued", idx), line.qty_issued)?;

                if line.qty_requested.is_zero() && line.qty_issued.is_zero() {
                    return Err(DomainError::validation(
                        format!("items[{}].qty_requested", idx),
                        "Enter a requested or issued quantity",
                    ));
                }
                if !within_tolerance(line.qty_issued, line.qty_requested) {
                    return Err(DomainError::validation(
                        format!("items[{}].qty_issued", idx),
                        "Issued quantity cannot exceed requested quantity",
                    ));
                }

                Ok(MaterialRequestLine {
                    item_id,
                    qty_requested: line.qty_requested,
                    qty_issued: line.qty_issued,
                })
            })
            .collect::<DomainResult<Vec<_>>>()?;

        Ok(Self {
            id: Uuid::new_v4(),
            mr_number: clean_required(&input.mr_number),
            department: clean_optional(input.department),
            requested_by: clean_optional(input.requested_by),
            notes: clean_optional(input.notes),
            items,
            created_at: Utc::now(),
        })
    }

    /// Issued quantity per item, summed over lines
    pub fn issued_by_item(&self) -> HashMap<Uuid, Decimal> {
        let mut issued = HashMap::new();
        for line in &self.items {
            *issued.entry(line.item_id).or_insert(Decimal::ZERO) += line.qty_issued;
        }
        issued
    }

    /// Checks that the issued quantities fit the current stock of each item.
    /// Items missing from `stock` have none on hand.
    pub fn check_against_stock(&self, stock: &HashMap<Uuid, StockLevel>) -> DomainResult<()> {
        let mut issued: Vec<_> = self.issued_by_item().into_iter().collect();
        issued.sort_by_key(|(item_id, _)| *item_id);

        for (item_id, qty) in issued {
            if qty.is_zero() {
                continue;
            }
            let available = stock
                .get(&item_id)
                .map(|s| s.current_stock)
                .unwrap_or(Decimal::ZERO);
            if !within_tolerance(qty, available) {
                return Err(DomainError::validation(
                    "qty_issued",
                    format!(
                        "Issued quantity {} exceeds current stock {} for item {}",
                        qty, available, item_id
                    ),
                ));
            }
        }
        Ok(())
    }
}
