//! Item and supplier master data

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use validator::Validate;

use crate::error::DomainResult;
use crate::validation::{clean_optional, clean_required, not_blank};

/// Unit of measure assigned when none is given
pub const DEFAULT_UOM: &str = "pcs";

/// A purchasable item
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Item {
    pub id: Uuid,
    pub sku: String,
    pub name: String,
    pub uom: String,
    pub created_at: DateTime<Utc>,
}

/// Input for registering an item
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateItemInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub sku: String,
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub name: String,
    pub uom: Option<String>,
}

impl Item {
    pub fn create(input: CreateItemInput) -> DomainResult<Self> {
        input.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            sku: clean_required(&input.sku),
            name: clean_required(&input.name),
            uom: clean_optional(input.uom).unwrap_or_else(|| DEFAULT_UOM.to_string()),
            created_at: Utc::now(),
        })
    }
}

/// A vendor that purchase orders are placed with
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Supplier {
    pub id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Input for registering a supplier
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct CreateSupplierInput {
    #[serde(default)]
    #[validate(custom = "not_blank")]
    pub name: String,
    pub address: Option<String>,
}

impl Supplier {
    pub fn create(input: CreateSupplierInput) -> DomainResult<Self> {
        input.validate()?;

        Ok(Self {
            id: Uuid::new_v4(),
            name: clean_required(&input.name),
            address: clean_optional(input.address),
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DomainError;

    #[test]
    fn test_item_defaults_uom() {
        let item = Item::create(CreateItemInput {
            sku: " SKU-1 ".into(),
            name: "Green beans".into(),
            uom: Some("  ".into()),
        })
        .unwrap();

        assert_eq!(item.sku, "SKU-1");
        assert_eq!(item.uom, DEFAULT_UOM);
    }

    #[test]
    fn test_item_requires_name() {
        let err = Item::create(CreateItemInput {
            sku: "SKU-1".into(),
            name: "".into(),
            uom: None,
        })
        .unwrap_err();

        assert!(matches!(err, DomainError::Validation { ref field, .. } if field == "name"));
    }

    #[test]
    fn test_supplier_requires_name() {
        let err = Supplier::create(CreateSupplierInput {
            name: " ".into(),
            address: None,
        })
        .unwrap_err();

        assert_eq!(err.code(), "VALIDATION_ERROR");
    }
}
