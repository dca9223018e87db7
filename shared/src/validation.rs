//! Validation utilities for procurement documents

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::error::{DomainError, DomainResult};

// ============================================================================
// Derive Helpers
// ============================================================================

/// Rejects empty or whitespace-only strings.
///
/// Used through `#[validate(custom = "not_blank")]`; the error code `blank`
/// is turned into a "`field` is required" message on conversion.
pub fn not_blank(value: &str) -> Result<(), validator::ValidationError> {
    if value.trim().is_empty() {
        return Err(validator::ValidationError::new("blank"));
    }
    Ok(())
}

// ============================================================================
// Quantity Validations
// ============================================================================

/// Upper bound for any single quantity, price or rate.
///
/// Keeps line totals, subtotals and tax amounts inside `Decimal` range.
pub const MAX_AMOUNT: i64 = 1_000_000_000_000;

/// Quantity or price must be strictly positive
pub fn validate_positive(field: &str, value: Decimal) -> DomainResult<()> {
    if value <= Decimal::ZERO {
        return Err(DomainError::validation(
            field,
            format!("{} must be greater than zero", field),
        ));
    }
    validate_magnitude(field, value)
}

/// Quantity or price may be zero but never negative
pub fn validate_non_negative(field: &str, value: Decimal) -> DomainResult<()> {
    if value < Decimal::ZERO {
        return Err(DomainError::validation(
            field,
            format!("{} cannot be negative", field),
        ));
    }
    validate_magnitude(field, value)
}

fn validate_magnitude(field: &str, value: Decimal) -> DomainResult<()> {
    if value.abs() >= Decimal::from(MAX_AMOUNT) {
        return Err(DomainError::validation(
            field,
            format!("{} must be less than {}", field, MAX_AMOUNT),
        ));
    }
    Ok(())
}

/// Line references must name an item
pub fn require_item(field: &str, item_id: Option<Uuid>) -> DomainResult<Uuid> {
    item_id.ok_or_else(|| DomainError::validation(field, "Item is required"))
}

// ============================================================================
// Text Normalisation
// ============================================================================

/// Trims free text and drops it when nothing is left
pub fn clean_optional(value: Option<String>) -> Option<String> {
    value.and_then(|v| {
        let trimmed = v.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

/// Trimmed document number or code
pub fn clean_required(value: &str) -> String {
    value.trim().to_string()
}
