//! Domain error taxonomy for the procurement engine

use thiserror::Error;

/// Errors raised by the engine when a precondition fails.
///
/// Every variant carries a human-readable message; the backend maps each
/// variant to an HTTP status.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainError {
    /// Malformed or missing input: required field absent, non-positive
    /// quantity, quantity exceeding remaining, empty flow definition.
    #[error("{message}")]
    Validation { field: String, message: String },

    /// Duplicate unique identifier or double-recording an immutable line.
    #[error("{message}")]
    Conflict { resource: String, message: String },

    /// Unresolvable id or tax code reference.
    #[error("{resource} not found: {id}")]
    NotFound { resource: String, id: String },

    /// Approval transition attempted on a terminal or out-of-range state.
    #[error("Invalid state: {message}")]
    InvalidState { message: String },
}

impl DomainError {
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn conflict(resource: impl Into<String>, message: impl Into<String>) -> Self {
        DomainError::Conflict {
            resource: resource.into(),
            message: message.into(),
        }
    }

    pub fn not_found(resource: impl Into<String>, id: impl ToString) -> Self {
        DomainError::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        DomainError::InvalidState {
            message: message.into(),
        }
    }

    /// Stable machine-readable code for the variant
    pub fn code(&self) -> &'static str {
        match self {
            DomainError::Validation { .. } => "VALIDATION_ERROR",
            DomainError::Conflict { .. } => "CONFLICT",
            DomainError::NotFound { .. } => "NOT_FOUND",
            DomainError::InvalidState { .. } => "INVALID_STATE",
        }
    }
}

/// Converts derive-based input validation failures into the first failing
/// field (alphabetical, so the reported field is stable across runs).
impl From<validator::ValidationErrors> for DomainError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<_> = errors.field_errors().into_iter().collect();
        fields.sort_by_key(|(field, _)| *field);

        match fields.first() {
            Some((field, field_errors)) => {
                let message = field_errors
                    .first()
                    .map(|e| match &e.message {
                        Some(message) => message.to_string(),
                        None if e.code == "blank" => format!("{} is required", field),
                        None => format!("{} is invalid", field),
                    })
                    .unwrap_or_else(|| format!("{} is invalid", field));
                DomainError::validation(*field, message)
            }
            None => DomainError::validation("input", errors.to_string()),
        }
    }
}

/// Result type alias for engine operations
pub type DomainResult<T> = Result<T, DomainError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::not_blank;
    use validator::Validate;

    #[derive(Validate)]
    struct Probe {
        #[validate(custom = "not_blank")]
        number: String,
    }

    #[test]
    fn test_error_messages() {
        let err = DomainError::not_found("Purchase order", "abc");
        assert_eq!(err.to_string(), "Purchase order not found: abc");

        let err = DomainError::invalid_state("document is already approved");
        assert_eq!(err.to_string(), "Invalid state: document is already approved");
    }

    #[test]
    fn test_codes() {
        assert_eq!(DomainError::validation("f", "m").code(), "VALIDATION_ERROR");
        assert_eq!(DomainError::conflict("r", "m").code(), "CONFLICT");
    }

    #[test]
    fn test_blank_field_converts_to_required_message() {
        let probe = Probe {
            number: "   ".to_string(),
        };
        let err: DomainError = probe.validate().unwrap_err().into();
        assert_eq!(
            err,
            DomainError::validation("number", "number is required")
        );
    }
}
