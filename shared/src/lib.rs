//! Shared types and the procurement engine
//!
//! This crate holds every business rule of the PR → PO → GRN document chain:
//! document construction, the quantity ledger, approval state transitions,
//! tax resolution, totals and variance reporting. It performs no I/O; the
//! backend persistence adapters load state, call into these rules, and
//! store the results.

pub mod error;
pub mod models;
pub mod types;
pub mod validation;

pub use error::{DomainError, DomainResult};
pub use models::*;
pub use types::*;
