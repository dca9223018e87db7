//! HTTP handlers

pub mod approval;
pub mod goods_receipt;
pub mod health;
pub mod master_data;
pub mod material_request;
pub mod purchase_order;
pub mod reporting;
pub mod requisition;
pub mod tax;

pub use approval::*;
pub use goods_receipt::*;
pub use health::*;
pub use master_data::*;
pub use material_request::*;
pub use purchase_order::*;
pub use reporting::*;
pub use requisition::*;
pub use tax::*;
