//! Business services for the procurement engine
//!
//! Each service is built per request around the shared store handle.

pub mod approval;
pub mod goods_receipt;
pub mod master_data;
pub mod material_request;
pub mod purchase_order;
pub mod reporting;
pub mod requisition;
pub mod tax;

pub use approval::ApprovalService;
pub use goods_receipt::GoodsReceiptService;
pub use master_data::MasterDataService;
pub use material_request::MaterialRequestService;
pub use purchase_order::PurchaseOrderService;
pub use reporting::ReportingService;
pub use requisition::RequisitionService;
pub use tax::TaxService;
