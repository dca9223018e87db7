//! Route definitions for the procurement API

use axum::{
    routing::{get, post},
    Router,
};

use crate::{handlers, AppState};

/// Create API routes
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health_check))
        // Master data
        .nest("/items", item_routes())
        .nest("/suppliers", supplier_routes())
        .nest("/taxes", tax_routes())
        // Documents
        .nest("/purchase-requisitions", requisition_routes())
        .nest("/purchase-orders", purchase_order_routes())
        .nest("/grns", goods_receipt_routes())
        .nest("/approvals", approval_routes())
        // Reconciliation
        .nest("/reports", report_routes())
        // Internal issues
        .route(
            "/material-requests",
            get(handlers::list_material_requests).post(handlers::create_material_request),
        )
        .route("/stock/current", get(handlers::get_current_stock))
}

fn item_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_items).post(handlers::create_item))
        .route("/:item_id", get(handlers::get_item))
}

fn supplier_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route("/:supplier_id", get(handlers::get_supplier))
}

fn tax_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_tax_rates).post(handlers::add_tax_rate))
        .route("/resolve", get(handlers::resolve_tax_rate))
}

fn requisition_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_requisitions).post(handlers::create_requisition),
        )
        .route("/:pr_id", get(handlers::get_requisition))
}

fn purchase_order_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_purchase_orders).post(handlers::create_purchase_order),
        )
        .route("/:po_id", get(handlers::get_purchase_order))
        .route("/:po_id/totals", get(handlers::get_purchase_order_totals))
}

fn goods_receipt_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::list_goods_receipts).post(handlers::create_goods_receipt),
        )
        .route("/:grn_id", get(handlers::get_goods_receipt))
}

fn approval_routes() -> Router<AppState> {
    Router::new()
        .route("/decisions", post(handlers::decide))
        .route(
            "/pr-flow",
            get(handlers::get_pr_flow).post(handlers::save_pr_flow),
        )
        .route(
            "/po-flow",
            get(handlers::get_po_flow).post(handlers::save_po_flow),
        )
}

fn report_routes() -> Router<AppState> {
    Router::new()
        .route("/pr-vs-po", get(handlers::get_pr_vs_po_report))
        .route("/po-vs-grn", get(handlers::get_po_vs_grn_report))
}
