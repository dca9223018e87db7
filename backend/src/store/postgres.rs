//! PostgreSQL store
//!
//! One transaction per mutation. Goods receipts lock the purchase order row
//! before reading its ledger entries, approval decisions lock the document
//! row, and material requests serialize on a transaction-scoped advisory
//! lock.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use shared::{
    aggregate, ApprovalFlow, ApprovalStage, ApprovalState, ApprovalStatus,
    CreatePurchaseOrderInput, CreateRequisitionInput, Decision, DocType, DomainError,
    GoodsReceiptLine, GoodsReceiptNote, Item, LedgerEntry, MaterialRequest, MaterialRequestLine,
    OrderStatus, PurchaseOrder, PurchaseOrderLine, PurchaseRequisition, QuantityLedger,
    ReceiptStatus, RequestedQuantity, RequisitionLine, RequisitionStatus, StageInput, StockLevel,
    Supplier, TaxRate,
};
use sqlx::{postgres::PgPoolOptions, types::Json, PgConnection, PgPool};
use uuid::Uuid;

use super::{
    build_purchase_order, duplicate_number, ensure_items_exist, flow_or_implicit, open_ledger,
    ProcurementStore,
};
use crate::config::DatabaseConfig;
use crate::error::{AppError, AppResult};

/// Advisory lock key serializing stock issues
const STOCK_LOCK_KEY: i64 = 0x5354_4f43_4b;
/// Advisory lock key base for flow versions, offset per doc type
const FLOW_LOCK_KEY: i64 = 0x464c_4f57;

const REQUISITION_COLUMNS: &str = "id, pr_number, requested_by, department, requested_date, \
     customer_name, customer_ref_no, supplier_name, supplier_address, tax_code, tax_percent, \
     notes, status, approval_status, approval_level, approval_stages, flow_version, created_at";

const ORDER_COLUMNS: &str = "id, po_number, order_date, pr_id, supplier_id, supplier_name, \
     tax_code, status, approval_status, approval_level, approval_stages, flow_version, created_at";

#[derive(sqlx::FromRow)]
struct RequisitionRow {
    id: Uuid,
    pr_number: String,
    requested_by: Option<String>,
    department: Option<String>,
    requested_date: NaiveDate,
    customer_name: String,
    customer_ref_no: String,
    supplier_name: Option<String>,
    supplier_address: Option<String>,
    tax_code: Option<String>,
    tax_percent: Option<Decimal>,
    notes: Option<String>,
    status: String,
    approval_status: String,
    approval_level: i32,
    approval_stages: Json<Vec<ApprovalStage>>,
    flow_version: i32,
    created_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct RequisitionLineRow {
    pr_id: Uuid,
    item_id: Uuid,
    qty_bags: Option<Decimal>,
    qty_kgs: Option<Decimal>,
    unit_price: Decimal,
    notes: Option<String>,
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    po_number: String,
    order_date: NaiveDate,
    pr_id: Option<Uuid>,
    supplier_id: Option<Uuid>,
    supplier_name: Option<String>,
    tax_code: Option<String>,
    status: String,
    approval_status: String,
    approval_level: i32,
    approval_stages: Json<Vec<ApprovalStage>>,
    flow_version: i32,
    created_at: DateTime<Utc>,
}

type ItemRow = (Uuid, String, String, String, DateTime<Utc>);
type SupplierRow = (Uuid, String, Option<String>, DateTime<Utc>);
type TaxRateRow = (Uuid, String, String, Decimal, NaiveDate, bool, DateTime<Utc>);
type ReceiptRow = (Uuid, String, Uuid, NaiveDate, Option<String>, String, DateTime<Utc>);
type MaterialRequestRow = (Uuid, String, Option<String>, Option<String>, Option<String>, DateTime<Utc>);

fn corrupt(what: &str, value: &str) -> AppError {
    AppError::Internal(format!("Unrecognised {} in storage: {}", what, value))
}

fn approval_state(
    status: &str,
    level: i32,
    stages: Json<Vec<ApprovalStage>>,
    flow_version: i32,
) -> AppResult<ApprovalState> {
    Ok(ApprovalState {
        approval_status: ApprovalStatus::from_str(status)
            .ok_or_else(|| corrupt("approval status", status))?,
        approval_level: level,
        approval_stages: stages.0,
        flow_version,
    })
}

fn item_from_row(r: ItemRow) -> Item {
    Item {
        id: r.0,
        sku: r.1,
        name: r.2,
        uom: r.3,
        created_at: r.4,
    }
}

fn supplier_from_row(r: SupplierRow) -> Supplier {
    Supplier {
        id: r.0,
        name: r.1,
        address: r.2,
        created_at: r.3,
    }
}

/// Maps a unique violation to a conflict on `field`
fn unique_violation(err: sqlx::Error, resource: &str, field: &str, number: &str) -> AppError {
    if is_unique_violation(&err) {
        return duplicate_number(resource, field, number).into();
    }
    err.into()
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(config: &DatabaseConfig) -> AppResult<Self> {
        let url = config.url.as_deref().ok_or_else(|| {
            AppError::Configuration("database.url is required for the postgres backend".into())
        })?;
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .min_connections(config.min_connections)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect(url)
            .await?;
        Ok(Self::new(pool))
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn known_items(conn: &mut PgConnection, ids: &[Uuid]) -> AppResult<Vec<Uuid>> {
        let known = sqlx::query_scalar::<_, Uuid>("SELECT id FROM items WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&mut *conn)
            .await?;
        Ok(known)
    }

    async fn load_flow(conn: &mut PgConnection, doc_type: DocType) -> AppResult<Option<ApprovalFlow>> {
        let row = sqlx::query_as::<_, (i32, Json<Vec<ApprovalStage>>, DateTime<Utc>)>(
            r#"
            SELECT version, stages, saved_at
            FROM approval_flows
            WHERE doc_type = $1
            ORDER BY version DESC
            LIMIT 1
            "#,
        )
        .bind(doc_type.as_str())
        .fetch_optional(&mut *conn)
        .await?;

        Ok(row.map(|(version, stages, saved_at)| ApprovalFlow {
            doc_type,
            version,
            stages: stages.0,
            saved_at,
        }))
    }

    async fn load_requisitions(
        conn: &mut PgConnection,
        rows: Vec<RequisitionRow>,
    ) -> AppResult<Vec<PurchaseRequisition>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, RequisitionLineRow>(
            r#"
            SELECT pr_id, item_id, qty_bags, qty_kgs, unit_price, notes
            FROM purchase_requisition_lines
            WHERE pr_id = ANY($1)
            ORDER BY pr_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<RequisitionLine>> = HashMap::new();
        for l in line_rows {
            let quantity = RequestedQuantity::from_parts(l.qty_bags, l.qty_kgs)
                .map_err(|e| AppError::Internal(format!("Corrupt requisition line: {}", e)))?;
            lines.entry(l.pr_id).or_default().push(RequisitionLine {
                item_id: l.item_id,
                quantity,
                unit_price: l.unit_price,
                notes: l.notes,
            });
        }

        rows.into_iter()
            .map(|r| {
                Ok(PurchaseRequisition {
                    items: lines.remove(&r.id).unwrap_or_default(),
                    status: RequisitionStatus::from_str(&r.status)
                        .ok_or_else(|| corrupt("requisition status", &r.status))?,
                    approval: approval_state(
                        &r.approval_status,
                        r.approval_level,
                        r.approval_stages,
                        r.flow_version,
                    )?,
                    id: r.id,
                    pr_number: r.pr_number,
                    requested_by: r.requested_by,
                    department: r.department,
                    requested_date: r.requested_date,
                    customer_name: r.customer_name,
                    customer_ref_no: r.customer_ref_no,
                    supplier_name: r.supplier_name,
                    supplier_address: r.supplier_address,
                    tax_code: r.tax_code,
                    tax_percent: r.tax_percent,
                    notes: r.notes,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn fetch_requisition(conn: &mut PgConnection, id: Uuid) -> AppResult<Option<PurchaseRequisition>> {
        let rows = sqlx::query_as::<_, RequisitionRow>(&format!(
            "SELECT {} FROM purchase_requisitions WHERE id = $1",
            REQUISITION_COLUMNS
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(Self::load_requisitions(conn, rows).await?.pop())
    }

    async fn load_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> AppResult<Vec<PurchaseOrder>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
        let line_rows = sqlx::query_as::<_, (Uuid, Uuid, Decimal, Decimal)>(
            r#"
            SELECT po_id, item_id, qty_ordered, unit_price
            FROM purchase_order_lines
            WHERE po_id = ANY($1)
            ORDER BY po_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<PurchaseOrderLine>> = HashMap::new();
        for (po_id, item_id, qty_ordered, unit_price) in line_rows {
            lines.entry(po_id).or_default().push(PurchaseOrderLine {
                item_id,
                qty_ordered,
                unit_price,
            });
        }

        rows.into_iter()
            .map(|r| {
                Ok(PurchaseOrder {
                    items: lines.remove(&r.id).unwrap_or_default(),
                    status: OrderStatus::from_str(&r.status)
                        .ok_or_else(|| corrupt("order status", &r.status))?,
                    approval: approval_state(
                        &r.approval_status,
                        r.approval_level,
                        r.approval_stages,
                        r.flow_version,
                    )?,
                    id: r.id,
                    po_number: r.po_number,
                    order_date: r.order_date,
                    pr_id: r.pr_id,
                    supplier_id: r.supplier_id,
                    supplier_name: r.supplier_name,
                    tax_code: r.tax_code,
                    created_at: r.created_at,
                })
            })
            .collect()
    }

    async fn fetch_orders(conn: &mut PgConnection, filter: &str, id: Option<Uuid>) -> AppResult<Vec<PurchaseOrder>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM purchase_orders {} ORDER BY created_at DESC",
            ORDER_COLUMNS, filter
        ))
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Self::load_orders(conn, rows).await
    }

    async fn load_receipts(conn: &mut PgConnection, rows: Vec<ReceiptRow>) -> AppResult<Vec<GoodsReceiptNote>> {
        let ids: Vec<Uuid> = rows.iter().map(|r| r.0).collect();
        let line_rows = sqlx::query_as::<_, (Uuid, Uuid, Decimal)>(
            r#"
            SELECT grn_id, item_id, qty_received
            FROM goods_receipt_lines
            WHERE grn_id = ANY($1)
            ORDER BY grn_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&mut *conn)
        .await?;

        let mut lines: HashMap<Uuid, Vec<GoodsReceiptLine>> = HashMap::new();
        for (grn_id, item_id, qty_received) in line_rows {
            lines.entry(grn_id).or_default().push(GoodsReceiptLine {
                item_id,
                qty_received,
            });
        }

        rows.into_iter()
            .map(|r| {
                Ok(GoodsReceiptNote {
                    id: r.0,
                    grn_number: r.1,
                    po_id: r.2,
                    received_date: r.3,
                    notes: r.4,
                    status: ReceiptStatus::from_str(&r.5)
                        .ok_or_else(|| corrupt("receipt status", &r.5))?,
                    items: lines.remove(&r.0).unwrap_or_default(),
                    created_at: r.6,
                })
            })
            .collect()
    }

    async fn load_ledger(conn: &mut PgConnection, po_id: Uuid) -> AppResult<QuantityLedger> {
        let rows = sqlx::query_as::<_, (Uuid, Uuid, Decimal, Decimal)>(
            "SELECT po_id, item_id, ordered_qty, received_qty FROM quantity_ledger WHERE po_id = $1",
        )
        .bind(po_id)
        .fetch_all(&mut *conn)
        .await?;

        Ok(QuantityLedger::from_entries(rows.into_iter().map(
            |(po_id, item_id, ordered_qty, received_qty)| LedgerEntry {
                po_id,
                item_id,
                ordered_qty,
                received_qty,
            },
        )))
    }

    async fn stock_for(conn: &mut PgConnection, item_id: Uuid) -> AppResult<StockLevel> {
        let received = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(received_qty), 0) FROM quantity_ledger WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?;
        let issued = sqlx::query_scalar::<_, Decimal>(
            "SELECT COALESCE(SUM(qty_issued), 0) FROM material_request_lines WHERE item_id = $1",
        )
        .bind(item_id)
        .fetch_one(&mut *conn)
        .await?;
        Ok(StockLevel::new(item_id, received, issued))
    }

    async fn write_approval(
        conn: &mut PgConnection,
        table: &str,
        id: Uuid,
        approval: &ApprovalState,
    ) -> AppResult<()> {
        sqlx::query(&format!(
            "UPDATE {} SET approval_status = $2, approval_level = $3 WHERE id = $1",
            table
        ))
        .bind(id)
        .bind(approval.approval_status.as_str())
        .bind(approval.approval_level)
        .execute(&mut *conn)
        .await?;
        Ok(())
    }

    /// Locks the document row and returns its approval fields
    async fn lock_approval(conn: &mut PgConnection, table: &str, id: Uuid) -> AppResult<Option<ApprovalState>> {
        let row = sqlx::query_as::<_, (String, i32, Json<Vec<ApprovalStage>>, i32)>(&format!(
            "SELECT approval_status, approval_level, approval_stages, flow_version \
             FROM {} WHERE id = $1 FOR UPDATE",
            table
        ))
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;

        row.map(|(status, level, stages, version)| approval_state(&status, level, stages, version))
            .transpose()
    }
}

#[async_trait]
impl ProcurementStore for PgStore {
    async fn insert_item(&self, item: Item) -> AppResult<Item> {
        sqlx::query("INSERT INTO items (id, sku, name, uom, created_at) VALUES ($1, $2, $3, $4, $5)")
            .bind(item.id)
            .bind(&item.sku)
            .bind(&item.name)
            .bind(&item.uom)
            .bind(item.created_at)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                if is_unique_violation(&e) {
                    DomainError::conflict("sku", format!("Item sku {} already exists", item.sku)).into()
                } else {
                    AppError::from(e)
                }
            })?;
        Ok(item)
    }

    async fn get_item(&self, id: Uuid) -> AppResult<Option<Item>> {
        let row = sqlx::query_as::<_, ItemRow>(
            "SELECT id, sku, name, uom, created_at FROM items WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(item_from_row))
    }

    async fn list_items(&self) -> AppResult<Vec<Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, sku, name, uom, created_at FROM items ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(item_from_row).collect())
    }

    async fn items_by_id(&self, ids: &[Uuid]) -> AppResult<HashMap<Uuid, Item>> {
        let rows = sqlx::query_as::<_, ItemRow>(
            "SELECT id, sku, name, uom, created_at FROM items WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| (r.0, item_from_row(r)))
            .collect())
    }

    async fn insert_supplier(&self, supplier: Supplier) -> AppResult<Supplier> {
        sqlx::query("INSERT INTO suppliers (id, name, address, created_at) VALUES ($1, $2, $3, $4)")
            .bind(supplier.id)
            .bind(&supplier.name)
            .bind(&supplier.address)
            .bind(supplier.created_at)
            .execute(&self.pool)
            .await?;
        Ok(supplier)
    }

    async fn get_supplier(&self, id: Uuid) -> AppResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, address, created_at FROM suppliers WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(supplier_from_row))
    }

    async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(
            "SELECT id, name, address, created_at FROM suppliers ORDER BY name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(supplier_from_row).collect())
    }

    async fn append_tax_rate(&self, rate: TaxRate) -> AppResult<TaxRate> {
        sqlx::query(
            r#"
            INSERT INTO tax_rates (id, code, name, rate_percent, effective_date, is_active, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(rate.id)
        .bind(&rate.code)
        .bind(&rate.name)
        .bind(rate.rate_percent)
        .bind(rate.effective_date)
        .bind(rate.is_active)
        .bind(rate.created_at)
        .execute(&self.pool)
        .await?;
        Ok(rate)
    }

    async fn tax_rates(&self) -> AppResult<Vec<TaxRate>> {
        let rows = sqlx::query_as::<_, TaxRateRow>(
            r#"
            SELECT id, code, name, rate_percent, effective_date, is_active, created_at
            FROM tax_rates
            ORDER BY seq
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| TaxRate {
                id: r.0,
                code: r.1,
                name: r.2,
                rate_percent: r.3,
                effective_date: r.4,
                is_active: r.5,
                created_at: r.6,
            })
            .collect())
    }

    async fn current_flow(&self, doc_type: DocType) -> AppResult<Option<ApprovalFlow>> {
        let mut conn = self.pool.acquire().await?;
        Self::load_flow(&mut conn, doc_type).await
    }

    async fn save_flow(&self, doc_type: DocType, stages: Vec<StageInput>) -> AppResult<ApprovalFlow> {
        let mut tx = self.pool.begin().await?;

        let lock_key = FLOW_LOCK_KEY + matches!(doc_type, DocType::Po) as i64;
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(lock_key)
            .execute(&mut *tx)
            .await?;

        let previous = Self::load_flow(&mut tx, doc_type).await?.map(|f| f.version);
        let flow = ApprovalFlow::define(doc_type, &stages, previous)?;

        sqlx::query("INSERT INTO approval_flows (doc_type, version, stages, saved_at) VALUES ($1, $2, $3, $4)")
            .bind(doc_type.as_str())
            .bind(flow.version)
            .bind(Json(&flow.stages))
            .bind(flow.saved_at)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(flow)
    }

    async fn create_requisition(
        &self,
        input: CreateRequisitionInput,
        tax_percent: Option<Decimal>,
    ) -> AppResult<PurchaseRequisition> {
        let mut tx = self.pool.begin().await?;

        let flow = flow_or_implicit(Self::load_flow(&mut tx, DocType::Pr).await?, DocType::Pr);
        let pr = PurchaseRequisition::create(input, &flow, tax_percent)?;

        let ids: Vec<Uuid> = pr.items.iter().map(|l| l.item_id).collect();
        let known = Self::known_items(&mut tx, &ids).await?;
        ensure_items_exist(ids, |id| known.contains(id))?;

        sqlx::query(&format!(
            "INSERT INTO purchase_requisitions ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)",
            REQUISITION_COLUMNS
        ))
        .bind(pr.id)
        .bind(&pr.pr_number)
        .bind(&pr.requested_by)
        .bind(&pr.department)
        .bind(pr.requested_date)
        .bind(&pr.customer_name)
        .bind(&pr.customer_ref_no)
        .bind(&pr.supplier_name)
        .bind(&pr.supplier_address)
        .bind(&pr.tax_code)
        .bind(pr.tax_percent)
        .bind(&pr.notes)
        .bind(pr.status.as_str())
        .bind(pr.approval.approval_status.as_str())
        .bind(pr.approval.approval_level)
        .bind(Json(&pr.approval.approval_stages))
        .bind(pr.approval.flow_version)
        .bind(pr.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "Requisition", "pr_number", &pr.pr_number))?;

        for (line_no, line) in pr.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_requisition_lines
                    (pr_id, line_no, item_id, qty_bags, qty_kgs, unit_price, notes)
                VALUES ($1, $2, $3, $4, $5, $6, $7)
                "#,
            )
            .bind(pr.id)
            .bind(line_no as i32)
            .bind(line.item_id)
            .bind(line.quantity.bags())
            .bind(line.quantity.kgs())
            .bind(line.unit_price)
            .bind(&line.notes)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(pr)
    }

    async fn get_requisition(&self, id: Uuid) -> AppResult<Option<PurchaseRequisition>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_requisition(&mut conn, id).await
    }

    async fn list_requisitions(&self) -> AppResult<Vec<PurchaseRequisition>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, RequisitionRow>(&format!(
            "SELECT {} FROM purchase_requisitions ORDER BY created_at DESC",
            REQUISITION_COLUMNS
        ))
        .fetch_all(&mut *conn)
        .await?;
        Self::load_requisitions(&mut conn, rows).await
    }

    async fn decide_requisition(&self, id: Uuid, decision: Decision) -> AppResult<PurchaseRequisition> {
        let mut tx = self.pool.begin().await?;
        let mut approval = Self::lock_approval(&mut tx, "purchase_requisitions", id)
            .await?
            .ok_or_else(|| DomainError::not_found("Purchase requisition", id))?;
        approval.apply(decision)?;
        Self::write_approval(&mut tx, "purchase_requisitions", id, &approval).await?;
        let pr = Self::fetch_requisition(&mut tx, id).await?;
        tx.commit().await?;

        pr.ok_or_else(|| DomainError::not_found("Purchase requisition", id).into())
    }

    async fn create_purchase_order(&self, input: CreatePurchaseOrderInput) -> AppResult<PurchaseOrder> {
        let mut tx = self.pool.begin().await?;

        let requisition = match input.pr_id {
            Some(id) => Self::fetch_requisition(&mut tx, id).await?,
            None => None,
        };
        let supplier = match input.supplier_id {
            Some(id) => sqlx::query_as::<_, SupplierRow>(
                "SELECT id, name, address, created_at FROM suppliers WHERE id = $1",
            )
            .bind(id)
            .fetch_optional(&mut *tx)
            .await?
            .map(supplier_from_row),
            None => None,
        };
        let flow = flow_or_implicit(Self::load_flow(&mut tx, DocType::Po).await?, DocType::Po);
        let po = build_purchase_order(input, requisition.as_ref(), supplier.as_ref(), &flow)?;

        let ids: Vec<Uuid> = po.items.iter().map(|l| l.item_id).collect();
        let known = Self::known_items(&mut tx, &ids).await?;
        ensure_items_exist(ids, |id| known.contains(id))?;
        let ledger = open_ledger(&po)?;

        sqlx::query(&format!(
            "INSERT INTO purchase_orders ({}) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
            ORDER_COLUMNS
        ))
        .bind(po.id)
        .bind(&po.po_number)
        .bind(po.order_date)
        .bind(po.pr_id)
        .bind(po.supplier_id)
        .bind(&po.supplier_name)
        .bind(&po.tax_code)
        .bind(po.status.as_str())
        .bind(po.approval.approval_status.as_str())
        .bind(po.approval.approval_level)
        .bind(Json(&po.approval.approval_stages))
        .bind(po.approval.flow_version)
        .bind(po.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "Purchase order", "po_number", &po.po_number))?;

        for (line_no, line) in po.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO purchase_order_lines (po_id, line_no, item_id, qty_ordered, unit_price)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(po.id)
            .bind(line_no as i32)
            .bind(line.item_id)
            .bind(line.qty_ordered)
            .bind(line.unit_price)
            .execute(&mut *tx)
            .await?;
        }

        for entry in ledger.entries_for_order(po.id) {
            sqlx::query(
                "INSERT INTO quantity_ledger (po_id, item_id, ordered_qty, received_qty) VALUES ($1, $2, $3, $4)",
            )
            .bind(entry.po_id)
            .bind(entry.item_id)
            .bind(entry.ordered_qty)
            .bind(entry.received_qty)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(po)
    }

    async fn get_purchase_order(&self, id: Uuid) -> AppResult<Option<PurchaseOrder>> {
        let mut conn = self.pool.acquire().await?;
        Ok(Self::fetch_orders(&mut conn, "WHERE id = $1", Some(id)).await?.pop())
    }

    async fn list_purchase_orders(&self) -> AppResult<Vec<PurchaseOrder>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_orders(&mut conn, "WHERE $1::uuid IS NULL", None).await
    }

    async fn orders_for_requisition(&self, pr_id: Uuid) -> AppResult<Vec<PurchaseOrder>> {
        let mut conn = self.pool.acquire().await?;
        Self::fetch_orders(&mut conn, "WHERE pr_id = $1", Some(pr_id)).await
    }

    async fn decide_purchase_order(&self, id: Uuid, decision: Decision) -> AppResult<PurchaseOrder> {
        let mut tx = self.pool.begin().await?;
        let mut approval = Self::lock_approval(&mut tx, "purchase_orders", id)
            .await?
            .ok_or_else(|| DomainError::not_found("Purchase order", id))?;
        approval.apply(decision)?;
        Self::write_approval(&mut tx, "purchase_orders", id, &approval).await?;
        let po = Self::fetch_orders(&mut tx, "WHERE id = $1", Some(id)).await?.pop();
        tx.commit().await?;

        po.ok_or_else(|| DomainError::not_found("Purchase order", id).into())
    }

    async fn create_goods_receipt(&self, grn: GoodsReceiptNote) -> AppResult<GoodsReceiptNote> {
        let mut tx = self.pool.begin().await?;

        // Serializes receipts against the same order
        sqlx::query_scalar::<_, Uuid>("SELECT id FROM purchase_orders WHERE id = $1 FOR UPDATE")
            .bind(grn.po_id)
            .fetch_optional(&mut *tx)
            .await?
            .ok_or_else(|| DomainError::not_found("Purchase order", grn.po_id))?;

        let mut ledger = Self::load_ledger(&mut tx, grn.po_id).await?;
        ledger.receive(grn.po_id, &grn.items)?;

        for (item_id, _) in aggregate(&grn.items) {
            sqlx::query(
                "UPDATE quantity_ledger SET received_qty = $3 WHERE po_id = $1 AND item_id = $2",
            )
            .bind(grn.po_id)
            .bind(item_id)
            .bind(ledger.received(grn.po_id, item_id))
            .execute(&mut *tx)
            .await?;
        }

        sqlx::query("UPDATE purchase_orders SET status = $2 WHERE id = $1")
            .bind(grn.po_id)
            .bind(ledger.order_status(grn.po_id).as_str())
            .execute(&mut *tx)
            .await?;

        sqlx::query(
            r#"
            INSERT INTO goods_receipts (id, grn_number, po_id, received_date, notes, status, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(grn.id)
        .bind(&grn.grn_number)
        .bind(grn.po_id)
        .bind(grn.received_date)
        .bind(&grn.notes)
        .bind(grn.status.as_str())
        .bind(grn.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "Goods receipt", "grn_number", &grn.grn_number))?;

        for (line_no, line) in grn.items.iter().enumerate() {
            sqlx::query(
                "INSERT INTO goods_receipt_lines (grn_id, line_no, item_id, qty_received) VALUES ($1, $2, $3, $4)",
            )
            .bind(grn.id)
            .bind(line_no as i32)
            .bind(line.item_id)
            .bind(line.qty_received)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(grn)
    }

    async fn get_goods_receipt(&self, id: Uuid) -> AppResult<Option<GoodsReceiptNote>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT id, grn_number, po_id, received_date, notes, status, created_at
            FROM goods_receipts
            WHERE id = $1
            "#,
        )
        .bind(id)
        .fetch_all(&mut *conn)
        .await?;
        Ok(Self::load_receipts(&mut conn, rows).await?.pop())
    }

    async fn list_goods_receipts(&self, po_id: Option<Uuid>) -> AppResult<Vec<GoodsReceiptNote>> {
        let mut conn = self.pool.acquire().await?;
        let rows = sqlx::query_as::<_, ReceiptRow>(
            r#"
            SELECT id, grn_number, po_id, received_date, notes, status, created_at
            FROM goods_receipts
            WHERE $1::uuid IS NULL OR po_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(po_id)
        .fetch_all(&mut *conn)
        .await?;
        Self::load_receipts(&mut conn, rows).await
    }

    async fn ledger_for_order(&self, po_id: Uuid) -> AppResult<QuantityLedger> {
        let mut conn = self.pool.acquire().await?;
        Self::load_ledger(&mut conn, po_id).await
    }

    async fn create_material_request(&self, mr: MaterialRequest) -> AppResult<MaterialRequest> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(STOCK_LOCK_KEY)
            .execute(&mut *tx)
            .await?;

        let ids: Vec<Uuid> = mr.items.iter().map(|l| l.item_id).collect();
        let known = Self::known_items(&mut tx, &ids).await?;
        ensure_items_exist(ids, |id| known.contains(id))?;

        let mut stock = HashMap::new();
        for item_id in mr.issued_by_item().into_keys() {
            stock.insert(item_id, Self::stock_for(&mut tx, item_id).await?);
        }
        mr.check_against_stock(&stock)?;

        sqlx::query(
            r#"
            INSERT INTO material_requests (id, mr_number, department, requested_by, notes, created_at)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(mr.id)
        .bind(&mr.mr_number)
        .bind(&mr.department)
        .bind(&mr.requested_by)
        .bind(&mr.notes)
        .bind(mr.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| unique_violation(e, "Material request", "mr_number", &mr.mr_number))?;

        for (line_no, line) in mr.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO material_request_lines (mr_id, line_no, item_id, qty_requested, qty_issued)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(mr.id)
            .bind(line_no as i32)
            .bind(line.item_id)
            .bind(line.qty_requested)
            .bind(line.qty_issued)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(mr)
    }

    async fn list_material_requests(&self) -> AppResult<Vec<MaterialRequest>> {
        let rows = sqlx::query_as::<_, MaterialRequestRow>(
            r#"
            SELECT id, mr_number, department, requested_by, notes, created_at
            FROM material_requests
            ORDER BY created_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        let ids: Vec<Uuid> = rows.iter().map(|r| r.0).collect();
        let line_rows = sqlx::query_as::<_, (Uuid, Uuid, Decimal, Decimal)>(
            r#"
            SELECT mr_id, item_id, qty_requested, qty_issued
            FROM material_request_lines
            WHERE mr_id = ANY($1)
            ORDER BY mr_id, line_no
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await?;

        let mut lines: HashMap<Uuid, Vec<MaterialRequestLine>> = HashMap::new();
        for (mr_id, item_id, qty_requested, qty_issued) in line_rows {
            lines.entry(mr_id).or_default().push(MaterialRequestLine {
                item_id,
                qty_requested,
                qty_issued,
            });
        }

        Ok(rows
            .into_iter()
            .map(|r| MaterialRequest {
                id: r.0,
                mr_number: r.1,
                department: r.2,
                requested_by: r.3,
                notes: r.4,
                items: lines.remove(&r.0).unwrap_or_default(),
                created_at: r.5,
            })
            .collect())
    }

    async fn stock_level(&self, item_id: Uuid) -> AppResult<StockLevel> {
        let mut conn = self.pool.acquire().await?;
        Self::stock_for(&mut conn, item_id).await
    }
}
