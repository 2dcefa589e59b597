//! PostgreSQL-backed store
//!
//! Writes go through SeaORM active models with `ON CONFLICT` upserts on the
//! primary connection; reads are hand-written joins against the read
//! connection so filtering, sorting and pagination stay in one statement.

use crate::db::models::*;
use crate::db::query::{
    InvoicePage, InvoiceQuery, InvoiceScope, InvoiceView, LineItemTotal, PartyRef, PaymentDue,
    SortColumn, SortOrder, CREDIT_NOTE,
};
use crate::db::records::{
    CustomerRecord, DocumentRecord, InvoiceRecord, LineItemRecord, PaymentRecord, SummaryRecord,
    VendorRecord,
};
use crate::db::store::{Store, StoreTransaction};
use crate::db::DbPool;
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use sea_orm::sea_query::OnConflict;
use sea_orm::{
    ActiveValue::NotSet, ColumnTrait, ConnectionTrait, DatabaseConnection, DatabaseTransaction,
    DbBackend, EntityTrait, FromQueryResult, JsonValue, QueryFilter, Set, Statement,
    TransactionTrait, Value,
};

/// Joined columns behind every invoice read
const INVOICE_VIEW_SELECT: &str = r#"
    SELECT d.id AS invoice_id,
           i.invoice_id AS invoice_number,
           i.invoice_date,
           s.invoice_total,
           s.document_type,
           s.currency_symbol AS currency,
           v.id AS vendor_id,
           v.vendor_name,
           c.id AS customer_id,
           c.customer_name,
           p.due_date,
           p.discounted_total
    FROM documents d
    LEFT JOIN invoices i ON i.document_id = d.id
    LEFT JOIN summaries s ON s.document_id = d.id
    LEFT JOIN vendors v ON v.document_id = d.id
    LEFT JOIN customers c ON c.document_id = d.id
    LEFT JOIN payments p ON p.document_id = d.id
"#;

const INVOICE_VIEW_COUNT: &str = r#"
    SELECT COUNT(*) AS total
    FROM documents d
    LEFT JOIN invoices i ON i.document_id = d.id
    LEFT JOIN summaries s ON s.document_id = d.id
    LEFT JOIN vendors v ON v.document_id = d.id
    LEFT JOIN customers c ON c.document_id = d.id
"#;

#[derive(Debug, FromQueryResult)]
struct InvoiceViewRow {
    invoice_id: String,
    invoice_number: Option<String>,
    invoice_date: Option<NaiveDate>,
    invoice_total: Option<Decimal>,
    document_type: Option<String>,
    currency: Option<String>,
    vendor_id: Option<i32>,
    vendor_name: Option<String>,
    customer_id: Option<i32>,
    customer_name: Option<String>,
    due_date: Option<NaiveDate>,
    discounted_total: Option<Decimal>,
}

impl From<InvoiceViewRow> for InvoiceView {
    fn from(row: InvoiceViewRow) -> Self {
        InvoiceView {
            invoice_id: row.invoice_id,
            invoice_number: row.invoice_number,
            invoice_date: row.invoice_date,
            invoice_total: row.invoice_total,
            document_type: row.document_type,
            currency: row.currency,
            vendor: row.vendor_id.map(|id| PartyRef {
                id,
                name: row.vendor_name,
            }),
            customer: row.customer_id.map(|id| PartyRef {
                id,
                name: row.customer_name,
            }),
            due_date: row.due_date,
            discounted_total: row.discounted_total,
        }
    }
}

#[derive(Debug, FromQueryResult)]
struct CountRow {
    total: i64,
}

#[derive(Debug, FromQueryResult)]
struct PaymentDueRow {
    document_id: String,
    due_date: NaiveDate,
    discounted_total: Option<Decimal>,
    invoice_total: Option<Decimal>,
}

#[derive(Debug, FromQueryResult)]
struct LineItemTotalRow {
    general_ledger_account: Option<String>,
    total_price: Option<Decimal>,
}

/// WHERE clause accumulator with positional parameters
#[derive(Default)]
struct Conditions {
    clauses: Vec<String>,
    values: Vec<Value>,
}

impl Conditions {
    fn base() -> Self {
        Self {
            clauses: vec!["(i.id IS NOT NULL OR s.id IS NOT NULL)".to_string()],
            values: Vec::new(),
        }
    }

    /// Register a value and return its placeholder
    fn bind(&mut self, value: impl Into<Value>) -> String {
        self.values.push(value.into());
        format!("${}", self.values.len())
    }

    fn push(&mut self, clause: String) {
        self.clauses.push(clause);
    }

    fn where_sql(&self) -> String {
        format!("WHERE {}", self.clauses.join(" AND "))
    }
}

/// Escape LIKE wildcards so user text matches literally
fn like_pattern(needle: &str) -> String {
    let escaped = needle
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{}%", escaped)
}

fn order_by_sql(column: SortColumn, order: SortOrder) -> String {
    let expr = match column {
        SortColumn::InvoiceDate => "i.invoice_date",
        SortColumn::InvoiceNumber => "i.invoice_id COLLATE \"C\"",
        SortColumn::Amount => "s.invoice_total",
        SortColumn::VendorName => "v.vendor_name COLLATE \"C\"",
        SortColumn::CustomerName => "c.customer_name COLLATE \"C\"",
        SortColumn::DueDate => "p.due_date",
    };
    let direction = match order {
        SortOrder::Asc => "ASC NULLS LAST",
        SortOrder::Desc => "DESC NULLS FIRST",
    };
    format!("ORDER BY {} {}, d.id ASC", expr, direction)
}

/// Repository for data access operations
#[derive(Clone)]
pub struct Repository {
    pool: DbPool,
}

impl Repository {
    /// Create a new repository with the given connection pool
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    /// Get the read connection
    fn read_conn(&self) -> &DatabaseConnection {
        self.pool.read()
    }

    /// Get the write connection
    fn write_conn(&self) -> &DatabaseConnection {
        self.pool.write()
    }

    /// Create missing tables and indexes
    pub async fn create_schema(&self) -> Result<()> {
        crate::db::schema::create_schema(self.write_conn()).await
    }
}

#[async_trait]
impl Store for Repository {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        let txn = self.write_conn().begin().await?;
        Ok(Box::new(PgTransaction { txn: Some(txn) }))
    }

    // ========================================================================
    // Aggregation Scans
    // ========================================================================

    async fn invoice_rows(&self, scope: &InvoiceScope) -> Result<Vec<InvoiceView>> {
        let mut conditions = Conditions::base();

        if scope.spend_only {
            let credit = conditions.bind(CREDIT_NOTE);
            conditions.push(format!(
                "s.invoice_total IS NOT NULL AND s.document_type IS DISTINCT FROM {}",
                credit
            ));
        }
        if let Some(from) = scope.invoice_date_from {
            let p = conditions.bind(from);
            conditions.push(format!("i.invoice_date >= {}", p));
        }
        if let Some(before) = scope.invoice_date_before {
            let p = conditions.bind(before);
            conditions.push(format!("i.invoice_date < {}", p));
        }

        let sql = format!(
            "{} {} ORDER BY d.id ASC",
            INVOICE_VIEW_SELECT,
            conditions.where_sql()
        );
        let rows = InvoiceViewRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            sql,
            conditions.values,
        ))
        .all(self.read_conn())
        .await?;

        Ok(rows.into_iter().map(InvoiceView::from).collect())
    }

    // ========================================================================
    // Invoice Listing
    // ========================================================================

    async fn search_invoices(&self, query: &InvoiceQuery) -> Result<InvoicePage> {
        let filter = &query.filter;
        let mut conditions = Conditions::base();

        if let Some(ref vendor) = filter.vendor {
            let p = conditions.bind(like_pattern(vendor));
            conditions.push(format!("v.vendor_name ILIKE {}", p));
        }
        if let Some(ref number) = filter.invoice_number {
            let p = conditions.bind(like_pattern(number));
            conditions.push(format!("i.invoice_id ILIKE {}", p));
        }
        if let Some(from) = filter.date_from {
            let p = conditions.bind(from);
            conditions.push(format!("i.invoice_date >= {}", p));
        }
        if let Some(to) = filter.date_to {
            let p = conditions.bind(to);
            conditions.push(format!("i.invoice_date <= {}", p));
        }
        if let Some(min) = filter.min_amount {
            let p = conditions.bind(min);
            conditions.push(format!("s.invoice_total >= {}", p));
        }
        if let Some(max) = filter.max_amount {
            let p = conditions.bind(max);
            conditions.push(format!("s.invoice_total <= {}", p));
        }
        if let Some(ref search) = filter.search {
            let p = conditions.bind(like_pattern(search));
            conditions.push(format!(
                "(i.invoice_id ILIKE {p} OR v.vendor_name ILIKE {p} OR c.customer_name ILIKE {p})"
            ));
        }

        let count_sql = format!("{} {}", INVOICE_VIEW_COUNT, conditions.where_sql());
        let total = CountRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            count_sql,
            conditions.values.clone(),
        ))
        .one(self.read_conn())
        .await?
        .map(|row| row.total.max(0) as u64)
        .unwrap_or(0);

        let where_sql = conditions.where_sql();
        let limit = conditions.bind(query.limit as i64);
        let offset = conditions.bind(query.offset as i64);
        let page_sql = format!(
            "{} {} {} LIMIT {} OFFSET {}",
            INVOICE_VIEW_SELECT,
            where_sql,
            order_by_sql(query.sort.column, query.sort.order),
            limit,
            offset
        );
        let rows = InvoiceViewRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            page_sql,
            conditions.values,
        ))
        .all(self.read_conn())
        .await?;

        Ok(InvoicePage {
            total,
            rows: rows.into_iter().map(InvoiceView::from).collect(),
        })
    }

    async fn line_item_totals(&self) -> Result<Vec<LineItemTotal>> {
        let rows = LineItemTotalRow::find_by_statement(Statement::from_string(
            DbBackend::Postgres,
            "SELECT general_ledger_account, total_price FROM line_items",
        ))
        .all(self.read_conn())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| LineItemTotal {
                general_ledger_account: row.general_ledger_account,
                total_price: row.total_price,
            })
            .collect())
    }

    async fn payments_due(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PaymentDue>> {
        let rows = PaymentDueRow::find_by_statement(Statement::from_sql_and_values(
            DbBackend::Postgres,
            r#"
            SELECT p.document_id, p.due_date, p.discounted_total, s.invoice_total
            FROM payments p
            LEFT JOIN summaries s ON s.document_id = p.document_id
            WHERE p.due_date >= $1 AND p.due_date <= $2
            ORDER BY p.due_date ASC, p.document_id ASC
            "#,
            [from.into(), to.into()],
        ))
        .all(self.read_conn())
        .await?;

        Ok(rows
            .into_iter()
            .map(|row| PaymentDue {
                document_id: row.document_id,
                due_date: row.due_date,
                discounted_total: row.discounted_total,
                invoice_total: row.invoice_total,
            })
            .collect())
    }

    // ========================================================================
    // Assistant SQL
    // ========================================================================

    async fn run_read_only(&self, sql: &str, max_rows: usize) -> Result<Vec<serde_json::Value>> {
        let txn = self.read_conn().begin().await?;
        txn.execute_unprepared("SET TRANSACTION READ ONLY").await?;
        txn.execute_unprepared("SET LOCAL statement_timeout = '15s'").await?;

        let wrapped = format!(
            "SELECT * FROM ({}) AS assistant_query LIMIT {}",
            sql, max_rows
        );
        let rows = JsonValue::find_by_statement(Statement::from_string(DbBackend::Postgres, wrapped))
            .all(&txn)
            .await;

        txn.rollback().await?;
        Ok(rows?)
    }

    async fn ping(&self) -> Result<()> {
        self.pool.ping().await
    }
}

/// One document's writes inside a database transaction
struct PgTransaction {
    txn: Option<DatabaseTransaction>,
}

impl PgTransaction {
    fn conn(&self) -> Result<&DatabaseTransaction> {
        self.txn.as_ref().ok_or_else(|| AppError::Internal {
            message: "transaction already finished".to_string(),
        })
    }
}

#[async_trait]
impl StoreTransaction for PgTransaction {
    async fn ensure_organization(&mut self, id: &str) -> Result<()> {
        self.conn()?
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO organizations (id)
                VALUES ($1)
                ON CONFLICT (id) DO NOTHING
                "#,
                vec![id.into()],
            ))
            .await?;
        Ok(())
    }

    async fn ensure_department(&mut self, id: &str, organization_id: &str) -> Result<()> {
        self.conn()?
            .execute(Statement::from_sql_and_values(
                DbBackend::Postgres,
                r#"
                INSERT INTO departments (id, organization_id)
                VALUES ($1, $2)
                ON CONFLICT (id) DO NOTHING
                "#,
                vec![id.into(), organization_id.into()],
            ))
            .await?;
        Ok(())
    }

    async fn upsert_document(&mut self, document: &DocumentRecord) -> Result<()> {
        let now = Utc::now();
        let model = DocumentActiveModel {
            id: Set(document.id.clone()),
            name: Set(document.name.clone()),
            file_path: Set(document.file_path.clone()),
            file_size: Set(document.file_size),
            file_type: Set(document.file_type.clone()),
            status: Set(document.status.clone()),
            organization_id: Set(document.organization_id.clone()),
            department_id: Set(document.department_id.clone()),
            uploaded_by_id: Set(document.uploaded_by_id.clone()),
            is_validated_by_human: Set(document.is_validated_by_human),
            created_at: Set(document.created_at.unwrap_or(now)),
            updated_at: Set(document.updated_at.unwrap_or(now)),
            processed_at: Set(document.processed_at),
            analytics_id: Set(document.analytics_id.clone()),
            original_file_name: Set(document.original_file_name.clone()),
            template_name: Set(document.template_name.clone()),
        };

        // created_at keeps its first-insert value
        DocumentEntity::insert(model)
            .on_conflict(
                OnConflict::column(DocumentColumn::Id)
                    .update_columns([
                        DocumentColumn::Name,
                        DocumentColumn::FilePath,
                        DocumentColumn::FileSize,
                        DocumentColumn::FileType,
                        DocumentColumn::Status,
                        DocumentColumn::OrganizationId,
                        DocumentColumn::DepartmentId,
                        DocumentColumn::UploadedById,
                        DocumentColumn::IsValidatedByHuman,
                        DocumentColumn::UpdatedAt,
                        DocumentColumn::ProcessedAt,
                        DocumentColumn::AnalyticsId,
                        DocumentColumn::OriginalFileName,
                        DocumentColumn::TemplateName,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn()?)
            .await?;
        Ok(())
    }

    async fn upsert_vendor(&mut self, document_id: &str, vendor: &VendorRecord) -> Result<()> {
        let model = VendorActiveModel {
            id: NotSet,
            document_id: Set(document_id.to_string()),
            vendor_name: Set(vendor.vendor_name.clone()),
            vendor_party_number: Set(vendor.vendor_party_number.clone()),
            vendor_address: Set(vendor.vendor_address.clone()),
            vendor_tax_id: Set(vendor.vendor_tax_id.clone()),
            confidence_name: Set(vendor.confidence_name),
            confidence_address: Set(vendor.confidence_address),
            confidence_tax_id: Set(vendor.confidence_tax_id),
        };

        VendorEntity::insert(model)
            .on_conflict(
                OnConflict::column(VendorColumn::DocumentId)
                    .update_columns([
                        VendorColumn::VendorName,
                        VendorColumn::VendorPartyNumber,
                        VendorColumn::VendorAddress,
                        VendorColumn::VendorTaxId,
                        VendorColumn::ConfidenceName,
                        VendorColumn::ConfidenceAddress,
                        VendorColumn::ConfidenceTaxId,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn()?)
            .await?;
        Ok(())
    }

    async fn upsert_customer(&mut self, document_id: &str, customer: &CustomerRecord) -> Result<()> {
        let model = CustomerActiveModel {
            id: NotSet,
            document_id: Set(document_id.to_string()),
            customer_name: Set(customer.customer_name.clone()),
            customer_address: Set(customer.customer_address.clone()),
            confidence_name: Set(customer.confidence_name),
            confidence_address: Set(customer.confidence_address),
        };

        CustomerEntity::insert(model)
            .on_conflict(
                OnConflict::column(CustomerColumn::DocumentId)
                    .update_columns([
                        CustomerColumn::CustomerName,
                        CustomerColumn::CustomerAddress,
                        CustomerColumn::ConfidenceName,
                        CustomerColumn::ConfidenceAddress,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn()?)
            .await?;
        Ok(())
    }

    async fn upsert_invoice(&mut self, document_id: &str, invoice: &InvoiceRecord) -> Result<()> {
        let model = InvoiceActiveModel {
            id: NotSet,
            document_id: Set(document_id.to_string()),
            invoice_id: Set(invoice.invoice_id.clone()),
            invoice_date: Set(invoice.invoice_date),
            delivery_date: Set(invoice.delivery_date),
            confidence_invoice_id: Set(invoice.confidence_invoice_id),
            confidence_invoice_date: Set(invoice.confidence_invoice_date),
            confidence_delivery_date: Set(invoice.confidence_delivery_date),
        };

        InvoiceEntity::insert(model)
            .on_conflict(
                OnConflict::column(InvoiceColumn::DocumentId)
                    .update_columns([
                        InvoiceColumn::InvoiceId,
                        InvoiceColumn::InvoiceDate,
                        InvoiceColumn::DeliveryDate,
                        InvoiceColumn::ConfidenceInvoiceId,
                        InvoiceColumn::ConfidenceInvoiceDate,
                        InvoiceColumn::ConfidenceDeliveryDate,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn()?)
            .await?;
        Ok(())
    }

    async fn upsert_payment(&mut self, document_id: &str, payment: &PaymentRecord) -> Result<()> {
        let model = PaymentActiveModel {
            id: NotSet,
            document_id: Set(document_id.to_string()),
            due_date: Set(payment.due_date),
            payment_terms: Set(payment.payment_terms.clone()),
            bank_account_number: Set(payment.bank_account_number.clone()),
            bic: Set(payment.bic.clone()),
            account_name: Set(payment.account_name.clone()),
            net_days: Set(payment.net_days),
            discount_percentage: Set(payment.discount_percentage),
            discount_days: Set(payment.discount_days),
            discount_due_date: Set(payment.discount_due_date),
            discounted_total: Set(payment.discounted_total),
            confidence_payment_terms: Set(payment.confidence_payment_terms),
            confidence_bank_account: Set(payment.confidence_bank_account),
            confidence_due_date: Set(payment.confidence_due_date),
        };

        PaymentEntity::insert(model)
            .on_conflict(
                OnConflict::column(PaymentColumn::DocumentId)
                    .update_columns([
                        PaymentColumn::DueDate,
                        PaymentColumn::PaymentTerms,
                        PaymentColumn::BankAccountNumber,
                        PaymentColumn::Bic,
                        PaymentColumn::AccountName,
                        PaymentColumn::NetDays,
                        PaymentColumn::DiscountPercentage,
                        PaymentColumn::DiscountDays,
                        PaymentColumn::DiscountDueDate,
                        PaymentColumn::DiscountedTotal,
                        PaymentColumn::ConfidencePaymentTerms,
                        PaymentColumn::ConfidenceBankAccount,
                        PaymentColumn::ConfidenceDueDate,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn()?)
            .await?;
        Ok(())
    }

    async fn upsert_summary(&mut self, document_id: &str, summary: &SummaryRecord) -> Result<()> {
        let model = SummaryActiveModel {
            id: NotSet,
            document_id: Set(document_id.to_string()),
            document_type: Set(summary.document_type.clone()),
            sub_total: Set(summary.sub_total),
            total_tax: Set(summary.total_tax),
            invoice_total: Set(summary.invoice_total),
            currency_symbol: Set(summary.currency_symbol.clone()),
            confidence_sub_total: Set(summary.confidence_sub_total),
            confidence_total_tax: Set(summary.confidence_total_tax),
            confidence_invoice_total: Set(summary.confidence_invoice_total),
        };

        SummaryEntity::insert(model)
            .on_conflict(
                OnConflict::column(SummaryColumn::DocumentId)
                    .update_columns([
                        SummaryColumn::DocumentType,
                        SummaryColumn::SubTotal,
                        SummaryColumn::TotalTax,
                        SummaryColumn::InvoiceTotal,
                        SummaryColumn::CurrencySymbol,
                        SummaryColumn::ConfidenceSubTotal,
                        SummaryColumn::ConfidenceTotalTax,
                        SummaryColumn::ConfidenceInvoiceTotal,
                    ])
                    .to_owned(),
            )
            .exec_without_returning(self.conn()?)
            .await?;
        Ok(())
    }

    async fn replace_line_items(&mut self, document_id: &str, items: &[LineItemRecord]) -> Result<()> {
        let conn = self.conn()?;

        LineItemEntity::delete_many()
            .filter(LineItemColumn::DocumentId.eq(document_id))
            .exec(conn)
            .await?;

        if items.is_empty() {
            return Ok(());
        }

        let models = items.iter().map(|item| LineItemActiveModel {
            id: NotSet,
            document_id: Set(document_id.to_string()),
            sr_no: Set(item.sr_no),
            description: Set(item.description.clone()),
            quantity: Set(item.quantity),
            unit_price: Set(item.unit_price),
            total_price: Set(item.total_price),
            general_ledger_account: Set(item.general_ledger_account.clone()),
            tax_key: Set(item.tax_key.clone()),
            vat_rate: Set(item.vat_rate),
            vat_amount: Set(item.vat_amount),
            confidence_description: Set(item.confidence_description),
            confidence_quantity: Set(item.confidence_quantity),
            confidence_unit_price: Set(item.confidence_unit_price),
            confidence_total_price: Set(item.confidence_total_price),
        });

        LineItemEntity::insert_many(models)
            .exec_without_returning(conn)
            .await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.commit().await?;
        }
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        if let Some(txn) = self.txn.take() {
            txn.rollback().await?;
        }
        Ok(())
    }
}
