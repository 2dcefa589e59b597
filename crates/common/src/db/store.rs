//! Storage abstraction shared by ingestion and the query layer
//!
//! `Repository` implements it over PostgreSQL and `MemoryStore` keeps
//! everything in process for tests and local runs.

use crate::db::query::{
    InvoicePage, InvoiceQuery, InvoiceScope, InvoiceView, LineItemTotal, PaymentDue,
};
use crate::db::records::{
    CustomerRecord, DocumentRecord, InvoiceRecord, LineItemRecord, PaymentRecord, SummaryRecord,
    VendorRecord,
};
use crate::errors::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait Store: Send + Sync {
    /// Open a write transaction. Nothing becomes visible until `commit`.
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>>;

    /// Every invoice row admitted by `scope`, ordered by invoice id
    async fn invoice_rows(&self, scope: &InvoiceScope) -> Result<Vec<InvoiceView>>;

    /// One filtered, sorted page of invoice rows plus the unpaginated count
    async fn search_invoices(&self, query: &InvoiceQuery) -> Result<InvoicePage>;

    /// Ledger account and total of every stored line item
    async fn line_item_totals(&self) -> Result<Vec<LineItemTotal>>;

    /// Payments due in `[from, to]`, ordered by due date then document id
    async fn payments_due(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PaymentDue>>;

    /// Run a vetted read-only statement and return at most `max_rows` rows
    async fn run_read_only(&self, sql: &str, max_rows: usize) -> Result<Vec<serde_json::Value>>;

    /// Check connectivity
    async fn ping(&self) -> Result<()>;
}

/// Writes for a single document, applied atomically on `commit`.
///
/// Child upserts are keyed by document id; dropping the transaction without
/// committing discards every write.
#[async_trait]
pub trait StoreTransaction: Send {
    /// Insert the organization if it does not exist; never updates
    async fn ensure_organization(&mut self, id: &str) -> Result<()>;

    /// Insert the department if it does not exist; never updates
    async fn ensure_department(&mut self, id: &str, organization_id: &str) -> Result<()>;

    /// Upsert by id. `created_at` is only written on insert.
    async fn upsert_document(&mut self, document: &DocumentRecord) -> Result<()>;

    async fn upsert_vendor(&mut self, document_id: &str, vendor: &VendorRecord) -> Result<()>;

    async fn upsert_customer(&mut self, document_id: &str, customer: &CustomerRecord) -> Result<()>;

    async fn upsert_invoice(&mut self, document_id: &str, invoice: &InvoiceRecord) -> Result<()>;

    async fn upsert_payment(&mut self, document_id: &str, payment: &PaymentRecord) -> Result<()>;

    async fn upsert_summary(&mut self, document_id: &str, summary: &SummaryRecord) -> Result<()>;

    /// Delete the document's line items, then insert `items`
    async fn replace_line_items(&mut self, document_id: &str, items: &[LineItemRecord]) -> Result<()>;

    async fn commit(&mut self) -> Result<()>;

    async fn rollback(&mut self) -> Result<()>;
}
