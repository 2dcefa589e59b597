//! In-process store
//!
//! Keeps every table in ordered maps behind one `RwLock`. Transactions buffer
//! their writes and apply them to a copy of the state under the write lock at
//! commit, so a failing write leaves the store untouched. Referential rules
//! match the PostgreSQL schema: departments need their organization,
//! documents need the organization and department they name, and child rows
//! need their document.

use crate::db::query::{
    InvoicePage, InvoiceQuery, InvoiceScope, InvoiceView, LineItemTotal, PartyRef, PaymentDue,
};
use crate::db::records::{
    CustomerRecord, DocumentRecord, InvoiceRecord, LineItemRecord, PaymentRecord, SummaryRecord,
    VendorRecord,
};
use crate::db::store::{Store, StoreTransaction};
use crate::errors::{AppError, Result};
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Shared in-memory store; clones see the same data
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<State>>,
}

/// Point-in-time copy of the stored entities, without surrogate ids
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemorySnapshot {
    pub organizations: BTreeSet<String>,
    pub departments: BTreeMap<String, String>,
    pub documents: BTreeMap<String, DocumentRecord>,
    pub vendors: BTreeMap<String, VendorRecord>,
    pub customers: BTreeMap<String, CustomerRecord>,
    pub invoices: BTreeMap<String, InvoiceRecord>,
    pub payments: BTreeMap<String, PaymentRecord>,
    pub summaries: BTreeMap<String, SummaryRecord>,
    pub line_items: BTreeMap<String, Vec<LineItemRecord>>,
}

#[derive(Debug, Clone, Default)]
struct State {
    organizations: BTreeSet<String>,
    departments: BTreeMap<String, String>,
    documents: BTreeMap<String, DocumentRecord>,
    vendors: BTreeMap<String, Keyed<VendorRecord>>,
    customers: BTreeMap<String, Keyed<CustomerRecord>>,
    invoices: BTreeMap<String, Keyed<InvoiceRecord>>,
    payments: BTreeMap<String, Keyed<PaymentRecord>>,
    summaries: BTreeMap<String, Keyed<SummaryRecord>>,
    line_items: BTreeMap<String, Vec<Keyed<LineItemRecord>>>,
    last_id: i32,
}

#[derive(Debug, Clone)]
struct Keyed<T> {
    id: i32,
    record: T,
}

#[derive(Debug, Clone)]
enum WriteOp {
    Organization(String),
    Department { id: String, organization_id: String },
    Document(DocumentRecord),
    Vendor(String, VendorRecord),
    Customer(String, CustomerRecord),
    Invoice(String, InvoiceRecord),
    Payment(String, PaymentRecord),
    Summary(String, SummaryRecord),
    LineItems(String, Vec<LineItemRecord>),
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> MemorySnapshot {
        let state = self.state.read().await;
        MemorySnapshot {
            organizations: state.organizations.clone(),
            departments: state.departments.clone(),
            documents: state.documents.clone(),
            vendors: strip(&state.vendors),
            customers: strip(&state.customers),
            invoices: strip(&state.invoices),
            payments: strip(&state.payments),
            summaries: strip(&state.summaries),
            line_items: state
                .line_items
                .iter()
                .map(|(doc, items)| (doc.clone(), items.iter().map(|i| i.record.clone()).collect()))
                .collect(),
        }
    }
}

fn strip<T: Clone>(table: &BTreeMap<String, Keyed<T>>) -> BTreeMap<String, T> {
    table
        .iter()
        .map(|(doc, keyed)| (doc.clone(), keyed.record.clone()))
        .collect()
}

impl State {
    fn next_id(&mut self) -> i32 {
        self.last_id += 1;
        self.last_id
    }

    fn require_document(&self, document_id: &str) -> Result<()> {
        if self.documents.contains_key(document_id) {
            Ok(())
        } else {
            Err(AppError::Constraint {
                message: format!("document {} does not exist", document_id),
            })
        }
    }

    fn upsert_child<T>(
        &mut self,
        table: fn(&mut State) -> &mut BTreeMap<String, Keyed<T>>,
        document_id: String,
        record: T,
    ) -> Result<()> {
        self.require_document(&document_id)?;
        let existing = table(self).get(&document_id).map(|k| k.id);
        let id = match existing {
            Some(id) => id,
            None => self.next_id(),
        };
        table(self).insert(document_id, Keyed { id, record });
        Ok(())
    }

    fn apply(&mut self, op: WriteOp, now: DateTime<Utc>) -> Result<()> {
        match op {
            WriteOp::Organization(id) => {
                self.organizations.insert(id);
            }
            WriteOp::Department { id, organization_id } => {
                if !self.organizations.contains(&organization_id) {
                    return Err(AppError::Constraint {
                        message: format!("organization {} does not exist", organization_id),
                    });
                }
                self.departments.entry(id).or_insert(organization_id);
            }
            WriteOp::Document(mut document) => {
                if let Some(ref org) = document.organization_id {
                    if !self.organizations.contains(org) {
                        return Err(AppError::Constraint {
                            message: format!("organization {} does not exist", org),
                        });
                    }
                }
                if let Some(ref dept) = document.department_id {
                    if !self.departments.contains_key(dept) {
                        return Err(AppError::Constraint {
                            message: format!("department {} does not exist", dept),
                        });
                    }
                }
                let created_at = match self.documents.get(&document.id) {
                    Some(existing) => existing.created_at,
                    None => Some(document.created_at.unwrap_or(now)),
                };
                document.created_at = created_at;
                document.updated_at = Some(document.updated_at.unwrap_or(now));
                self.documents.insert(document.id.clone(), document);
            }
            WriteOp::Vendor(doc, record) => self.upsert_child(|s| &mut s.vendors, doc, record)?,
            WriteOp::Customer(doc, record) => self.upsert_child(|s| &mut s.customers, doc, record)?,
            WriteOp::Invoice(doc, record) => self.upsert_child(|s| &mut s.invoices, doc, record)?,
            WriteOp::Payment(doc, record) => self.upsert_child(|s| &mut s.payments, doc, record)?,
            WriteOp::Summary(doc, record) => self.upsert_child(|s| &mut s.summaries, doc, record)?,
            WriteOp::LineItems(doc, items) => {
                self.require_document(&doc)?;
                let keyed = items
                    .into_iter()
                    .map(|record| Keyed {
                        id: self.next_id(),
                        record,
                    })
                    .collect();
                self.line_items.insert(doc, keyed);
            }
        }
        Ok(())
    }

    fn views(&self) -> impl Iterator<Item = InvoiceView> + '_ {
        self.documents.keys().filter_map(move |doc| {
            let invoice = self.invoices.get(doc).map(|k| &k.record);
            let summary = self.summaries.get(doc).map(|k| &k.record);
            if invoice.is_none() && summary.is_none() {
                return None;
            }
            let payment = self.payments.get(doc).map(|k| &k.record);
            Some(InvoiceView {
                invoice_id: doc.clone(),
                invoice_number: invoice.and_then(|i| i.invoice_id.clone()),
                invoice_date: invoice.and_then(|i| i.invoice_date),
                invoice_total: summary.and_then(|s| s.invoice_total),
                document_type: summary.and_then(|s| s.document_type.clone()),
                currency: summary.and_then(|s| s.currency_symbol.clone()),
                vendor: self.vendors.get(doc).map(|k| PartyRef {
                    id: k.id,
                    name: k.record.vendor_name.clone(),
                }),
                customer: self.customers.get(doc).map(|k| PartyRef {
                    id: k.id,
                    name: k.record.customer_name.clone(),
                }),
                due_date: payment.and_then(|p| p.due_date),
                discounted_total: payment.and_then(|p| p.discounted_total),
            })
        })
    }
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTransaction>> {
        Ok(Box::new(MemoryTransaction {
            state: self.state.clone(),
            pending: Vec::new(),
        }))
    }

    async fn invoice_rows(&self, scope: &InvoiceScope) -> Result<Vec<InvoiceView>> {
        let state = self.state.read().await;
        Ok(state.views().filter(|row| scope.admits(row)).collect())
    }

    async fn search_invoices(&self, query: &InvoiceQuery) -> Result<InvoicePage> {
        let state = self.state.read().await;
        let mut rows: Vec<InvoiceView> = state
            .views()
            .filter(|row| query.filter.matches(row))
            .collect();
        rows.sort_by(|a, b| query.sort.compare(a, b));

        let total = rows.len() as u64;
        let rows = rows
            .into_iter()
            .skip(query.offset as usize)
            .take(query.limit as usize)
            .collect();

        Ok(InvoicePage { total, rows })
    }

    async fn line_item_totals(&self) -> Result<Vec<LineItemTotal>> {
        let state = self.state.read().await;
        Ok(state
            .line_items
            .values()
            .flatten()
            .map(|item| LineItemTotal {
                general_ledger_account: item.record.general_ledger_account.clone(),
                total_price: item.record.total_price,
            })
            .collect())
    }

    async fn payments_due(&self, from: NaiveDate, to: NaiveDate) -> Result<Vec<PaymentDue>> {
        let state = self.state.read().await;
        let mut due: Vec<PaymentDue> = state
            .payments
            .iter()
            .filter_map(|(doc, payment)| {
                let due_date = payment.record.due_date.filter(|d| (from..=to).contains(d))?;
                Some(PaymentDue {
                    document_id: doc.clone(),
                    due_date,
                    discounted_total: payment.record.discounted_total,
                    invoice_total: state
                        .summaries
                        .get(doc)
                        .and_then(|s| s.record.invoice_total),
                })
            })
            .collect();
        due.sort_by(|a, b| {
            a.due_date
                .cmp(&b.due_date)
                .then_with(|| a.document_id.cmp(&b.document_id))
        });
        Ok(due)
    }

    async fn run_read_only(&self, _sql: &str, _max_rows: usize) -> Result<Vec<serde_json::Value>> {
        Err(AppError::ServiceUnavailable {
            message: "SQL execution requires the PostgreSQL store".to_string(),
        })
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

struct MemoryTransaction {
    state: Arc<RwLock<State>>,
    pending: Vec<WriteOp>,
}

#[async_trait]
impl StoreTransaction for MemoryTransaction {
    async fn ensure_organization(&mut self, id: &str) -> Result<()> {
        self.pending.push(WriteOp::Organization(id.to_string()));
        Ok(())
    }

    async fn ensure_department(&mut self, id: &str, organization_id: &str) -> Result<()> {
        self.pending.push(WriteOp::Department {
            id: id.to_string(),
            organization_id: organization_id.to_string(),
        });
        Ok(())
    }

    async fn upsert_document(&mut self, document: &DocumentRecord) -> Result<()> {
        self.pending.push(WriteOp::Document(document.clone()));
        Ok(())
    }

    async fn upsert_vendor(&mut self, document_id: &str, vendor: &VendorRecord) -> Result<()> {
        self.pending
            .push(WriteOp::Vendor(document_id.to_string(), vendor.clone()));
        Ok(())
    }

    async fn upsert_customer(&mut self, document_id: &str, customer: &CustomerRecord) -> Result<()> {
        self.pending
            .push(WriteOp::Customer(document_id.to_string(), customer.clone()));
        Ok(())
    }

    async fn upsert_invoice(&mut self, document_id: &str, invoice: &InvoiceRecord) -> Result<()> {
        self.pending
            .push(WriteOp::Invoice(document_id.to_string(), invoice.clone()));
        Ok(())
    }

    async fn upsert_payment(&mut self, document_id: &str, payment: &PaymentRecord) -> Result<()> {
        self.pending
            .push(WriteOp::Payment(document_id.to_string(), payment.clone()));
        Ok(())
    }

    async fn upsert_summary(&mut self, document_id: &str, summary: &SummaryRecord) -> Result<()> {
        self.pending
            .push(WriteOp::Summary(document_id.to_string(), summary.clone()));
        Ok(())
    }

    async fn replace_line_items(&mut self, document_id: &str, items: &[LineItemRecord]) -> Result<()> {
        self.pending
            .push(WriteOp::LineItems(document_id.to_string(), items.to_vec()));
        Ok(())
    }

    async fn commit(&mut self) -> Result<()> {
        let now = Utc::now();
        let mut guard = self.state.write().await;
        let mut next = guard.clone();
        for op in self.pending.drain(..) {
            next.apply(op, now)?;
        }
        *guard = next;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<()> {
        self.pending.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::{InvoiceFilter, InvoiceSort, SortColumn, SortOrder};
    use chrono::{NaiveDate, TimeZone};
    use rust_decimal::Decimal;

    async fn seed(store: &MemoryStore, id: &str, vendor: &str, total: i64, day: u32) {
        let mut txn = store.begin().await.unwrap();
        txn.upsert_document(&DocumentRecord::new(id)).await.unwrap();
        txn.upsert_vendor(
            id,
            &VendorRecord {
                vendor_name: Some(vendor.to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        txn.upsert_invoice(
            id,
            &InvoiceRecord {
                invoice_id: Some(format!("INV-{}", id)),
                invoice_date: NaiveDate::from_ymd_opt(2026, 5, day),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        txn.upsert_summary(
            id,
            &SummaryRecord {
                invoice_total: Some(Decimal::from(total)),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        txn.commit().await.unwrap();
    }

    #[tokio::test]
    async fn test_uncommitted_writes_are_invisible() {
        let store = MemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.upsert_document(&DocumentRecord::new("doc-1")).await.unwrap();
        assert!(store.snapshot().await.documents.is_empty());

        txn.rollback().await.unwrap();
        txn.commit().await.unwrap();
        assert!(store.snapshot().await.documents.is_empty());
    }

    #[tokio::test]
    async fn test_failed_commit_leaves_state_untouched() {
        let store = MemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.ensure_organization("org-1").await.unwrap();
        let mut document = DocumentRecord::new("doc-1");
        document.organization_id = Some("org-1".into());
        document.department_id = Some("dep-missing".into());
        txn.upsert_document(&document).await.unwrap();

        let err = txn.commit().await.unwrap_err();
        assert!(matches!(err, AppError::Constraint { .. }));

        let snapshot = store.snapshot().await;
        assert!(snapshot.organizations.is_empty());
        assert!(snapshot.documents.is_empty());
    }

    #[tokio::test]
    async fn test_created_at_survives_update() {
        let store = MemoryStore::new();
        let first = Utc.with_ymd_and_hms(2026, 1, 1, 8, 0, 0).unwrap();
        let later = Utc.with_ymd_and_hms(2026, 2, 1, 8, 0, 0).unwrap();

        let mut document = DocumentRecord::new("doc-1");
        document.created_at = Some(first);
        let mut txn = store.begin().await.unwrap();
        txn.upsert_document(&document).await.unwrap();
        txn.commit().await.unwrap();

        document.created_at = Some(later);
        document.name = Some("renamed.pdf".into());
        let mut txn = store.begin().await.unwrap();
        txn.upsert_document(&document).await.unwrap();
        txn.commit().await.unwrap();

        let stored = store.snapshot().await.documents["doc-1"].clone();
        assert_eq!(stored.created_at, Some(first));
        assert_eq!(stored.name.as_deref(), Some("renamed.pdf"));
    }

    #[tokio::test]
    async fn test_child_upsert_keeps_surrogate_id() {
        let store = MemoryStore::new();
        seed(&store, "doc-1", "Acme", 10, 1).await;
        let before = store.invoice_rows(&InvoiceScope::all()).await.unwrap();
        seed(&store, "doc-1", "Acme GmbH", 10, 1).await;
        let after = store.invoice_rows(&InvoiceScope::all()).await.unwrap();

        assert_eq!(after.len(), 1);
        assert_eq!(before[0].vendor.as_ref().unwrap().id, after[0].vendor.as_ref().unwrap().id);
        assert_eq!(after[0].vendor_name(), Some("Acme GmbH"));
    }

    #[tokio::test]
    async fn test_child_requires_document() {
        let store = MemoryStore::new();
        let mut txn = store.begin().await.unwrap();
        txn.upsert_vendor("ghost", &VendorRecord::default()).await.unwrap();
        assert!(txn.commit().await.is_err());
    }

    #[tokio::test]
    async fn test_search_paginates_after_sorting() {
        let store = MemoryStore::new();
        seed(&store, "a", "Acme", 30, 3).await;
        seed(&store, "b", "Globex", 10, 1).await;
        seed(&store, "c", "Initech", 20, 2).await;

        let query = InvoiceQuery {
            filter: InvoiceFilter::default(),
            sort: InvoiceSort {
                column: SortColumn::Amount,
                order: SortOrder::Desc,
            },
            offset: 1,
            limit: 1,
        };
        let page = store.search_invoices(&query).await.unwrap();
        assert_eq!(page.total, 3);
        assert_eq!(page.rows.len(), 1);
        assert_eq!(page.rows[0].invoice_id, "c");
    }
}
