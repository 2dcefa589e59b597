//! Ingestion engine
//!
//! Loads extraction records into the store one document at a time. Each
//! document is written in its own transaction, so a failure leaves nothing
//! behind for that document and never stops the batch.

use crate::errors::{IngestionError, IngestionFatalError};
use crate::mapper::{map_document, NormalizedDocument};
use serde::Serialize;
use serde_json::Value;
use spendboard_common::db::{Store, StoreTransaction};
use spendboard_common::metrics;
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Default number of documents between progress signals
pub const DEFAULT_PROGRESS_INTERVAL: usize = 10;

/// Receives progress signals during a batch
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, processed: usize, total: usize);
}

/// Result of one successfully ingested document
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentOutcome {
    pub document_id: String,
    /// Number of line items written
    pub line_items: usize,
}

/// One failed document in a batch
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentFailure {
    pub index: usize,
    pub document_id: Option<String>,
    pub error: String,
}

/// Summary of a batch run
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct BatchReport {
    pub total: usize,
    pub succeeded: usize,
    pub failed: usize,
    /// Documents not attempted because shutdown was requested
    pub skipped: usize,
    pub failures: Vec<DocumentFailure>,
}

impl BatchReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0 && self.skipped == 0
    }
}

pub struct IngestionEngine {
    store: Arc<dyn Store>,
    progress_interval: usize,
    observer: Option<Arc<dyn ProgressObserver>>,
}

impl IngestionEngine {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self {
            store,
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
            observer: None,
        }
    }

    /// Signal progress every `interval` documents (0 is treated as 1)
    pub fn with_progress_interval(mut self, interval: usize) -> Self {
        self.progress_interval = interval.max(1);
        self
    }

    pub fn with_observer(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Map and write one extraction record atomically
    pub async fn ingest_document(&self, raw: &Value) -> Result<DocumentOutcome, IngestionError> {
        let start = Instant::now();
        let result = self.ingest_inner(raw).await;
        metrics::record_ingestion(start.elapsed().as_secs_f64(), result.is_ok());
        result
    }

    async fn ingest_inner(&self, raw: &Value) -> Result<DocumentOutcome, IngestionError> {
        let doc = map_document(raw)?;
        let store_err = |source| IngestionError::Store {
            document_id: doc.id().to_string(),
            source,
        };

        let mut txn = self.store.begin().await.map_err(store_err)?;

        if let Err(e) = write_document(txn.as_mut(), &doc).await {
            if let Err(rollback) = txn.rollback().await {
                warn!(document_id = %doc.id(), error = %rollback, "Rollback failed");
            }
            return Err(store_err(e));
        }

        txn.commit().await.map_err(store_err)?;

        Ok(DocumentOutcome {
            document_id: doc.id().to_string(),
            line_items: doc.line_items.len(),
        })
    }

    /// Ingest every record in order, isolating failures
    pub async fn ingest_batch(&self, docs: &[Value]) -> BatchReport {
        self.run_batch(docs, None).await
    }

    /// Like `ingest_batch`, but stops between documents once `shutdown`
    /// turns true. Documents not reached are reported as skipped.
    pub async fn ingest_batch_with_shutdown(
        &self,
        docs: &[Value],
        shutdown: watch::Receiver<bool>,
    ) -> BatchReport {
        self.run_batch(docs, Some(shutdown)).await
    }

    /// Read a JSON array (or single object) of records and ingest it
    pub async fn ingest_file(&self, path: &Path) -> Result<BatchReport, IngestionFatalError> {
        let docs = load_records(path).await?;
        Ok(self.ingest_batch(&docs).await)
    }

    #[instrument(skip_all, fields(total = docs.len()))]
    async fn run_batch(
        &self,
        docs: &[Value],
        shutdown: Option<watch::Receiver<bool>>,
    ) -> BatchReport {
        let total = docs.len();
        let mut report = BatchReport {
            total,
            ..BatchReport::default()
        };

        info!("Starting ingestion of {} documents", total);

        for (index, raw) in docs.iter().enumerate() {
            if shutdown.as_ref().is_some_and(|rx| *rx.borrow()) {
                report.skipped = total - index;
                warn!(
                    processed = index,
                    skipped = report.skipped,
                    "Shutdown requested, stopping ingestion"
                );
                break;
            }

            debug!(
                "Processing document {}/{}: {}",
                index + 1,
                total,
                raw.get("name").and_then(|name| name.as_str()).unwrap_or("<unnamed>")
            );

            match self.ingest_document(raw).await {
                Ok(outcome) => {
                    report.succeeded += 1;
                    debug!(document_id = %outcome.document_id, "Document ingested");
                }
                Err(e) => {
                    report.failed += 1;
                    let document_id = e
                        .document_id()
                        .map(str::to_string)
                        .or_else(|| raw.get("_id").map(|id| id.to_string()));
                    warn!(
                        index,
                        document_id = document_id.as_deref().unwrap_or("<none>"),
                        error = %e,
                        "Failed to ingest document"
                    );
                    report.failures.push(DocumentFailure {
                        index,
                        document_id,
                        error: e.to_string(),
                    });
                }
            }

            let processed = index + 1;
            if processed % self.progress_interval == 0 && processed < total {
                self.progress(processed, total);
            }
        }

        self.progress(report.succeeded + report.failed, total);

        info!(
            total = report.total,
            succeeded = report.succeeded,
            failed = report.failed,
            skipped = report.skipped,
            "Ingestion complete"
        );

        report
    }

    fn progress(&self, processed: usize, total: usize) {
        info!("Progress: {}/{} documents processed", processed, total);
        if let Some(ref observer) = self.observer {
            observer.on_progress(processed, total);
        }
    }
}

/// Parent rows first, then the document, its sections and line items
async fn write_document(
    txn: &mut dyn StoreTransaction,
    doc: &NormalizedDocument,
) -> spendboard_common::Result<()> {
    let id = doc.id();

    if let Some(ref org) = doc.organization_id {
        txn.ensure_organization(org).await?;
    }
    if let Some((ref dept, ref org)) = doc.department {
        txn.ensure_department(dept, org).await?;
    }

    txn.upsert_document(&doc.document).await?;

    if let Some(ref vendor) = doc.vendor {
        txn.upsert_vendor(id, vendor).await?;
    }
    if let Some(ref customer) = doc.customer {
        txn.upsert_customer(id, customer).await?;
    }
    if let Some(ref invoice) = doc.invoice {
        txn.upsert_invoice(id, invoice).await?;
    }
    if let Some(ref payment) = doc.payment {
        txn.upsert_payment(id, payment).await?;
    }
    if let Some(ref summary) = doc.summary {
        txn.upsert_summary(id, summary).await?;
    }
    txn.replace_line_items(id, &doc.line_items).await?;

    Ok(())
}

/// Read extraction records from a JSON file
pub async fn load_records(path: &Path) -> Result<Vec<Value>, IngestionFatalError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| IngestionFatalError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    let parsed: Value =
        serde_json::from_str(&content).map_err(|source| IngestionFatalError::Decode {
            path: path.to_path_buf(),
            source,
        })?;

    match parsed {
        Value::Array(docs) => Ok(docs),
        doc @ Value::Object(_) => Ok(vec![doc]),
        other => Err(IngestionFatalError::Shape {
            path: path.to_path_buf(),
            found: json_kind(&other),
        }),
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal::Decimal;
    use serde_json::json;
    use spendboard_common::MemoryStore;
    use std::io::Write;
    use std::sync::Mutex;

    fn invoice_doc(id: &str, vendor: &str, total: i64) -> Value {
        json!({
            "_id": id,
            "name": format!("{id}.pdf"),
            "organizationId": "org-1",
            "departmentId": "dept-1",
            "createdAt": {"$date": "2024-03-01T09:00:00Z"},
            "updatedAt": {"$date": "2024-03-02T09:00:00Z"},
            "extractedData": {"llmData": {
                "vendor": {"value": {"vendorName": {"value": vendor, "confidence": 0.9}}},
                "invoice": {"value": {"invoiceId": {"value": format!("INV-{id}")},
                                      "invoiceDate": {"value": "2024-03-15"}}},
                "summary": {"value": {"invoiceTotal": {"value": total}}},
                "lineItems": {"value": {"items": {"value": [
                    {"description": {"value": "Service"}, "totalPrice": {"value": total},
                     "Sachkonto": {"value": "4400"}}
                ]}}}
            }}
        })
    }

    fn engine(store: &MemoryStore) -> IngestionEngine {
        IngestionEngine::new(Arc::new(store.clone()))
    }

    #[derive(Default)]
    struct Recorder(Mutex<Vec<(usize, usize)>>);

    impl ProgressObserver for Recorder {
        fn on_progress(&self, processed: usize, total: usize) {
            self.0.lock().unwrap().push((processed, total));
        }
    }

    #[tokio::test]
    async fn test_ingest_document_writes_all_sections() {
        let store = MemoryStore::new();
        let outcome = engine(&store)
            .ingest_document(&invoice_doc("d1", "Acme Corp", 1200))
            .await
            .unwrap();

        assert_eq!(outcome.document_id, "d1");
        assert_eq!(outcome.line_items, 1);

        let snap = store.snapshot().await;
        assert!(snap.organizations.contains("org-1"));
        assert_eq!(snap.departments.get("dept-1").map(String::as_str), Some("org-1"));
        assert_eq!(
            snap.vendors["d1"].vendor_name.as_deref(),
            Some("Acme Corp")
        );
        assert_eq!(snap.summaries["d1"].invoice_total, Some(Decimal::from(1200)));
        assert_eq!(snap.line_items["d1"].len(), 1);
    }

    #[tokio::test]
    async fn test_vendor_confidence_without_customer_section() {
        let store = MemoryStore::new();
        engine(&store)
            .ingest_document(&json!({
                "_id": "acme-1",
                "extractedData": {"llmData": {
                    "vendor": {"value": {"vendorName": {"value": "Acme Corp", "confidence": 0.92}}}
                }}
            }))
            .await
            .unwrap();

        let snap = store.snapshot().await;
        let vendor = &snap.vendors["acme-1"];
        assert_eq!(vendor.vendor_name.as_deref(), Some("Acme Corp"));
        assert_eq!(vendor.confidence_name, Some(0.92));
        assert!(snap.customers.is_empty());
    }

    #[tokio::test]
    async fn test_batch_isolates_failures() {
        let store = MemoryStore::new();
        let docs = vec![
            invoice_doc("d1", "Acme Corp", 100),
            json!({"name": "no id"}),
            // department without organization: the document's FK cannot hold
            json!({"_id": "d3", "departmentId": "dept-x"}),
            invoice_doc("d4", "Globex", 300),
        ];

        let report = engine(&store).ingest_batch(&docs).await;

        assert_eq!(report.total, 4);
        assert_eq!(report.succeeded, 2);
        assert_eq!(report.failed, 2);
        assert_eq!(report.skipped, 0);
        assert_eq!(report.failures[0].index, 1);
        assert_eq!(report.failures[0].document_id, None);
        assert_eq!(report.failures[1].document_id.as_deref(), Some("d3"));

        let snap = store.snapshot().await;
        assert!(snap.documents.contains_key("d1"));
        assert!(snap.documents.contains_key("d4"));
        assert!(!snap.documents.contains_key("d3"));
    }

    #[tokio::test]
    async fn test_reingesting_batch_is_idempotent() {
        let store = MemoryStore::new();
        let docs = vec![
            invoice_doc("d1", "Acme Corp", 100),
            invoice_doc("d2", "Globex", 200),
        ];
        let engine = engine(&store);

        engine.ingest_batch(&docs).await;
        let first = store.snapshot().await;
        let report = engine.ingest_batch(&docs).await;

        assert_eq!(report.succeeded, 2);
        assert_eq!(store.snapshot().await, first);
    }

    #[tokio::test]
    async fn test_reingest_without_items_array_clears_line_items() {
        let store = MemoryStore::new();
        let engine = engine(&store);
        engine
            .ingest_document(&invoice_doc("d1", "Acme Corp", 100))
            .await
            .unwrap();

        let outcome = engine
            .ingest_document(&json!({
                "_id": "d1",
                "organizationId": "org-1",
                "extractedData": {"llmData": {"lineItems": {"value": {}}}}
            }))
            .await
            .unwrap();

        assert_eq!(outcome.line_items, 0);
        assert!(store.snapshot().await.line_items["d1"].is_empty());

        engine
            .ingest_document(&invoice_doc("d1", "Acme Corp", 100))
            .await
            .unwrap();
        engine
            .ingest_document(&json!({
                "_id": "d1",
                "organizationId": "org-1",
                "extractedData": {"llmData": {}}
            }))
            .await
            .unwrap();
        assert!(store.snapshot().await.line_items["d1"].is_empty());
    }

    #[tokio::test]
    async fn test_progress_every_interval_and_at_end() {
        let store = MemoryStore::new();
        let recorder = Arc::new(Recorder::default());
        let docs: Vec<Value> = (0..5)
            .map(|i| invoice_doc(&format!("d{i}"), "Acme Corp", 10))
            .collect();

        engine(&store)
            .with_progress_interval(2)
            .with_observer(recorder.clone())
            .ingest_batch(&docs)
            .await;

        assert_eq!(
            recorder.0.lock().unwrap().as_slice(),
            &[(2, 5), (4, 5), (5, 5)]
        );
    }

    #[tokio::test]
    async fn test_shutdown_skips_remaining_documents() {
        let store = MemoryStore::new();
        let (tx, rx) = watch::channel(false);
        tx.send(true).unwrap();

        let docs = vec![invoice_doc("d1", "Acme Corp", 10)];
        let report = engine(&store).ingest_batch_with_shutdown(&docs, rx).await;

        assert_eq!(report.succeeded, 0);
        assert_eq!(report.skipped, 1);
        assert!(!report.is_clean());
        assert!(store.snapshot().await.documents.is_empty());
    }

    #[tokio::test]
    async fn test_ingest_file_accepts_single_object() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", invoice_doc("d1", "Acme Corp", 10)).unwrap();

        let store = MemoryStore::new();
        let report = engine(&store).ingest_file(file.path()).await.unwrap();

        assert_eq!(report.total, 1);
        assert!(report.is_clean());
    }

    #[tokio::test]
    async fn test_ingest_file_fatal_errors() {
        let store = MemoryStore::new();
        let engine = engine(&store);

        let mut bad_json = tempfile::NamedTempFile::new().unwrap();
        write!(bad_json, "[{{\"_id\": ").unwrap();
        assert!(matches!(
            engine.ingest_file(bad_json.path()).await,
            Err(IngestionFatalError::Decode { .. })
        ));

        let mut scalar = tempfile::NamedTempFile::new().unwrap();
        write!(scalar, "42").unwrap();
        assert!(matches!(
            engine.ingest_file(scalar.path()).await,
            Err(IngestionFatalError::Shape { found: "a number", .. })
        ));

        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            engine.ingest_file(&dir.path().join("missing.json")).await,
            Err(IngestionFatalError::Read { .. })
        ));

        assert!(store.snapshot().await.documents.is_empty());
    }
}
