//! Vendor spend rankings
//!
//! Invoices are grouped by vendor name, compared case-insensitively after
//! trimming. Invoices without a vendor (or without a vendor name) fall into
//! one "Unknown Vendor" group. Credit notes and invoices without a total are
//! excluded.

use crate::money::{accumulate, round_cents};
use crate::Analytics;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use spendboard_common::db::query::{InvoiceScope, InvoiceView};
use spendboard_common::errors::Result;
use spendboard_common::{metrics, UNKNOWN_VENDOR};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorSpend {
    /// Lowest vendor row id in the group; `None` for "Unknown Vendor"
    pub vendor_id: Option<i32>,
    pub vendor_name: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub spend: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VendorInvoices {
    pub vendor_id: Option<i32>,
    pub vendor_name: String,
    pub latest_invoice_date: Option<NaiveDate>,
    pub invoice_count: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spend: Decimal,
}

#[derive(Debug)]
struct VendorGroup {
    vendor_id: Option<i32>,
    vendor_name: String,
    latest_invoice_date: Option<NaiveDate>,
    invoice_count: u64,
    spend: Decimal,
}

impl Analytics {
    /// Vendors ranked by total spend, largest first
    #[instrument(skip(self))]
    pub async fn top_vendors_by_spend(&self, limit: usize) -> Result<Vec<VendorSpend>> {
        let start = Instant::now();
        let rows = self.store.invoice_rows(&InvoiceScope::spend()).await?;

        let top: Vec<VendorSpend> = group_by_vendor(&rows)?
            .into_iter()
            .take(limit)
            .map(|g| VendorSpend {
                vendor_id: g.vendor_id,
                vendor_name: g.vendor_name,
                spend: round_cents(g.spend),
            })
            .collect();

        metrics::record_query("top_vendors", start.elapsed().as_secs_f64(), top.len());
        Ok(top)
    }

    /// Per-vendor invoice count, spend and most recent invoice date, ranked by
    /// spend
    #[instrument(skip(self))]
    pub async fn invoices_by_vendor(&self, limit: usize) -> Result<Vec<VendorInvoices>> {
        let start = Instant::now();
        let rows = self.store.invoice_rows(&InvoiceScope::spend()).await?;

        let groups: Vec<VendorInvoices> = group_by_vendor(&rows)?
            .into_iter()
            .take(limit)
            .map(|g| VendorInvoices {
                vendor_id: g.vendor_id,
                vendor_name: g.vendor_name,
                latest_invoice_date: g.latest_invoice_date,
                invoice_count: g.invoice_count,
                total_spend: round_cents(g.spend),
            })
            .collect();

        metrics::record_query("invoices_by_vendor", start.elapsed().as_secs_f64(), groups.len());
        Ok(groups)
    }
}

/// Grouping key and display name of a row's vendor
fn vendor_key(row: &InvoiceView) -> Option<(String, &str)> {
    let name = row.vendor_name()?.trim();
    (!name.is_empty()).then(|| (name.to_lowercase(), name))
}

/// Groups ordered by spend descending, then name
fn group_by_vendor(rows: &[InvoiceView]) -> Result<Vec<VendorGroup>> {
    let mut groups: HashMap<Option<String>, VendorGroup> = HashMap::new();

    for row in rows {
        let key = vendor_key(row);
        let vendor_id = key.as_ref().and(row.vendor.as_ref()).map(|v| v.id);
        let group = groups
            .entry(key.as_ref().map(|(k, _)| k.clone()))
            .or_insert_with(|| VendorGroup {
                vendor_id,
                vendor_name: key
                    .as_ref()
                    .map(|(_, name)| name.to_string())
                    .unwrap_or_else(|| UNKNOWN_VENDOR.to_string()),
                latest_invoice_date: None,
                invoice_count: 0,
                spend: Decimal::ZERO,
            });

        group.vendor_id = match (group.vendor_id, vendor_id) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        };
        group.latest_invoice_date = group.latest_invoice_date.max(row.invoice_date);
        group.invoice_count += 1;
        accumulate(&mut group.spend, row.invoice_total.unwrap_or(Decimal::ZERO))?;
    }

    let mut groups: Vec<VendorGroup> = groups.into_values().collect();
    groups.sort_by(|a, b| match b.spend.cmp(&a.spend) {
        Ordering::Equal => a.vendor_name.cmp(&b.vendor_name),
        other => other,
    });
    Ok(groups)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{analytics, date, SeedInvoice};

    fn fixtures() -> Vec<SeedInvoice> {
        vec![
            SeedInvoice::new("a", Some("Acme Corp"), Some(date(2024, 1, 10)), Some(500)),
            SeedInvoice::new("b", Some(" acme corp "), Some(date(2024, 2, 10)), Some(300)),
            SeedInvoice::new("c", Some("Globex"), Some(date(2024, 1, 5)), Some(900)),
            SeedInvoice::new("d", None, Some(date(2024, 3, 1)), Some(50)),
            SeedInvoice::new("e", Some("Initech"), Some(date(2024, 3, 2)), Some(2000)).credit_note(),
            SeedInvoice::new("f", Some("Initech"), Some(date(2024, 3, 3)), None),
        ]
    }

    #[tokio::test]
    async fn test_top_vendors_groups_and_ranks() {
        let analytics = analytics(date(2024, 3, 15), &fixtures()).await;
        let top = analytics.top_vendors_by_spend(10).await.unwrap();

        let ranked: Vec<(&str, Decimal)> = top
            .iter()
            .map(|v| (v.vendor_name.as_str(), v.spend))
            .collect();
        assert_eq!(
            ranked,
            [
                ("Globex", Decimal::from(900)),
                ("Acme Corp", Decimal::from(800)),
                (UNKNOWN_VENDOR, Decimal::from(50)),
            ]
        );
        assert!(top[0].vendor_id.is_some());
        assert_eq!(top[2].vendor_id, None);
    }

    #[tokio::test]
    async fn test_credit_notes_and_missing_totals_are_excluded() {
        let analytics = analytics(date(2024, 3, 15), &fixtures()).await;
        let top = analytics.top_vendors_by_spend(10).await.unwrap();

        assert!(top.iter().all(|v| v.vendor_name != "Initech"));
    }

    #[tokio::test]
    async fn test_limit_applies_after_ranking() {
        let analytics = analytics(date(2024, 3, 15), &fixtures()).await;
        let top = analytics.top_vendors_by_spend(1).await.unwrap();

        assert_eq!(top.len(), 1);
        assert_eq!(top[0].vendor_name, "Globex");
    }

    #[tokio::test]
    async fn test_invoices_by_vendor_tracks_latest_date() {
        let analytics = analytics(date(2024, 3, 15), &fixtures()).await;
        let groups = analytics.invoices_by_vendor(10).await.unwrap();

        let acme = groups.iter().find(|g| g.vendor_name == "Acme Corp").unwrap();
        assert_eq!(acme.invoice_count, 2);
        assert_eq!(acme.latest_invoice_date, Some(date(2024, 2, 10)));
        assert_eq!(acme.total_spend, Decimal::from(800));
    }

    #[tokio::test]
    async fn test_spend_overflow_is_an_error() {
        let mut huge = vec![
            SeedInvoice::new("a", Some("Acme Corp"), Some(date(2024, 3, 1)), None),
            SeedInvoice::new("b", Some("Acme Corp"), Some(date(2024, 3, 2)), None),
        ];
        for inv in &mut huge {
            inv.total = Some(Decimal::MAX);
        }
        let analytics = analytics(date(2024, 3, 15), &huge).await;

        assert!(matches!(
            analytics.top_vendors_by_spend(10).await,
            Err(spendboard_common::AppError::Internal { .. })
        ));
        assert!(analytics.invoices_by_vendor(10).await.is_err());
        assert!(analytics.dashboard_stats().await.is_err());
    }

    #[tokio::test]
    async fn test_single_vendor_ranks_alone() {
        let analytics = analytics(
            date(2024, 3, 15),
            &[SeedInvoice::new("a", Some("Acme Corp"), Some(date(2024, 3, 1)), Some(1200))],
        )
        .await;

        let top = analytics.top_vendors_by_spend(10).await.unwrap();
        assert_eq!(top.len(), 1);
        assert_eq!(top[0].vendor_name, "Acme Corp");
        assert_eq!(top[0].spend, Decimal::from(1200));
    }
}
