//! Dashboard statistics

use crate::money::{round_cents, sum};
use crate::Analytics;
use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use spendboard_common::db::query::InvoiceScope;
use spendboard_common::errors::Result;
use spendboard_common::metrics;
use std::time::Instant;
use tracing::instrument;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardStats {
    /// Sum of totals invoiced since January 1st of the current year
    #[serde(with = "rust_decimal::serde::float")]
    pub total_spend_ytd: Decimal,
    pub total_invoices: u64,
    /// Invoices with a non-empty document type
    pub documents_uploaded: u64,
    #[serde(with = "rust_decimal::serde::float")]
    pub average_invoice_value: Decimal,
}

impl Analytics {
    #[instrument(skip(self))]
    pub async fn dashboard_stats(&self) -> Result<DashboardStats> {
        let start = Instant::now();
        let rows = self.store.invoice_rows(&InvoiceScope::all()).await?;

        let year_start = NaiveDate::from_ymd_opt(self.today().year(), 1, 1);
        let total_spend_ytd = sum(rows
            .iter()
            .filter(|row| row.invoice_date.is_some() && row.invoice_date >= year_start)
            .map(|row| row.invoice_total))?;

        let total_invoices = rows.len() as u64;
        let documents_uploaded = rows
            .iter()
            .filter(|row| row.document_type.as_deref().is_some_and(|t| !t.is_empty()))
            .count() as u64;

        let average_invoice_value = if total_invoices == 0 {
            Decimal::ZERO
        } else {
            sum(rows.iter().map(|row| row.invoice_total))? / Decimal::from(total_invoices)
        };

        metrics::record_query("dashboard_stats", start.elapsed().as_secs_f64(), 1);

        Ok(DashboardStats {
            total_spend_ytd: round_cents(total_spend_ytd),
            total_invoices,
            documents_uploaded,
            average_invoice_value: round_cents(average_invoice_value),
        })
    }
}
