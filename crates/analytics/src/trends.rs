//! Monthly invoice trends

use crate::money::{accumulate, round_cents};
use crate::{Analytics, MAX_TREND_MONTHS};
use chrono::{Datelike, Months, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use spendboard_common::db::query::InvoiceScope;
use spendboard_common::errors::{AppError, Result};
use spendboard_common::metrics;
use std::time::Instant;
use tracing::{debug, instrument};

/// One calendar month of invoices
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrendPoint {
    /// `YYYY-MM`
    pub month: String,
    /// Short month name, e.g. `Jan`
    pub label: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub total_amount: Decimal,
    pub invoice_count: u64,
}

impl Analytics {
    /// Totals for each of the last `months` calendar months, oldest first.
    /// Months without invoices report zeros.
    #[instrument(skip(self))]
    pub async fn invoice_trends(&self, months: u32) -> Result<Vec<TrendPoint>> {
        if months == 0 || months > MAX_TREND_MONTHS {
            return Err(AppError::validation(
                "months",
                format!("months must be between 1 and {}", MAX_TREND_MONTHS),
            ));
        }

        let start = Instant::now();
        let current = first_of_month(self.today());
        let first = current
            .checked_sub_months(Months::new(months - 1))
            .ok_or_else(|| AppError::validation("months", "trend window out of range"))?;
        let end = current
            .checked_add_months(Months::new(1))
            .ok_or_else(|| AppError::validation("months", "trend window out of range"))?;

        let rows = self
            .store
            .invoice_rows(&InvoiceScope {
                invoice_date_from: Some(first),
                invoice_date_before: Some(end),
                ..InvoiceScope::all()
            })
            .await?;

        let mut points: Vec<(NaiveDate, Decimal, u64)> = (0..months)
            .filter_map(|i| first.checked_add_months(Months::new(i)))
            .map(|month| (month, Decimal::ZERO, 0))
            .collect();

        for row in &rows {
            let Some(date) = row.invoice_date else { continue };
            let index = month_index(first, date);
            if let Some(point) = points.get_mut(index) {
                accumulate(&mut point.1, row.invoice_total.unwrap_or(Decimal::ZERO))?;
                point.2 += 1;
            }
        }

        debug!(invoices = rows.len(), "Computed invoice trends");
        metrics::record_query("invoice_trends", start.elapsed().as_secs_f64(), points.len());

        Ok(points
            .into_iter()
            .map(|(month, total, count)| TrendPoint {
                month: month.format("%Y-%m").to_string(),
                label: month.format("%b").to_string(),
                total_amount: round_cents(total),
                invoice_count: count,
            })
            .collect())
    }
}

fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Whole months from `first` to the month containing `date`
fn month_index(first: NaiveDate, date: NaiveDate) -> usize {
    let months = (date.year() - first.year()) * 12 + date.month() as i32 - first.month() as i32;
    usize::try_from(months).unwrap_or(usize::MAX)
}
