//! Expected cash outflow by due date

use crate::money::{accumulate, round_cents};
use crate::{Analytics, DEFAULT_OUTFLOW_DAYS};
use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use serde::Serialize;
use spendboard_common::errors::{AppError, Result};
use spendboard_common::metrics;
use std::collections::BTreeMap;
use std::time::Instant;
use tracing::{debug, instrument};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashOutflow {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub rows: Vec<CashOutflowDay>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CashOutflowDay {
    pub date: NaiveDate,
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
}

impl Analytics {
    /// Payments due in `[start, end]`, summed per day in date order.
    ///
    /// The window defaults to today through 30 days ahead. Every payment row
    /// counts, whether or not its document has invoice or summary data. Each
    /// payment contributes its discounted total, falling back to the invoice
    /// total; payments with neither are left out.
    #[instrument(skip(self))]
    pub async fn cash_outflow(
        &self,
        start: Option<NaiveDate>,
        end: Option<NaiveDate>,
    ) -> Result<CashOutflow> {
        let timer = Instant::now();
        let today = self.today();
        let start = start.unwrap_or(today);
        let end = end.unwrap_or(today + Duration::days(DEFAULT_OUTFLOW_DAYS));

        if start > end {
            return Err(AppError::validation(
                "start",
                format!("start ({}) must not be after end ({})", start, end),
            ));
        }

        let payments = self.store.payments_due(start, end).await?;

        let mut days: BTreeMap<NaiveDate, Decimal> = BTreeMap::new();
        for payment in &payments {
            let Some(amount) = payment.amount() else {
                continue;
            };
            accumulate(days.entry(payment.due_date).or_default(), amount)?;
        }

        let rows: Vec<CashOutflowDay> = days
            .into_iter()
            .map(|(date, amount)| CashOutflowDay {
                date,
                amount: round_cents(amount),
            })
            .collect();

        debug!(%start, %end, days = rows.len(), "Computed cash outflow");
        metrics::record_query("cash_outflow", timer.elapsed().as_secs_f64(), rows.len());

        Ok(CashOutflow { start, end, rows })
    }
}
