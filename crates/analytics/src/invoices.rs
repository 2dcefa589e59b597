//! Invoice listing and recent invoices

use crate::Analytics;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::Serialize;
use spendboard_common::db::query::{
    InvoiceFilter, InvoiceQuery, InvoiceSort, InvoiceView, PartyRef, SortColumn, SortOrder,
};
use spendboard_common::errors::Result;
use spendboard_common::{metrics, UNKNOWN_VENDOR};
use std::time::Instant;
use tracing::instrument;

pub const DEFAULT_PAGE_SIZE: u64 = 25;
pub const MAX_PAGE_SIZE: u64 = 500;

/// Listing request; out-of-range paging values are clamped
#[derive(Debug, Clone, PartialEq)]
pub struct InvoiceListParams {
    pub page: u64,
    pub page_size: u64,
    pub filter: InvoiceFilter,
    pub sort: InvoiceSort,
}

impl Default for InvoiceListParams {
    fn default() -> Self {
        Self {
            page: 1,
            page_size: DEFAULT_PAGE_SIZE,
            filter: InvoiceFilter::default(),
            sort: InvoiceSort::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InvoiceStatus {
    Pending,
    Overdue,
}

impl InvoiceStatus {
    /// Overdue once the due day has begun, i.e. due on or before `today`
    pub fn derive(due_date: Option<NaiveDate>, today: NaiveDate) -> Self {
        match due_date {
            Some(due) if due <= today => InvoiceStatus::Overdue,
            _ => InvoiceStatus::Pending,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InvoiceListRow {
    pub invoice_id: String,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    /// Invoice total, zero when the document has none
    #[serde(with = "rust_decimal::serde::float")]
    pub amount: Decimal,
    pub currency: Option<String>,
    pub vendor: Option<PartyRef>,
    pub customer: Option<PartyRef>,
    pub due_date: Option<NaiveDate>,
    pub status: InvoiceStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvoiceListPage {
    pub total: u64,
    pub page: u64,
    pub page_size: u64,
    pub rows: Vec<InvoiceListRow>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentInvoice {
    pub invoice_id: String,
    pub invoice_number: Option<String>,
    pub vendor_name: String,
    pub invoice_date: Option<NaiveDate>,
    #[serde(with = "rust_decimal::serde::float_option")]
    pub invoice_total: Option<Decimal>,
}

impl Analytics {
    /// One page of invoices matching the filter, in the requested order
    #[instrument(skip(self))]
    pub async fn list_invoices(&self, params: &InvoiceListParams) -> Result<InvoiceListPage> {
        let start = Instant::now();
        let page = params.page.max(1);
        let page_size = params.page_size.clamp(1, MAX_PAGE_SIZE);

        let result = self
            .store
            .search_invoices(&InvoiceQuery {
                filter: params.filter.clone(),
                sort: params.sort,
                offset: (page - 1).saturating_mul(page_size),
                limit: page_size,
            })
            .await?;

        let today = self.today();
        let rows: Vec<InvoiceListRow> = result
            .rows
            .into_iter()
            .map(|row| list_row(row, today))
            .collect();

        metrics::record_query("list_invoices", start.elapsed().as_secs_f64(), rows.len());

        Ok(InvoiceListPage {
            total: result.total,
            page,
            page_size,
            rows,
        })
    }

    /// Most recent invoices by invoice date
    #[instrument(skip(self))]
    pub async fn recent_invoices(&self, limit: usize) -> Result<Vec<RecentInvoice>> {
        let start = Instant::now();
        let result = self
            .store
            .search_invoices(&InvoiceQuery {
                filter: InvoiceFilter::default(),
                sort: InvoiceSort {
                    column: SortColumn::InvoiceDate,
                    order: SortOrder::Desc,
                },
                offset: 0,
                limit: limit as u64,
            })
            .await?;

        let rows: Vec<RecentInvoice> = result
            .rows
            .into_iter()
            .map(|row| RecentInvoice {
                vendor_name: row.vendor_name().unwrap_or(UNKNOWN_VENDOR).to_string(),
                invoice_id: row.invoice_id,
                invoice_number: row.invoice_number,
                invoice_date: row.invoice_date,
                invoice_total: row.invoice_total,
            })
            .collect();

        metrics::record_query("recent_invoices", start.elapsed().as_secs_f64(), rows.len());
        Ok(rows)
    }
}

fn list_row(row: InvoiceView, today: NaiveDate) -> InvoiceListRow {
    InvoiceListRow {
        status: InvoiceStatus::derive(row.due_date, today),
        invoice_id: row.invoice_id,
        invoice_number: row.invoice_number,
        invoice_date: row.invoice_date,
        amount: row.invoice_total.unwrap_or(Decimal::ZERO),
        currency: row.currency,
        vendor: row.vendor,
        customer: row.customer,
        due_date: row.due_date,
    }
}
