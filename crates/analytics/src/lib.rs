//! Spendboard Analytics
//!
//! Read-side aggregations over the normalized invoice schema:
//! - Monthly invoice trends
//! - Vendor spend rankings and per-vendor invoice summaries
//! - Spend by ledger category
//! - Upcoming cash outflow
//! - Invoice listing with filters, sorting and pagination
//! - Dashboard statistics
//!
//! Every operation is a function of the store's current state, the explicit
//! parameters and the clock. Sums use `Decimal`; results are rounded to cents.

mod cashflow;
mod categories;
mod invoices;
pub mod money;
mod stats;
mod trends;
mod vendors;

pub use cashflow::{CashOutflow, CashOutflowDay};
pub use categories::CategorySpend;
pub use invoices::{InvoiceListPage, InvoiceListParams, InvoiceListRow, InvoiceStatus, RecentInvoice};
pub use stats::DashboardStats;
pub use trends::TrendPoint;
pub use vendors::{VendorInvoices, VendorSpend};

use chrono::{NaiveDate, Utc};
use spendboard_common::Store;
use std::sync::Arc;

/// Default number of months for invoice trends
pub const DEFAULT_TREND_MONTHS: u32 = 12;

/// Largest accepted trend window
pub const MAX_TREND_MONTHS: u32 = 120;

/// Default size of ranked lists (vendors, categories)
pub const DEFAULT_LIMIT: usize = 10;

/// Default size of the recent invoices list
pub const DEFAULT_RECENT_LIMIT: usize = 9;

/// Default cash outflow window, in days from today
pub const DEFAULT_OUTFLOW_DAYS: i64 = 30;

/// Source of "today"
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// Wall clock in UTC
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// Clock pinned to one day
#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

/// Aggregation query layer
#[derive(Clone)]
pub struct Analytics {
    store: Arc<dyn Store>,
    clock: Arc<dyn Clock>,
}

impl Analytics {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    pub fn with_clock(store: Arc<dyn Store>, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    fn today(&self) -> NaiveDate {
        self.clock.today()
    }
}
