//! Read-side types shared by the store implementations and the query layer
//!
//! `InvoiceView` is the denormalized "queryable invoice" row: one per
//! document that carries invoice header facts or totals, joined with its
//! vendor, customer, summary and payment.

use crate::errors::AppError;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::str::FromStr;

/// Document type value that marks a credit note
pub const CREDIT_NOTE: &str = "creditNote";

/// Display reference to a vendor or customer row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartyRef {
    pub id: i32,
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvoiceView {
    /// Document id
    pub invoice_id: String,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub invoice_total: Option<Decimal>,
    pub document_type: Option<String>,
    pub currency: Option<String>,
    pub vendor: Option<PartyRef>,
    pub customer: Option<PartyRef>,
    pub due_date: Option<NaiveDate>,
    pub discounted_total: Option<Decimal>,
}

impl InvoiceView {
    pub fn vendor_name(&self) -> Option<&str> {
        self.vendor.as_ref().and_then(|v| v.name.as_deref())
    }

    pub fn customer_name(&self) -> Option<&str> {
        self.customer.as_ref().and_then(|c| c.name.as_deref())
    }

    pub fn is_credit_note(&self) -> bool {
        self.document_type.as_deref() == Some(CREDIT_NOTE)
    }
}

/// Predicates pushed down to the store for aggregation scans.
///
/// All bounds are on calendar days. A row whose bounded column is null never
/// matches a bound on that column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceScope {
    /// Inclusive lower bound on invoice date
    pub invoice_date_from: Option<NaiveDate>,
    /// Exclusive upper bound on invoice date
    pub invoice_date_before: Option<NaiveDate>,
    /// Drop rows without a total and credit notes
    pub spend_only: bool,
}

impl InvoiceScope {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn spend() -> Self {
        Self {
            spend_only: true,
            ..Self::default()
        }
    }

    pub fn admits(&self, row: &InvoiceView) -> bool {
        if self.spend_only && (row.invoice_total.is_none() || row.is_credit_note()) {
            return false;
        }
        if !within(row.invoice_date, self.invoice_date_from, |d, from| d >= from) {
            return false;
        }
        within(row.invoice_date, self.invoice_date_before, |d, before| d < before)
    }
}

fn within<T: Copy>(value: Option<T>, bound: Option<T>, test: impl Fn(T, T) -> bool) -> bool {
    match (bound, value) {
        (None, _) => true,
        (Some(_), None) => false,
        (Some(bound), Some(value)) => test(value, bound),
    }
}

/// Listing filters. Text filters are case-insensitive substring matches,
/// ranges are inclusive on both ends.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceFilter {
    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub date_from: Option<NaiveDate>,
    pub date_to: Option<NaiveDate>,
    pub min_amount: Option<Decimal>,
    pub max_amount: Option<Decimal>,
    /// Matches invoice number, vendor name or customer name
    pub search: Option<String>,
}

impl InvoiceFilter {
    pub fn matches(&self, row: &InvoiceView) -> bool {
        if let Some(ref needle) = self.vendor {
            if !contains_ci(row.vendor_name(), needle) {
                return false;
            }
        }
        if let Some(ref needle) = self.invoice_number {
            if !contains_ci(row.invoice_number.as_deref(), needle) {
                return false;
            }
        }
        if !within(row.invoice_date, self.date_from, |d, from| d >= from)
            || !within(row.invoice_date, self.date_to, |d, to| d <= to)
            || !within(row.invoice_total, self.min_amount, |a, min| a >= min)
            || !within(row.invoice_total, self.max_amount, |a, max| a <= max)
        {
            return false;
        }
        if let Some(ref needle) = self.search {
            return contains_ci(row.invoice_number.as_deref(), needle)
                || contains_ci(row.vendor_name(), needle)
                || contains_ci(row.customer_name(), needle);
        }
        true
    }
}

fn contains_ci(haystack: Option<&str>, needle: &str) -> bool {
    haystack
        .map(|h| h.to_lowercase().contains(&needle.to_lowercase()))
        .unwrap_or(false)
}

/// Sortable listing columns
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortColumn {
    #[default]
    InvoiceDate,
    InvoiceNumber,
    Amount,
    VendorName,
    CustomerName,
    DueDate,
}

impl FromStr for SortColumn {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "invoice_date" | "invoiceDate" | "date" => Ok(SortColumn::InvoiceDate),
            "invoice_number" | "invoiceNumber" => Ok(SortColumn::InvoiceNumber),
            "amount" | "invoice_total" | "invoiceTotal" => Ok(SortColumn::Amount),
            "vendor" | "vendor_name" | "vendorName" => Ok(SortColumn::VendorName),
            "customer" | "customer_name" | "customerName" => Ok(SortColumn::CustomerName),
            "due_date" | "dueDate" => Ok(SortColumn::DueDate),
            other => Err(AppError::validation(
                "sortBy",
                format!("unsupported sort column '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl FromStr for SortOrder {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(AppError::validation(
                "sortOrder",
                format!("sort order must be 'asc' or 'desc', got '{}'", other),
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InvoiceSort {
    pub column: SortColumn,
    pub order: SortOrder,
}

impl InvoiceSort {
    /// Total order used for listing: the chosen column with nulls treated as
    /// larger than any value (last ascending, first descending), then
    /// invoice id ascending.
    pub fn compare(&self, a: &InvoiceView, b: &InvoiceView) -> Ordering {
        let primary = match self.column {
            SortColumn::InvoiceDate => nulls_last(a.invoice_date, b.invoice_date),
            SortColumn::InvoiceNumber => {
                nulls_last(a.invoice_number.as_deref(), b.invoice_number.as_deref())
            }
            SortColumn::Amount => nulls_last(a.invoice_total, b.invoice_total),
            SortColumn::VendorName => nulls_last(a.vendor_name(), b.vendor_name()),
            SortColumn::CustomerName => nulls_last(a.customer_name(), b.customer_name()),
            SortColumn::DueDate => nulls_last(a.due_date, b.due_date),
        };
        let primary = match self.order {
            SortOrder::Asc => primary,
            SortOrder::Desc => primary.reverse(),
        };
        primary.then_with(|| a.invoice_id.cmp(&b.invoice_id))
    }
}

fn nulls_last<T: Ord>(a: Option<T>, b: Option<T>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Greater,
        (Some(_), None) => Ordering::Less,
        (Some(a), Some(b)) => a.cmp(&b),
    }
}

/// One page request against the invoice listing
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InvoiceQuery {
    pub filter: InvoiceFilter,
    pub sort: InvoiceSort,
    pub offset: u64,
    pub limit: u64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct InvoicePage {
    /// Number of rows matching the filter, ignoring pagination
    pub total: u64,
    pub rows: Vec<InvoiceView>,
}

/// Ledger account and total of one line item
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineItemTotal {
    pub general_ledger_account: Option<String>,
    pub total_price: Option<Decimal>,
}

/// A payment with a due date, with the total of its document's summary.
/// Payments are read on their own, so documents without invoice or summary
/// rows still count.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaymentDue {
    pub document_id: String,
    pub due_date: NaiveDate,
    pub discounted_total: Option<Decimal>,
    pub invoice_total: Option<Decimal>,
}

impl PaymentDue {
    /// Discounted total, falling back to the invoice total
    pub fn amount(&self) -> Option<Decimal> {
        self.discounted_total.or(self.invoice_total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(id: &str, vendor: Option<&str>, total: Option<Decimal>) -> InvoiceView {
        InvoiceView {
            invoice_id: id.to_string(),
            invoice_number: Some(format!("INV-{}", id)),
            invoice_date: NaiveDate::from_ymd_opt(2026, 3, 15),
            invoice_total: total,
            document_type: Some("invoice".into()),
            currency: Some("€".into()),
            vendor: vendor.map(|name| PartyRef {
                id: 1,
                name: Some(name.to_string()),
            }),
            customer: None,
            due_date: None,
            discounted_total: None,
        }
    }

    #[test]
    fn test_spend_scope_excludes_credit_notes_and_missing_totals() {
        let scope = InvoiceScope::spend();
        let mut credit = row("a", Some("Acme"), Some(Decimal::from(10)));
        credit.document_type = Some(CREDIT_NOTE.into());

        assert!(scope.admits(&row("b", Some("Acme"), Some(Decimal::from(10)))));
        assert!(!scope.admits(&credit));
        assert!(!scope.admits(&row("c", Some("Acme"), None)));
    }

    #[test]
    fn test_date_bounds_reject_null_dates() {
        let scope = InvoiceScope {
            invoice_date_from: NaiveDate::from_ymd_opt(2026, 1, 1),
            ..InvoiceScope::default()
        };
        let mut undated = row("a", None, None);
        undated.invoice_date = None;
        assert!(!scope.admits(&undated));
        assert!(scope.admits(&row("b", None, None)));
    }

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = InvoiceFilter {
            vendor: Some("acme".into()),
            ..InvoiceFilter::default()
        };
        assert!(filter.matches(&row("a", Some("ACME Corp"), None)));
        assert!(!filter.matches(&row("b", Some("Globex"), None)));
        assert!(!filter.matches(&row("c", None, None)));
    }

    #[test]
    fn test_search_matches_any_text_column() {
        let filter = InvoiceFilter {
            search: Some("inv-b".into()),
            ..InvoiceFilter::default()
        };
        assert!(filter.matches(&row("b", None, None)));
        assert!(!filter.matches(&row("a", Some("Globex"), None)));
    }

    #[test]
    fn test_amount_range_is_inclusive() {
        let filter = InvoiceFilter {
            min_amount: Some(Decimal::from(100)),
            max_amount: Some(Decimal::from(200)),
            ..InvoiceFilter::default()
        };
        assert!(filter.matches(&row("a", None, Some(Decimal::from(100)))));
        assert!(filter.matches(&row("b", None, Some(Decimal::from(200)))));
        assert!(!filter.matches(&row("c", None, Some(Decimal::new(20001, 2)))));
        assert!(!filter.matches(&row("d", None, None)));
    }

    #[test]
    fn test_sort_places_nulls_last_ascending() {
        let sort = InvoiceSort {
            column: SortColumn::Amount,
            order: SortOrder::Asc,
        };
        let mut rows = vec![
            row("c", None, None),
            row("b", None, Some(Decimal::from(5))),
            row("a", None, Some(Decimal::from(5))),
        ];
        rows.sort_by(|a, b| sort.compare(a, b));
        let ids: Vec<_> = rows.iter().map(|r| r.invoice_id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);

        let desc = InvoiceSort {
            order: SortOrder::Desc,
            ..sort
        };
        rows.sort_by(|a, b| desc.compare(a, b));
        let ids: Vec<_> = rows.iter().map(|r| r.invoice_id.as_str()).collect();
        assert_eq!(ids, vec!["c", "a", "b"]);
    }

    #[test]
    fn test_sort_column_parsing() {
        assert_eq!("amount".parse::<SortColumn>().unwrap(), SortColumn::Amount);
        assert_eq!("vendorName".parse::<SortColumn>().unwrap(), SortColumn::VendorName);
        assert!("drop table".parse::<SortColumn>().is_err());
        assert_eq!("ASC".parse::<SortOrder>().unwrap(), SortOrder::Asc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }
}
