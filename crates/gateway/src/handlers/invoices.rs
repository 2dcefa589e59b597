//! Invoice listing handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use spendboard_analytics::{
    InvoiceListPage, InvoiceListParams, RecentInvoice, VendorInvoices, DEFAULT_LIMIT,
    DEFAULT_RECENT_LIMIT,
};
use spendboard_common::db::query::{InvoiceFilter, InvoiceSort, SortColumn, SortOrder};
use spendboard_common::errors::Result;
use validator::Validate;

use super::dashboard::LimitParams;
use super::{parse_amount_param, parse_date_param, text_param};
use crate::AppState;

/// Query string of `GET /api/invoices`
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ListInvoicesParams {
    #[validate(range(min = 1))]
    pub page: Option<u64>,

    #[validate(range(min = 1, max = 500))]
    pub page_size: Option<u64>,

    pub vendor: Option<String>,
    pub invoice_number: Option<String>,
    pub date_from: Option<String>,
    pub date_to: Option<String>,
    pub min_amount: Option<String>,
    pub max_amount: Option<String>,
    pub sort_by: Option<String>,
    pub sort_order: Option<String>,
    pub search: Option<String>,
}

impl ListInvoicesParams {
    fn into_list_params(self) -> Result<InvoiceListParams> {
        let defaults = InvoiceListParams::default();

        let filter = InvoiceFilter {
            vendor: text_param(self.vendor.as_deref()),
            invoice_number: text_param(self.invoice_number.as_deref()),
            date_from: parse_date_param("dateFrom", self.date_from.as_deref())?,
            date_to: parse_date_param("dateTo", self.date_to.as_deref())?,
            min_amount: parse_amount_param("minAmount", self.min_amount.as_deref())?,
            max_amount: parse_amount_param("maxAmount", self.max_amount.as_deref())?,
            search: text_param(self.search.as_deref()),
        };

        let mut sort = InvoiceSort::default();
        if let Some(column) = text_param(self.sort_by.as_deref()) {
            sort.column = column.parse::<SortColumn>()?;
        }
        if let Some(order) = text_param(self.sort_order.as_deref()) {
            sort.order = order.parse::<SortOrder>()?;
        }

        Ok(InvoiceListParams {
            page: self.page.unwrap_or(defaults.page),
            page_size: self.page_size.unwrap_or(defaults.page_size),
            filter,
            sort,
        })
    }
}

/// Filtered, sorted and paginated invoices with derived payment status
pub async fn list_invoices(
    State(state): State<AppState>,
    params: std::result::Result<Query<ListInvoicesParams>, QueryRejection>,
) -> Result<Json<InvoiceListPage>> {
    let Query(params) = params?;
    params.validate()?;

    let params = params.into_list_params()?;
    Ok(Json(state.analytics.list_invoices(&params).await?))
}

pub async fn recent_invoices(
    State(state): State<AppState>,
    params: std::result::Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<RecentInvoice>>> {
    let Query(params) = params?;
    params.validate()?;

    let invoices = state
        .analytics
        .recent_invoices(params.limit_or(DEFAULT_RECENT_LIMIT))
        .await?;
    Ok(Json(invoices))
}

/// Per-vendor invoice counts and spend
pub async fn invoices_by_vendor(
    State(state): State<AppState>,
    params: std::result::Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<VendorInvoices>>> {
    let Query(params) = params?;
    params.validate()?;

    let vendors = state
        .analytics
        .invoices_by_vendor(params.limit_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(vendors))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use rust_decimal::Decimal;
    use spendboard_common::AppError;

    #[test]
    fn test_query_string_maps_to_list_params() {
        let params = ListInvoicesParams {
            page: Some(3),
            page_size: Some(50),
            vendor: Some(" Acme ".into()),
            date_from: Some("2024-01-01".into()),
            min_amount: Some("10.50".into()),
            sort_by: Some("vendor".into()),
            sort_order: Some("asc".into()),
            search: Some("".into()),
            ..ListInvoicesParams::default()
        };

        let list = params.into_list_params().unwrap();

        assert_eq!(list.page, 3);
        assert_eq!(list.page_size, 50);
        assert_eq!(list.filter.vendor.as_deref(), Some("Acme"));
        assert_eq!(list.filter.date_from, NaiveDate::from_ymd_opt(2024, 1, 1));
        assert_eq!(list.filter.min_amount, Some(Decimal::new(1050, 2)));
        assert_eq!(list.filter.search, None);
        assert_eq!(list.sort.column, SortColumn::VendorName);
        assert_eq!(list.sort.order, SortOrder::Asc);
    }

    #[test]
    fn test_defaults_when_query_is_empty() {
        let list = ListInvoicesParams::default().into_list_params().unwrap();
        assert_eq!(list, InvoiceListParams::default());
    }

    #[test]
    fn test_unknown_sort_column_is_rejected() {
        let params = ListInvoicesParams {
            sort_by: Some("colour".into()),
            ..ListInvoicesParams::default()
        };
        assert!(matches!(
            params.into_list_params(),
            Err(AppError::Validation { .. })
        ));
    }
}
