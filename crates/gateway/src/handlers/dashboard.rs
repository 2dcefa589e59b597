//! Dashboard aggregation handlers

use axum::{
    extract::{rejection::QueryRejection, Query, State},
    Json,
};
use serde::Deserialize;
use spendboard_analytics::{
    CashOutflow, CategorySpend, DashboardStats, TrendPoint, VendorSpend, DEFAULT_LIMIT,
    DEFAULT_TREND_MONTHS,
};
use spendboard_common::errors::Result;
use validator::Validate;

use super::parse_date_param;
use crate::AppState;

#[derive(Debug, Deserialize, Validate)]
pub struct TrendParams {
    #[validate(range(min = 1, max = 120))]
    pub months: Option<u32>,
}

/// `?limit=N` for ranked lists
#[derive(Debug, Deserialize, Validate)]
pub struct LimitParams {
    #[validate(range(min = 1, max = 100))]
    pub limit: Option<usize>,
}

impl LimitParams {
    pub fn limit_or(&self, default: usize) -> usize {
        self.limit.unwrap_or(default)
    }
}

#[derive(Debug, Deserialize)]
pub struct CashOutflowParams {
    pub start: Option<String>,
    pub end: Option<String>,
}

/// Monthly invoice totals, oldest month first
pub async fn invoice_trends(
    State(state): State<AppState>,
    params: std::result::Result<Query<TrendParams>, QueryRejection>,
) -> Result<Json<Vec<TrendPoint>>> {
    let Query(params) = params?;
    params.validate()?;

    let months = params.months.unwrap_or(DEFAULT_TREND_MONTHS);
    Ok(Json(state.analytics.invoice_trends(months).await?))
}

pub async fn top_vendors(
    State(state): State<AppState>,
    params: std::result::Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<VendorSpend>>> {
    let Query(params) = params?;
    params.validate()?;

    let vendors = state
        .analytics
        .top_vendors_by_spend(params.limit_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(vendors))
}

pub async fn category_spend(
    State(state): State<AppState>,
    params: std::result::Result<Query<LimitParams>, QueryRejection>,
) -> Result<Json<Vec<CategorySpend>>> {
    let Query(params) = params?;
    params.validate()?;

    let categories = state
        .analytics
        .category_spend(params.limit_or(DEFAULT_LIMIT))
        .await?;
    Ok(Json(categories))
}

/// Payments due per day; the window defaults to the next 30 days
pub async fn cash_outflow(
    State(state): State<AppState>,
    params: std::result::Result<Query<CashOutflowParams>, QueryRejection>,
) -> Result<Json<CashOutflow>> {
    let Query(params) = params?;
    let start = parse_date_param("start", params.start.as_deref())?;
    let end = parse_date_param("end", params.end.as_deref())?;

    Ok(Json(state.analytics.cash_outflow(start, end).await?))
}

pub async fn stats(State(state): State<AppState>) -> Result<Json<DashboardStats>> {
    Ok(Json(state.analytics.dashboard_stats().await?))
}
