//! API handlers module

pub mod chat;
pub mod dashboard;
pub mod health;
pub mod invoices;

use chrono::{DateTime, NaiveDate};
use rust_decimal::Decimal;
use spendboard_common::errors::{AppError, Result};
use std::str::FromStr;

/// Query values that are present but blank count as absent
fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// `YYYY-MM-DD` or an RFC 3339 timestamp, reduced to its calendar day
pub(crate) fn parse_date_param(field: &str, value: Option<&str>) -> Result<Option<NaiveDate>> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(value).ok().map(|ts| ts.date_naive()))
        .map(Some)
        .ok_or_else(|| AppError::validation(field, format!("'{}' is not a valid date", value)))
}

pub(crate) fn parse_amount_param(field: &str, value: Option<&str>) -> Result<Option<Decimal>> {
    let Some(value) = non_empty(value) else {
        return Ok(None);
    };

    Decimal::from_str(value)
        .map(Some)
        .map_err(|_| AppError::validation(field, format!("'{}' is not a valid amount", value)))
}

pub(crate) fn text_param(value: Option<&str>) -> Option<String> {
    non_empty(value).map(str::to_string)
}
