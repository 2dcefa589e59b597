//! Normalized records handed to the store by the ingestion engine
//!
//! These mirror the entity columns minus store-assigned surrogate keys, so
//! both the PostgreSQL repository and the in-memory store accept the same
//! input.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub id: String,
    pub name: Option<String>,
    pub file_path: Option<String>,
    pub file_size: Option<i64>,
    pub file_type: Option<String>,
    pub status: Option<String>,
    pub organization_id: Option<String>,
    pub department_id: Option<String>,
    pub uploaded_by_id: Option<String>,
    pub is_validated_by_human: bool,
    /// Only honored when the document is inserted for the first time
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub processed_at: Option<DateTime<Utc>>,
    pub analytics_id: Option<String>,
    pub original_file_name: Option<String>,
    pub template_name: Option<String>,
}

impl DocumentRecord {
    /// A document with only its id set
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: None,
            file_path: None,
            file_size: None,
            file_type: None,
            status: None,
            organization_id: None,
            department_id: None,
            uploaded_by_id: None,
            is_validated_by_human: false,
            created_at: None,
            updated_at: None,
            processed_at: None,
            analytics_id: None,
            original_file_name: None,
            template_name: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VendorRecord {
    pub vendor_name: Option<String>,
    pub vendor_party_number: Option<String>,
    pub vendor_address: Option<String>,
    pub vendor_tax_id: Option<String>,
    pub confidence_name: Option<f64>,
    pub confidence_address: Option<f64>,
    pub confidence_tax_id: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CustomerRecord {
    pub customer_name: Option<String>,
    pub customer_address: Option<String>,
    pub confidence_name: Option<f64>,
    pub confidence_address: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InvoiceRecord {
    pub invoice_id: Option<String>,
    pub invoice_date: Option<NaiveDate>,
    pub delivery_date: Option<NaiveDate>,
    pub confidence_invoice_id: Option<f64>,
    pub confidence_invoice_date: Option<f64>,
    pub confidence_delivery_date: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub due_date: Option<NaiveDate>,
    pub payment_terms: Option<String>,
    pub bank_account_number: Option<String>,
    pub bic: Option<String>,
    pub account_name: Option<String>,
    pub net_days: i32,
    pub discount_percentage: Option<Decimal>,
    pub discount_days: i32,
    pub discount_due_date: Option<NaiveDate>,
    pub discounted_total: Option<Decimal>,
    pub confidence_payment_terms: Option<f64>,
    pub confidence_bank_account: Option<f64>,
    pub confidence_due_date: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryRecord {
    pub document_type: Option<String>,
    pub sub_total: Option<Decimal>,
    pub total_tax: Option<Decimal>,
    pub invoice_total: Option<Decimal>,
    pub currency_symbol: Option<String>,
    pub confidence_sub_total: Option<f64>,
    pub confidence_total_tax: Option<f64>,
    pub confidence_invoice_total: Option<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItemRecord {
    pub sr_no: Option<i32>,
    pub description: Option<String>,
    pub quantity: Option<Decimal>,
    pub unit_price: Option<Decimal>,
    pub total_price: Option<Decimal>,
    pub general_ledger_account: Option<String>,
    pub tax_key: Option<String>,
    pub vat_rate: Decimal,
    pub vat_amount: Decimal,
    pub confidence_description: Option<f64>,
    pub confidence_quantity: Option<f64>,
    pub confidence_unit_price: Option<f64>,
    pub confidence_total_price: Option<f64>,
}
