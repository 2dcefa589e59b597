//! Maps one extraction record to normalized rows

use crate::errors::MappingError;
use crate::extraction::{
    decimal, field, flag, integer, lookup, object_id, parse_calendar_date, parse_date,
    parse_large_integer, text,
};
use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde_json::Value;
use spendboard_common::db::records::{
    CustomerRecord, DocumentRecord, InvoiceRecord, LineItemRecord, PaymentRecord, SummaryRecord,
    VendorRecord,
};

/// Everything one extraction record contributes to the store
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    pub organization_id: Option<String>,
    /// `(department_id, organization_id)`, set only when both are known
    pub department: Option<(String, String)>,
    pub document: DocumentRecord,
    pub vendor: Option<VendorRecord>,
    pub customer: Option<CustomerRecord>,
    pub invoice: Option<InvoiceRecord>,
    pub payment: Option<PaymentRecord>,
    pub summary: Option<SummaryRecord>,
    /// Replaces the stored line items; empty when the extraction has no item list
    pub line_items: Vec<LineItemRecord>,
}

impl NormalizedDocument {
    pub fn id(&self) -> &str {
        &self.document.id
    }
}

/// Map an extraction record. Only a missing document id is an error.
pub fn map_document(raw: &Value) -> Result<NormalizedDocument, MappingError> {
    let id = raw
        .get("_id")
        .and_then(object_id)
        .ok_or(MappingError::MissingId)?;

    let organization_id = text_at(raw, "organizationId");
    let department_id = text_at(raw, "departmentId");
    let department = match (&department_id, &organization_id) {
        (Some(dept), Some(org)) => Some((dept.clone(), org.clone())),
        _ => None,
    };

    let document = DocumentRecord {
        id,
        name: text_at(raw, "name"),
        file_path: text_at(raw, "filePath"),
        file_size: field(raw, "fileSize").value().and_then(parse_large_integer),
        file_type: text_at(raw, "fileType"),
        status: text_at(raw, "status"),
        organization_id: organization_id.clone(),
        department_id,
        uploaded_by_id: text_at(raw, "uploadedById"),
        is_validated_by_human: field(raw, "isValidatedByHuman")
            .value()
            .and_then(flag)
            .unwrap_or(false),
        created_at: field(raw, "createdAt").value().and_then(parse_date),
        updated_at: field(raw, "updatedAt").value().and_then(parse_date),
        processed_at: field(raw, "processedAt").value().and_then(parse_date),
        analytics_id: text_at(raw, "analyticsId"),
        original_file_name: lookup(raw, &["metadata", "originalFileName"]).and_then(text),
        template_name: lookup(raw, &["metadata", "templateName"]).and_then(text),
    };

    let mut normalized = NormalizedDocument {
        organization_id,
        department,
        document,
        vendor: None,
        customer: None,
        invoice: None,
        payment: None,
        summary: None,
        line_items: Vec::new(),
    };

    let Some(llm) = lookup(raw, &["extractedData", "llmData"]) else {
        return Ok(normalized);
    };

    normalized.vendor = section(llm, "vendor").map(map_vendor);
    normalized.customer = section(llm, "customer").map(map_customer);
    normalized.invoice = section(llm, "invoice").map(map_invoice);
    normalized.payment = section(llm, "payment").map(map_payment);
    normalized.summary = section(llm, "summary").map(map_summary);
    normalized.line_items = section(llm, "lineItems")
        .and_then(|items| field(items, "items").value())
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter(|item| item.is_object())
                .map(map_line_item)
                .collect()
        })
        .unwrap_or_default();

    Ok(normalized)
}

/// The object carried by `llm[key]`, if any
fn section<'a>(llm: &'a Value, key: &str) -> Option<&'a Value> {
    field(llm, key).value().filter(|v| v.is_object())
}

fn text_at(obj: &Value, key: &str) -> Option<String> {
    field(obj, key).value().and_then(text)
}

fn decimal_at(obj: &Value, key: &str) -> Option<Decimal> {
    field(obj, key).value().and_then(decimal)
}

fn date_at(obj: &Value, key: &str) -> Option<NaiveDate> {
    field(obj, key).value().and_then(parse_calendar_date)
}

fn confidence_at(obj: &Value, key: &str) -> Option<f64> {
    field(obj, key).confidence()
}

fn map_vendor(v: &Value) -> VendorRecord {
    VendorRecord {
        vendor_name: text_at(v, "vendorName"),
        vendor_party_number: text_at(v, "vendorPartyNumber"),
        vendor_address: text_at(v, "vendorAddress"),
        vendor_tax_id: text_at(v, "vendorTaxId"),
        confidence_name: confidence_at(v, "vendorName"),
        confidence_address: confidence_at(v, "vendorAddress"),
        confidence_tax_id: confidence_at(v, "vendorTaxId"),
    }
}

fn map_customer(c: &Value) -> CustomerRecord {
    CustomerRecord {
        customer_name: text_at(c, "customerName"),
        customer_address: text_at(c, "customerAddress"),
        confidence_name: confidence_at(c, "customerName"),
        confidence_address: confidence_at(c, "customerAddress"),
    }
}

fn map_invoice(inv: &Value) -> InvoiceRecord {
    InvoiceRecord {
        invoice_id: text_at(inv, "invoiceId"),
        invoice_date: date_at(inv, "invoiceDate"),
        delivery_date: date_at(inv, "deliveryDate"),
        confidence_invoice_id: confidence_at(inv, "invoiceId"),
        confidence_invoice_date: confidence_at(inv, "invoiceDate"),
        confidence_delivery_date: confidence_at(inv, "deliveryDate"),
    }
}

fn map_payment(p: &Value) -> PaymentRecord {
    let days = |key: &str| field(p, key).value().and_then(integer).unwrap_or(0);

    PaymentRecord {
        due_date: date_at(p, "dueDate"),
        payment_terms: text_at(p, "paymentTerms"),
        bank_account_number: text_at(p, "bankAccountNumber"),
        bic: text_at(p, "BIC"),
        account_name: text_at(p, "accountName"),
        net_days: days("netDays"),
        discount_percentage: decimal_at(p, "discountPercentage"),
        discount_days: days("discountDays"),
        discount_due_date: date_at(p, "discountDueDate"),
        discounted_total: decimal_at(p, "discountedTotal"),
        confidence_payment_terms: confidence_at(p, "paymentTerms"),
        confidence_bank_account: confidence_at(p, "bankAccountNumber"),
        confidence_due_date: confidence_at(p, "dueDate"),
    }
}

fn map_summary(s: &Value) -> SummaryRecord {
    SummaryRecord {
        document_type: text_at(s, "documentType"),
        sub_total: decimal_at(s, "subTotal"),
        total_tax: decimal_at(s, "totalTax"),
        invoice_total: decimal_at(s, "invoiceTotal"),
        currency_symbol: text_at(s, "currencySymbol"),
        confidence_sub_total: confidence_at(s, "subTotal"),
        confidence_total_tax: confidence_at(s, "totalTax"),
        confidence_invoice_total: confidence_at(s, "invoiceTotal"),
    }
}

fn map_line_item(item: &Value) -> LineItemRecord {
    LineItemRecord {
        sr_no: field(item, "srNo").value().and_then(integer),
        description: text_at(item, "description"),
        quantity: decimal_at(item, "quantity"),
        unit_price: decimal_at(item, "unitPrice"),
        total_price: decimal_at(item, "totalPrice"),
        general_ledger_account: text_at(item, "Sachkonto"),
        tax_key: text_at(item, "BUSchluessel"),
        vat_rate: decimal_at(item, "vatRate").unwrap_or(Decimal::ZERO),
        vat_amount: decimal_at(item, "vatAmount").unwrap_or(Decimal::ZERO),
        confidence_description: confidence_at(item, "description"),
        confidence_quantity: confidence_at(item, "quantity"),
        confidence_unit_price: confidence_at(item, "unitPrice"),
        confidence_total_price: confidence_at(item, "totalPrice"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "_id": {"$oid": "doc-1"},
            "name": "acme-march.pdf",
            "filePath": "/uploads/acme-march.pdf",
            "fileSize": {"$numberLong": "204800"},
            "fileType": "application/pdf",
            "status": "processed",
            "organizationId": "org-1",
            "departmentId": "dept-1",
            "uploadedById": "user-7",
            "isValidatedByHuman": true,
            "createdAt": {"$date": "2024-03-16T08:00:00Z"},
            "updatedAt": {"$date": "2024-03-17T08:00:00Z"},
            "metadata": {"originalFileName": "ACME_0315.pdf", "templateName": "default"},
            "extractedData": {"llmData": {
                "vendor": {"value": {
                    "vendorName": {"value": "Acme Corp", "confidence": 0.97},
                    "vendorTaxId": {"value": "DE123456789", "confidence": "0.8"}
                }},
                "customer": {"value": {
                    "customerName": {"value": "Globex GmbH", "confidence": 0.9}
                }},
                "invoice": {"value": {
                    "invoiceId": {"value": "INV-1001", "confidence": 0.99},
                    "invoiceDate": {"value": "2024-03-15", "confidence": 0.95}
                }},
                "payment": {"value": {
                    "dueDate": {"value": "14.04.2024", "confidence": 0.7},
                    "BIC": {"value": "DEUTDEFF"},
                    "netDays": {"value": 30},
                    "discountDays": {"value": null},
                    "discountedTotal": {"value": "1.164,00"}
                }},
                "summary": {"value": {
                    "documentType": {"value": "invoice"},
                    "subTotal": {"value": 1000},
                    "totalTax": {"value": 200},
                    "invoiceTotal": {"value": 1200, "confidence": 0.99},
                    "currencySymbol": {"value": "EUR"}
                }},
                "lineItems": {"value": {"items": {"value": [
                    {
                        "srNo": {"value": 1},
                        "description": {"value": "Consulting", "confidence": 0.9},
                        "quantity": {"value": 10},
                        "unitPrice": {"value": 100},
                        "totalPrice": {"value": 1000},
                        "Sachkonto": {"value": "4400"},
                        "BUSchluessel": {"value": "9"},
                        "vatRate": {"value": 19}
                    },
                    "not an item"
                ]}}}
            }}
        })
    }

    #[test]
    fn test_maps_document_fields() {
        let doc = map_document(&sample()).unwrap();

        assert_eq!(doc.id(), "doc-1");
        assert_eq!(doc.organization_id.as_deref(), Some("org-1"));
        assert_eq!(doc.department, Some(("dept-1".to_string(), "org-1".to_string())));
        assert_eq!(doc.document.file_size, Some(204800));
        assert!(doc.document.is_validated_by_human);
        assert_eq!(doc.document.original_file_name.as_deref(), Some("ACME_0315.pdf"));
        assert_eq!(doc.document.template_name.as_deref(), Some("default"));
        assert!(doc.document.created_at.is_some());
        assert_eq!(doc.document.processed_at, None);
    }

    #[test]
    fn test_maps_sections_with_confidences() {
        let doc = map_document(&sample()).unwrap();

        let vendor = doc.vendor.unwrap();
        assert_eq!(vendor.vendor_name.as_deref(), Some("Acme Corp"));
        assert_eq!(vendor.confidence_name, Some(0.97));
        assert_eq!(vendor.confidence_tax_id, Some(0.8));
        assert_eq!(vendor.vendor_address, None);

        let invoice = doc.invoice.unwrap();
        assert_eq!(invoice.invoice_id.as_deref(), Some("INV-1001"));
        assert_eq!(invoice.invoice_date, NaiveDate::from_ymd_opt(2024, 3, 15));

        let payment = doc.payment.unwrap();
        assert_eq!(payment.due_date, NaiveDate::from_ymd_opt(2024, 4, 14));
        assert_eq!(payment.bic.as_deref(), Some("DEUTDEFF"));
        assert_eq!(payment.net_days, 30);
        assert_eq!(payment.discount_days, 0);
        assert_eq!(payment.discounted_total, Some(Decimal::from(1164)));

        let summary = doc.summary.unwrap();
        assert_eq!(summary.invoice_total, Some(Decimal::from(1200)));
        assert_eq!(summary.currency_symbol.as_deref(), Some("EUR"));
    }

    #[test]
    fn test_line_items_skip_non_objects_and_default_vat() {
        let items = map_document(&sample()).unwrap().line_items;

        assert_eq!(items.len(), 1);
        assert_eq!(items[0].sr_no, Some(1));
        assert_eq!(items[0].general_ledger_account.as_deref(), Some("4400"));
        assert_eq!(items[0].tax_key.as_deref(), Some("9"));
        assert_eq!(items[0].vat_rate, Decimal::from(19));
        assert_eq!(items[0].vat_amount, Decimal::ZERO);
        assert_eq!(items[0].confidence_description, Some(0.9));
    }

    #[test]
    fn test_missing_id_is_the_only_failure() {
        assert!(matches!(
            map_document(&json!({"name": "x"})),
            Err(MappingError::MissingId)
        ));
        assert!(matches!(
            map_document(&json!({"_id": "  "})),
            Err(MappingError::MissingId)
        ));
        assert!(map_document(&json!({"_id": "bare"})).is_ok());
    }

    #[test]
    fn test_document_without_extraction_has_no_children() {
        let doc = map_document(&json!({"_id": "doc-2", "organizationId": "org-1"})).unwrap();

        assert_eq!(doc.vendor, None);
        assert_eq!(doc.summary, None);
        assert!(doc.line_items.is_empty());
        assert!(!doc.document.is_validated_by_human);
    }

    #[test]
    fn test_department_needs_organization() {
        let doc = map_document(&json!({"_id": "doc-3", "departmentId": "dept-1"})).unwrap();

        assert_eq!(doc.department, None);
        assert_eq!(doc.document.department_id.as_deref(), Some("dept-1"));
    }

    #[test]
    fn test_non_object_sections_are_ignored() {
        let doc = map_document(&json!({
            "_id": "doc-4",
            "extractedData": {"llmData": {
                "vendor": {"value": "Acme"},
                "invoice": {"value": null},
                "lineItems": {"value": {"items": {"value": "none"}}}
            }}
        }))
        .unwrap();

        assert_eq!(doc.vendor, None);
        assert_eq!(doc.invoice, None);
        assert!(doc.line_items.is_empty());
    }

    #[test]
    fn test_empty_item_array_replaces_line_items() {
        let doc = map_document(&json!({
            "_id": "doc-5",
            "extractedData": {"llmData": {
                "lineItems": {"value": {"items": {"value": []}}}
            }}
        }))
        .unwrap();

        assert!(doc.line_items.is_empty());
    }
}
