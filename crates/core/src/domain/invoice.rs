use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::fields::{self, Record, INVOICE_TOTAL, RESULT_TABLE_KEY};

/// Key carrying the created invoice document number.
pub const DOCUMENT_NUMBER_KEY: &str = "DocNo";
/// Key carrying the created debtor account number.
pub const ACCOUNT_NUMBER_KEY: &str = "AccNo";

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InvoiceHeader {
    pub document_no: String,
    pub document_date: Option<NaiveDate>,
    pub cancelled: bool,
    pub total: Decimal,
}

impl InvoiceHeader {
    pub fn from_record(record: &Record) -> Self {
        Self {
            document_no: fields::text_field(record, &[DOCUMENT_NUMBER_KEY]).unwrap_or_default(),
            document_date: record.get("DocDate").and_then(Value::as_str).and_then(parse_doc_date),
            cancelled: record
                .get("Cancelled")
                .and_then(Value::as_str)
                .is_some_and(|flag| flag.eq_ignore_ascii_case("T")),
            total: INVOICE_TOTAL.decimal_or_zero(record),
        }
    }
}

/// Reads the date part of an ERP `DocDate` such as `2026-01-29T00:00:00`
/// or `2026/01/29`.
pub fn parse_doc_date(raw: &str) -> Option<NaiveDate> {
    let date_part: String = raw.trim().chars().take(10).collect();
    NaiveDate::parse_from_str(&date_part.replace('-', "/"), "%Y/%m/%d").ok()
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewInvoice {
    pub debtor_code: String,
    pub item_code: String,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub description: Option<String>,
}

impl NewInvoice {
    pub fn total(&self) -> Decimal {
        self.quantity * self.unit_price
    }

    /// Single-element batch accepted by the invoice-create endpoint. The
    /// invoice is saved as a draft that is not yet submitted for e-invoicing.
    pub fn to_payload(&self) -> Value {
        let mut invoice = json!({
            "DebtorCode": self.debtor_code,
            "DocStatus": "A",
            "SubmitEInvoice": "T",
            "ConsolidatedEInvoice": "F",
            "SubmitInvoiceNow": "F",
            "IVDTL": [{
                "ItemCode": self.item_code,
                "Qty": fields::decimal_to_json(self.quantity),
                "UnitPrice": fields::decimal_to_json(self.unit_price),
            }],
        });

        if let (Some(description), Some(object)) = (&self.description, invoice.as_object_mut()) {
            object.insert("Description".to_owned(), Value::String(description.clone()));
        }

        Value::Array(vec![invoice])
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewDebtor {
    pub company_name: String,
    pub phone: String,
    pub address: String,
    pub register_no: String,
}

impl NewDebtor {
    pub fn to_payload(&self, debtor_type: &str) -> Value {
        json!({
            "DebtorType": debtor_type,
            "CompanyName": self.company_name,
            "RegisterNo": self.register_no,
            "IsGroupCompany": "F",
            "IsActive": "T",
            "IsCashSaleDebtor": "F",
            "TaxEntityID": "1",
            "Address1": self.address,
            "Phone1": self.phone,
            "StatementType": "O",
            "AgingOn": "I",
            "SGEInvoicePeppolFormat": "",
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CreateOutcome {
    Created { number: String },
    Rejected { raw: String },
}

/// Classifies a create response by the presence of `key` in any of the shapes
/// the ERP answers with: `[{key}]`, `{ResultTable: [{key}]}` or `{key}`.
/// Anything else is a rejection carrying the raw response text.
pub fn classify_create_response(response: Option<&Value>, key: &str) -> CreateOutcome {
    let Some(response) = response else {
        return CreateOutcome::Rejected { raw: "no response from ERP".to_owned() };
    };

    let first_row = match response {
        Value::Array(rows) => rows.first().and_then(Value::as_object),
        Value::Object(object) => match object.get(RESULT_TABLE_KEY) {
            Some(Value::Array(rows)) => rows.first().and_then(Value::as_object),
            _ => Some(object),
        },
        _ => None,
    };

    match first_row.and_then(|row| fields::text_field(row, &[key])) {
        Some(number) => CreateOutcome::Created { number },
        None => CreateOutcome::Rejected { raw: response.to_string() },
    }
}
