use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::fields::{self, Record, BALANCE};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Debtor {
    pub account_no: String,
    pub company_name: String,
    pub balance: Decimal,
    pub credit_limit: Decimal,
    pub credit_term: Option<String>,
    pub phone: Option<String>,
    pub fax: Option<String>,
    pub address: Option<String>,
}

impl Debtor {
    pub fn from_record(record: &Record) -> Self {
        let account_no = fields::text_field(record, &["AccNo", "DebtorCode"]).unwrap_or_default();
        Self {
            company_name: fields::text_field(record, &["CompanyName", "Name"])
                .unwrap_or_else(|| account_no.clone()),
            balance: BALANCE.decimal_or_zero(record),
            credit_limit: record
                .get("CreditLimit")
                .and_then(fields::value_to_decimal)
                .unwrap_or(Decimal::ZERO),
            credit_term: fields::text_field(record, &["CreditTerm", "DisplayTerm"]),
            phone: fields::text_field(record, &["Phone1", "Phone"]),
            fax: fields::text_field(record, &["Fax1", "Fax"]),
            address: joined_address(record),
            account_no,
        }
    }

    pub fn matches_code(&self, keyword: &str) -> bool {
        self.account_no.eq_ignore_ascii_case(keyword.trim())
    }

    pub fn contains_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        !needle.is_empty()
            && (self.account_no.to_lowercase().contains(&needle)
                || self.company_name.to_lowercase().contains(&needle))
    }
}

fn joined_address(record: &Record) -> Option<String> {
    if let Some(address) = fields::text_field(record, &["Address"]) {
        return Some(address);
    }

    let lines: Vec<String> = ["Address1", "Address2", "Address3", "Address4"]
        .iter()
        .filter_map(|key| fields::text_field(record, &[*key]))
        .collect();
    (!lines.is_empty()).then(|| lines.join(", "))
}
