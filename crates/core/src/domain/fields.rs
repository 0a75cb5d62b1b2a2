//! Field-name fallback chains over raw ERP rows.
//!
//! The ERP reports the same logical value under different keys depending on
//! the endpoint and version (a debtor balance may be `Balance`, `Outstanding`,
//! `CurBalance` or only `NetTotal`). Each chain lists candidate keys in
//! priority order; the first key that is present with a readable number wins.

use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};

pub type Record = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FieldChain {
    pub name: &'static str,
    pub keys: &'static [&'static str],
}

pub const BALANCE: FieldChain =
    FieldChain { name: "balance", keys: &["Balance", "Outstanding", "CurBalance", "NetTotal"] };

pub const QUANTITY: FieldChain = FieldChain { name: "quantity", keys: &["BalQty", "Qty"] };

pub const INVOICE_TOTAL: FieldChain =
    FieldChain { name: "invoice_total", keys: &["FinalTotal", "NetTotal"] };

/// Detail-line array carrying per-batch quantities on stock rows.
pub const BATCH_DETAIL_KEY: &str = "ItemDTL";

pub const RESULT_TABLE_KEY: &str = "ResultTable";

impl FieldChain {
    pub fn first_decimal(&self, record: &Record) -> Option<Decimal> {
        self.keys.iter().filter_map(|key| record.get(*key)).find_map(value_to_decimal)
    }

    pub fn decimal_or_zero(&self, record: &Record) -> Decimal {
        self.first_decimal(record).unwrap_or(Decimal::ZERO)
    }
}

/// Reads a JSON number or a numeric string. Nulls, blanks and anything
/// non-numeric count as absent.
pub fn value_to_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(number) => number_to_decimal(number),
        Value::String(text) => {
            let trimmed = text.trim().replace(',', "");
            if trimmed.is_empty() {
                return None;
            }
            Decimal::from_str(&trimmed).or_else(|_| Decimal::from_scientific(&trimmed)).ok()
        }
        _ => None,
    }
}

fn number_to_decimal(number: &Number) -> Option<Decimal> {
    if let Some(integer) = number.as_i64() {
        return Some(Decimal::from(integer));
    }
    if let Some(unsigned) = number.as_u64() {
        return Some(Decimal::from(unsigned));
    }
    number.as_f64().and_then(|float| Decimal::try_from(float).ok()).map(|value| value.normalize())
}

/// Converts a decimal into a JSON number for request payloads.
pub fn decimal_to_json(value: Decimal) -> Value {
    let normalized = value.normalize();
    if normalized.scale() == 0 {
        if let Ok(integer) = i64::try_from(normalized.mantissa()) {
            return Value::from(integer);
        }
    }

    normalized
        .to_string()
        .parse::<f64>()
        .ok()
        .and_then(Number::from_f64)
        .map(Value::Number)
        .unwrap_or(Value::Null)
}

/// First non-empty text among `keys`; numbers are rendered as text.
pub fn text_field(record: &Record, keys: &[&str]) -> Option<String> {
    keys.iter().filter_map(|key| record.get(*key)).find_map(|value| match value {
        Value::String(text) if !text.trim().is_empty() => Some(text.trim().to_owned()),
        Value::Number(number) => Some(number.to_string()),
        _ => None,
    })
}

/// Rows of a collection response, accepting either a bare array or an object
/// wrapping the array under `ResultTable`.
pub fn rows_from_response(response: &Value) -> Vec<Record> {
    let rows = match response {
        Value::Array(rows) => rows.as_slice(),
        Value::Object(object) => match object.get(RESULT_TABLE_KEY) {
            Some(Value::Array(rows)) => rows.as_slice(),
            _ => &[],
        },
        _ => &[],
    };

    rows.iter().filter_map(|row| row.as_object().cloned()).collect()
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{
        decimal_to_json, rows_from_response, text_field, value_to_decimal, BALANCE,
        INVOICE_TOTAL, QUANTITY,
    };

    fn record(value: serde_json::Value) -> super::Record {
        value.as_object().cloned().expect("test record must be an object")
    }

    #[test]
    fn balance_prefers_first_present_key() {
        let row = record(json!({"NetTotal": 900, "Outstanding": "120.50", "Balance": null}));

        assert_eq!(BALANCE.first_decimal(&row), Some(Decimal::new(12_050, 2)));
    }

    #[test]
    fn balance_defaults_to_zero_when_every_key_is_missing() {
        let row = record(json!({"CompanyName": "ACME"}));

        assert_eq!(BALANCE.decimal_or_zero(&row), Decimal::ZERO);
    }

    #[test]
    fn unreadable_values_fall_through_to_next_key() {
        let row = record(json!({"BalQty": "n/a", "Qty": 7}));

        assert_eq!(QUANTITY.first_decimal(&row), Some(Decimal::from(7)));
    }

    #[test]
    fn invoice_total_uses_net_total_when_final_total_absent() {
        let row = record(json!({"NetTotal": 42.5}));

        assert_eq!(INVOICE_TOTAL.first_decimal(&row), Some(Decimal::new(425, 1)));
    }

    #[test]
    fn numeric_strings_accept_thousand_separators() {
        assert_eq!(value_to_decimal(&json!("1,250.75")), Some(Decimal::new(125_075, 2)));
        assert_eq!(value_to_decimal(&json!("  ")), None);
        assert_eq!(value_to_decimal(&json!(true)), None);
    }

    #[test]
    fn rows_are_read_from_array_or_result_table() {
        let bare = json!([{"ItemCode": "A"}, {"ItemCode": "B"}, "noise"]);
        let wrapped = json!({"Status": "OK", "ResultTable": [{"ItemCode": "C"}]});

        assert_eq!(rows_from_response(&bare).len(), 2);
        assert_eq!(rows_from_response(&wrapped).len(), 1);
        assert!(rows_from_response(&json!({"Status": "OK"})).is_empty());
        assert!(rows_from_response(&json!("error")).is_empty());
    }

    #[test]
    fn decimals_render_as_json_numbers() {
        assert_eq!(decimal_to_json(Decimal::new(300, 2)), json!(3));
        assert_eq!(decimal_to_json(Decimal::new(525, 2)), json!(5.25));
    }

    #[test]
    fn text_field_skips_blank_values() {
        let row = record(json!({"AccNo": " ", "DebtorCode": "300-A001"}));

        assert_eq!(text_field(&row, &["AccNo", "DebtorCode"]).as_deref(), Some("300-A001"));
    }
}
