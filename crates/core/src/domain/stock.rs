use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::fields::{self, Record, BATCH_DETAIL_KEY, QUANTITY};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StockItem {
    pub code: String,
    pub description: String,
    pub unit_of_measure: String,
    pub price: Decimal,
    pub cost: Decimal,
    pub group: Option<String>,
    pub item_type: Option<String>,
    pub quantity: Decimal,
}

impl StockItem {
    pub fn from_record(record: &Record) -> Self {
        let code = fields::text_field(record, &["ItemCode"]).unwrap_or_default();
        let description = fields::text_field(record, &["Description", "Desc"])
            .unwrap_or_else(|| code.clone());

        Self {
            description,
            unit_of_measure: fields::text_field(record, &["UOM", "BaseUOM", "SalesUOM"])
                .unwrap_or_else(|| "UNIT".to_owned()),
            price: decimal_field(record, &["Price", "UnitPrice", "StdSellingPrice"]),
            cost: decimal_field(record, &["Cost", "StdCost"]),
            group: fields::text_field(record, &["ItemGroup"]),
            item_type: fields::text_field(record, &["ItemType"]),
            quantity: quantity_on_hand(record),
            code,
        }
    }

    pub fn matches_code(&self, keyword: &str) -> bool {
        self.code.eq_ignore_ascii_case(keyword.trim())
    }

    pub fn contains_keyword(&self, keyword: &str) -> bool {
        let needle = keyword.trim().to_lowercase();
        !needle.is_empty()
            && (self.code.to_lowercase().contains(&needle)
                || self.description.to_lowercase().contains(&needle))
    }
}

/// Quantity on hand for a stock row.
///
/// A scalar `BalQty`/`Qty` on the row takes precedence. Only when neither is
/// present are the `ItemDTL` batch lines summed, each line read through the
/// same scalar chain.
pub fn quantity_on_hand(record: &Record) -> Decimal {
    if let Some(quantity) = QUANTITY.first_decimal(record) {
        return quantity;
    }

    match record.get(BATCH_DETAIL_KEY) {
        Some(Value::Array(lines)) => lines
            .iter()
            .filter_map(Value::as_object)
            .filter_map(|line| QUANTITY.first_decimal(line))
            .sum(),
        _ => Decimal::ZERO,
    }
}

fn decimal_field(record: &Record, keys: &[&str]) -> Decimal {
    keys.iter()
        .filter_map(|key| record.get(*key))
        .find_map(fields::value_to_decimal)
        .unwrap_or(Decimal::ZERO)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use super::{quantity_on_hand, StockItem};

    fn record(value: serde_json::Value) -> crate::domain::fields::Record {
        value.as_object().cloned().expect("test record must be an object")
    }

    #[test]
    fn batch_lines_are_summed_when_scalar_missing() {
        let row = record(json!({
            "ItemCode": "APPLE",
            "ItemDTL": [{"BalQty": 4}, {"Qty": "6.5"}, {"Remark": "no qty"}]
        }));

        assert_eq!(quantity_on_hand(&row), Decimal::new(105, 1));
    }

    #[test]
    fn scalar_quantity_wins_over_batch_lines() {
        let row = record(json!({
            "ItemCode": "APPLE",
            "BalQty": 10,
            "ItemDTL": [{"BalQty": 4}, {"BalQty": 6}]
        }));

        assert_eq!(quantity_on_hand(&row), Decimal::from(10));
    }

    #[test]
    fn quantity_defaults_to_zero() {
        assert_eq!(quantity_on_hand(&record(json!({"ItemCode": "X"}))), Decimal::ZERO);
    }

    #[test]
    fn record_conversion_fills_display_defaults() {
        let item = StockItem::from_record(&record(json!({
            "ItemCode": "APPLE",
            "Price": 5.0,
            "ItemGroup": "FRUIT"
        })));

        assert_eq!(item.description, "APPLE");
        assert_eq!(item.unit_of_measure, "UNIT");
        assert_eq!(item.price, Decimal::from(5));
        assert_eq!(item.cost, Decimal::ZERO);
        assert_eq!(item.group.as_deref(), Some("FRUIT"));
        assert_eq!(item.item_type, None);
    }

    #[test]
    fn keyword_matching_is_case_insensitive() {
        let item = StockItem::from_record(&record(json!({
            "ItemCode": "IP15",
            "Description": "iPhone 15 Pro"
        })));

        assert!(item.matches_code("ip15"));
        assert!(item.contains_keyword("IPHONE"));
        assert!(!item.contains_keyword("samsung"));
        assert!(!item.contains_keyword("  "));
    }
}
