use aiaa_core::domain::debtor::Debtor;
use aiaa_core::domain::invoice::{CreateOutcome, NewDebtor, NewInvoice};
use aiaa_core::domain::sales::SalesSummary;
use aiaa_core::domain::stock::StockItem;
use async_trait::async_trait;
use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

pub const DEFAULT_LIST_LIMIT: usize = 20;
pub const DEFAULT_TOP_DEBTORS: usize = 5;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ErpError {
    #[error("erp service unavailable: {0}")]
    Unavailable(String),
}

/// Read and write operations the assistant performs against the ERP.
///
/// Reads download the full collection and filter locally; the ERP offers no
/// server-side querying.
#[async_trait]
pub trait ErpGateway: Send + Sync {
    async fn list_stock(&self, limit: usize) -> Result<Vec<StockItem>, ErpError>;
    async fn find_stock(&self, keyword: &str) -> Result<Option<StockItem>, ErpError>;
    async fn list_debtors(&self, limit: usize) -> Result<Vec<Debtor>, ErpError>;
    async fn top_debtors(&self, limit: usize) -> Result<Vec<Debtor>, ErpError>;
    async fn find_debtor(&self, keyword: &str) -> Result<Option<Debtor>, ErpError>;
    async fn sales_summary(&self, date: NaiveDate) -> Result<SalesSummary, ErpError>;
    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<CreateOutcome, ErpError>;
    async fn create_debtor(&self, debtor: &NewDebtor) -> Result<CreateOutcome, ErpError>;
}

/// Exact code match first, then the first item whose code or description
/// contains the keyword.
pub fn search_stock(items: Vec<StockItem>, keyword: &str) -> Option<StockItem> {
    if let Some(position) = items.iter().position(|item| item.matches_code(keyword)) {
        return items.into_iter().nth(position);
    }
    items.into_iter().find(|item| item.contains_keyword(keyword))
}

pub fn search_debtor(debtors: Vec<Debtor>, keyword: &str) -> Option<Debtor> {
    if let Some(position) = debtors.iter().position(|debtor| debtor.matches_code(keyword)) {
        return debtors.into_iter().nth(position);
    }
    debtors.into_iter().find(|debtor| debtor.contains_keyword(keyword))
}

/// Debtors with a positive balance, largest first.
pub fn rank_top_debtors(debtors: Vec<Debtor>, limit: usize) -> Vec<Debtor> {
    let mut owing: Vec<Debtor> =
        debtors.into_iter().filter(|debtor| debtor.balance > Decimal::ZERO).collect();
    owing.sort_by(|left, right| right.balance.cmp(&left.balance));
    owing.truncate(limit);
    owing
}

#[cfg(test)]
mod tests {
    use aiaa_core::domain::debtor::Debtor;
    use aiaa_core::domain::stock::StockItem;
    use rust_decimal::Decimal;

    use super::{rank_top_debtors, search_debtor, search_stock};

    fn item(code: &str, description: &str) -> StockItem {
        StockItem {
            code: code.to_owned(),
            description: description.to_owned(),
            unit_of_measure: "UNIT".to_owned(),
            price: Decimal::ZERO,
            cost: Decimal::ZERO,
            group: None,
            item_type: None,
            quantity: Decimal::ZERO,
        }
    }

    fn debtor(code: &str, name: &str, balance: i64) -> Debtor {
        Debtor {
            account_no: code.to_owned(),
            company_name: name.to_owned(),
            balance: Decimal::from(balance),
            credit_limit: Decimal::ZERO,
            credit_term: None,
            phone: None,
            fax: None,
            address: None,
        }
    }

    #[test]
    fn exact_code_beats_earlier_partial_match() {
        let items = vec![item("APPLE-GREEN", "Green Apple"), item("APPLE", "Red Apple")];

        let found = search_stock(items, "apple").expect("item found");

        assert_eq!(found.code, "APPLE");
    }

    #[test]
    fn description_substring_is_a_fallback() {
        let items = vec![item("IP15", "iPhone 15"), item("SGS24", "Galaxy S24")];

        assert_eq!(search_stock(items.clone(), "galaxy").map(|found| found.code), Some("SGS24".to_owned()));
        assert_eq!(search_stock(items, "nokia"), None);
    }

    #[test]
    fn debtor_search_matches_name() {
        let debtors = vec![debtor("300-A001", "ABC Company", 10), debtor("300-B001", "Beta", 0)];

        assert_eq!(
            search_debtor(debtors, "abc").map(|found| found.account_no),
            Some("300-A001".to_owned())
        );
    }

    #[test]
    fn top_debtors_drop_settled_accounts_and_sort_descending() {
        let debtors = vec![
            debtor("A", "A", 100),
            debtor("B", "B", 0),
            debtor("C", "C", 900),
            debtor("D", "D", -50),
            debtor("E", "E", 300),
        ];

        let ranked = rank_top_debtors(debtors, 2);

        let codes: Vec<&str> = ranked.iter().map(|debtor| debtor.account_no.as_str()).collect();
        assert_eq!(codes, vec!["C", "E"]);
    }
}
