use aiaa_core::domain::fields;
use aiaa_core::domain::stock::StockItem;
use serde_json::json;
use tracing::debug;

use super::{unavailable, ErpService};
use crate::client::HttpMethod;
use crate::gateway::ErpError;

impl ErpService {
    /// Full item list including per-batch balances.
    pub(crate) async fn fetch_stock(&self) -> Result<Vec<StockItem>, ErpError> {
        let endpoint = &self.session.endpoints().item_list;
        let payload = json!({ "ItemCode": [], "IncludeBatchBal": true });

        let Some(response) = self
            .session
            .request_outcome(HttpMethod::Post, endpoint, Some(payload))
            .await
            .map_err(unavailable)?
        else {
            return Ok(Vec::new());
        };

        let items: Vec<StockItem> =
            fields::rows_from_response(&response).iter().map(StockItem::from_record).collect();
        debug!(event_name = "erp.stock.fetched", count = items.len(), "stock list downloaded");
        Ok(items)
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::accessors::test_support::{session_over, ScriptedErp};
    use crate::accessors::ErpService;
    use crate::client::HttpResponse;
    use crate::gateway::ErpGateway;

    #[tokio::test]
    async fn stock_rows_come_from_result_table() {
        let erp = ScriptedErp::with_responses(vec![HttpResponse::json(
            200,
            json!({"ResultTable": [
                {"ItemCode": "APPLE", "Description": "Red Apple", "Price": 5.0,
                 "ItemDTL": [{"BalQty": 2}, {"BalQty": 3}]},
                {"ItemCode": "PEAR", "BalQty": 1}
            ]}),
        )]);
        let service = ErpService::new(session_over(erp.clone()), "G01-A");

        let found = service.find_stock("apple").await.expect("gateway call");

        let apple = found.expect("apple is listed");
        assert_eq!(apple.quantity, Decimal::from(5));
        assert_eq!(apple.price, Decimal::from(5));
        assert_eq!(erp.bodies(), vec![json!({"ItemCode": [], "IncludeBatchBal": true})]);
    }

    #[tokio::test]
    async fn unknown_item_is_not_found_rather_than_error() {
        let erp = ScriptedErp::with_responses(vec![HttpResponse::json(
            200,
            json!([{"ItemCode": "APPLE"}]),
        )]);
        let service = ErpService::new(session_over(erp), "G01-A");

        assert_eq!(service.find_stock("DURIAN").await, Ok(None));
    }

    #[tokio::test]
    async fn missing_response_reads_as_empty_list() {
        let erp = ScriptedErp::with_responses(vec![HttpResponse::empty(500)]);
        let service = ErpService::new(session_over(erp), "G01-A");

        assert_eq!(service.list_stock(20).await, Ok(Vec::new()));
    }

    #[tokio::test]
    async fn list_is_truncated_to_limit() {
        let rows: Vec<_> = (0..30).map(|n| json!({"ItemCode": format!("I{n}")})).collect();
        let erp = ScriptedErp::with_responses(vec![HttpResponse::json(200, json!(rows))]);
        let service = ErpService::new(session_over(erp), "G01-A");

        let items = service.list_stock(20).await.expect("gateway call");

        assert_eq!(items.len(), 20);
        assert_eq!(items[0].code, "I0");
    }
}
