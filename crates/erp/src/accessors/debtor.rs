use aiaa_core::domain::debtor::Debtor;
use aiaa_core::domain::fields;
use aiaa_core::domain::invoice::{self, CreateOutcome, NewDebtor};
use serde_json::json;
use tracing::{debug, info, warn};

use super::{unavailable, ErpService};
use crate::client::HttpMethod;
use crate::gateway::ErpError;

impl ErpService {
    pub(crate) async fn fetch_debtors(&self) -> Result<Vec<Debtor>, ErpError> {
        let endpoint = &self.session.endpoints().debtor_list;
        let payload = json!({ "AccNo": [] });

        let Some(response) = self
            .session
            .request_outcome(HttpMethod::Post, endpoint, Some(payload))
            .await
            .map_err(unavailable)?
        else {
            return Ok(Vec::new());
        };

        let debtors: Vec<Debtor> =
            fields::rows_from_response(&response).iter().map(Debtor::from_record).collect();
        debug!(event_name = "erp.debtor.fetched", count = debtors.len(), "debtor list downloaded");
        Ok(debtors)
    }

    pub(crate) async fn submit_debtor(&self, debtor: &NewDebtor) -> Result<CreateOutcome, ErpError> {
        let endpoint = &self.session.endpoints().debtor_create;
        let payload = debtor.to_payload(&self.debtor_type);
        let response = self
            .session
            .request_outcome(HttpMethod::Post, endpoint, Some(payload))
            .await
            .map_err(unavailable)?;

        let outcome =
            invoice::classify_create_response(response.as_ref(), invoice::ACCOUNT_NUMBER_KEY);
        match &outcome {
            CreateOutcome::Created { number } => info!(
                event_name = "erp.debtor.created",
                account_no = %number,
                "debtor created"
            ),
            CreateOutcome::Rejected { raw } => warn!(
                event_name = "erp.debtor.create_rejected",
                response = %raw,
                "debtor creation rejected"
            ),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use aiaa_core::domain::invoice::{CreateOutcome, NewDebtor};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::accessors::test_support::{session_over, ScriptedErp};
    use crate::accessors::ErpService;
    use crate::client::HttpResponse;
    use crate::gateway::ErpGateway;

    fn directory() -> HttpResponse {
        HttpResponse::json(
            200,
            json!([
                {"AccNo": "300-A001", "CompanyName": "ABC Company", "Balance": 1200},
                {"AccNo": "300-B001", "CompanyName": "Beta Trading", "Outstanding": "4500.50"},
                {"AccNo": "300-C001", "CompanyName": "Cash Sales", "NetTotal": 0}
            ]),
        )
    }

    #[tokio::test]
    async fn top_debtors_use_balance_fallback_chain() {
        let erp = ScriptedErp::with_responses(vec![directory()]);
        let service = ErpService::new(session_over(erp.clone()), "G01-A");

        let top = service.top_debtors(5).await.expect("gateway call");

        assert_eq!(top.len(), 2);
        assert_eq!(top[0].account_no, "300-B001");
        assert_eq!(top[0].balance, Decimal::new(450_050, 2));
        assert_eq!(erp.bodies(), vec![json!({"AccNo": []})]);
    }

    #[tokio::test]
    async fn find_debtor_by_partial_name() {
        let erp = ScriptedErp::with_responses(vec![directory()]);
        let service = ErpService::new(session_over(erp), "G01-A");

        let found = service.find_debtor("beta").await.expect("gateway call");

        assert_eq!(found.map(|debtor| debtor.account_no), Some("300-B001".to_owned()));
    }

    #[tokio::test]
    async fn create_debtor_sends_configured_type_and_reads_account_number() {
        let erp = ScriptedErp::with_responses(vec![HttpResponse::json(
            200,
            json!([{"AccNo": "300-K001"}]),
        )]);
        let service = ErpService::new(session_over(erp.clone()), "G02-B");

        let outcome = service
            .create_debtor(&NewDebtor {
                company_name: "Kedai Ali".to_owned(),
                phone: "012-3456789".to_owned(),
                address: String::new(),
                register_no: String::new(),
            })
            .await
            .expect("gateway call");

        assert_eq!(outcome, CreateOutcome::Created { number: "300-K001".to_owned() });
        let sent = erp.bodies();
        assert_eq!(sent[0]["DebtorType"], json!("G02-B"));
        assert_eq!(sent[0]["CompanyName"], json!("Kedai Ali"));
    }
}
