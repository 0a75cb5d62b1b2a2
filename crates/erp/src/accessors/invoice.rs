use aiaa_core::domain::invoice::{self, CreateOutcome, NewInvoice};
use tracing::{info, warn};

use super::{unavailable, ErpService};
use crate::client::HttpMethod;
use crate::gateway::ErpError;

impl ErpService {
    pub(crate) async fn submit_invoice(
        &self,
        new_invoice: &NewInvoice,
    ) -> Result<CreateOutcome, ErpError> {
        let endpoint = &self.session.endpoints().invoice_create;
        let response = self
            .session
            .request_outcome(HttpMethod::Post, endpoint, Some(new_invoice.to_payload()))
            .await
            .map_err(unavailable)?;

        let outcome =
            invoice::classify_create_response(response.as_ref(), invoice::DOCUMENT_NUMBER_KEY);
        match &outcome {
            CreateOutcome::Created { number } => info!(
                event_name = "erp.invoice.created",
                doc_no = %number,
                debtor_code = %new_invoice.debtor_code,
                "invoice created"
            ),
            CreateOutcome::Rejected { raw } => warn!(
                event_name = "erp.invoice.create_rejected",
                debtor_code = %new_invoice.debtor_code,
                response = %raw,
                "invoice creation rejected"
            ),
        }
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use aiaa_core::domain::invoice::{CreateOutcome, NewInvoice};
    use rust_decimal::Decimal;
    use serde_json::json;

    use crate::accessors::test_support::{session_over, ScriptedErp};
    use crate::accessors::ErpService;
    use crate::client::HttpResponse;
    use crate::gateway::ErpGateway;

    fn invoice() -> NewInvoice {
        NewInvoice {
            debtor_code: "300-A001".to_owned(),
            item_code: "APPLE".to_owned(),
            quantity: Decimal::from(3),
            unit_price: Decimal::new(500, 2),
            description: None,
        }
    }

    #[tokio::test]
    async fn created_invoice_number_is_read_from_result_table() {
        let erp = ScriptedErp::with_responses(vec![HttpResponse::json(
            200,
            json!({"Status": "Success", "ResultTable": [{"DocNo": "IV-000123"}]}),
        )]);
        let service = ErpService::new(session_over(erp.clone()), "G01-A");

        let outcome = service.create_invoice(&invoice()).await.expect("gateway call");

        assert_eq!(outcome, CreateOutcome::Created { number: "IV-000123".to_owned() });
        let sent = erp.bodies();
        assert_eq!(sent[0][0]["IVDTL"][0], json!({"ItemCode": "APPLE", "Qty": 3, "UnitPrice": 5}));
        assert_eq!(sent[0][0]["DebtorCode"], json!("300-A001"));
    }

    #[tokio::test]
    async fn failed_submission_is_a_rejection_not_an_error() {
        let erp = ScriptedErp::with_responses(vec![HttpResponse::json(400, json!({"Message": "bad"}))]);
        let service = ErpService::new(session_over(erp), "G01-A");

        let outcome = service.create_invoice(&invoice()).await.expect("gateway call");

        assert!(matches!(outcome, CreateOutcome::Rejected { .. }));
    }
}
