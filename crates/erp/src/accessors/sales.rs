use aiaa_core::domain::fields;
use aiaa_core::domain::invoice::InvoiceHeader;
use aiaa_core::domain::sales::{self, SalesSummary};
use chrono::NaiveDate;
use serde_json::json;
use tracing::debug;

use super::{unavailable, ErpService};
use crate::client::HttpMethod;
use crate::gateway::ErpError;

impl ErpService {
    /// One invoice-list call covering `date` and the day before it.
    pub(crate) async fn fetch_sales_summary(&self, date: NaiveDate) -> Result<SalesSummary, ErpError> {
        let endpoint = &self.session.endpoints().invoice_list;
        let payload = json!({
            "DateFrom": sales::format_erp_date(sales::previous_day(date)),
            "DateTo": sales::format_erp_date(date),
        });

        let headers: Vec<InvoiceHeader> = self
            .session
            .request_outcome(HttpMethod::Post, endpoint, Some(payload))
            .await
            .map_err(unavailable)?
            .map(|response| {
                fields::rows_from_response(&response).iter().map(InvoiceHeader::from_record).collect()
            })
            .unwrap_or_default();

        let summary = SalesSummary::aggregate(date, &headers);
        debug!(
            event_name = "erp.sales.aggregated",
            date = %sales::format_erp_date(date),
            invoices = headers.len(),
            counted = summary.invoice_count,
            "sales summary computed"
        );
        Ok(summary)
    }
}
