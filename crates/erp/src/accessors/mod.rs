//! ERP accessors: each wraps one or two endpoints of [`ErpSession`] and turns
//! raw rows into domain records.
//!
//! [`ErpSession`]: crate::client::ErpSession

mod debtor;
mod invoice;
mod sales;
mod stock;

use std::sync::Arc;

use aiaa_core::domain::debtor::Debtor;
use aiaa_core::domain::invoice::{CreateOutcome, NewDebtor, NewInvoice};
use aiaa_core::domain::sales::SalesSummary;
use aiaa_core::domain::stock::StockItem;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::client::{ErpSession, TransportError};
use crate::gateway::{ErpError, ErpGateway};

pub struct ErpService {
    session: Arc<ErpSession>,
    debtor_type: String,
}

impl ErpService {
    pub fn new(session: Arc<ErpSession>, debtor_type: impl Into<String>) -> Self {
        Self { session, debtor_type: debtor_type.into() }
    }

    pub fn session(&self) -> &Arc<ErpSession> {
        &self.session
    }
}

#[async_trait]
impl ErpGateway for ErpService {
    async fn list_stock(&self, limit: usize) -> Result<Vec<StockItem>, ErpError> {
        let mut items = self.fetch_stock().await?;
        items.truncate(limit);
        Ok(items)
    }

    async fn find_stock(&self, keyword: &str) -> Result<Option<StockItem>, ErpError> {
        Ok(crate::gateway::search_stock(self.fetch_stock().await?, keyword))
    }

    async fn list_debtors(&self, limit: usize) -> Result<Vec<Debtor>, ErpError> {
        let mut debtors = self.fetch_debtors().await?;
        debtors.truncate(limit);
        Ok(debtors)
    }

    async fn top_debtors(&self, limit: usize) -> Result<Vec<Debtor>, ErpError> {
        Ok(crate::gateway::rank_top_debtors(self.fetch_debtors().await?, limit))
    }

    async fn find_debtor(&self, keyword: &str) -> Result<Option<Debtor>, ErpError> {
        Ok(crate::gateway::search_debtor(self.fetch_debtors().await?, keyword))
    }

    async fn sales_summary(&self, date: NaiveDate) -> Result<SalesSummary, ErpError> {
        self.fetch_sales_summary(date).await
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<CreateOutcome, ErpError> {
        self.submit_invoice(invoice).await
    }

    async fn create_debtor(&self, debtor: &NewDebtor) -> Result<CreateOutcome, ErpError> {
        self.submit_debtor(debtor).await
    }
}

/// The ERP could not be reached at all, as opposed to answering without data.
fn unavailable(error: TransportError) -> ErpError {
    ErpError::Unavailable(error.to_string())
}
