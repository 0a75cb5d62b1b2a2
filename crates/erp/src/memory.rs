use std::sync::Mutex;

use aiaa_core::domain::debtor::Debtor;
use aiaa_core::domain::invoice::{CreateOutcome, InvoiceHeader, NewDebtor, NewInvoice};
use aiaa_core::domain::sales::SalesSummary;
use aiaa_core::domain::stock::StockItem;
use async_trait::async_trait;
use chrono::NaiveDate;

use crate::gateway::{self, ErpError, ErpGateway};

/// Gateway over fixed in-process data. Records every create call and answers
/// it with the configured outcome.
#[derive(Default)]
pub struct InMemoryErpGateway {
    pub stock: Vec<StockItem>,
    pub debtors: Vec<Debtor>,
    pub invoices: Vec<InvoiceHeader>,
    pub invoice_outcome: Option<CreateOutcome>,
    pub debtor_outcome: Option<CreateOutcome>,
    pub unavailable: bool,
    pub created_invoices: Mutex<Vec<NewInvoice>>,
    pub created_debtors: Mutex<Vec<NewDebtor>>,
}

impl InMemoryErpGateway {
    pub fn created_invoices(&self) -> Vec<NewInvoice> {
        self.created_invoices.lock().map(|created| created.clone()).unwrap_or_default()
    }

    pub fn created_debtors(&self) -> Vec<NewDebtor> {
        self.created_debtors.lock().map(|created| created.clone()).unwrap_or_default()
    }

    fn check_available(&self) -> Result<(), ErpError> {
        if self.unavailable {
            return Err(ErpError::Unavailable("in-memory gateway marked unavailable".to_owned()));
        }
        Ok(())
    }
}

#[async_trait]
impl ErpGateway for InMemoryErpGateway {
    async fn list_stock(&self, limit: usize) -> Result<Vec<StockItem>, ErpError> {
        self.check_available()?;
        Ok(self.stock.iter().take(limit).cloned().collect())
    }

    async fn find_stock(&self, keyword: &str) -> Result<Option<StockItem>, ErpError> {
        self.check_available()?;
        Ok(gateway::search_stock(self.stock.clone(), keyword))
    }

    async fn list_debtors(&self, limit: usize) -> Result<Vec<Debtor>, ErpError> {
        self.check_available()?;
        Ok(self.debtors.iter().take(limit).cloned().collect())
    }

    async fn top_debtors(&self, limit: usize) -> Result<Vec<Debtor>, ErpError> {
        self.check_available()?;
        Ok(gateway::rank_top_debtors(self.debtors.clone(), limit))
    }

    async fn find_debtor(&self, keyword: &str) -> Result<Option<Debtor>, ErpError> {
        self.check_available()?;
        Ok(gateway::search_debtor(self.debtors.clone(), keyword))
    }

    async fn sales_summary(&self, date: NaiveDate) -> Result<SalesSummary, ErpError> {
        self.check_available()?;
        Ok(SalesSummary::aggregate(date, &self.invoices))
    }

    async fn create_invoice(&self, invoice: &NewInvoice) -> Result<CreateOutcome, ErpError> {
        self.check_available()?;
        if let Ok(mut created) = self.created_invoices.lock() {
            created.push(invoice.clone());
        }
        Ok(self
            .invoice_outcome
            .clone()
            .unwrap_or_else(|| CreateOutcome::Created { number: "IV-00001".to_owned() }))
    }

    async fn create_debtor(&self, debtor: &NewDebtor) -> Result<CreateOutcome, ErpError> {
        self.check_available()?;
        if let Ok(mut created) = self.created_debtors.lock() {
            created.push(debtor.clone());
        }
        Ok(self
            .debtor_outcome
            .clone()
            .unwrap_or_else(|| CreateOutcome::Created { number: "300-N001".to_owned() }))
    }
}

#[cfg(test)]
mod tests {
    use aiaa_core::domain::invoice::{CreateOutcome, NewInvoice};
    use rust_decimal::Decimal;

    use super::InMemoryErpGateway;
    use crate::gateway::{ErpError, ErpGateway};

    #[tokio::test]
    async fn create_calls_are_recorded() {
        let gateway = InMemoryErpGateway::default();
        let invoice = NewInvoice {
            debtor_code: "300-A001".to_owned(),
            item_code: "APPLE".to_owned(),
            quantity: Decimal::from(3),
            unit_price: Decimal::new(500, 2),
            description: None,
        };

        let outcome = gateway.create_invoice(&invoice).await.expect("create");

        assert!(matches!(outcome, CreateOutcome::Created { .. }));
        assert_eq!(gateway.created_invoices(), vec![invoice]);
    }

    #[tokio::test]
    async fn unavailable_gateway_fails_every_call() {
        let gateway = InMemoryErpGateway { unavailable: true, ..InMemoryErpGateway::default() };

        assert!(matches!(gateway.list_stock(5).await, Err(ErpError::Unavailable(_))));
        assert!(gateway.created_invoices().is_empty());
    }
}
