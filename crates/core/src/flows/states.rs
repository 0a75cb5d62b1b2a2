use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::invoice::{NewDebtor, NewInvoice};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowType {
    Invoice,
    Debtor,
}

impl FlowType {
    pub fn label(self) -> &'static str {
        match self {
            Self::Invoice => "invoice",
            Self::Debtor => "debtor",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FlowState {
    AwaitingDebtor,
    AwaitingItem,
    AwaitingQuantity,
    AwaitingName,
    AwaitingPhone,
    AwaitingConfirm,
    Completed,
    Cancelled,
}

impl FlowState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Cancelled)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowEvent {
    DebtorEntered(String),
    /// Item code after catalogue lookup. A failed lookup still produces this
    /// event with description `unknown` and a zero price.
    ItemResolved { code: String, description: String, unit_price: Decimal },
    QuantityEntered(String),
    NameEntered(String),
    PhoneEntered(String),
    Confirmed,
    ConfirmationUnclear,
    CancelRequested,
}

/// Field values collected so far by an active wizard.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardScratch {
    pub debtor_code: Option<String>,
    pub item_code: Option<String>,
    pub description: Option<String>,
    pub unit_price: Option<Decimal>,
    pub quantity: Option<Decimal>,
    pub company_name: Option<String>,
    pub phone: Option<String>,
}

impl WizardScratch {
    pub fn invoice_total(&self) -> Option<Decimal> {
        Some(self.quantity? * self.unit_price?)
    }

    pub fn missing_invoice_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.debtor_code.is_none() {
            missing.push("debtor_code".to_owned());
        }
        if self.item_code.is_none() {
            missing.push("item_code".to_owned());
        }
        if self.unit_price.is_none() {
            missing.push("unit_price".to_owned());
        }
        if self.quantity.is_none() {
            missing.push("quantity".to_owned());
        }
        missing
    }

    pub fn missing_debtor_fields(&self) -> Vec<String> {
        let mut missing = Vec::new();
        if self.company_name.is_none() {
            missing.push("company_name".to_owned());
        }
        if self.phone.is_none() {
            missing.push("phone".to_owned());
        }
        missing
    }

    pub fn to_new_invoice(&self) -> Option<NewInvoice> {
        Some(NewInvoice {
            debtor_code: self.debtor_code.clone()?,
            item_code: self.item_code.clone()?,
            quantity: self.quantity?,
            unit_price: self.unit_price?,
            description: None,
        })
    }

    pub fn to_new_debtor(&self) -> Option<NewDebtor> {
        Some(NewDebtor {
            company_name: self.company_name.clone()?,
            phone: self.phone.clone()?,
            address: String::new(),
            register_no: String::new(),
        })
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum FlowAction {
    PromptForDebtor,
    PromptForItem,
    PromptForQuantity,
    RepromptQuantity { input: String },
    PromptForName,
    PromptForPhone,
    PresentSummary,
    SubmitInvoice(NewInvoice),
    SubmitDebtor(NewDebtor),
    DiscardScratch,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionOutcome {
    pub from: FlowState,
    pub to: FlowState,
    pub event: FlowEvent,
    pub actions: Vec<FlowAction>,
    pub scratch: WizardScratch,
}
