use std::str::FromStr;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::flows::states::{
    FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome, WizardScratch,
};

pub trait FlowDefinition {
    fn flow_type(&self) -> FlowType;
    fn initial_state(&self) -> FlowState;
    fn entry_actions(&self) -> Vec<FlowAction>;
    fn transition(
        &self,
        current: FlowState,
        event: &FlowEvent,
        scratch: &WizardScratch,
    ) -> Result<TransitionOutcome, FlowTransitionError>;
}

/// Debtor, item, quantity, then confirmation.
#[derive(Clone, Debug, Default)]
pub struct InvoiceFlow;

impl FlowDefinition for InvoiceFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::Invoice
    }

    fn initial_state(&self) -> FlowState {
        FlowState::AwaitingDebtor
    }

    fn entry_actions(&self) -> Vec<FlowAction> {
        vec![FlowAction::PromptForDebtor]
    }

    fn transition(
        &self,
        current: FlowState,
        event: &FlowEvent,
        scratch: &WizardScratch,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_invoice(current, event, scratch)
    }
}

/// Company name, phone, then confirmation.
#[derive(Clone, Debug, Default)]
pub struct DebtorFlow;

impl FlowDefinition for DebtorFlow {
    fn flow_type(&self) -> FlowType {
        FlowType::Debtor
    }

    fn initial_state(&self) -> FlowState {
        FlowState::AwaitingName
    }

    fn entry_actions(&self) -> Vec<FlowAction> {
        vec![FlowAction::PromptForName]
    }

    fn transition(
        &self,
        current: FlowState,
        event: &FlowEvent,
        scratch: &WizardScratch,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        transition_debtor(current, event, scratch)
    }
}

/// Runs the definition behind a [`FlowType`]; sessions only ever talk to
/// flows through here.
pub struct FlowEngine {
    flow: &'static (dyn FlowDefinition + Sync),
}

impl FlowEngine {
    pub fn for_flow(flow: FlowType) -> Self {
        let flow: &'static (dyn FlowDefinition + Sync) = match flow {
            FlowType::Invoice => &InvoiceFlow,
            FlowType::Debtor => &DebtorFlow,
        };
        Self { flow }
    }

    pub fn flow_type(&self) -> FlowType {
        self.flow.flow_type()
    }

    pub fn initial_state(&self) -> FlowState {
        self.flow.initial_state()
    }

    pub fn entry_actions(&self) -> Vec<FlowAction> {
        self.flow.entry_actions()
    }

    pub fn apply(
        &self,
        current: FlowState,
        event: &FlowEvent,
        scratch: &WizardScratch,
    ) -> Result<TransitionOutcome, FlowTransitionError> {
        self.flow.transition(current, event, scratch)
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum FlowTransitionError {
    #[error("missing required fields before transition from {state:?}: {missing_fields:?}")]
    MissingRequiredFields { state: FlowState, missing_fields: Vec<String> },
    #[error("invalid transition from {state:?} using event {event:?}")]
    InvalidTransition { state: FlowState, event: FlowEvent },
}

/// One chat's in-flight wizard: which flow, where it is, and what it holds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WizardSession {
    pub flow: FlowType,
    pub state: FlowState,
    pub scratch: WizardScratch,
}

impl WizardSession {
    pub fn start(flow: FlowType) -> (Self, Vec<FlowAction>) {
        let engine = FlowEngine::for_flow(flow);
        let session = Self { flow, state: engine.initial_state(), scratch: WizardScratch::default() };
        (session, engine.entry_actions())
    }

    /// Applies `event` and, on success, moves the session to the outcome's
    /// state and scratch. A rejected event leaves the session untouched.
    pub fn advance(&mut self, event: FlowEvent) -> Result<TransitionOutcome, FlowTransitionError> {
        let outcome = FlowEngine::for_flow(self.flow).apply(self.state, &event, &self.scratch)?;

        self.state = outcome.to;
        self.scratch = outcome.scratch.clone();
        Ok(outcome)
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }
}

/// Parses quantity text; only positive numbers are accepted.
pub fn parse_quantity(input: &str) -> Option<Decimal> {
    let trimmed = input.trim();
    Decimal::from_str(trimmed)
        .ok()
        .filter(|quantity| *quantity > Decimal::ZERO)
        .map(|quantity| quantity.normalize())
}

fn transition_invoice(
    current: FlowState,
    event: &FlowEvent,
    scratch: &WizardScratch,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{
        DiscardScratch, PresentSummary, PromptForDebtor, PromptForItem, PromptForQuantity,
        RepromptQuantity, SubmitInvoice,
    };
    use FlowState::{
        AwaitingConfirm, AwaitingDebtor, AwaitingItem, AwaitingQuantity, Cancelled, Completed,
    };

    let mut next = scratch.clone();
    let (to, actions) = match (current, event) {
        (_, FlowEvent::CancelRequested) if !current.is_terminal() => {
            next = WizardScratch::default();
            (Cancelled, vec![DiscardScratch])
        }
        (AwaitingDebtor, FlowEvent::DebtorEntered(code)) => match non_blank(code) {
            Some(code) => {
                next.debtor_code = Some(code);
                (AwaitingItem, vec![PromptForItem])
            }
            None => (AwaitingDebtor, vec![PromptForDebtor]),
        },
        (AwaitingItem, FlowEvent::ItemResolved { code, description, unit_price }) => {
            match non_blank(code) {
                Some(code) => {
                    next.item_code = Some(code);
                    next.description = Some(description.clone());
                    next.unit_price = Some(*unit_price);
                    (AwaitingQuantity, vec![PromptForQuantity])
                }
                None => (AwaitingItem, vec![PromptForItem]),
            }
        }
        (AwaitingQuantity, FlowEvent::QuantityEntered(input)) => match parse_quantity(input) {
            Some(quantity) => {
                next.quantity = Some(quantity);
                (AwaitingConfirm, vec![PresentSummary])
            }
            None => (AwaitingQuantity, vec![RepromptQuantity { input: input.clone() }]),
        },
        (AwaitingConfirm, FlowEvent::ConfirmationUnclear) => (AwaitingConfirm, vec![PresentSummary]),
        (AwaitingConfirm, FlowEvent::Confirmed) => {
            let Some(invoice) = scratch.to_new_invoice() else {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: current,
                    missing_fields: scratch.missing_invoice_fields(),
                });
            };
            next = WizardScratch::default();
            (Completed, vec![SubmitInvoice(invoice), DiscardScratch])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current, to, event: event.clone(), actions, scratch: next })
}

fn transition_debtor(
    current: FlowState,
    event: &FlowEvent,
    scratch: &WizardScratch,
) -> Result<TransitionOutcome, FlowTransitionError> {
    use FlowAction::{DiscardScratch, PresentSummary, PromptForName, PromptForPhone, SubmitDebtor};
    use FlowState::{AwaitingConfirm, AwaitingName, AwaitingPhone, Cancelled, Completed};

    let mut next = scratch.clone();
    let (to, actions) = match (current, event) {
        (_, FlowEvent::CancelRequested) if !current.is_terminal() => {
            next = WizardScratch::default();
            (Cancelled, vec![DiscardScratch])
        }
        (AwaitingName, FlowEvent::NameEntered(name)) => match non_blank(name) {
            Some(name) => {
                next.company_name = Some(name);
                (AwaitingPhone, vec![PromptForPhone])
            }
            None => (AwaitingName, vec![PromptForName]),
        },
        (AwaitingPhone, FlowEvent::PhoneEntered(phone)) => match non_blank(phone) {
            Some(phone) => {
                next.phone = Some(phone);
                (AwaitingConfirm, vec![PresentSummary])
            }
            None => (AwaitingPhone, vec![PromptForPhone]),
        },
        (AwaitingConfirm, FlowEvent::ConfirmationUnclear) => (AwaitingConfirm, vec![PresentSummary]),
        (AwaitingConfirm, FlowEvent::Confirmed) => {
            let Some(debtor) = scratch.to_new_debtor() else {
                return Err(FlowTransitionError::MissingRequiredFields {
                    state: current,
                    missing_fields: scratch.missing_debtor_fields(),
                });
            };
            next = WizardScratch::default();
            (Completed, vec![SubmitDebtor(debtor), DiscardScratch])
        }
        _ => {
            return Err(FlowTransitionError::InvalidTransition {
                state: current,
                event: event.clone(),
            });
        }
    };

    Ok(TransitionOutcome { from: current, to, event: event.clone(), actions, scratch: next })
}

fn non_blank(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_owned())
}
