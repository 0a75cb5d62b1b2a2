pub mod engine;
pub mod states;

pub use engine::{
    parse_quantity, DebtorFlow, FlowDefinition, FlowEngine, FlowTransitionError, InvoiceFlow,
    WizardSession,
};
pub use states::{FlowAction, FlowEvent, FlowState, FlowType, TransitionOutcome, WizardScratch};
