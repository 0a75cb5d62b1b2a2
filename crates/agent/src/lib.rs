//! Conversation layer of the assistant.
//!
//! Free text goes to the [`classifier`], which asks a language model for an
//! `{intent, args}` object. The [`runtime`] routes intents and button presses
//! to the ERP gateway, drives the create-invoice and create-debtor wizards
//! held in [`sessions`], and renders every answer through [`format`].
//!
//! The model only names the intent. Prices, totals and what gets written to
//! the ERP come from the ERP itself and from the wizard's collected values.

pub mod classifier;
pub mod format;
pub mod llm;
pub mod runtime;
pub mod sessions;

pub use classifier::IntentClassifier;
pub use llm::{client_from_config, LlmClient, OllamaClient, OpenAiClient};
pub use runtime::AgentRuntime;
pub use sessions::{SessionError, WizardSessions};
