//! Dispatcher and wizard driver.
//!
//! Every public entry point takes the chat's lock, so one chat never has two
//! requests in flight, and returns exactly one reply. Failures are mapped to
//! an [`InterfaceError`](aiaa_core::errors::InterfaceError) carrying a
//! correlation id; nothing escapes to the chat layer.

use std::collections::HashMap;
use std::sync::Arc;

use aiaa_core::domain::chat::ChatId;
use aiaa_core::domain::invoice::{CreateOutcome, NewDebtor, NewInvoice};
use aiaa_core::domain::sales::resolve_sales_date;
use aiaa_core::errors::{ApplicationError, DomainError};
use aiaa_core::flows::{FlowAction, FlowEvent, FlowState, FlowType, WizardScratch};
use aiaa_core::intent::{ButtonAction, IntentKind, IntentResult};
use aiaa_core::reply::ReplyMessage;
use aiaa_erp::gateway::{ErpError, ErpGateway, DEFAULT_LIST_LIMIT, DEFAULT_TOP_DEBTORS};
use chrono::{Local, NaiveDate};
use rust_decimal::Decimal;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::classifier::IntentClassifier;
use crate::format;
use crate::sessions::{SessionError, WizardSessions};

const UNKNOWN_ITEM_DESCRIPTION: &str = "unknown";

pub struct AgentRuntime {
    erp: Arc<dyn ErpGateway>,
    classifier: IntentClassifier,
    sessions: WizardSessions,
    chat_locks: Mutex<HashMap<ChatId, Arc<Mutex<()>>>>,
    fixed_today: Option<NaiveDate>,
}

impl AgentRuntime {
    pub fn new(erp: Arc<dyn ErpGateway>, classifier: IntentClassifier) -> Self {
        Self {
            erp,
            classifier,
            sessions: WizardSessions::new(),
            chat_locks: Mutex::new(HashMap::new()),
            fixed_today: None,
        }
    }

    /// Pins "today" for sales requests and the classifier prompt.
    pub fn with_fixed_date(mut self, today: NaiveDate) -> Self {
        self.fixed_today = Some(today);
        self
    }

    pub fn sessions(&self) -> &WizardSessions {
        &self.sessions
    }

    pub fn main_menu(&self) -> ReplyMessage {
        format::welcome()
    }

    pub fn help(&self) -> ReplyMessage {
        format::help()
    }

    /// Free text: feeds an active wizard, otherwise goes through the
    /// classifier and the dispatcher.
    pub async fn handle_text(&self, chat: ChatId, text: &str) -> ReplyMessage {
        let lock = self.chat_lock(chat).await;
        let _guard = lock.lock().await;

        let result = match self.sessions.current(chat).await {
            Some(session) => self.drive_wizard(chat, session.flow, session.state, text).await,
            None => {
                let intent = self.classifier.classify_on(text, self.today()).await;
                self.dispatch(chat, &intent).await
            }
        };
        self.settle(chat, result)
    }

    /// Button presses skip the classifier.
    pub async fn handle_button(&self, chat: ChatId, button_id: &str) -> ReplyMessage {
        let lock = self.chat_lock(chat).await;
        let _guard = lock.lock().await;

        let result = match ButtonAction::from_button(button_id) {
            ButtonAction::Intent(intent) => self.dispatch(chat, &intent).await,
            ButtonAction::WizardConfirm => match self.sessions.current(chat).await {
                Some(session) if session.state == FlowState::AwaitingConfirm => {
                    self.advance_wizard(chat, session.flow, FlowEvent::Confirmed).await
                }
                _ => Ok(format::nothing_to_confirm()),
            },
            ButtonAction::WizardCancel => self.cancel_active(chat).await,
            ButtonAction::Unrecognized(id) => {
                warn!(
                    event_name = "agent.dispatch.unknown_button",
                    chat_id = %chat,
                    button_id = %id,
                    "unrecognised button, showing main menu"
                );
                Ok(format::welcome())
            }
        };
        self.settle(chat, result)
    }

    pub async fn start_wizard(&self, chat: ChatId, flow: FlowType) -> ReplyMessage {
        let lock = self.chat_lock(chat).await;
        let _guard = lock.lock().await;

        let result = self.begin_wizard(chat, flow).await;
        self.settle(chat, result)
    }

    pub async fn cancel_wizard(&self, chat: ChatId) -> ReplyMessage {
        let lock = self.chat_lock(chat).await;
        let _guard = lock.lock().await;

        let result = self.cancel_active(chat).await;
        self.settle(chat, result)
    }

    pub async fn dispatch(
        &self,
        chat: ChatId,
        intent: &IntentResult,
    ) -> Result<ReplyMessage, ApplicationError> {
        let kind = intent.kind();
        info!(
            event_name = "agent.dispatch.intent",
            chat_id = %chat,
            intent = kind.as_str(),
            raw_intent = %intent.intent,
            "dispatching intent"
        );

        match kind {
            IntentKind::CheckStock => {
                let Some(keyword) = intent.text_arg(&["item_code", "item", "code", "keyword"]) else {
                    return Ok(format::missing_argument("Which item? e.g. 'check stock APPLE'"));
                };
                Ok(match self.erp.find_stock(&keyword).await.map_err(integration)? {
                    Some(item) => format::stock_card(&item),
                    None => format::stock_not_found(&keyword),
                })
            }
            IntentKind::ListStock => {
                let items = self.erp.list_stock(DEFAULT_LIST_LIMIT).await.map_err(integration)?;
                Ok(format::stock_list(&items))
            }
            IntentKind::CheckDebtorInfo => {
                let Some(keyword) = intent.text_arg(&["name", "debtor_name_or_code", "code"]) else {
                    return Ok(format::missing_argument("Which debtor? e.g. 'show debtor ABC Company'"));
                };
                Ok(match self.erp.find_debtor(&keyword).await.map_err(integration)? {
                    Some(debtor) => format::debtor_card(&debtor),
                    None => format::debtor_not_found(&keyword),
                })
            }
            IntentKind::ListCustomers => {
                let debtors = self.erp.list_debtors(DEFAULT_LIST_LIMIT).await.map_err(integration)?;
                Ok(format::debtor_directory(&debtors))
            }
            IntentKind::ListTopDebtors => {
                let limit = intent.limit_arg("limit", DEFAULT_TOP_DEBTORS);
                let debtors = self.erp.top_debtors(limit).await.map_err(integration)?;
                Ok(format::top_debtors(&debtors))
            }
            IntentKind::GetSales => {
                let today = self.today();
                let raw_date = intent.text_arg(&["date", "date_text"]);
                let date = match resolve_sales_date(raw_date.as_deref(), today) {
                    Ok(date) => date,
                    Err(DomainError::UnreadableDate(raw)) => return Ok(format::unreadable_date(&raw)),
                    Err(other) => return Err(other.into()),
                };
                let summary = self.erp.sales_summary(date).await.map_err(integration)?;
                Ok(format::sales_report(&summary, today))
            }
            IntentKind::CreateInvoice => self.begin_wizard(chat, FlowType::Invoice).await,
            IntentKind::CreateDebtor => self.begin_wizard(chat, FlowType::Debtor).await,
            IntentKind::Help => Ok(format::help()),
            IntentKind::Menu => Ok(format::welcome()),
            IntentKind::Unknown => Ok(format::not_understood()),
        }
    }

    async fn begin_wizard(
        &self,
        chat: ChatId,
        flow: FlowType,
    ) -> Result<ReplyMessage, ApplicationError> {
        match self.sessions.start(chat, flow).await {
            Ok(actions) => {
                info!(
                    event_name = "agent.wizard.started",
                    chat_id = %chat,
                    flow = flow.label(),
                    "wizard started"
                );
                self.render_actions(chat, flow, &actions, &WizardScratch::default()).await
            }
            Err(SessionError::AlreadyActive(active)) => {
                info!(
                    event_name = "agent.wizard.start_rejected",
                    chat_id = %chat,
                    requested = flow.label(),
                    active = active.label(),
                    "wizard already active"
                );
                Ok(format::wizard_busy())
            }
            Err(other) => Err(session_failure(other)),
        }
    }

    async fn cancel_active(&self, chat: ChatId) -> Result<ReplyMessage, ApplicationError> {
        match self.sessions.current(chat).await {
            Some(session) => self.advance_wizard(chat, session.flow, FlowEvent::CancelRequested).await,
            None => Ok(format::nothing_to_cancel()),
        }
    }

    async fn drive_wizard(
        &self,
        chat: ChatId,
        flow: FlowType,
        state: FlowState,
        text: &str,
    ) -> Result<ReplyMessage, ApplicationError> {
        let input = text.trim();
        let event = if is_cancel_request(input) {
            FlowEvent::CancelRequested
        } else {
            match state {
                FlowState::AwaitingDebtor => FlowEvent::DebtorEntered(input.to_owned()),
                FlowState::AwaitingItem => self.resolve_item(chat, input).await,
                FlowState::AwaitingQuantity => FlowEvent::QuantityEntered(input.to_owned()),
                FlowState::AwaitingName => FlowEvent::NameEntered(input.to_owned()),
                FlowState::AwaitingPhone => FlowEvent::PhoneEntered(input.to_owned()),
                FlowState::AwaitingConfirm => confirmation_event(input),
                FlowState::Completed | FlowState::Cancelled => return Ok(format::welcome()),
            }
        };

        self.advance_wizard(chat, flow, event).await
    }

    async fn advance_wizard(
        &self,
        chat: ChatId,
        flow: FlowType,
        event: FlowEvent,
    ) -> Result<ReplyMessage, ApplicationError> {
        let outcome = self.sessions.advance(chat, event).await.map_err(session_failure)?;
        info!(
            event_name = "agent.wizard.transition",
            chat_id = %chat,
            flow = flow.label(),
            from = ?outcome.from,
            to = ?outcome.to,
            "wizard advanced"
        );
        self.render_actions(chat, flow, &outcome.actions, &outcome.scratch).await
    }

    /// Turns a transition's actions into the single reply for this turn.
    /// Submissions run here; a trailing scratch discard after a submission
    /// does not replace its reply.
    async fn render_actions(
        &self,
        chat: ChatId,
        flow: FlowType,
        actions: &[FlowAction],
        scratch: &WizardScratch,
    ) -> Result<ReplyMessage, ApplicationError> {
        let mut reply = None;
        for action in actions {
            let next = match action {
                FlowAction::PromptForDebtor => format::prompt_debtor(),
                FlowAction::PromptForItem => format::prompt_item(),
                FlowAction::PromptForQuantity => format::prompt_quantity(scratch),
                FlowAction::RepromptQuantity { input } => format::reprompt_quantity(input),
                FlowAction::PromptForName => format::prompt_name(),
                FlowAction::PromptForPhone => format::prompt_phone(),
                FlowAction::PresentSummary => match flow {
                    FlowType::Invoice => format::invoice_summary(scratch),
                    FlowType::Debtor => format::debtor_summary(scratch),
                },
                FlowAction::SubmitInvoice(invoice) => self.submit_invoice(chat, invoice).await?,
                FlowAction::SubmitDebtor(debtor) => self.submit_debtor(chat, debtor).await?,
                FlowAction::DiscardScratch if reply.is_some() => continue,
                FlowAction::DiscardScratch => format::wizard_cancelled(),
            };
            reply = Some(next);
        }

        Ok(reply.unwrap_or_else(format::welcome))
    }

    async fn submit_invoice(
        &self,
        chat: ChatId,
        invoice: &NewInvoice,
    ) -> Result<ReplyMessage, ApplicationError> {
        match self.erp.create_invoice(invoice).await.map_err(integration)? {
            CreateOutcome::Created { number } => {
                info!(
                    event_name = "agent.wizard.invoice_created",
                    chat_id = %chat,
                    document_no = %number,
                    "invoice created"
                );
                Ok(format::invoice_created(&number))
            }
            CreateOutcome::Rejected { raw } => {
                warn!(
                    event_name = "agent.wizard.invoice_rejected",
                    chat_id = %chat,
                    response = %raw,
                    "erp rejected invoice"
                );
                Ok(format::create_rejected("invoice", &raw))
            }
        }
    }

    async fn submit_debtor(
        &self,
        chat: ChatId,
        debtor: &NewDebtor,
    ) -> Result<ReplyMessage, ApplicationError> {
        match self.erp.create_debtor(debtor).await.map_err(integration)? {
            CreateOutcome::Created { number } => {
                info!(
                    event_name = "agent.wizard.debtor_created",
                    chat_id = %chat,
                    account_no = %number,
                    "debtor created"
                );
                Ok(format::debtor_created(&number))
            }
            CreateOutcome::Rejected { raw } => {
                warn!(
                    event_name = "agent.wizard.debtor_rejected",
                    chat_id = %chat,
                    response = %raw,
                    "erp rejected debtor"
                );
                Ok(format::create_rejected("debtor", &raw))
            }
        }
    }

    /// Looks the code up in the catalogue. A miss or a failed lookup still
    /// lets the wizard continue with an unknown description and zero price.
    async fn resolve_item(&self, chat: ChatId, input: &str) -> FlowEvent {
        let fallback = || FlowEvent::ItemResolved {
            code: input.to_owned(),
            description: UNKNOWN_ITEM_DESCRIPTION.to_owned(),
            unit_price: Decimal::ZERO,
        };
        if input.is_empty() {
            return fallback();
        }

        match self.erp.find_stock(input).await {
            Ok(Some(item)) => FlowEvent::ItemResolved {
                code: item.code,
                description: item.description,
                unit_price: item.price,
            },
            Ok(None) => fallback(),
            Err(error) => {
                warn!(
                    event_name = "agent.wizard.item_lookup_failed",
                    chat_id = %chat,
                    item_code = input,
                    error = %error,
                    "item lookup failed, continuing without catalogue data"
                );
                fallback()
            }
        }
    }

    fn settle(&self, chat: ChatId, result: Result<ReplyMessage, ApplicationError>) -> ReplyMessage {
        match result {
            Ok(reply) => reply,
            Err(application_error) => {
                let interface = application_error.into_interface(Uuid::new_v4().to_string());
                error!(
                    event_name = "agent.dispatch.failed",
                    chat_id = %chat,
                    correlation_id = interface.correlation_id(),
                    error = %interface,
                    "request failed"
                );
                format::error_reply(interface.user_message(), interface.correlation_id())
            }
        }
    }

    /// Locks nobody else holds belong to idle chats and are dropped here, so
    /// the map only tracks chats with a request in flight.
    async fn chat_lock(&self, chat: ChatId) -> Arc<Mutex<()>> {
        let mut locks = self.chat_locks.lock().await;
        locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        locks.entry(chat).or_default().clone()
    }

    #[cfg(test)]
    async fn tracked_chat_locks(&self) -> usize {
        self.chat_locks.lock().await.len()
    }

    fn today(&self) -> NaiveDate {
        self.fixed_today.unwrap_or_else(|| Local::now().date_naive())
    }
}

fn integration(error: ErpError) -> ApplicationError {
    ApplicationError::Integration(error.to_string())
}

fn session_failure(error: SessionError) -> ApplicationError {
    match error {
        SessionError::Transition(transition) => DomainError::FlowTransition(transition).into(),
        other => DomainError::InvariantViolation(other.to_string()).into(),
    }
}

fn is_cancel_request(input: &str) -> bool {
    matches!(input.to_ascii_lowercase().as_str(), "/cancel" | "cancel")
}

fn confirmation_event(input: &str) -> FlowEvent {
    match input.to_ascii_lowercase().as_str() {
        "yes" | "y" | "confirm" | "ok" => FlowEvent::Confirmed,
        "no" | "n" | "cancel" => FlowEvent::CancelRequested,
        _ => FlowEvent::ConfirmationUnclear,
    }
}
