use std::{collections::HashMap, sync::Arc};

use aiaa_core::domain::chat::ChatId;
use aiaa_core::reply::ReplyMessage;
use async_trait::async_trait;
use thiserror::Error;

use crate::commands::BotCommand;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ChatEnvelope {
    pub update_id: i64,
    pub event: ChatEvent,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ChatEvent {
    Command(CommandEvent),
    Message(MessageEvent),
    ButtonPress(ButtonPressEvent),
    Unsupported { event_type: String },
}

impl ChatEvent {
    pub fn event_type(&self) -> ChatEventType {
        match self {
            Self::Command(_) => ChatEventType::Command,
            Self::Message(_) => ChatEventType::Message,
            Self::ButtonPress(_) => ChatEventType::ButtonPress,
            Self::Unsupported { .. } => ChatEventType::Unsupported,
        }
    }

    pub fn chat_id(&self) -> Option<ChatId> {
        match self {
            Self::Command(event) => Some(event.chat_id),
            Self::Message(event) => Some(event.chat_id),
            Self::ButtonPress(event) => Some(event.chat_id),
            Self::Unsupported { .. } => None,
        }
    }

    /// Text and button events wait on the model or the ERP, so the user gets
    /// a placeholder while they run.
    pub fn wants_working_indicator(&self) -> bool {
        matches!(self, Self::Message(_) | Self::ButtonPress(_))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ChatEventType {
    Command,
    Message,
    ButtonPress,
    Unsupported,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CommandEvent {
    pub chat_id: ChatId,
    pub user_id: Option<i64>,
    pub command: BotCommand,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MessageEvent {
    pub chat_id: ChatId,
    pub user_id: Option<i64>,
    pub text: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ButtonPressEvent {
    pub chat_id: ChatId,
    pub user_id: Option<i64>,
    pub callback_id: String,
    pub action_id: String,
    pub message_id: Option<i64>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EventContext {
    pub correlation_id: String,
}

impl Default for EventContext {
    fn default() -> Self {
        Self { correlation_id: "unknown-correlation-id".to_owned() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandlerResult {
    Responded(ReplyMessage),
    Ignored,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EventHandlerError {
    #[error("conversation service failure: {0}")]
    Service(String),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error(transparent)]
    Handler(#[from] EventHandlerError),
}

/// What the chat layer needs from the conversation logic behind it.
#[async_trait]
pub trait ConversationService: Send + Sync {
    async fn on_command(
        &self,
        chat: ChatId,
        command: BotCommand,
        ctx: &EventContext,
    ) -> Result<ReplyMessage, EventHandlerError>;

    async fn on_message(
        &self,
        chat: ChatId,
        text: &str,
        ctx: &EventContext,
    ) -> Result<ReplyMessage, EventHandlerError>;

    async fn on_button(
        &self,
        chat: ChatId,
        action_id: &str,
        ctx: &EventContext,
    ) -> Result<ReplyMessage, EventHandlerError>;
}

#[async_trait]
pub trait EventHandler: Send + Sync {
    fn event_type(&self) -> ChatEventType;
    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError>;
}

#[derive(Default)]
pub struct EventDispatcher {
    handlers: HashMap<ChatEventType, Arc<dyn EventHandler>>,
}

impl EventDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the command, message and button handlers over one service.
    pub fn for_service<S>(service: Arc<S>) -> Self
    where
        S: ConversationService + 'static,
    {
        let mut dispatcher = Self::new();
        dispatcher.register(CommandHandler::new(service.clone()));
        dispatcher.register(MessageHandler::new(service.clone()));
        dispatcher.register(ButtonPressHandler::new(service));
        dispatcher
    }

    pub fn register<H>(&mut self, handler: H)
    where
        H: EventHandler + 'static,
    {
        self.handlers.insert(handler.event_type(), Arc::new(handler));
    }

    pub async fn dispatch(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, DispatchError> {
        let Some(handler) = self.handlers.get(&envelope.event.event_type()) else {
            return Ok(HandlerResult::Ignored);
        };

        handler.handle(envelope, ctx).await.map_err(DispatchError::from)
    }

    pub fn handler_count(&self) -> usize {
        self.handlers.len()
    }
}

pub struct CommandHandler<S> {
    service: Arc<S>,
}

impl<S> CommandHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for CommandHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Command
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Command(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.service.on_command(event.chat_id, event.command, ctx).await?;
        Ok(HandlerResult::Responded(reply))
    }
}

pub struct MessageHandler<S> {
    service: Arc<S>,
}

impl<S> MessageHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for MessageHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::Message
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::Message(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };
        if event.text.trim().is_empty() {
            return Ok(HandlerResult::Ignored);
        }

        let reply = self.service.on_message(event.chat_id, &event.text, ctx).await?;
        Ok(HandlerResult::Responded(reply))
    }
}

pub struct ButtonPressHandler<S> {
    service: Arc<S>,
}

impl<S> ButtonPressHandler<S>
where
    S: ConversationService,
{
    pub fn new(service: Arc<S>) -> Self {
        Self { service }
    }
}

#[async_trait]
impl<S> EventHandler for ButtonPressHandler<S>
where
    S: ConversationService + 'static,
{
    fn event_type(&self) -> ChatEventType {
        ChatEventType::ButtonPress
    }

    async fn handle(
        &self,
        envelope: &ChatEnvelope,
        ctx: &EventContext,
    ) -> Result<HandlerResult, EventHandlerError> {
        let ChatEvent::ButtonPress(event) = &envelope.event else {
            return Ok(HandlerResult::Ignored);
        };

        let reply = self.service.on_button(event.chat_id, &event.action_id, ctx).await?;
        Ok(HandlerResult::Responded(reply))
    }
}
