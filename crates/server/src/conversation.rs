use std::sync::Arc;

use aiaa_agent::runtime::AgentRuntime;
use aiaa_chat::commands::BotCommand;
use aiaa_chat::events::{ConversationService, EventContext, EventHandlerError};
use aiaa_core::domain::chat::ChatId;
use aiaa_core::flows::FlowType;
use aiaa_core::reply::ReplyMessage;
use async_trait::async_trait;
use tracing::debug;

/// Chat events onto the agent runtime. The runtime answers every call
/// itself, failures included, so this never returns an error.
pub struct AgentConversation {
    runtime: Arc<AgentRuntime>,
}

impl AgentConversation {
    pub fn new(runtime: Arc<AgentRuntime>) -> Self {
        Self { runtime }
    }
}

#[async_trait]
impl ConversationService for AgentConversation {
    async fn on_command(
        &self,
        chat: ChatId,
        command: BotCommand,
        ctx: &EventContext,
    ) -> Result<ReplyMessage, EventHandlerError> {
        debug!(
            event_name = "server.conversation.command",
            chat_id = chat.0,
            command = command.name(),
            correlation_id = %ctx.correlation_id,
            "routing bot command"
        );
        Ok(match command {
            BotCommand::Start | BotCommand::Menu => self.runtime.main_menu(),
            BotCommand::Help => self.runtime.help(),
            BotCommand::Cancel => self.runtime.cancel_wizard(chat).await,
            BotCommand::Invoice => self.runtime.start_wizard(chat, FlowType::Invoice).await,
            BotCommand::Debtor => self.runtime.start_wizard(chat, FlowType::Debtor).await,
        })
    }

    async fn on_message(
        &self,
        chat: ChatId,
        text: &str,
        _ctx: &EventContext,
    ) -> Result<ReplyMessage, EventHandlerError> {
        Ok(self.runtime.handle_text(chat, text).await)
    }

    async fn on_button(
        &self,
        chat: ChatId,
        action_id: &str,
        _ctx: &EventContext,
    ) -> Result<ReplyMessage, EventHandlerError> {
        Ok(self.runtime.handle_button(chat, action_id).await)
    }
}
