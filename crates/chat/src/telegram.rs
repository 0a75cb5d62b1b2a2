//! Telegram Bot API over long polling.

use std::collections::VecDeque;
use std::time::Duration;

use aiaa_core::config::TelegramConfig;
use aiaa_core::domain::chat::ChatId;
use aiaa_core::reply::ReplyMessage;
use anyhow::Context;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use serde_json::{json, Value};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::commands::{parse_command, BotCommand, CommandParseError};
use crate::events::{ButtonPressEvent, ChatEnvelope, ChatEvent, CommandEvent, MessageEvent};
use crate::keyboard::OutgoingMessage;
use crate::polling::{ChatTransport, TransportError};

/// Added to the long-poll timeout for the HTTP client deadline.
const HTTP_GRACE_SECS: u64 = 10;

enum ApiFailure {
    Http(String),
    Rejected(String),
}

impl ApiFailure {
    fn describe(self) -> String {
        match self {
            Self::Http(message) => message,
            Self::Rejected(description) => format!("telegram rejected the call: {description}"),
        }
    }
}

pub struct TelegramTransport {
    http: reqwest::Client,
    api_base_url: String,
    bot_token: SecretString,
    poll_timeout_secs: u64,
    offset: Mutex<i64>,
    pending: Mutex<VecDeque<ChatEnvelope>>,
}

impl TelegramTransport {
    pub fn new(
        api_base_url: impl Into<String>,
        bot_token: SecretString,
        poll_timeout_secs: u64,
    ) -> anyhow::Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(poll_timeout_secs + HTTP_GRACE_SECS))
            .build()
            .context("building telegram http client")?;
        Ok(Self {
            http,
            api_base_url: api_base_url.into(),
            bot_token,
            poll_timeout_secs,
            offset: Mutex::new(0),
            pending: Mutex::new(VecDeque::new()),
        })
    }

    pub fn from_config(config: &TelegramConfig) -> anyhow::Result<Self> {
        Self::new(config.api_base_url.clone(), config.bot_token.clone(), config.poll_timeout_secs)
    }

    fn method_url(&self, method: &str) -> String {
        format!(
            "{}/bot{}/{method}",
            self.api_base_url.trim_end_matches('/'),
            self.bot_token.expose_secret()
        )
    }

    async fn call<B>(&self, method: &str, body: &B) -> Result<Value, ApiFailure>
    where
        B: Serialize + Sync,
    {
        let response = self
            .http
            .post(self.method_url(method))
            .json(body)
            .send()
            .await
            // reqwest errors embed the URL, which carries the token
            .map_err(|error| ApiFailure::Http(format!("{method}: {}", error.without_url())))?;
        let payload: Value = response
            .json()
            .await
            .map_err(|error| ApiFailure::Http(format!("{method}: {}", error.without_url())))?;

        if payload.get("ok").and_then(Value::as_bool) == Some(true) {
            return Ok(payload.get("result").cloned().unwrap_or(Value::Null));
        }
        let description =
            payload.get("description").and_then(Value::as_str).unwrap_or("no description");
        Err(ApiFailure::Rejected(description.to_owned()))
    }

    async fn fetch_updates(&self) -> Result<(), TransportError> {
        let offset = *self.offset.lock().await;
        let body = json!({
            "offset": offset,
            "timeout": self.poll_timeout_secs,
            "allowed_updates": ["message", "callback_query"],
        });
        let result = self
            .call("getUpdates", &body)
            .await
            .map_err(|failure| TransportError::Receive(failure.describe()))?;

        let updates = result.as_array().cloned().unwrap_or_default();
        let mut next_offset = offset;
        let mut pending = self.pending.lock().await;
        for update in &updates {
            if let Some(update_id) = update.get("update_id").and_then(Value::as_i64) {
                next_offset = next_offset.max(update_id + 1);
            }
            match parse_update(update) {
                Some(envelope) => pending.push_back(envelope),
                None => debug!(event_name = "chat.telegram.update_skipped", "update without an id"),
            }
        }
        *self.offset.lock().await = next_offset;
        Ok(())
    }

    async fn post_message(&self, method: &str, message: &OutgoingMessage) -> Result<Value, ApiFailure> {
        match self.call(method, message).await {
            Err(ApiFailure::Rejected(description))
                if message.parse_mode.is_some() && description.contains("can't parse entities") =>
            {
                warn!(
                    event_name = "chat.telegram.markdown_rejected",
                    chat_id = message.chat_id,
                    description = %description,
                    "markup rejected, resending as plain text"
                );
                self.call(method, &message.as_plain()).await
            }
            other => other,
        }
    }
}

#[async_trait]
impl ChatTransport for TelegramTransport {
    async fn connect(&self) -> Result<(), TransportError> {
        let me = self
            .call("getMe", &json!({}))
            .await
            .map_err(|failure| TransportError::Connect(failure.describe()))?;
        let bot_username = bot_username(&me);
        info!(
            event_name = "chat.telegram.connected",
            bot_username = %bot_username,
            "telegram bot identity confirmed"
        );

        let commands: Vec<Value> = BotCommand::ALL
            .iter()
            .map(|command| json!({"command": command.name(), "description": command.description()}))
            .collect();
        if let Err(failure) = self.call("setMyCommands", &json!({ "commands": commands })).await {
            warn!(
                event_name = "chat.telegram.commands_not_registered",
                error = %failure.describe(),
                "could not register the command list"
            );
        }
        Ok(())
    }

    async fn next_envelope(&self) -> Result<Option<ChatEnvelope>, TransportError> {
        loop {
            if let Some(envelope) = self.pending.lock().await.pop_front() {
                return Ok(Some(envelope));
            }
            self.fetch_updates().await?;
        }
    }

    async fn acknowledge(&self, envelope: &ChatEnvelope) -> Result<(), TransportError> {
        let ChatEvent::ButtonPress(press) = &envelope.event else {
            return Ok(());
        };
        self.call("answerCallbackQuery", &json!({ "callback_query_id": press.callback_id }))
            .await
            .map(|_| ())
            .map_err(|failure| TransportError::Acknowledge(failure.describe()))
    }

    async fn send_reply(&self, chat: ChatId, reply: &ReplyMessage) -> Result<i64, TransportError> {
        let sent = self
            .post_message("sendMessage", &OutgoingMessage::send(chat, reply))
            .await
            .map_err(|failure| TransportError::Send(failure.describe()))?;
        sent.get("message_id")
            .and_then(Value::as_i64)
            .ok_or_else(|| TransportError::Send("sendMessage result has no message_id".to_owned()))
    }

    async fn edit_reply(
        &self,
        chat: ChatId,
        message_id: i64,
        reply: &ReplyMessage,
    ) -> Result<(), TransportError> {
        match self.post_message("editMessageText", &OutgoingMessage::edit(chat, message_id, reply)).await {
            Ok(_) => Ok(()),
            Err(ApiFailure::Rejected(description)) if description.contains("message is not modified") => {
                Ok(())
            }
            Err(failure) => Err(TransportError::Send(failure.describe())),
        }
    }

    async fn disconnect(&self) -> Result<(), TransportError> {
        self.pending.lock().await.clear();
        Ok(())
    }
}

/// Converts one `getUpdates` entry. Returns `None` only when the entry has no
/// `update_id`; anything unrecognised becomes [`ChatEvent::Unsupported`].
pub fn parse_update(update: &Value) -> Option<ChatEnvelope> {
    let update_id = update.get("update_id")?.as_i64()?;
    let event = match (update.get("message"), update.get("callback_query")) {
        (Some(message), _) => parse_message(message),
        (None, Some(callback)) => parse_callback(callback),
        (None, None) => None,
    }
    .unwrap_or_else(|| ChatEvent::Unsupported { event_type: update_kind(update) });

    Some(ChatEnvelope { update_id, event })
}

fn parse_message(message: &Value) -> Option<ChatEvent> {
    let chat_id = ChatId(message.get("chat")?.get("id")?.as_i64()?);
    let user_id = message.get("from").and_then(|from| from.get("id")).and_then(Value::as_i64);
    let text = message.get("text")?.as_str()?;

    match parse_command(text) {
        Ok(command) => Some(ChatEvent::Command(CommandEvent { chat_id, user_id, command })),
        Err(CommandParseError::NotACommand(_) | CommandParseError::UnsupportedCommand(_)) => {
            Some(ChatEvent::Message(MessageEvent { chat_id, user_id, text: text.to_owned() }))
        }
    }
}

fn parse_callback(callback: &Value) -> Option<ChatEvent> {
    let message = callback.get("message")?;
    Some(ChatEvent::ButtonPress(ButtonPressEvent {
        chat_id: ChatId(message.get("chat")?.get("id")?.as_i64()?),
        user_id: callback.get("from").and_then(|from| from.get("id")).and_then(Value::as_i64),
        callback_id: callback.get("id")?.as_str()?.to_owned(),
        action_id: callback.get("data")?.as_str()?.to_owned(),
        message_id: message.get("message_id").and_then(Value::as_i64),
    }))
}

/// `username` from a `getMe` result.
fn bot_username(me: &Value) -> &str {
    me.get("username").and_then(|name| name.as_str()).unwrap_or("unknown")
}

fn update_kind(update: &Value) -> String {
    update
        .as_object()
        .and_then(|fields| fields.keys().find(|key| key.as_str() != "update_id"))
        .cloned()
        .unwrap_or_else(|| "unknown".to_owned())
}

#[cfg(test)]
mod tests {
    use aiaa_core::domain::chat::ChatId;
    use secrecy::SecretString;
    use serde_json::json;

    use super::{bot_username, parse_update, TelegramTransport};
    use crate::commands::BotCommand;
    use crate::events::{ButtonPressEvent, ChatEvent, CommandEvent, MessageEvent};

    #[test]
    fn bot_username_falls_back_when_missing() {
        assert_eq!(bot_username(&json!({"id": 1, "username": "aiaa_bot"})), "aiaa_bot");
        assert_eq!(bot_username(&json!({"id": 1})), "unknown");
    }

    #[test]
    fn text_message_becomes_message_event() {
        let update = json!({
            "update_id": 10,
            "message": {"message_id": 1, "from": {"id": 77}, "chat": {"id": -100}, "text": "sales today"}
        });

        let envelope = parse_update(&update).expect("update parses");

        assert_eq!(envelope.update_id, 10);
        assert_eq!(
            envelope.event,
            ChatEvent::Message(MessageEvent {
                chat_id: ChatId(-100),
                user_id: Some(77),
                text: "sales today".to_owned(),
            })
        );
    }

    #[test]
    fn known_command_becomes_command_event() {
        let update = json!({
            "update_id": 11,
            "message": {"message_id": 2, "chat": {"id": 5}, "text": "/invoice@aiaa_bot"}
        });

        let envelope = parse_update(&update).expect("update parses");

        assert_eq!(
            envelope.event,
            ChatEvent::Command(CommandEvent { chat_id: ChatId(5), user_id: None, command: BotCommand::Invoice })
        );
    }

    #[test]
    fn unknown_command_is_passed_on_as_text() {
        let update = json!({"update_id": 12, "message": {"chat": {"id": 5}, "text": "/stock APPLE"}});

        let envelope = parse_update(&update).expect("update parses");

        assert!(matches!(envelope.event, ChatEvent::Message(MessageEvent { ref text, .. }) if text == "/stock APPLE"));
    }

    #[test]
    fn callback_query_becomes_button_press() {
        let update = json!({
            "update_id": 13,
            "callback_query": {
                "id": "cb-99",
                "from": {"id": 77},
                "data": "sales_today",
                "message": {"message_id": 40, "chat": {"id": 5}}
            }
        });

        let envelope = parse_update(&update).expect("update parses");

        assert_eq!(
            envelope.event,
            ChatEvent::ButtonPress(ButtonPressEvent {
                chat_id: ChatId(5),
                user_id: Some(77),
                callback_id: "cb-99".to_owned(),
                action_id: "sales_today".to_owned(),
                message_id: Some(40),
            })
        );
    }

    #[test]
    fn other_updates_are_unsupported() {
        let edited = json!({"update_id": 14, "edited_message": {"chat": {"id": 5}, "text": "x"}});
        let photo = json!({"update_id": 15, "message": {"chat": {"id": 5}, "photo": []}});

        assert_eq!(
            parse_update(&edited).map(|envelope| envelope.event),
            Some(ChatEvent::Unsupported { event_type: "edited_message".to_owned() })
        );
        assert_eq!(
            parse_update(&photo).map(|envelope| envelope.event),
            Some(ChatEvent::Unsupported { event_type: "message".to_owned() })
        );
        assert_eq!(parse_update(&json!({"message": {}})), None);
    }

    #[test]
    fn method_url_joins_base_token_and_method() {
        let transport = TelegramTransport::new(
            "https://api.telegram.org/",
            SecretString::from("123:abc".to_owned()),
            30,
        )
        .expect("client builds");

        assert_eq!(transport.method_url("getMe"), "https://api.telegram.org/bot123:abc/getMe");
    }
}
