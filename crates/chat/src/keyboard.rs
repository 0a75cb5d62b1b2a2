use aiaa_core::domain::chat::ChatId;
use aiaa_core::reply::{ReplyFormat, ReplyMessage};
use serde::Serialize;

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardButton {
    pub text: String,
    pub callback_data: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct InlineKeyboardMarkup {
    pub inline_keyboard: Vec<Vec<InlineKeyboardButton>>,
}

pub fn inline_keyboard(reply: &ReplyMessage) -> Option<InlineKeyboardMarkup> {
    if !reply.has_keyboard() {
        return None;
    }

    let rows = reply
        .keyboard
        .iter()
        .filter(|row| !row.is_empty())
        .map(|row| {
            row.iter()
                .map(|button| InlineKeyboardButton {
                    text: button.label.clone(),
                    callback_data: button.action_id.clone(),
                })
                .collect()
        })
        .collect();
    Some(InlineKeyboardMarkup { inline_keyboard: rows })
}

pub fn parse_mode(format: ReplyFormat) -> Option<&'static str> {
    match format {
        ReplyFormat::Plain => None,
        ReplyFormat::Markdown => Some("Markdown"),
    }
}

/// Body of a `sendMessage` or `editMessageText` call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct OutgoingMessage {
    pub chat_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_id: Option<i64>,
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parse_mode: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_markup: Option<InlineKeyboardMarkup>,
}

impl OutgoingMessage {
    pub fn send(chat: ChatId, reply: &ReplyMessage) -> Self {
        Self {
            chat_id: chat.0,
            message_id: None,
            text: reply.text.clone(),
            parse_mode: parse_mode(reply.format),
            reply_markup: inline_keyboard(reply),
        }
    }

    pub fn edit(chat: ChatId, message_id: i64, reply: &ReplyMessage) -> Self {
        Self { message_id: Some(message_id), ..Self::send(chat, reply) }
    }

    /// Same message with markup parsing switched off.
    pub fn as_plain(&self) -> Self {
        Self { parse_mode: None, ..self.clone() }
    }
}

#[cfg(test)]
mod tests {
    use aiaa_core::domain::chat::ChatId;
    use aiaa_core::reply::ReplyMessage;
    use serde_json::json;

    use super::OutgoingMessage;

    #[test]
    fn markdown_reply_with_keyboard_serializes_for_send() {
        let reply = ReplyMessage::builder("*Menu*")
            .markdown()
            .row(|row| {
                row.button("sales_today", "📊 Sales Today").button("help_info", "💡 Help");
            })
            .build();

        let body = serde_json::to_value(OutgoingMessage::send(ChatId(5), &reply)).expect("serializes");

        assert_eq!(
            body,
            json!({
                "chat_id": 5,
                "text": "*Menu*",
                "parse_mode": "Markdown",
                "reply_markup": {"inline_keyboard": [[
                    {"text": "📊 Sales Today", "callback_data": "sales_today"},
                    {"text": "💡 Help", "callback_data": "help_info"}
                ]]}
            })
        );
    }

    #[test]
    fn plain_edit_omits_optional_fields() {
        let reply = ReplyMessage::plain("done");

        let body =
            serde_json::to_value(OutgoingMessage::edit(ChatId(5), 77, &reply)).expect("serializes");

        assert_eq!(body, json!({"chat_id": 5, "message_id": 77, "text": "done"}));
    }

    #[test]
    fn plain_fallback_drops_parse_mode_only() {
        let reply = ReplyMessage::markdown("a_b");
        let message = OutgoingMessage::send(ChatId(1), &reply);

        let plain = message.as_plain();

        assert_eq!(plain.parse_mode, None);
        assert_eq!(plain.text, "a_b");
    }
}
