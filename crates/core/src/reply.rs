use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyFormat {
    #[default]
    Plain,
    Markdown,
}

/// An inline button: the label shown to the user and the opaque identifier
/// echoed back when it is pressed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyButton {
    pub label: String,
    pub action_id: String,
}

impl ReplyButton {
    pub fn new(action_id: impl Into<String>, label: impl Into<String>) -> Self {
        Self { label: label.into(), action_id: action_id.into() }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReplyMessage {
    pub text: String,
    pub format: ReplyFormat,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub keyboard: Vec<Vec<ReplyButton>>,
}

impl ReplyMessage {
    pub fn plain(text: impl Into<String>) -> Self {
        Self { text: text.into(), format: ReplyFormat::Plain, keyboard: Vec::new() }
    }

    pub fn markdown(text: impl Into<String>) -> Self {
        Self { text: text.into(), format: ReplyFormat::Markdown, keyboard: Vec::new() }
    }

    pub fn builder(text: impl Into<String>) -> ReplyBuilder {
        ReplyBuilder { message: Self::plain(text) }
    }

    pub fn has_keyboard(&self) -> bool {
        self.keyboard.iter().any(|row| !row.is_empty())
    }
}

pub struct ReplyBuilder {
    message: ReplyMessage,
}

impl ReplyBuilder {
    pub fn markdown(mut self) -> Self {
        self.message.format = ReplyFormat::Markdown;
        self
    }

    pub fn row<F>(mut self, build: F) -> Self
    where
        F: FnOnce(&mut RowBuilder),
    {
        let mut row = RowBuilder::default();
        build(&mut row);
        if !row.buttons.is_empty() {
            self.message.keyboard.push(row.buttons);
        }
        self
    }

    pub fn build(self) -> ReplyMessage {
        self.message
    }
}

#[derive(Default)]
pub struct RowBuilder {
    buttons: Vec<ReplyButton>,
}

impl RowBuilder {
    pub fn button(&mut self, action_id: impl Into<String>, label: impl Into<String>) -> &mut Self {
        self.buttons.push(ReplyButton::new(action_id, label));
        self
    }
}
