//! Free text to `{intent, args}` through a language model.
//!
//! Models wrap their answer in reasoning blocks, markdown fences or prose.
//! Extraction strips `<think>` blocks, then tries a fenced block if there is
//! one, then every balanced `{...}` in order, then the whole trimmed text.
//! The first JSON object carrying an `intent` key wins. Any failure along the
//! way is the `unknown` intent; classification never errors.

use std::sync::Arc;

use aiaa_core::intent::IntentResult;
use chrono::{Local, NaiveDate};
use serde_json::Value;
use tracing::{debug, warn};

use crate::llm::LlmClient;

pub struct IntentClassifier {
    llm: Arc<dyn LlmClient>,
}

impl IntentClassifier {
    pub fn new(llm: Arc<dyn LlmClient>) -> Self {
        Self { llm }
    }

    pub async fn classify(&self, user_text: &str) -> IntentResult {
        self.classify_on(user_text, Local::now().date_naive()).await
    }

    pub async fn classify_on(&self, user_text: &str, today: NaiveDate) -> IntentResult {
        let system = system_prompt(today);
        let raw = match self.llm.complete(&system, user_text).await {
            Ok(raw) => raw,
            Err(error) => {
                warn!(
                    event_name = "agent.classifier.fallback",
                    reason = "completion_failed",
                    error = %error,
                    "language model call failed, treating request as unknown"
                );
                return IntentResult::unknown();
            }
        };

        match parse_intent(&raw) {
            Some(result) => {
                debug!(
                    event_name = "agent.classifier.classified",
                    intent = %result.intent,
                    "intent classified"
                );
                result
            }
            None => {
                warn!(
                    event_name = "agent.classifier.fallback",
                    reason = "unparseable_output",
                    output_len = raw.len(),
                    "model output held no usable intent json"
                );
                IntentResult::unknown()
            }
        }
    }
}

pub fn system_prompt(today: NaiveDate) -> String {
    format!(
        r#"You are the router of an AutoCount ERP assistant.
Identify the user's intent and extract its arguments.
Return ONLY one JSON object, no markdown and no explanation.

Today is {today}.

Intents:
1. check_stock (args: item_code)
2. list_stock (no args)
3. check_debtor_info (args: name)
4. list_customers (no args)
5. list_top_debtors (args: limit, default 5)
6. get_sales (args: date as YYYY/MM/DD, "today" or "yesterday")
7. create_invoice (no args)
8. create_debtor (no args)
9. help (no args)
10. unknown (anything else)

Example:
{{"intent": "check_stock", "args": {{"item_code": "IPHONE"}}}}"#,
        today = today.format("%Y/%m/%d")
    )
}

/// Parses model output into an intent, `None` when nothing usable is found.
/// Braces in surrounding prose are skipped over; an object without an
/// `intent` key is only used when no candidate has one.
pub fn parse_intent(raw: &str) -> Option<IntentResult> {
    let text = strip_reasoning(raw);
    let objects: Vec<Value> = fenced_block(text)
        .into_iter()
        .chain(balanced_objects(text))
        .chain(std::iter::once(text.trim()))
        .filter_map(|candidate| match serde_json::from_str::<Value>(candidate) {
            Ok(value @ Value::Object(_)) => Some(value),
            _ => None,
        })
        .collect();

    let chosen = match objects.iter().position(|value| value.get("intent").is_some()) {
        Some(index) => objects.into_iter().nth(index)?,
        None => objects.into_iter().next()?,
    };
    serde_json::from_value(chosen).ok()
}

/// The first candidate extraction would try.
pub fn extract_json_candidate(raw: &str) -> &str {
    let text = strip_reasoning(raw);

    if let Some(fenced) = fenced_block(text) {
        return fenced;
    }
    if let Some(object) = balanced_objects(text).next() {
        return object;
    }
    text.trim()
}

/// Drops everything up to the last `</think>`. An opening `<think>` with no
/// close means the model never finished reasoning; nothing after it is JSON.
fn strip_reasoning(raw: &str) -> &str {
    if let Some(end) = raw.rfind("</think>") {
        return &raw[end + "</think>".len()..];
    }
    match raw.find("<think>") {
        Some(start) => &raw[..start],
        None => raw,
    }
}

fn fenced_block(text: &str) -> Option<&str> {
    let open = text.find("```")?;
    let after_open = &text[open + 3..];
    let body_start = after_open.find('\n').map(|newline| newline + 1).unwrap_or(0);
    let info = after_open[..body_start].trim();
    if !info.is_empty() && !info.chars().all(|ch| ch.is_ascii_alphanumeric()) {
        return None;
    }

    let body = &after_open[body_start..];
    let close = body.find("```")?;
    let inner = body[..close].trim();
    (!inner.is_empty()).then_some(inner)
}

/// Every balanced `{...}` in `text`, left to right. An opening brace that
/// never closes is skipped and scanning resumes just after it.
fn balanced_objects(text: &str) -> impl Iterator<Item = &str> {
    let mut from = 0;
    std::iter::from_fn(move || {
        while let Some(offset) = text[from..].find('{') {
            let start = from + offset;
            match balanced_len(&text[start..]) {
                Some(len) => {
                    from = start + len;
                    return Some(&text[start..start + len]);
                }
                None => from = start + 1,
            }
        }
        None
    })
}

/// Length of the object opening at the start of `text`.
fn balanced_len(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text.char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return Some(offset + 1);
                }
            }
            _ => {}
        }
    }

    None
}
