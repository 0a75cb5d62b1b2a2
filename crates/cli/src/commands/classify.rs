use std::sync::Arc;

use aiaa_agent::classifier::IntentClassifier;
use aiaa_agent::llm::{client_from_config, LlmClient};
use aiaa_core::config::{AppConfig, LoadOptions};

use crate::commands::{block_on, CommandResult};

const COMMAND: &str = "classify";

/// Dry run: asks the configured model for an intent and prints it as JSON.
/// Nothing is sent to the ERP.
pub fn run(text: &str) -> CommandResult {
    if text.trim().is_empty() {
        return CommandResult::failure(COMMAND, "usage", "message text is required", 2);
    }

    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(COMMAND, "config_validation", error.to_string(), 2);
        }
    };

    let llm: Arc<dyn LlmClient> = match client_from_config(&config.llm) {
        Ok(client) => Arc::from(client),
        Err(error) => return CommandResult::failure(COMMAND, "llm_client", error.to_string(), 3),
    };
    classify_with(llm, text)
}

pub fn classify_with(llm: Arc<dyn LlmClient>, text: &str) -> CommandResult {
    let classifier = IntentClassifier::new(llm);
    let result = match block_on(classifier.classify(text)) {
        Ok(result) => result,
        Err(error) => return CommandResult::failure(COMMAND, "runtime", error, 4),
    };

    match serde_json::to_string_pretty(&result) {
        Ok(output) => CommandResult { exit_code: 0, output },
        Err(error) => CommandResult::failure(COMMAND, "serialization", error.to_string(), 4),
    }
}
