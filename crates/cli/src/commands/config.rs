use std::env;
use std::fs;
use std::path::Path;

use aiaa_core::config::{resolve_config_path, AppConfig, LoadOptions};
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = resolve_config_path(None);
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let entries = vec![
        entry("erp.base_url", config.erp.base_url.clone(), &["AIAA_ERP_BASE_URL"]),
        entry("erp.user_id", config.erp.user_id.clone(), &["AIAA_ERP_USER_ID"]),
        entry("erp.password", redact_secret(&config.erp.password), &["AIAA_ERP_PASSWORD"]),
        entry(
            "erp.license_token",
            redact_secret(&config.erp.license_token),
            &["AIAA_ERP_LICENSE_TOKEN"],
        ),
        entry("erp.timeout_secs", config.erp.timeout_secs.to_string(), &["AIAA_ERP_TIMEOUT_SECS"]),
        entry("erp.debtor_type", config.erp.debtor_type.clone(), &["AIAA_ERP_DEBTOR_TYPE"]),
        entry(
            "telegram.bot_token",
            redact_bot_token(config.telegram.bot_token.expose_secret()),
            &["AIAA_TELEGRAM_BOT_TOKEN"],
        ),
        entry(
            "telegram.api_base_url",
            config.telegram.api_base_url.clone(),
            &["AIAA_TELEGRAM_API_BASE_URL"],
        ),
        entry(
            "telegram.poll_timeout_secs",
            config.telegram.poll_timeout_secs.to_string(),
            &["AIAA_TELEGRAM_POLL_TIMEOUT_SECS"],
        ),
        entry("llm.provider", format!("{:?}", config.llm.provider), &["AIAA_LLM_PROVIDER"]),
        entry("llm.model", config.llm.model.clone(), &["AIAA_LLM_MODEL"]),
        entry(
            "llm.base_url",
            config.llm.base_url.clone().unwrap_or_else(|| "<unset>".to_string()),
            &["AIAA_LLM_BASE_URL"],
        ),
        entry(
            "llm.api_key",
            config.llm.api_key.as_ref().map_or_else(|| "<unset>".to_string(), redact_secret),
            &["AIAA_LLM_API_KEY"],
        ),
        entry("llm.timeout_secs", config.llm.timeout_secs.to_string(), &["AIAA_LLM_TIMEOUT_SECS"]),
        entry("server.bind_address", config.server.bind_address.clone(), &["AIAA_SERVER_BIND_ADDRESS"]),
        entry(
            "server.health_check_port",
            config.server.health_check_port.to_string(),
            &["AIAA_SERVER_HEALTH_CHECK_PORT"],
        ),
        entry(
            "server.graceful_shutdown_secs",
            config.server.graceful_shutdown_secs.to_string(),
            &["AIAA_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        ),
        entry("logging.level", config.logging.level.clone(), &["AIAA_LOGGING_LEVEL", "AIAA_LOG_LEVEL"]),
        entry(
            "logging.format",
            format!("{:?}", config.logging.format),
            &["AIAA_LOGGING_FORMAT", "AIAA_LOG_FORMAT"],
        ),
    ];

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];
    lines.extend(entries.into_iter().map(|entry| {
        render_line(entry.key, &entry.value, source(entry.key, entry.env_keys))
    }));
    lines.join("\n")
}

struct Entry {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

fn entry(key: &'static str, value: String, env_keys: &'static [&'static str]) -> Entry {
    Entry { key, value, env_keys }
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_secret(secret: &SecretString) -> String {
    if secret.expose_secret().trim().is_empty() {
        "<empty>".to_string()
    } else {
        "<redacted>".to_string()
    }
}

/// Keeps the public bot id, hides the secret half.
fn redact_bot_token(token: &str) -> String {
    let trimmed = token.trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((bot_id, _)) = trimmed.split_once(':') {
        return format!("{bot_id}:***");
    }

    "<redacted>".to_string()
}
