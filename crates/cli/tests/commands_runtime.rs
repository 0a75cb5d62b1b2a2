use std::env;
use std::sync::{Arc, Mutex, OnceLock};

use aiaa_agent::llm::LlmClient;
use aiaa_cli::commands::{classify, config, doctor};
use async_trait::async_trait;
use serde_json::Value;

const BOT_TOKEN: &str = "123456:test-secret";

#[test]
fn config_redacts_secrets_and_attributes_sources() {
    with_env(
        &[
            ("AIAA_TELEGRAM_BOT_TOKEN", BOT_TOKEN),
            ("AIAA_ERP_PASSWORD", "hunter2"),
            ("AIAA_LOG_LEVEL", "debug"),
        ],
        || {
            let output = config::run();

            assert!(output.starts_with("effective config"));
            assert!(output.contains(
                "- telegram.bot_token = 123456:*** (source: env (AIAA_TELEGRAM_BOT_TOKEN))"
            ));
            assert!(output.contains("- erp.password = <redacted> (source: env (AIAA_ERP_PASSWORD))"));
            assert!(output.contains("- logging.level = debug (source: env (AIAA_LOG_LEVEL))"));
            assert!(output.contains("- erp.base_url = http://localhost:8015 (source: default)"));
            assert!(!output.contains("test-secret"));
            assert!(!output.contains("hunter2"));
        },
    );
}

#[test]
fn config_reports_validation_failure_without_bot_token() {
    with_env(&[], || {
        let output = config::run();
        assert!(output.starts_with("config validation failed"), "{output}");
        assert!(output.contains("telegram.bot_token"));
    });
}

#[test]
fn doctor_skips_dependent_checks_when_config_is_invalid() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["name"], "config_validation");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "skipped");
    });
}

#[test]
fn doctor_reports_unreachable_erp() {
    with_env(
        &[("AIAA_TELEGRAM_BOT_TOKEN", BOT_TOKEN), ("AIAA_ERP_BASE_URL", "http://127.0.0.1:9")],
        || {
            let result = doctor::run(true);
            assert_eq!(result.exit_code, 1);

            let payload = parse_payload(&result.output);
            assert_eq!(payload["checks"][0]["status"], "pass");
            assert_eq!(payload["checks"][1]["name"], "erp_login");
            assert_eq!(payload["checks"][1]["status"], "fail");
            assert_eq!(payload["checks"][2]["name"], "llm_client");
            assert_eq!(payload["checks"][2]["status"], "pass");
        },
    );
}

#[test]
fn doctor_human_output_marks_each_check() {
    with_env(&[], || {
        let result = doctor::run(false);
        assert!(result.output.starts_with("doctor: one or more readiness checks failed"));
        assert!(result.output.contains("- [fail] config_validation:"));
        assert!(result.output.contains("- [skip] erp_login:"));
    });
}

#[test]
fn classify_requires_message_text() {
    let result = classify::run("   ");
    assert_eq!(result.exit_code, 2);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["command"], "classify");
    assert_eq!(payload["error_class"], "usage");
}

#[test]
fn classify_reports_config_failure() {
    with_env(&[], || {
        let result = classify::run("stock of A4 paper");
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["error_class"], "config_validation");
    });
}

struct FencedReply;

#[async_trait]
impl LlmClient for FencedReply {
    async fn complete(&self, _system: &str, _user: &str) -> anyhow::Result<String> {
        Ok("<think>stock question</think>\n```json\n{\"intent\": \"check_stock\", \"args\": {\"keyword\": \"A4\"}}\n```"
            .to_owned())
    }
}

#[test]
fn classify_prints_the_extracted_intent() {
    let result = classify::classify_with(Arc::new(FencedReply), "how many A4 do we have");
    assert_eq!(result.exit_code, 0);

    let payload = parse_payload(&result.output);
    assert_eq!(payload["intent"], "check_stock");
    assert_eq!(payload["args"]["keyword"], "A4");
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "AIAA_ERP_BASE_URL",
        "AIAA_ERP_USER_ID",
        "AIAA_ERP_PASSWORD",
        "AIAA_ERP_LICENSE_TOKEN",
        "AIAA_ERP_TIMEOUT_SECS",
        "AIAA_ERP_DEBTOR_TYPE",
        "AIAA_TELEGRAM_BOT_TOKEN",
        "AIAA_TELEGRAM_API_BASE_URL",
        "AIAA_TELEGRAM_POLL_TIMEOUT_SECS",
        "AIAA_LLM_PROVIDER",
        "AIAA_LLM_API_KEY",
        "AIAA_LLM_BASE_URL",
        "AIAA_LLM_MODEL",
        "AIAA_LLM_TIMEOUT_SECS",
        "AIAA_SERVER_BIND_ADDRESS",
        "AIAA_SERVER_HEALTH_CHECK_PORT",
        "AIAA_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "AIAA_LOGGING_LEVEL",
        "AIAA_LOGGING_FORMAT",
        "AIAA_LOG_LEVEL",
        "AIAA_LOG_FORMAT",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
