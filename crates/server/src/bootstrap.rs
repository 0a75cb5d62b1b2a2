use std::sync::Arc;

use aiaa_agent::classifier::IntentClassifier;
use aiaa_agent::llm::{client_from_config, LlmClient};
use aiaa_agent::runtime::AgentRuntime;
use aiaa_chat::events::EventDispatcher;
use aiaa_chat::polling::{ChatTransport, PollingRunner, ReconnectPolicy};
use aiaa_chat::telegram::TelegramTransport;
use aiaa_core::config::{AppConfig, ConfigError, LoadOptions};
use aiaa_erp::accessors::ErpService;
use aiaa_erp::client::{ErpSession, TransportError};
use aiaa_erp::gateway::ErpGateway;
use thiserror::Error;
use tracing::{info, warn};

use crate::conversation::AgentConversation;

pub struct Application {
    pub config: AppConfig,
    pub erp_session: Arc<ErpSession>,
    pub agent_runtime: Arc<AgentRuntime>,
    pub chat_runner: PollingRunner,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("erp http client could not be built: {0}")]
    ErpClient(#[source] TransportError),
    #[error("language model client could not be built: {0}")]
    LlmClient(#[source] anyhow::Error),
    #[error("telegram transport could not be built: {0}")]
    ChatTransport(#[source] anyhow::Error),
}

pub async fn bootstrap(options: LoadOptions) -> Result<Application, BootstrapError> {
    let config = AppConfig::load(options)?;
    bootstrap_with_config(config).await
}

/// Wires the ERP session, the agent and the Telegram runner from an already
/// loaded config. The initial ERP login is attempted but a failure only
/// degrades health; requests log in again on demand.
pub async fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(event_name = "system.bootstrap.start", "starting application bootstrap");

    let erp_session =
        Arc::new(ErpSession::from_config(&config.erp).map_err(BootstrapError::ErpClient)?);
    if erp_session.login().await {
        info!(
            event_name = "system.bootstrap.erp_connected",
            base_url = %erp_session.base_url(),
            "initial erp login succeeded"
        );
    } else {
        warn!(
            event_name = "system.bootstrap.erp_unavailable",
            base_url = %erp_session.base_url(),
            "initial erp login failed; continuing, requests will retry the login"
        );
    }

    let llm: Arc<dyn LlmClient> =
        Arc::from(client_from_config(&config.llm).map_err(BootstrapError::LlmClient)?);
    info!(
        event_name = "system.bootstrap.llm_configured",
        provider = ?config.llm.provider,
        model = %config.llm.model,
        "language model client configured"
    );

    let erp: Arc<dyn ErpGateway> =
        Arc::new(ErpService::new(erp_session.clone(), config.erp.debtor_type.clone()));
    let agent_runtime = Arc::new(AgentRuntime::new(erp, IntentClassifier::new(llm)));

    let transport: Arc<dyn ChatTransport> = Arc::new(
        TelegramTransport::from_config(&config.telegram).map_err(BootstrapError::ChatTransport)?,
    );
    let dispatcher =
        EventDispatcher::for_service(Arc::new(AgentConversation::new(agent_runtime.clone())));
    let chat_runner = PollingRunner::new(transport, dispatcher, ReconnectPolicy::default());

    Ok(Application { config, erp_session, agent_runtime, chat_runner })
}

#[cfg(test)]
mod tests {
    use aiaa_core::config::{ConfigOverrides, LoadOptions};

    use crate::bootstrap::bootstrap;

    #[tokio::test]
    async fn bootstrap_fails_fast_on_malformed_bot_token() {
        let result = bootstrap(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                telegram_bot_token: Some("not-a-token".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await;

        let message = result.err().expect("bootstrap should fail").to_string();
        assert!(message.contains("telegram.bot_token"), "{message}");
    }

    #[tokio::test]
    async fn bootstrap_survives_unreachable_erp() {
        let app = bootstrap(LoadOptions {
            config_path: Some("does-not-exist.toml".into()),
            overrides: ConfigOverrides {
                telegram_bot_token: Some("123456:test-secret".to_string()),
                erp_base_url: Some("http://127.0.0.1:9".to_string()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        })
        .await
        .expect("bootstrap should not require a reachable erp");

        assert!(!app.erp_session.has_token().await);
        assert_eq!(app.agent_runtime.sessions().len().await, 0);
    }
}
