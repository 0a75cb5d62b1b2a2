use std::time::Duration;

use aiaa_core::config::{LlmConfig, LlmProvider};
use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};

/// Text completion over a system instruction and one user message.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

pub struct OllamaClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build().context("building ollama http client")?;
        Ok(Self { http, base_url: base_url.into(), model: model.into() })
    }
}

#[async_trait]
impl LlmClient for OllamaClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "stream": false,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self.http.post(&url).json(&body).send().await.context("ollama request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("ollama returned status {status}"));
        }

        let payload: Value = response.json().await.context("ollama response was not json")?;
        payload["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("ollama response missing message.content"))
    }
}

pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    api_key: SecretString,
    model: String,
}

impl OpenAiClient {
    pub const DEFAULT_BASE_URL: &'static str = "https://api.openai.com";

    pub fn new(
        base_url: Option<String>,
        api_key: SecretString,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build().context("building openai http client")?;
        Ok(Self {
            http,
            base_url: base_url.unwrap_or_else(|| Self::DEFAULT_BASE_URL.to_owned()),
            api_key,
            model: model.into(),
        })
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let url = format!("{}/v1/chat/completions", self.base_url.trim_end_matches('/'));
        let body = json!({
            "model": self.model,
            "temperature": 0,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
        });

        let response = self
            .http
            .post(&url)
            .bearer_auth(self.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .context("openai request failed")?;
        let status = response.status();
        if !status.is_success() {
            return Err(anyhow!("openai returned status {status}"));
        }

        let payload: Value = response.json().await.context("openai response was not json")?;
        payload["choices"][0]["message"]["content"]
            .as_str()
            .map(str::to_owned)
            .ok_or_else(|| anyhow!("openai response missing choices[0].message.content"))
    }
}

pub fn client_from_config(config: &LlmConfig) -> Result<Box<dyn LlmClient>> {
    let timeout = Duration::from_secs(config.timeout_secs);
    match config.provider {
        LlmProvider::Ollama => {
            let base_url = config
                .base_url
                .clone()
                .ok_or_else(|| anyhow!("llm.base_url is required for the ollama provider"))?;
            Ok(Box::new(OllamaClient::new(base_url, config.model.clone(), timeout)?))
        }
        LlmProvider::OpenAi => {
            let api_key = config
                .api_key
                .clone()
                .ok_or_else(|| anyhow!("llm.api_key is required for the openai provider"))?;
            Ok(Box::new(OpenAiClient::new(config.base_url.clone(), api_key, config.model.clone(), timeout)?))
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use anyhow::{anyhow, Result};
    use async_trait::async_trait;

    use super::LlmClient;

    /// Answers every completion with the same reply and records the system
    /// prompts it was given.
    pub(crate) struct CannedLlm {
        reply: Result<String, String>,
        pub(crate) prompts: Mutex<Vec<String>>,
    }

    impl CannedLlm {
        pub(crate) fn replying(reply: &str) -> Self {
            Self { reply: Ok(reply.to_owned()), prompts: Mutex::new(Vec::new()) }
        }

        pub(crate) fn failing(message: &str) -> Self {
            Self { reply: Err(message.to_owned()), prompts: Mutex::new(Vec::new()) }
        }
    }

    #[async_trait]
    impl LlmClient for CannedLlm {
        async fn complete(&self, system: &str, _user: &str) -> Result<String> {
            self.prompts.lock().expect("prompts lock").push(system.to_owned());
            self.reply.clone().map_err(|message| anyhow!(message))
        }
    }
}
