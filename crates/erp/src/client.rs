//! Authenticated HTTP session against the ERP REST API.
//!
//! The bearer token has no known lifetime; expiry is discovered through a 401.
//! A 401 triggers exactly one re-login and one re-send of the same request.
//! Re-logins are single-flight: every login bumps a generation counter, and a
//! caller that saw a 401 only logs in again if nobody else has refreshed past
//! the generation it used.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use aiaa_core::config::ErpConfig;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::{json, Value};
use thiserror::Error;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use crate::endpoints::Endpoints;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Get => f.write_str("GET"),
            Self::Post => f.write_str("POST"),
        }
    }
}

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub bearer: Option<SecretString>,
    pub body: Option<Value>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed JSON body; `None` when the body is empty or not JSON.
    pub body: Option<Value>,
}

impl HttpResponse {
    pub fn json(status: u16, body: Value) -> Self {
        Self { status, body: Some(body) }
    }

    pub fn empty(status: u16) -> Self {
        Self { status, body: None }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("request timed out: {0}")]
    Timeout(String),
    #[error("connection failed: {0}")]
    Connect(String),
    #[error("http transport failure: {0}")]
    Other(String),
}

#[async_trait]
pub trait HttpTransport: Send + Sync {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError>;
}

pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| TransportError::Other(error.to_string()))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
        let mut builder = match request.method {
            HttpMethod::Get => self.client.get(&request.url),
            HttpMethod::Post => self.client.post(&request.url),
        };
        if let Some(token) = &request.bearer {
            builder = builder.bearer_auth(token.expose_secret());
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder.send().await.map_err(map_reqwest_error)?;
        let status = response.status().as_u16();
        let bytes = response.bytes().await.map_err(map_reqwest_error)?;
        let body = serde_json::from_slice::<Value>(&bytes).ok();

        Ok(HttpResponse { status, body })
    }
}

fn map_reqwest_error(error: reqwest::Error) -> TransportError {
    if error.is_timeout() {
        TransportError::Timeout(error.to_string())
    } else if error.is_connect() {
        TransportError::Connect(error.to_string())
    } else {
        TransportError::Other(error.to_string())
    }
}

#[derive(Clone, Debug)]
pub struct ErpCredentials {
    pub user_id: String,
    pub password: SecretString,
    pub license_token: SecretString,
}

#[derive(Debug, Default)]
struct TokenState {
    generation: u64,
    token: Option<SecretString>,
}

pub struct ErpSession {
    base_url: String,
    credentials: ErpCredentials,
    endpoints: Endpoints,
    transport: Arc<dyn HttpTransport>,
    token: RwLock<TokenState>,
    login_lock: Mutex<()>,
}

impl ErpSession {
    pub fn new(
        base_url: impl Into<String>,
        credentials: ErpCredentials,
        endpoints: Endpoints,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            base_url: base_url.into(),
            credentials,
            endpoints,
            transport,
            token: RwLock::new(TokenState::default()),
            login_lock: Mutex::new(()),
        }
    }

    pub fn from_config(config: &ErpConfig) -> Result<Self, TransportError> {
        let transport = ReqwestTransport::new(Duration::from_secs(config.timeout_secs))?;
        Ok(Self::new(
            config.base_url.clone(),
            ErpCredentials {
                user_id: config.user_id.clone(),
                password: config.password.clone(),
                license_token: config.license_token.clone(),
            },
            Endpoints::default(),
            Arc::new(transport),
        ))
    }

    pub fn endpoints(&self) -> &Endpoints {
        &self.endpoints
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn has_token(&self) -> bool {
        self.token.read().await.token.is_some()
    }

    /// Exchanges the configured credentials for a bearer token. Failure is
    /// not fatal: the token is left unset and later requests will 401.
    pub async fn login(&self) -> bool {
        let _guard = self.login_lock.lock().await;
        self.login_locked().await
    }

    /// Sends `payload` to `endpoint`, returning the JSON body of a final 200.
    /// Every other outcome, transport failures included, is `None`.
    pub async fn request(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<Value>,
    ) -> Option<Value> {
        self.request_outcome(method, endpoint, payload).await.ok().flatten()
    }

    /// Like [`ErpSession::request`], but keeps a failure to reach the ERP
    /// apart from an answer without data. Non-200 statuses are `Ok(None)`.
    pub async fn request_outcome(
        &self,
        method: HttpMethod,
        endpoint: &str,
        payload: Option<Value>,
    ) -> Result<Option<Value>, TransportError> {
        let url = join_url(&self.base_url, endpoint);
        let (generation, token) = self.token_snapshot().await;

        let first = self.send_once(method, &url, endpoint, token, payload.clone()).await?;
        let response = if first.status == 401 {
            warn!(
                event_name = "erp.session.token_expired",
                endpoint = %endpoint,
                generation,
                "erp rejected bearer token, re-authenticating once"
            );
            self.refresh_token(generation).await;
            let (_, token) = self.token_snapshot().await;
            self.send_once(method, &url, endpoint, token, payload).await?
        } else {
            first
        };

        if response.status != 200 {
            warn!(
                event_name = "erp.request.rejected",
                endpoint = %endpoint,
                status = response.status,
                "erp request returned non-success status"
            );
            return Ok(None);
        }

        if response.body.is_none() {
            warn!(
                event_name = "erp.request.unreadable_body",
                endpoint = %endpoint,
                "erp response body was empty or not json"
            );
        }
        Ok(response.body)
    }

    async fn refresh_token(&self, seen_generation: u64) -> bool {
        let _guard = self.login_lock.lock().await;
        {
            let state = self.token.read().await;
            if state.generation != seen_generation {
                debug!(
                    event_name = "erp.session.login_coalesced",
                    generation = state.generation,
                    "token already refreshed by a concurrent request"
                );
                return state.token.is_some();
            }
        }
        self.login_locked().await
    }

    async fn login_locked(&self) -> bool {
        let url = join_url(&self.base_url, &self.endpoints.login);
        let body = json!({
            "user": self.credentials.user_id,
            "password": self.credentials.password.expose_secret(),
            "licenseToken": self.credentials.license_token.expose_secret(),
        });
        let request = HttpRequest { method: HttpMethod::Post, url, bearer: None, body: Some(body) };

        let token = match self.transport.send(request).await {
            Ok(response) if response.status == 200 => {
                extract_login_token(response.body.as_ref())
            }
            Ok(response) => {
                warn!(
                    event_name = "erp.session.login_rejected",
                    status = response.status,
                    "erp login returned non-success status"
                );
                None
            }
            Err(transport_error) => {
                error!(
                    event_name = "erp.session.login_failed",
                    error = %transport_error,
                    "erp login could not reach the server"
                );
                None
            }
        };

        let mut state = self.token.write().await;
        state.generation += 1;
        let succeeded = token.is_some();
        state.token = token.map(SecretString::from);

        if succeeded {
            info!(
                event_name = "erp.session.login_succeeded",
                generation = state.generation,
                user_id = %self.credentials.user_id,
                "erp session authenticated"
            );
        } else {
            warn!(
                event_name = "erp.session.login_without_token",
                generation = state.generation,
                "erp login did not yield a token"
            );
        }
        succeeded
    }

    async fn token_snapshot(&self) -> (u64, Option<SecretString>) {
        let state = self.token.read().await;
        (state.generation, state.token.clone())
    }

    async fn send_once(
        &self,
        method: HttpMethod,
        url: &str,
        endpoint: &str,
        bearer: Option<SecretString>,
        body: Option<Value>,
    ) -> Result<HttpResponse, TransportError> {
        let request = HttpRequest { method, url: url.to_owned(), bearer, body };
        self.transport.send(request).await.map_err(|transport_error| {
            error!(
                event_name = "erp.request.transport_failed",
                endpoint = %endpoint,
                method = %method,
                error = %transport_error,
                "erp request failed before a response arrived"
            );
            transport_error
        })
    }
}

/// Token from element 0 of a login response; accepts `token` or `Token`.
fn extract_login_token(body: Option<&Value>) -> Option<String> {
    let first = body?.as_array()?.first()?;
    ["token", "Token"]
        .iter()
        .filter_map(|key| first.get(*key))
        .filter_map(Value::as_str)
        .map(str::trim)
        .find(|token| !token.is_empty())
        .map(str::to_owned)
}

pub fn join_url(base_url: &str, endpoint: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), endpoint.trim_start_matches('/'))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use secrecy::{ExposeSecret, SecretString};
    use serde_json::{json, Value};
    use tokio::sync::Barrier;

    use super::{
        join_url, ErpCredentials, ErpSession, HttpMethod, HttpRequest, HttpResponse,
        HttpTransport, TransportError,
    };
    use crate::endpoints::Endpoints;

    const ITEMS: &str = "api/V2/Item/GetItem";

    /// Issues `token-<n>` on the n-th login. Data requests succeed only when
    /// they carry a token from a login at or after `valid_from_login`.
    struct RotatingTokenTransport {
        logins: AtomicUsize,
        data_calls: AtomicUsize,
        valid_from_login: usize,
        always_unauthorized: bool,
        stale_barrier: Option<Barrier>,
    }

    impl RotatingTokenTransport {
        fn new(valid_from_login: usize) -> Self {
            Self {
                logins: AtomicUsize::new(0),
                data_calls: AtomicUsize::new(0),
                valid_from_login,
                always_unauthorized: false,
                stale_barrier: None,
            }
        }

        fn logins(&self) -> usize {
            self.logins.load(Ordering::SeqCst)
        }

        fn data_calls(&self) -> usize {
            self.data_calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl HttpTransport for RotatingTokenTransport {
        async fn send(&self, request: HttpRequest) -> Result<HttpResponse, TransportError> {
            if request.url.ends_with("api/Login") {
                let login = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
                return Ok(HttpResponse::json(200, json!([{ "token": format!("token-{login}") }])));
            }

            self.data_calls.fetch_add(1, Ordering::SeqCst);
            let login_of_token = request
                .bearer
                .as_ref()
                .and_then(|token| token.expose_secret().strip_prefix("token-").map(str::to_owned))
                .and_then(|n| n.parse::<usize>().ok())
                .unwrap_or(0);

            if self.always_unauthorized || login_of_token < self.valid_from_login {
                if let Some(barrier) = &self.stale_barrier {
                    barrier.wait().await;
                }
                return Ok(HttpResponse::empty(401));
            }
            Ok(HttpResponse::json(200, json!([{ "ItemCode": "APPLE" }])))
        }
    }

    struct FailingTransport;

    #[async_trait]
    impl HttpTransport for FailingTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Err(TransportError::Connect("connection refused".to_owned()))
        }
    }

    struct FixedTransport(HttpResponse);

    #[async_trait]
    impl HttpTransport for FixedTransport {
        async fn send(&self, _request: HttpRequest) -> Result<HttpResponse, TransportError> {
            Ok(self.0.clone())
        }
    }

    fn session(transport: Arc<dyn HttpTransport>) -> ErpSession {
        ErpSession::new(
            "http://erp.test:8015/",
            ErpCredentials {
                user_id: "ADMIN".to_owned(),
                password: SecretString::from("ADMIN".to_owned()),
                license_token: SecretString::from("license".to_owned()),
            },
            Endpoints::default(),
            transport,
        )
    }

    #[tokio::test]
    async fn login_stores_token_from_first_element() {
        let transport = Arc::new(RotatingTokenTransport::new(1));
        let session = session(transport.clone());

        assert!(session.login().await);
        assert!(session.has_token().await);
        assert_eq!(transport.logins(), 1);
    }

    #[tokio::test]
    async fn login_accepts_capitalised_token_key() {
        let session = session(Arc::new(FixedTransport(HttpResponse::json(
            200,
            json!([{ "Token": "abc" }]),
        ))));

        assert!(session.login().await);
    }

    #[tokio::test]
    async fn login_failure_leaves_token_unset() {
        let empty = session(Arc::new(FixedTransport(HttpResponse::json(200, json!([])))));
        let rejected = session(Arc::new(FixedTransport(HttpResponse::empty(403))));
        let unreachable = session(Arc::new(FailingTransport));

        assert!(!empty.login().await);
        assert!(!rejected.login().await);
        assert!(!unreachable.login().await);
        assert!(!unreachable.has_token().await);
    }

    #[tokio::test]
    async fn single_401_triggers_one_login_and_one_retry() {
        let transport = Arc::new(RotatingTokenTransport::new(2));
        let session = session(transport.clone());
        assert!(session.login().await);

        let response = session.request(HttpMethod::Post, ITEMS, Some(json!({}))).await;

        assert_eq!(response, Some(json!([{ "ItemCode": "APPLE" }])));
        assert_eq!(transport.logins(), 2);
        assert_eq!(transport.data_calls(), 2);
    }

    #[tokio::test]
    async fn second_401_is_terminal() {
        let mut transport = RotatingTokenTransport::new(1);
        transport.always_unauthorized = true;
        let transport = Arc::new(transport);
        let session = session(transport.clone());

        let response = session.request(HttpMethod::Post, ITEMS, None).await;

        assert_eq!(response, None);
        assert_eq!(transport.logins(), 1);
        assert_eq!(transport.data_calls(), 2);
    }

    #[tokio::test]
    async fn concurrent_401s_collapse_into_one_login() {
        let mut transport = RotatingTokenTransport::new(1);
        transport.stale_barrier = Some(Barrier::new(2));
        let transport = Arc::new(transport);
        let session = Arc::new(session(transport.clone()));

        let first = {
            let session = session.clone();
            tokio::spawn(async move { session.request(HttpMethod::Post, ITEMS, None).await })
        };
        let second = {
            let session = session.clone();
            tokio::spawn(async move { session.request(HttpMethod::Post, ITEMS, None).await })
        };

        let first = first.await.expect("first request task");
        let second = second.await.expect("second request task");

        assert!(first.is_some());
        assert!(second.is_some());
        assert_eq!(transport.logins(), 1);
        assert_eq!(transport.data_calls(), 4);
    }

    #[tokio::test]
    async fn transport_failure_becomes_none() {
        let session = session(Arc::new(FailingTransport));

        assert_eq!(session.request(HttpMethod::Get, ITEMS, None).await, None);
    }

    #[tokio::test]
    async fn request_outcome_separates_unreachable_from_no_data() {
        let unreachable = session(Arc::new(FailingTransport));
        let server_error = session(Arc::new(FixedTransport(HttpResponse::empty(500))));

        assert_eq!(
            unreachable.request_outcome(HttpMethod::Get, ITEMS, None).await,
            Err(TransportError::Connect("connection refused".to_owned()))
        );
        assert_eq!(server_error.request_outcome(HttpMethod::Get, ITEMS, None).await, Ok(None));
    }

    #[tokio::test]
    async fn non_200_and_non_json_bodies_are_no_data() {
        let server_error = session(Arc::new(FixedTransport(HttpResponse::json(
            500,
            json!({"Message": "boom"}),
        ))));
        let html = session(Arc::new(FixedTransport(HttpResponse::empty(200))));

        assert_eq!(server_error.request(HttpMethod::Post, ITEMS, None).await, None);
        assert_eq!(html.request(HttpMethod::Post, ITEMS, None).await, None::<Value>);
    }

    #[test]
    fn urls_join_without_doubled_slashes() {
        assert_eq!(join_url("http://erp:8015/", "/api/Login"), "http://erp:8015/api/Login");
        assert_eq!(join_url("http://erp:8015", "api/Debtor/"), "http://erp:8015/api/Debtor/");
    }
}
