use std::sync::Arc;
use std::time::{Duration, Instant};

use aiaa_erp::client::ErpSession;
use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use chrono::Utc;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, error, info};

/// Without a token, the health route logs in at most once per this window.
pub const LOGIN_RETRY_COOLDOWN: Duration = Duration::from_secs(30);

#[derive(Clone)]
pub struct HealthState {
    erp_session: Arc<ErpSession>,
    login_cooldown: Duration,
    last_login_attempt: Arc<Mutex<Option<Instant>>>,
}

impl HealthState {
    pub fn new(erp_session: Arc<ErpSession>) -> Self {
        Self::with_login_cooldown(erp_session, LOGIN_RETRY_COOLDOWN)
    }

    pub fn with_login_cooldown(erp_session: Arc<ErpSession>, login_cooldown: Duration) -> Self {
        Self { erp_session, login_cooldown, last_login_attempt: Arc::new(Mutex::new(None)) }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthCheck {
    pub status: &'static str,
    pub detail: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub service: HealthCheck,
    pub erp: HealthCheck,
    pub checked_at: String,
}

pub fn router(erp_session: Arc<ErpSession>) -> Router {
    Router::new().route("/health", get(health)).with_state(HealthState::new(erp_session))
}

pub async fn spawn(bind_address: &str, port: u16, erp_session: Arc<ErpSession>) -> std::io::Result<()> {
    let address = format!("{bind_address}:{port}");
    let listener = tokio::net::TcpListener::bind(&address).await?;

    info!(
        event_name = "system.health.start",
        bind_address = %address,
        "health endpoint started"
    );

    tokio::spawn(async move {
        if let Err(error) = axum::serve(listener, router(erp_session)).await {
            error!(
                event_name = "system.health.error",
                error = %error,
                "health endpoint server terminated unexpectedly"
            );
        }
    });

    Ok(())
}

pub async fn health(State(state): State<HealthState>) -> (StatusCode, Json<HealthResponse>) {
    let erp = erp_check(&state).await;
    let ready = erp.status == "ready";

    let payload = HealthResponse {
        status: if ready { "ready" } else { "degraded" },
        service: HealthCheck {
            status: "ready",
            detail: "aiaa-server runtime initialized".to_string(),
        },
        erp,
        checked_at: Utc::now().to_rfc3339(),
    };

    let status_code = if ready { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };
    (status_code, Json(payload))
}

async fn erp_check(state: &HealthState) -> HealthCheck {
    let session = &state.erp_session;
    if session.has_token().await {
        return HealthCheck { status: "ready", detail: "erp session holds a token".to_string() };
    }

    // Held across the login so concurrent polls share one attempt.
    let mut last_attempt = state.last_login_attempt.lock().await;
    if let Some(at) = *last_attempt {
        if at.elapsed() < state.login_cooldown {
            debug!(
                event_name = "system.health.login_throttled",
                "skipping erp login, last attempt is still recent"
            );
            return HealthCheck {
                status: "degraded",
                detail: format!("erp login recently failed against {}", session.base_url()),
            };
        }
    }
    *last_attempt = Some(Instant::now());

    if session.login().await {
        return HealthCheck { status: "ready", detail: "erp login succeeded".to_string() };
    }
    HealthCheck {
        status: "degraded",
        detail: format!("erp login failed against {}", session.base_url()),
    }
}
