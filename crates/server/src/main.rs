mod bootstrap;
mod conversation;
mod health;

use std::time::Duration;

use aiaa_core::config::{AppConfig, LoadOptions};
use anyhow::Result;
use tokio::sync::watch;

fn init_logging(config: &AppConfig) {
    use aiaa_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging needs the config, so load it before anything else.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;

    health::spawn(
        &app.config.server.bind_address,
        app.config.server.health_check_port,
        app.erp_session.clone(),
    )
    .await?;

    let grace = Duration::from_secs(app.config.server.graceful_shutdown_secs);
    let (stop, shutdown) = watch::channel(false);
    let runner = app.chat_runner;
    let mut polling = tokio::spawn(async move { runner.run_until(shutdown, grace).await });

    tracing::info!(event_name = "system.server.started", "aiaa-server started");

    tokio::select! {
        finished = &mut polling => {
            tracing::warn!(
                event_name = "system.server.polling_stopped",
                "telegram polling ended; shutting down"
            );
            finished??;
            return Ok(());
        }
        signal = tokio::signal::ctrl_c() => signal?,
    }

    tracing::info!(
        event_name = "system.server.stopping",
        grace_secs = grace.as_secs(),
        "shutdown signal received"
    );
    // The runner may already be gone, in which case there is nobody to tell.
    let _ = stop.send(true);
    match tokio::time::timeout(grace + Duration::from_secs(1), polling).await {
        Ok(finished) => finished??,
        Err(_) => tracing::warn!(
            event_name = "system.server.shutdown_timeout",
            "polling did not stop within the grace period"
        ),
    }

    tracing::info!(event_name = "system.server.stopped", "aiaa-server stopped");
    Ok(())
}
