//! Rewind Rally - headless level runner
//!
//! Loads a level (or the built-in demo), then drives it at the fixed
//! simulation rate with a seeded autopilot until the level finishes, the
//! tick limit is reached or the process is asked to stop.

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rewind_rally::config::Config;
use rewind_rally::game::GameSession;
use rewind_rally::runner::{run_level, Autopilot};
use rewind_rally::world::LevelDescription;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Load configuration
    let config = Config::from_env()?;

    // Initialize tracing
    init_tracing(&config.log_level);

    info!("Starting Rewind Rally");

    let mut level = match &config.level_path {
        Some(path) => LevelDescription::load(path)
            .with_context(|| format!("loading level {}", path.display()))?,
        None => {
            info!("LEVEL_PATH not set, using the demo level");
            LevelDescription::demo()
        }
    };

    let mut tuning = level.session_tuning.clone().unwrap_or_default();
    if let Some(budget) = config.rewind_budget {
        tuning.rewind_budget = budget;
    }
    if let Some(energy) = config.spawn_energy {
        tuning.spawn_energy = energy;
    }
    level.session_tuning = Some(tuning);

    let session = GameSession::from_level(level)?;
    info!(
        session_id = %session.id(),
        level = %session.level().name,
        max_ticks = config.max_ticks,
        seed = config.autopilot_seed,
        "Session ready"
    );

    let summary = run_level(
        session,
        Autopilot::new(config.autopilot_seed),
        config.max_ticks,
        shutdown_signal(),
    )
    .await;

    info!(summary = %serde_json::to_string(&summary)?, "Run summary");
    info!("Shutdown complete");
    Ok(())
}

/// Initialize tracing/logging
fn init_tracing(log_level: &str) {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .init();
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        }
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        }
    }
}
