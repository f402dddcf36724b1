//! Edge agent entry point.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Adapters (outer ring)                     │
//! │                                                             │
//! │  RealHardware / SimulatedHardware / DemoSeeder              │
//! │  ReqwestTransport   LogEventSink   Diagnostics              │
//! │                                                             │
//! │  ───────────────── Port trait boundary ─────────────────    │
//! │                                                             │
//! │  ┌───────────────────────────────────────────────────────┐  │
//! │  │  SensorManager · ActuatorManager · LocalRuleEngine    │  │
//! │  │             ResilientClient (shared)                  │  │
//! │  └───────────────────────────────────────────────────────┘  │
//! │                                                             │
//! │  Orchestrator (task group · cancellation · grace period)    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};
use tokio_util::sync::CancellationToken;

use edge_agent::adapters::http::ReqwestTransport;
use edge_agent::adapters::log_sink::LogEventSink;
use edge_agent::adapters::SharedHardware;
use edge_agent::cli::Cli;
use edge_agent::client::ResilientClient;
use edge_agent::config::AgentConfig;
use edge_agent::diagnostics::Diagnostics;
use edge_agent::logging;
use edge_agent::orchestrator::Orchestrator;

#[tokio::main]
async fn main() -> Result<()> {
    // ── 1. Environment + CLI ──────────────────────────────────
    if let Err(e) = dotenvy::dotenv() {
        if !e.not_found() {
            eprintln!("edge-agent: ignoring unreadable .env: {e}");
        }
    }
    let cli = Cli::parse();
    logging::init(cli.log_level.as_deref())?;
    info!("edge-agent v{}", env!("CARGO_PKG_VERSION"));

    // ── 2. Configuration ──────────────────────────────────────
    let mut config = if cli.config.exists() {
        AgentConfig::load(&cli.config)
            .with_context(|| format!("loading {}", cli.config.display()))?
    } else {
        warn!(
            "config {} not found, using defaults",
            cli.config.display()
        );
        AgentConfig::default()
    };
    config.apply_env()?;
    if let Some(mode) = cli.mode {
        config.hardware.mode = mode;
    }
    config.validate()?;
    info!(
        "config: backend={} mode={} channels={} rules={}",
        config.backend.base_url,
        config.hardware.mode,
        config.channels.len(),
        config.rules.rules.len()
    );
    if cli.check {
        info!("config OK");
        return Ok(());
    }

    // ── 3. Adapters ───────────────────────────────────────────
    let transport = ReqwestTransport::new(
        &config.backend.base_url,
        Duration::from_millis(config.backend.request_timeout_ms),
    )?;
    let client = Arc::new(ResilientClient::from_config(
        Arc::new(transport),
        &config.backend,
        &config.retry,
    ));
    let hardware = SharedHardware::from_config(&config);
    let diagnostics = Arc::new(Diagnostics::new(Arc::new(LogEventSink::new())));

    // ── 4. Shutdown signal ────────────────────────────────────
    let shutdown = CancellationToken::new();
    tokio::spawn(watch_signals(shutdown.clone()));

    // ── 5. Run ────────────────────────────────────────────────
    let orchestrator = Orchestrator::new(config, hardware, client, diagnostics)?;
    orchestrator.run(shutdown).await?;
    info!("edge-agent stopped");
    Ok(())
}

/// Cancel `shutdown` on SIGINT or SIGTERM.
async fn watch_signals(shutdown: CancellationToken) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut term) => {
                tokio::select! {
                    _ = tokio::signal::ctrl_c() => info!("SIGINT received"),
                    _ = term.recv() => info!("SIGTERM received"),
                }
            }
            Err(e) => {
                warn!("cannot install SIGTERM handler: {}", e);
                let _ = tokio::signal::ctrl_c().await;
                info!("SIGINT received");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        info!("interrupt received");
    }
    shutdown.cancel();
}
