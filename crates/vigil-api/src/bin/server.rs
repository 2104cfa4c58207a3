//! vigil server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, starts the sweep scheduler, and serves the JSON
//! API over HTTP. SIGINT stops the listener and cancels any in-flight sweep.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::{net::TcpListener, sync::watch};
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vigil_api::{AppState, ServerConfig, api_router};
use vigil_engine::{
  resend::ResendTransport,
  scheduler,
  sweep::MissedCheckInSweep,
  transport::{AlertContext, AlertTransport, LogTransport, TransportError},
};
use vigil_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Vigil check-in monitor server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// The transport picked at startup from configuration.
enum Transport {
  Resend(ResendTransport),
  Log(LogTransport),
}

impl AlertTransport for Transport {
  async fn send(
    &self,
    recipient: &str,
    alert: &AlertContext,
  ) -> Result<(), TransportError> {
    match self {
      Self::Resend(t) => t.send(recipient, alert).await,
      Self::Log(t) => t.send(recipient, alert).await,
    }
  }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VIGIL"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = Arc::new(
    SqliteStore::open(&store_path)
      .await
      .with_context(|| format!("failed to open store at {store_path:?}"))?,
  );

  // Pick the alert transport.
  let transport = match &server_cfg.resend_api_key {
    Some(key) => {
      tracing::info!("email alerts enabled via Resend");
      Transport::Resend(
        ResendTransport::new(key.clone(), server_cfg.alert_from.clone())
          .context("failed to build Resend transport")?,
      )
    }
    None => {
      tracing::warn!("no resend_api_key configured; alerts will only be logged");
      Transport::Log(LogTransport)
    }
  };

  // Start the sweep scheduler: once shortly after startup, then on the
  // fixed period, never overlapping.
  let sweep =
    Arc::new(MissedCheckInSweep::new(Arc::clone(&store), Arc::new(transport)));
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let scheduler_task = tokio::spawn(scheduler::run(
    sweep,
    server_cfg.schedule(),
    shutdown_rx,
  ));

  // Serve the API.
  let app = api_router(AppState::new(store)).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(
    sweep_interval_secs = server_cfg.sweep_interval_secs,
    "listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("server error")?;

  // Stop the scheduler; an in-flight sweep is cancelled at its next await
  // point, accepting unsent notifications.
  shutdown_tx.send(true).ok();
  scheduler_task.await.context("scheduler task panicked")?;

  Ok(())
}

async fn shutdown_signal() {
  tokio::signal::ctrl_c().await.ok();
  tracing::info!("shutdown signal received");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
