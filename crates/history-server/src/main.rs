//! history-server binary.
//!
//! Resolves [`Settings`] from `history.toml` (or the path given with
//! `--config`), the selected environment section and `HISTORY_*`
//! variables, opens the SQLite store, and serves the JSON API over HTTP.
//! Prometheus metrics are served on a second listener.

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::Parser;
use history_server::{Settings, telemetry};
use history_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Delivery history ledger server")]
struct Cli {
  /// Path to the TOML settings file.
  #[arg(short, long, default_value = "history.toml")]
  config: PathBuf,

  /// Settings section layered over `[default]`.
  #[arg(short, long, env = "HISTORY_ENV", default_value = "development")]
  environment: String,
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

  let settings = Settings::load(&cli.config, &cli.environment)
    .with_context(|| format!("failed to load settings from {:?}", cli.config))?;
  tracing::debug!(?settings, environment = %cli.environment, "resolved settings");

  let store_config = settings.store_config();
  let store = SqliteStore::open(&store_config)
    .await
    .with_context(|| format!("failed to open store at {:?}", store_config.path))?;

  let recorder = telemetry::install_recorder()
    .context("failed to install metrics recorder")?;
  let app = history_server::router(Arc::new(store));
  let address = settings.address();
  let metrics_address = settings.metrics_address();

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  tracing::info!("Serving metrics on http://{metrics_address}/metrics");
  let metrics_listener = TcpListener::bind(&metrics_address)
    .await
    .with_context(|| format!("failed to bind {metrics_address}"))?;

  tokio::try_join!(
    async { axum::serve(listener, app).await.context("server error") },
    async {
      axum::serve(metrics_listener, telemetry::metrics_router(recorder))
        .await
        .context("metrics server error")
    },
  )?;

  Ok(())
}
