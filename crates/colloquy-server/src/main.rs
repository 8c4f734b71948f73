//! colloquy-server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, mounts the JSON API under `/api`, and runs a
//! background task that prunes stale presence rows.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use colloquy_core::{message::EnrollmentPolicy, store::SessionStore};
use colloquy_store_sqlite::SqliteStore;
use serde::Deserialize;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Colloquy discussion platform server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Runtime server configuration, deserialised from `config.toml` with
/// `COLLOQUY_*` environment overrides.
#[derive(Deserialize, Clone)]
struct ServerConfig {
  #[serde(default = "default_host")]
  host: String,
  #[serde(default = "default_port")]
  port: u16,
  #[serde(default = "default_store_path")]
  store_path: PathBuf,
  #[serde(default)]
  enrollment_policy: EnrollmentPolicy,
  /// Presence rows older than this are deleted by the background pruner.
  #[serde(default = "default_presence_retention")]
  presence_retention_minutes: u64,
}

fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 8380 }
fn default_store_path() -> PathBuf { PathBuf::from("colloquy.db") }
fn default_presence_retention() -> u64 { 30 }

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("COLLOQUY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?
    .with_enrollment_policy(server_cfg.enrollment_policy);
  tracing::info!(
    policy = ?store.enrollment_policy(),
    "store opened at {store_path:?}"
  );

  let store = Arc::new(store);
  spawn_presence_pruner(
    store.clone(),
    server_cfg.presence_retention_minutes,
  );

  let app = axum::Router::new()
    .nest("/api", colloquy_api::api_router(store));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Periodically delete presence rows older than the retention window.
/// Pure housekeeping; a failed sweep is logged and retried next tick.
fn spawn_presence_pruner(store: Arc<SqliteStore>, retention_minutes: u64) {
  let retention = chrono::Duration::minutes(retention_minutes as i64);
  let tick = Duration::from_secs(retention_minutes.max(1) * 60 / 2);
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(tick);
    loop {
      interval.tick().await;
      if let Err(e) = store.prune_presence(retention).await {
        tracing::warn!("presence prune failed: {e}");
      }
    }
  });
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
