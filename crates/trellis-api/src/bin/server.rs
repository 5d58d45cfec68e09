//! Trellis server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`, overridable
//! through `TRELLIS_`-prefixed environment variables), opens an in-process
//! SQLite store, and serves the JSON API over HTTP.
//!
//! The binary ships with a development transfer collaborator that settles
//! every withdrawal locally with a pseudo hash; a production deployment
//! replaces [`DevTransfer`] with a payout gateway client.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use rust_decimal::Decimal;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use trellis_api::{AppState, ServerConfig, api_router};
use trellis_core::{
  levels::LevelTable,
  reward::Currency,
  transfer::{ChainTransfer, TransferError, TxReceipt},
};
use trellis_engine::{ChannelActivityLog, LedgerConfig};
use trellis_store_sqlite::SqliteStore;
use uuid::Uuid;

const ACTIVITY_BUFFER: usize = 256;

#[derive(Parser)]
#[command(author, version, about = "Trellis matrix platform server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

/// Settles transfers locally with a minted pseudo hash. Development only:
/// no funds move anywhere.
struct DevTransfer;

impl ChainTransfer for DevTransfer {
  async fn transfer(
    &self,
    currency: Currency,
    wallet: &str,
    amount: Decimal,
  ) -> Result<TxReceipt, TransferError> {
    tracing::info!(%currency, %wallet, %amount, "dev transfer, no chain attached");
    Ok(TxReceipt {
      tx_hash:      format!("0xdev{}", Uuid::new_v4().simple()),
      block_number: None,
    })
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
    .add_source(config::Environment::with_prefix("TRELLIS"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Activity events drain into the tracing log.
  let (activity, rx) = ChannelActivityLog::new(ACTIVITY_BUFFER);
  ChannelActivityLog::spawn_tracing_drain(rx);

  let state = AppState::new(
    Arc::new(store),
    Arc::new(DevTransfer),
    LevelTable::standard(),
    LedgerConfig::default(),
    Arc::new(activity),
  );

  // Complete any withdrawal whose transfer settled before a crash, before
  // taking traffic.
  let recovered = state
    .withdrawals
    .recover()
    .await
    .context("withdrawal recovery failed")?;
  if recovered > 0 {
    tracing::info!(recovered, "completed unreconciled withdrawals");
  }

  let app = api_router(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
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
