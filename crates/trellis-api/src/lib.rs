//! JSON REST API for Trellis.
//!
//! Exposes an axum [`Router`] over the engine components, generic over the
//! [`MatrixStore`] backend and the [`ChainTransfer`] collaborator. Auth, TLS,
//! and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", trellis_api::api_router(state))
//! ```

pub mod error;
pub mod members;
pub mod rewards;
pub mod withdrawals;

use std::{path::PathBuf, sync::Arc};

use axum::{
  Router,
  routing::{get, post},
};
use serde::Deserialize;
use trellis_core::{
  activity::ActivityLog,
  levels::LevelTable,
  store::MatrixStore,
  transfer::ChainTransfer,
};
use trellis_engine::{
  LedgerConfig, PlacementEngine, RewardLedger, WithdrawalProcessor,
};

pub use error::ApiError;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and the
/// `TRELLIS_` environment.
#[derive(Deserialize, Clone)]
pub struct ServerConfig {
  pub host:       String,
  pub port:       u16,
  pub store_path: PathBuf,
}

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through all axum handlers: the store for read
/// views, the three engine components for everything that writes.
pub struct AppState<S, T> {
  pub store:       Arc<S>,
  pub placement:   Arc<PlacementEngine<S>>,
  pub ledger:      Arc<RewardLedger<S>>,
  pub withdrawals: Arc<WithdrawalProcessor<S, T>>,
}

impl<S, T> Clone for AppState<S, T> {
  fn clone(&self) -> Self {
    Self {
      store:       self.store.clone(),
      placement:   self.placement.clone(),
      ledger:      self.ledger.clone(),
      withdrawals: self.withdrawals.clone(),
    }
  }
}

impl<S, T> AppState<S, T>
where
  S: MatrixStore,
  T: ChainTransfer,
{
  /// Wire the engine components over one store and transfer collaborator.
  pub fn new(
    store: Arc<S>,
    transfer: Arc<T>,
    levels: LevelTable,
    ledger_config: LedgerConfig,
    activity: Arc<dyn ActivityLog>,
  ) -> Self {
    Self {
      placement:   Arc::new(PlacementEngine::new(store.clone())),
      ledger:      Arc::new(RewardLedger::new(
        store.clone(),
        levels,
        ledger_config,
      )),
      withdrawals: Arc::new(WithdrawalProcessor::new(
        store.clone(),
        transfer,
        activity,
      )),
      store,
    }
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build a fully-materialised API router for `state`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, T>(state: AppState<S, T>) -> Router<()>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  Router::new()
    // Members
    .route("/members", post(members::register::<S, T>))
    .route("/members/{wallet}", get(members::get_one::<S, T>))
    .route("/members/{wallet}/downline", get(members::downline::<S, T>))
    .route("/members/{wallet}/upgrade", post(members::upgrade::<S, T>))
    // Ledger views
    .route("/members/{wallet}/rewards", get(rewards::list::<S, T>))
    .route(
      "/members/{wallet}/transactions",
      get(withdrawals::transactions::<S, T>),
    )
    // Withdrawals
    .route("/withdrawals", post(withdrawals::create::<S, T>))
    .with_state(state)
}

// ─── Tests ────────────────────────────────────────────────────────────────────
