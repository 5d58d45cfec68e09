//! Handlers for `/members/:wallet/rewards`.

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use trellis_core::{
  member::normalize_wallet,
  reward::{Reward, RewardStatus},
  store::MatrixStore,
  transfer::ChainTransfer,
};

use crate::{
  AppState,
  error::{ApiError, store_err},
};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<RewardStatus>,
}

/// `GET /members/:wallet/rewards[?status=pending|instant]`
pub async fn list<S, T>(
  State(state): State<AppState<S, T>>,
  Path(wallet): Path<String>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Reward>>, ApiError>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  let wallet = normalize_wallet(&wallet)?;
  let rewards = state
    .store
    .rewards_for(&wallet, params.status)
    .await
    .map_err(store_err)?;
  Ok(Json(rewards))
}
