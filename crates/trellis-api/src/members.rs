//! Handlers for `/members` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/members` | Body: `{"wallet":"0x..","sponsor_wallet":"0x.."}` |
//! | `GET`  | `/members/:wallet` | 404 if not registered |
//! | `GET`  | `/members/:wallet/downline` | Optional `?depth=N` |
//! | `POST` | `/members/:wallet/upgrade` | Body: `{"level":2}` |
//!
//! Registration places the member (spillover from the sponsor, or as the
//! tree root when no sponsor is given) and distributes the level-1 rewards.

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use trellis_core::{
  Error,
  member::{Member, Placement, normalize_wallet},
  reward::Reward,
  store::MatrixStore,
  transfer::ChainTransfer,
};

use crate::{
  AppState,
  error::{ApiError, store_err},
};

// ─── Register ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct RegisterBody {
  pub wallet:         String,
  /// Absent only for the tree root.
  pub sponsor_wallet: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct RegisterResponse {
  pub member:    Member,
  pub placement: Option<Placement>,
  pub rewards:   Vec<Reward>,
}

/// `POST /members`
pub async fn register<S, T>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<RegisterBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  let (member, placement) = match &body.sponsor_wallet {
    Some(sponsor) => {
      let (member, placement) =
        state.placement.place(&body.wallet, sponsor).await?;
      (member, Some(placement))
    }
    None => (state.placement.register_root(&body.wallet).await?, None),
  };

  let rewards = state.ledger.distribute(&member.wallet, 1).await?;

  // Re-read: the distribution bumped the level and may have credited BCC.
  let wallet = member.wallet;
  let member = state
    .store
    .member_by_wallet(&wallet)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError(Error::MemberNotFound(wallet)))?;

  Ok((
    StatusCode::CREATED,
    Json(RegisterResponse { member, placement, rewards }),
  ))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /members/:wallet`
pub async fn get_one<S, T>(
  State(state): State<AppState<S, T>>,
  Path(wallet): Path<String>,
) -> Result<Json<Member>, ApiError>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  let wallet = normalize_wallet(&wallet)?;
  let member = state
    .store
    .member_by_wallet(&wallet)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError(Error::MemberNotFound(wallet)))?;
  Ok(Json(member))
}

// ─── Downline ─────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct DownlineParams {
  pub depth: Option<u32>,
}

#[derive(Debug, Serialize)]
pub struct DownlineEntry {
  pub depth:  u32,
  pub member: Member,
}

/// `GET /members/:wallet/downline[?depth=N]` — the member's subtree from
/// the closure index, ordered by increasing depth.
pub async fn downline<S, T>(
  State(state): State<AppState<S, T>>,
  Path(wallet): Path<String>,
  Query(params): Query<DownlineParams>,
) -> Result<Json<Vec<DownlineEntry>>, ApiError>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  let wallet = normalize_wallet(&wallet)?;
  let member = state
    .store
    .member_by_wallet(&wallet)
    .await
    .map_err(store_err)?
    .ok_or_else(|| ApiError(Error::MemberNotFound(wallet)))?;

  let entries = state
    .store
    .descendants_of(member.member_id, params.depth)
    .await
    .map_err(store_err)?
    .into_iter()
    .map(|(depth, member)| DownlineEntry { depth, member })
    .collect();

  Ok(Json(entries))
}

// ─── Upgrade ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct UpgradeBody {
  pub level: u8,
}

/// `POST /members/:wallet/upgrade` — purchase a level, distribute rewards.
pub async fn upgrade<S, T>(
  State(state): State<AppState<S, T>>,
  Path(wallet): Path<String>,
  Json(body): Json<UpgradeBody>,
) -> Result<Json<Vec<Reward>>, ApiError>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  let rewards = state.ledger.distribute(&wallet, body.level).await?;
  Ok(Json(rewards))
}
