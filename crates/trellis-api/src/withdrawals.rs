//! Handlers for withdrawals and the transaction history view.

use axum::{
  Json,
  extract::{Path, State},
  http::StatusCode,
  response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use trellis_core::{
  member::normalize_wallet,
  reward::{Currency, Transaction},
  store::MatrixStore,
  transfer::ChainTransfer,
};

use crate::{
  AppState,
  error::{ApiError, store_err},
};

#[derive(Debug, Deserialize)]
pub struct WithdrawBody {
  pub wallet:   String,
  pub currency: Currency,
  pub amount:   Decimal,
}

/// `POST /withdrawals` — body: `{"wallet":"0x..","currency":"USDT","amount":"70"}`
pub async fn create<S, T>(
  State(state): State<AppState<S, T>>,
  Json(body): Json<WithdrawBody>,
) -> Result<impl IntoResponse, ApiError>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  let receipt = state
    .withdrawals
    .withdraw(&body.wallet, body.currency, body.amount)
    .await?;
  Ok((StatusCode::CREATED, Json(receipt)))
}

/// `GET /members/:wallet/transactions` — newest first.
pub async fn transactions<S, T>(
  State(state): State<AppState<S, T>>,
  Path(wallet): Path<String>,
) -> Result<Json<Vec<Transaction>>, ApiError>
where
  S: MatrixStore + 'static,
  T: ChainTransfer + 'static,
{
  let wallet = normalize_wallet(&wallet)?;
  let transactions = state
    .store
    .transactions_for(&wallet)
    .await
    .map_err(store_err)?;
  Ok(Json(transactions))
}
