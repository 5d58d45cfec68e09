//! The blockchain transfer collaborator boundary.
//!
//! The core never mutates ledger state until a transfer has returned a
//! definitive success carrying a transaction hash. There is no timeout or
//! cancellation contract here; a call is atomic-or-absent and callers that
//! need a timeout policy wrap the collaborator themselves.

use std::future::Future;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::reward::Currency;

/// Definitive proof of a settled on-chain transfer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxReceipt {
  pub tx_hash:      String,
  pub block_number: Option<u64>,
}

/// The collaborator rejected or failed the transfer. No funds moved.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct TransferError(pub String);

/// An opaque, possibly slow, possibly failing remote transfer from the
/// company wallet to a member wallet.
pub trait ChainTransfer: Send + Sync {
  fn transfer<'a>(
    &'a self,
    currency: Currency,
    wallet: &'a str,
    amount: Decimal,
  ) -> impl Future<Output = Result<TxReceipt, TransferError>> + Send + 'a;
}
