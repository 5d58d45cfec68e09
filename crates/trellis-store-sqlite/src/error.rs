//! Error type for `trellis-store-sqlite`.

use thiserror::Error;
use trellis_core::member::Position;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  #[error("database error: {0}")]
  Database(#[from] tokio_rusqlite::Error),

  #[error("uuid parse error: {0}")]
  Uuid(#[from] uuid::Error),

  #[error("date/time parse error: {0}")]
  DateParse(String),

  #[error("decimal parse error: {0}")]
  Decimal(String),

  /// A stored discriminant column holds a value no codec recognises.
  #[error("corrupt row: {0}")]
  Corrupt(String),

  #[error("member not found: {0}")]
  MemberNotFound(String),

  /// The wallet already has a member row or an incoming placement edge.
  #[error("wallet {0} already has a placement")]
  AlreadyPlaced(String),

  /// Another placement won the `(parent_id, position)` slot first. The
  /// placement engine re-runs its search and retries on this.
  #[error("slot {position} under {parent} is already taken")]
  SlotTaken { parent: Uuid, position: Position },

  /// A reward named by a claim plan was not in pending state when the
  /// reconciliation transaction ran. The whole transaction rolls back.
  #[error("reward {0} is not pending")]
  RewardNotPending(Uuid),

  /// The stored balance no longer covers the withdrawal amount. The whole
  /// transaction rolls back.
  #[error("bcc balance of {wallet} does not cover {amount}")]
  BalanceOverdraw { wallet: String, amount: String },
}

impl From<Error> for trellis_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::MemberNotFound(wallet) => Self::MemberNotFound(wallet),
      Error::AlreadyPlaced(wallet) => Self::AlreadyPlaced(wallet),
      Error::SlotTaken { parent, position } => {
        Self::SlotTaken { parent, position }
      }
      other => Self::Internal(other.to_string()),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
