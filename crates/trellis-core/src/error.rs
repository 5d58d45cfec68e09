//! Error taxonomy for the Trellis core.
//!
//! Every variant here is a deterministic, caller-actionable outcome except
//! [`Error::Internal`], which covers unexpected store failures. The
//! withdrawal processor documents the one genuinely dangerous `Internal`
//! case: a store failure after the external transfer has already settled.

use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

use crate::{member::Position, reward::Currency};

#[derive(Debug, Error)]
pub enum Error {
  #[error("invalid request: {0}")]
  Validation(String),

  #[error("member not found: {0}")]
  MemberNotFound(String),

  #[error("sponsor not found: {0}")]
  SponsorNotFound(String),

  #[error("wallet {0} already has a placement")]
  AlreadyPlaced(String),

  #[error("slot {position} under {parent} is already taken")]
  SlotTaken { parent: Uuid, position: Position },

  #[error("placement slot race not resolved after {attempts} attempts")]
  PlacementContention { attempts: u32 },

  #[error(
    "insufficient {currency} balance: requested {requested}, available {available}"
  )]
  InsufficientBalance {
    currency:  Currency,
    requested: Decimal,
    available: Decimal,
  },

  #[error("external transfer failed: {0}")]
  TransferFailed(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl Error {
  /// True for errors a caller may safely retry verbatim: the slot race and
  /// a rejected external transfer leave no ledger state behind.
  pub fn is_transient(&self) -> bool {
    matches!(
      self,
      Self::SlotTaken { .. }
        | Self::PlacementContention { .. }
        | Self::TransferFailed(_)
    )
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
