//! Member and placement types — the nodes and edges of the 3x3 matrix.
//!
//! A member is placed exactly once; the placement edge and the ancestor
//! closure rows derived from it are immutable thereafter. All tree queries
//! go through the closure index, never through recursive edge walks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Position ────────────────────────────────────────────────────────────────

/// One of the three child slots under a matrix node, filled in order.
#[derive(
  Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(into = "u8", try_from = "u8")]
pub enum Position {
  First,
  Second,
  Third,
}

impl Position {
  /// All slots in fill order. Placement always probes them left to right.
  pub const ALL: [Position; 3] = [Self::First, Self::Second, Self::Third];

  pub fn as_u8(self) -> u8 {
    match self {
      Self::First => 1,
      Self::Second => 2,
      Self::Third => 3,
    }
  }
}

impl TryFrom<u8> for Position {
  type Error = Error;

  fn try_from(value: u8) -> Result<Self> {
    match value {
      1 => Ok(Self::First),
      2 => Ok(Self::Second),
      3 => Ok(Self::Third),
      other => Err(Error::Validation(format!("invalid position: {other}"))),
    }
  }
}

impl From<Position> for u8 {
  fn from(value: Position) -> Self { value.as_u8() }
}

impl std::fmt::Display for Position {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{}", self.as_u8())
  }
}

// ─── Member ──────────────────────────────────────────────────────────────────

/// Soft lifecycle status. Members are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MemberStatus {
  Active,
  Suspended,
}

/// A platform member. The wallet is the external identity (unique,
/// lower-cased on entry); the UUID is the internal node id used by the
/// placement and closure tables.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
  pub member_id:      Uuid,
  pub wallet:         String,
  /// The referring sponsor's wallet as given at registration. Under
  /// spillover this can differ from the placement parent.
  pub sponsor_wallet: Option<String>,
  /// Highest purchased level, 0 until the first level-1 purchase. Max 19.
  pub current_level:  u8,
  /// Non-negative token balance; mutated only by the reward ledger
  /// (credits) and the withdrawal processor (debits).
  pub bcc_balance:    Decimal,
  pub status:         MemberStatus,
  pub joined_at:      DateTime<Utc>,
}

/// Where a new member landed: the node that received them and the slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
  pub parent_id: Uuid,
  pub position:  Position,
}

/// A parent/child edge in the matrix. At most one edge per
/// `(parent_id, position)`, at most one incoming edge per child.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementEdge {
  pub parent_id:  Uuid,
  pub child_id:   Uuid,
  pub position:   Position,
  pub created_at: DateTime<Utc>,
}

/// One row of the ancestor closure index: `ancestor_id` is `depth` edges
/// above `descendant_id`. Depth 0 is the self row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRow {
  pub ancestor_id:   Uuid,
  pub descendant_id: Uuid,
  pub depth:         u32,
}

// ─── Wallet normalisation ────────────────────────────────────────────────────

/// The maximum purchasable level.
pub const MAX_LEVEL: u8 = 19;

/// Normalise a wallet address: trim, lower-case, and validate the
/// `0x` + 40 hex digit shape. All wallets are stored in this form.
pub fn normalize_wallet(raw: &str) -> Result<String> {
  let wallet = raw.trim().to_ascii_lowercase();
  let hex_part = wallet
    .strip_prefix("0x")
    .ok_or_else(|| Error::Validation(format!("malformed wallet: {raw:?}")))?;
  if hex_part.len() != 40 || !hex_part.bytes().all(|b| b.is_ascii_hexdigit()) {
    return Err(Error::Validation(format!("malformed wallet: {raw:?}")));
  }
  Ok(wallet)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn normalize_lowercases_and_trims() {
    let raw = "  0xABCDEFabcdef0123456789ABCDEFabcdef012345 ";
    let normal = normalize_wallet(raw).unwrap();
    assert_eq!(normal, "0xabcdefabcdef0123456789abcdefabcdef012345");
  }

  #[test]
  fn normalize_rejects_bad_shapes() {
    assert!(normalize_wallet("").is_err());
    assert!(normalize_wallet("abcdef").is_err());
    assert!(normalize_wallet("0x1234").is_err());
    assert!(normalize_wallet("0xzzcdefabcdef0123456789abcdefabcdef012345").is_err());
  }

  #[test]
  fn position_round_trips_through_u8() {
    for pos in Position::ALL {
      assert_eq!(Position::try_from(pos.as_u8()).unwrap(), pos);
    }
    assert!(Position::try_from(0).is_err());
    assert!(Position::try_from(4).is_err());
  }
}
