//! Reward and transaction types — the ledger side of the platform.
//!
//! Rewards are created by the reward ledger and transitioned only by the
//! withdrawal processor. A reward is never deleted; claimed history is
//! retained. The only post-terminal mutation allowed is the shrink during a
//! partial claim, which creates a sibling pending reward for the remainder
//! in the same store transaction (the conservation law).

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ─── Discriminants ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardKind {
  /// Fixed bonus to the referring sponsor on a level-1 registration.
  DirectSponsor,
  /// Tiered payout to an ancestor N layers up on a level purchase.
  LayerPayout,
  /// Token credit granted once per `(wallet, level)`.
  BccToken,
}

impl RewardKind {
  /// The discriminant string stored in the `kind` column.
  pub fn discriminant(self) -> &'static str {
    match self {
      Self::DirectSponsor => "direct_sponsor",
      Self::LayerPayout => "layer_payout",
      Self::BccToken => "bcc_token",
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
  Usdt,
  Bcc,
}

impl std::fmt::Display for Currency {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::Usdt => write!(f, "USDT"),
      Self::Bcc => write!(f, "BCC"),
    }
  }
}

/// `Pending` rewards are claimable through withdrawal; `Instant` rewards
/// are settled (either granted instantly or claimed).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardStatus {
  Pending,
  Instant,
}

// ─── Reward ──────────────────────────────────────────────────────────────────

/// A ledger entry. `amount` is strictly positive, always.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
  pub reward_id:        Uuid,
  pub recipient_wallet: String,
  pub source_wallet:    String,
  pub kind:             RewardKind,
  pub currency:         Currency,
  pub amount:           Decimal,
  pub status:           RewardStatus,
  /// For layer payouts: the recipient's depth above the source member.
  pub layer:            Option<u32>,
  /// For BCC credits: the purchased level. Doubles as the idempotency key
  /// together with `source_wallet`.
  pub level:            Option<u8>,
  pub created_at:       DateTime<Utc>,
  /// Informational claim window for pending layer payouts. Expired rewards
  /// are not redistributed; see DESIGN.md.
  pub expires_at:       Option<DateTime<Utc>>,
  pub notes:            Option<String>,
}

/// Input to a distribution write. `reward_id`, `status` bookkeeping and
/// `created_at` are assigned by the store.
#[derive(Debug, Clone)]
pub struct NewReward {
  pub recipient_wallet: String,
  pub source_wallet:    String,
  pub kind:             RewardKind,
  pub currency:         Currency,
  pub amount:           Decimal,
  pub status:           RewardStatus,
  pub layer:            Option<u32>,
  pub level:            Option<u8>,
  pub expires_at:       Option<DateTime<Utc>>,
  pub notes:            Option<String>,
}

// ─── Claim plan ──────────────────────────────────────────────────────────────

/// The final, partially-consumed reward in a claim walk: the row shrinks to
/// `claimed` and flips to instant, and a sibling pending reward for
/// `remainder` is inserted in the same transaction.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PartialClaim {
  pub reward_id: Uuid,
  pub claimed:   Decimal,
  pub remainder: Decimal,
}

/// The outcome of walking pending rewards oldest-first for a withdrawal.
/// Computed by the withdrawal processor under the wallet lock; applied by
/// the store in one transaction.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClaimPlan {
  /// Rewards consumed whole, flipped to instant.
  pub full:    Vec<Uuid>,
  /// At most one reward is split; it is always the last one touched.
  pub partial: Option<PartialClaim>,
}

// ─── Transactions ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionKind {
  Withdrawal,
  Purchase,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionStatus {
  Pending,
  Confirmed,
}

/// An immutable record of settled movement. Written only after the external
/// transfer has reported success with a hash.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
  pub transaction_id: Uuid,
  pub wallet:         String,
  pub kind:           TransactionKind,
  pub currency:       Currency,
  pub amount:         Decimal,
  pub status:         TransactionStatus,
  pub tx_hash:        Option<String>,
  pub block_number:   Option<u64>,
  pub created_at:     DateTime<Utc>,
}

/// Input to a transaction insert; id, status and timestamp come from the
/// store.
#[derive(Debug, Clone)]
pub struct NewTransaction {
  pub wallet:       String,
  pub kind:         TransactionKind,
  pub currency:     Currency,
  pub amount:       Decimal,
  pub tx_hash:      Option<String>,
  pub block_number: Option<u64>,
}

/// What a successful withdrawal hands back to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WithdrawalReceipt {
  pub transaction_id: Uuid,
  pub tx_hash:        String,
}

// ─── Transfer intents ────────────────────────────────────────────────────────

/// Lifecycle of a transfer intent. `Settled` with no matching ledger
/// mutation is the state a recovery pass looks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentState {
  /// Written before the external transfer is invoked.
  Created,
  /// The transfer returned a hash; the ledger mutation may not have run.
  Settled,
  /// The transfer was rejected; no funds moved.
  Failed,
  /// The ledger mutation committed in the same transaction as this flip.
  Reconciled,
}

/// The outbox record for one withdrawal: persisted before the external
/// transfer fires, so that a crash between a settled transfer and the
/// ledger mutation leaves a detectable trail instead of silent drift.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferIntent {
  pub intent_id:  Uuid,
  pub wallet:     String,
  pub currency:   Currency,
  pub amount:     Decimal,
  pub tx_hash:    Option<String>,
  pub state:      IntentState,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
}
