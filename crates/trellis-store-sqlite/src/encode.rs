//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! All timestamps are stored as RFC 3339 strings, money as canonical decimal
//! strings, UUIDs as hyphenated lowercase strings. Enum discriminants match
//! the serde tags on the core types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use trellis_core::{
  member::{Member, MemberStatus},
  reward::{
    Currency, IntentState, Reward, RewardKind, RewardStatus, Transaction,
    TransactionKind, TransactionStatus, TransferIntent,
  },
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Uuid ────────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339() }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── Decimal ─────────────────────────────────────────────────────────────────

pub fn encode_decimal(d: Decimal) -> String { d.normalize().to_string() }

pub fn decode_decimal(s: &str) -> Result<Decimal> {
  s.parse().map_err(|_| Error::Decimal(s.to_string()))
}

/// Same as [`decode_decimal`] but usable inside a `conn.call` closure, where
/// only `tokio_rusqlite::Error` can flow out.
pub fn decode_decimal_in_tx(
  s: &str,
) -> std::result::Result<Decimal, tokio_rusqlite::Error> {
  s.parse().map_err(|_| {
    tokio_rusqlite::Error::Other(
      format!("invalid decimal in store: {s:?}").into(),
    )
  })
}

// ─── Enum discriminants ──────────────────────────────────────────────────────

pub fn encode_member_status(s: MemberStatus) -> &'static str {
  match s {
    MemberStatus::Active => "active",
    MemberStatus::Suspended => "suspended",
  }
}

pub fn decode_member_status(s: &str) -> Result<MemberStatus> {
  match s {
    "active" => Ok(MemberStatus::Active),
    "suspended" => Ok(MemberStatus::Suspended),
    other => Err(Error::Corrupt(format!("unknown member status: {other:?}"))),
  }
}

pub fn encode_reward_kind(k: RewardKind) -> &'static str { k.discriminant() }

pub fn decode_reward_kind(s: &str) -> Result<RewardKind> {
  match s {
    "direct_sponsor" => Ok(RewardKind::DirectSponsor),
    "layer_payout" => Ok(RewardKind::LayerPayout),
    "bcc_token" => Ok(RewardKind::BccToken),
    other => Err(Error::Corrupt(format!("unknown reward kind: {other:?}"))),
  }
}

pub fn encode_currency(c: Currency) -> &'static str {
  match c {
    Currency::Usdt => "USDT",
    Currency::Bcc => "BCC",
  }
}

pub fn decode_currency(s: &str) -> Result<Currency> {
  match s {
    "USDT" => Ok(Currency::Usdt),
    "BCC" => Ok(Currency::Bcc),
    other => Err(Error::Corrupt(format!("unknown currency: {other:?}"))),
  }
}

pub fn encode_reward_status(s: RewardStatus) -> &'static str {
  match s {
    RewardStatus::Pending => "pending",
    RewardStatus::Instant => "instant",
  }
}

pub fn decode_reward_status(s: &str) -> Result<RewardStatus> {
  match s {
    "pending" => Ok(RewardStatus::Pending),
    "instant" => Ok(RewardStatus::Instant),
    other => Err(Error::Corrupt(format!("unknown reward status: {other:?}"))),
  }
}

pub fn encode_txn_kind(k: TransactionKind) -> &'static str {
  match k {
    TransactionKind::Withdrawal => "withdrawal",
    TransactionKind::Purchase => "purchase",
  }
}

pub fn decode_txn_kind(s: &str) -> Result<TransactionKind> {
  match s {
    "withdrawal" => Ok(TransactionKind::Withdrawal),
    "purchase" => Ok(TransactionKind::Purchase),
    other => Err(Error::Corrupt(format!("unknown transaction kind: {other:?}"))),
  }
}

pub fn encode_intent_state(s: IntentState) -> &'static str {
  match s {
    IntentState::Created => "created",
    IntentState::Settled => "settled",
    IntentState::Failed => "failed",
    IntentState::Reconciled => "reconciled",
  }
}

pub fn decode_intent_state(s: &str) -> Result<IntentState> {
  match s {
    "created" => Ok(IntentState::Created),
    "settled" => Ok(IntentState::Settled),
    "failed" => Ok(IntentState::Failed),
    "reconciled" => Ok(IntentState::Reconciled),
    other => Err(Error::Corrupt(format!("unknown intent state: {other:?}"))),
  }
}

pub fn encode_txn_status(s: TransactionStatus) -> &'static str {
  match s {
    TransactionStatus::Pending => "pending",
    TransactionStatus::Confirmed => "confirmed",
  }
}

pub fn decode_txn_status(s: &str) -> Result<TransactionStatus> {
  match s {
    "pending" => Ok(TransactionStatus::Pending),
    "confirmed" => Ok(TransactionStatus::Confirmed),
    other => Err(Error::Corrupt(format!("unknown transaction status: {other:?}"))),
  }
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `members` row.
pub struct RawMember {
  pub member_id:      String,
  pub wallet:         String,
  pub sponsor_wallet: Option<String>,
  pub current_level:  i64,
  pub bcc_balance:    String,
  pub status:         String,
  pub joined_at:      String,
}

impl RawMember {
  /// Column list matching the field order above.
  pub const COLUMNS: &'static str =
    "member_id, wallet, sponsor_wallet, current_level, bcc_balance, status, joined_at";

  pub fn from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:      row.get(offset)?,
      wallet:         row.get(offset + 1)?,
      sponsor_wallet: row.get(offset + 2)?,
      current_level:  row.get(offset + 3)?,
      bcc_balance:    row.get(offset + 4)?,
      status:         row.get(offset + 5)?,
      joined_at:      row.get(offset + 6)?,
    })
  }

  pub fn into_member(self) -> Result<Member> {
    Ok(Member {
      member_id:      decode_uuid(&self.member_id)?,
      wallet:         self.wallet,
      sponsor_wallet: self.sponsor_wallet,
      current_level:  self.current_level as u8,
      bcc_balance:    decode_decimal(&self.bcc_balance)?,
      status:         decode_member_status(&self.status)?,
      joined_at:      decode_dt(&self.joined_at)?,
    })
  }
}

/// Raw strings read directly from a `rewards` row.
pub struct RawReward {
  pub reward_id:        String,
  pub recipient_wallet: String,
  pub source_wallet:    String,
  pub kind:             String,
  pub currency:         String,
  pub amount:           String,
  pub status:           String,
  pub layer:            Option<i64>,
  pub level:            Option<i64>,
  pub created_at:       String,
  pub expires_at:       Option<String>,
  pub notes:            Option<String>,
}

impl RawReward {
  pub const COLUMNS: &'static str = "reward_id, recipient_wallet, source_wallet, \
     kind, currency, amount, status, layer, level, created_at, expires_at, notes";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reward_id:        row.get(0)?,
      recipient_wallet: row.get(1)?,
      source_wallet:    row.get(2)?,
      kind:             row.get(3)?,
      currency:         row.get(4)?,
      amount:           row.get(5)?,
      status:           row.get(6)?,
      layer:            row.get(7)?,
      level:            row.get(8)?,
      created_at:       row.get(9)?,
      expires_at:       row.get(10)?,
      notes:            row.get(11)?,
    })
  }

  pub fn into_reward(self) -> Result<Reward> {
    Ok(Reward {
      reward_id:        decode_uuid(&self.reward_id)?,
      recipient_wallet: self.recipient_wallet,
      source_wallet:    self.source_wallet,
      kind:             decode_reward_kind(&self.kind)?,
      currency:         decode_currency(&self.currency)?,
      amount:           decode_decimal(&self.amount)?,
      status:           decode_reward_status(&self.status)?,
      layer:            self.layer.map(|l| l as u32),
      level:            self.level.map(|l| l as u8),
      created_at:       decode_dt(&self.created_at)?,
      expires_at:       self.expires_at.as_deref().map(decode_dt).transpose()?,
      notes:            self.notes,
    })
  }
}

/// Raw strings read directly from a `transfer_intents` row.
pub struct RawIntent {
  pub intent_id:  String,
  pub wallet:     String,
  pub currency:   String,
  pub amount:     String,
  pub tx_hash:    Option<String>,
  pub state:      String,
  pub created_at: String,
  pub updated_at: String,
}

impl RawIntent {
  pub const COLUMNS: &'static str =
    "intent_id, wallet, currency, amount, tx_hash, state, created_at, updated_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      intent_id:  row.get(0)?,
      wallet:     row.get(1)?,
      currency:   row.get(2)?,
      amount:     row.get(3)?,
      tx_hash:    row.get(4)?,
      state:      row.get(5)?,
      created_at: row.get(6)?,
      updated_at: row.get(7)?,
    })
  }

  pub fn into_intent(self) -> Result<TransferIntent> {
    Ok(TransferIntent {
      intent_id:  decode_uuid(&self.intent_id)?,
      wallet:     self.wallet,
      currency:   decode_currency(&self.currency)?,
      amount:     decode_decimal(&self.amount)?,
      tx_hash:    self.tx_hash,
      state:      decode_intent_state(&self.state)?,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from a `transactions` row.
pub struct RawTransaction {
  pub transaction_id: String,
  pub wallet:         String,
  pub kind:           String,
  pub currency:       String,
  pub amount:         String,
  pub status:         String,
  pub tx_hash:        Option<String>,
  pub block_number:   Option<i64>,
  pub created_at:     String,
}

impl RawTransaction {
  pub const COLUMNS: &'static str = "transaction_id, wallet, kind, currency, \
     amount, status, tx_hash, block_number, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transaction_id: row.get(0)?,
      wallet:         row.get(1)?,
      kind:           row.get(2)?,
      currency:       row.get(3)?,
      amount:         row.get(4)?,
      status:         row.get(5)?,
      tx_hash:        row.get(6)?,
      block_number:   row.get(7)?,
      created_at:     row.get(8)?,
    })
  }

  pub fn into_transaction(self) -> Result<Transaction> {
    Ok(Transaction {
      transaction_id: decode_uuid(&self.transaction_id)?,
      wallet:         self.wallet,
      kind:           decode_txn_kind(&self.kind)?,
      currency:       decode_currency(&self.currency)?,
      amount:         decode_decimal(&self.amount)?,
      status:         decode_txn_status(&self.status)?,
      tx_hash:        self.tx_hash,
      block_number:   self.block_number.map(|b| b as u64),
      created_at:     decode_dt(&self.created_at)?,
    })
  }
}
