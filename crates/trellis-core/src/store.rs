//! The `MatrixStore` trait — persistence boundary of the platform core.
//!
//! The trait is implemented by storage backends (e.g.
//! `trellis-store-sqlite`). The engine components depend on this
//! abstraction, not on any concrete backend. Every write that must be
//! atomic (placement edge + closure rows, one distribution event, one
//! withdrawal reconciliation) is a single trait method so the backend can
//! wrap it in one transaction.

use std::future::Future;

use rust_decimal::Decimal;
use uuid::Uuid;

use crate::{
  member::{Member, Placement, Position},
  reward::{
    ClaimPlan, Currency, NewReward, NewTransaction, Reward, RewardStatus,
    Transaction, TransferIntent,
  },
};

/// Abstraction over the member/placement/reward store.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (tokio with `axum`).
pub trait MatrixStore: Send + Sync {
  type Error: std::error::Error
    + Into<crate::Error>
    + Send
    + Sync
    + 'static;

  // ── Members ───────────────────────────────────────────────────────────

  /// Create the root member (no sponsor, no incoming edge) together with
  /// its depth-0 closure row. Fails if the wallet is already registered.
  fn add_root<'a>(
    &'a self,
    wallet: &'a str,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + 'a;

  fn member_by_wallet<'a>(
    &'a self,
    wallet: &'a str,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + 'a;

  fn member_by_id(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Member>, Self::Error>> + Send + '_;

  /// The occupied slots directly under `parent_id`, in position order.
  fn children_of(
    &self,
    parent_id: Uuid,
  ) -> impl Future<Output = Result<Vec<(Position, Member)>, Self::Error>>
  + Send
  + '_;

  // ── Placement — the one edge write ────────────────────────────────────

  /// Create a member and insert its placement edge plus all closure rows
  /// (self row, parent row, one per ancestor of the parent) in one
  /// transaction.
  ///
  /// The `(parent_id, position)` uniqueness constraint is the source of
  /// truth for slot races: a violation surfaces as a slot-taken error the
  /// placement engine retries on. A duplicate wallet surfaces as an
  /// already-placed error.
  fn place_member<'a>(
    &'a self,
    wallet: &'a str,
    sponsor_wallet: &'a str,
    placement: Placement,
  ) -> impl Future<Output = Result<Member, Self::Error>> + Send + 'a;

  // ── Closure queries ───────────────────────────────────────────────────

  /// Ancestors of `member_id` ordered by increasing depth (parent first),
  /// excluding the self row, up to `max_depth` when given.
  fn ancestors_of(
    &self,
    member_id: Uuid,
    max_depth: Option<u32>,
  ) -> impl Future<Output = Result<Vec<(u32, Member)>, Self::Error>> + Send + '_;

  /// Descendants of `member_id` ordered by increasing depth, excluding the
  /// self row, up to `max_depth` when given.
  fn descendants_of(
    &self,
    member_id: Uuid,
    max_depth: Option<u32>,
  ) -> impl Future<Output = Result<Vec<(u32, Member)>, Self::Error>> + Send + '_;

  // ── Rewards — the one distribution write ──────────────────────────────

  /// Persist all rewards for one distribution event in one transaction and
  /// bump the member's level to `level` if higher.
  ///
  /// A `bcc_token` reward additionally increments the member's
  /// `bcc_balance`; that step is idempotent per `(source_wallet, level)` —
  /// on a retried event the BCC reward and its credit are skipped, never
  /// doubled. Returns the rewards actually inserted.
  fn record_distribution<'a>(
    &'a self,
    wallet: &'a str,
    level: u8,
    rewards: Vec<NewReward>,
  ) -> impl Future<Output = Result<Vec<Reward>, Self::Error>> + Send + 'a;

  /// Pending rewards for a wallet in `currency`, oldest first (FIFO claim
  /// order).
  fn pending_rewards<'a>(
    &'a self,
    wallet: &'a str,
    currency: Currency,
  ) -> impl Future<Output = Result<Vec<Reward>, Self::Error>> + Send + 'a;

  fn rewards_for<'a>(
    &'a self,
    wallet: &'a str,
    status: Option<RewardStatus>,
  ) -> impl Future<Output = Result<Vec<Reward>, Self::Error>> + Send + 'a;

  // ── Transfer intents (outbox) ─────────────────────────────────────────

  /// Persist a `created` intent before the external transfer is invoked.
  fn create_transfer_intent<'a>(
    &'a self,
    wallet: &'a str,
    currency: Currency,
    amount: Decimal,
  ) -> impl Future<Output = Result<TransferIntent, Self::Error>> + Send + 'a;

  /// Record that the external transfer settled with `tx_hash`. From this
  /// point on, only a committed reconciliation may retire the intent.
  fn mark_intent_settled<'a>(
    &'a self,
    intent_id: Uuid,
    tx_hash: &'a str,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;

  /// Record that the external transfer was rejected; no funds moved.
  fn mark_intent_failed(
    &self,
    intent_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Intents not yet `reconciled` or `failed`, oldest first. A `settled`
  /// entry here means funds moved without a matching ledger mutation.
  fn open_intents(
    &self,
  ) -> impl Future<Output = Result<Vec<TransferIntent>, Self::Error>> + Send + '_;

  // ── Withdrawal reconciliation ─────────────────────────────────────────

  /// Record a settled BCC withdrawal: insert the confirmed transaction,
  /// decrement `bcc_balance` by `txn.amount`, and flip the intent to
  /// `reconciled`, atomically. Fails without mutation if the balance no
  /// longer covers the amount.
  fn apply_bcc_withdrawal<'a>(
    &'a self,
    wallet: &'a str,
    intent_id: Uuid,
    txn: NewTransaction,
  ) -> impl Future<Output = Result<Transaction, Self::Error>> + Send + 'a;

  /// Record a settled USDT withdrawal: insert the confirmed transaction,
  /// flip every reward in `plan.full` to instant, apply the partial split
  /// (shrink + sibling pending remainder) if present, and flip the intent
  /// to `reconciled` — all in one transaction. Fails without mutation if
  /// any planned reward is no longer pending.
  fn apply_usdt_withdrawal<'a>(
    &'a self,
    wallet: &'a str,
    intent_id: Uuid,
    plan: ClaimPlan,
    txn: NewTransaction,
  ) -> impl Future<Output = Result<Transaction, Self::Error>> + Send + 'a;

  fn transactions_for<'a>(
    &'a self,
    wallet: &'a str,
  ) -> impl Future<Output = Result<Vec<Transaction>, Self::Error>> + Send + 'a;
}
