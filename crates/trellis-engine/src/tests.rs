//! Engine integration tests against an in-memory SQLite store.

use std::sync::{
  Arc,
  atomic::{AtomicU32, Ordering},
};

use chrono::{Duration, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use trellis_core::{
  Error,
  activity::NullActivityLog,
  levels::LevelTable,
  member::{Member, Placement, Position},
  reward::{
    ClaimPlan, Currency, IntentState, NewReward, NewTransaction, Reward,
    RewardKind, RewardStatus, Transaction, TransferIntent,
  },
  store::MatrixStore,
  transfer::{ChainTransfer, TransferError, TxReceipt},
};
use trellis_store_sqlite::{Error as StoreError, SqliteStore};
use uuid::Uuid;

use crate::{
  ChannelActivityLog, LedgerConfig, PlacementEngine, RewardLedger,
  WithdrawalProcessor,
};

// ─── Fixtures ────────────────────────────────────────────────────────────────

fn wallet(n: u32) -> String {
  format!("0x{n:040x}")
}

async fn store() -> Arc<SqliteStore> {
  Arc::new(SqliteStore::open_in_memory().await.expect("in-memory store"))
}

fn ledger(store: &Arc<SqliteStore>) -> RewardLedger<SqliteStore> {
  RewardLedger::new(store.clone(), LevelTable::standard(), LedgerConfig::default())
}

struct MockTransfer {
  calls: AtomicU32,
  fail:  bool,
}

impl MockTransfer {
  fn ok() -> Arc<Self> {
    Arc::new(Self { calls: AtomicU32::new(0), fail: false })
  }

  fn failing() -> Arc<Self> {
    Arc::new(Self { calls: AtomicU32::new(0), fail: true })
  }
}

impl ChainTransfer for MockTransfer {
  async fn transfer(
    &self,
    _currency: Currency,
    _wallet: &str,
    _amount: Decimal,
  ) -> Result<TxReceipt, TransferError> {
    let n = self.calls.fetch_add(1, Ordering::SeqCst);
    if self.fail {
      return Err(TransferError("gateway rejected the transfer".into()));
    }
    Ok(TxReceipt {
      tx_hash:      format!("0xhash{n}"),
      block_number: Some(1000 + n as u64),
    })
  }
}

fn processor(
  store: &Arc<SqliteStore>,
  transfer: Arc<MockTransfer>,
) -> WithdrawalProcessor<SqliteStore, MockTransfer> {
  WithdrawalProcessor::new(store.clone(), transfer, Arc::new(NullActivityLog))
}

/// Seed one pending USDT layer payout directly through the store.
async fn seed_pending(store: &SqliteStore, member: &Member, amount: Decimal) {
  store
    .record_distribution(&wallet(999), 1, vec![NewReward {
      recipient_wallet: member.wallet.clone(),
      source_wallet:    wallet(999),
      kind:             RewardKind::LayerPayout,
      currency:         Currency::Usdt,
      amount,
      status:           RewardStatus::Pending,
      layer:            Some(1),
      level:            None,
      expires_at:       Some(Utc::now() + Duration::hours(72)),
      notes:            None,
    }])
    .await
    .unwrap();
}

/// Store wrapper that loses a configurable number of slot races before
/// letting placement inserts through; everything else delegates.
struct RacySlotStore {
  inner:  Arc<SqliteStore>,
  losses: AtomicU32,
}

impl RacySlotStore {
  fn losing(inner: Arc<SqliteStore>, losses: u32) -> Arc<Self> {
    Arc::new(Self { inner, losses: AtomicU32::new(losses) })
  }
}

impl MatrixStore for RacySlotStore {
  type Error = StoreError;

  async fn add_root(&self, wallet: &str) -> Result<Member, StoreError> {
    self.inner.add_root(wallet).await
  }

  async fn member_by_wallet(
    &self,
    wallet: &str,
  ) -> Result<Option<Member>, StoreError> {
    self.inner.member_by_wallet(wallet).await
  }

  async fn member_by_id(&self, id: Uuid) -> Result<Option<Member>, StoreError> {
    self.inner.member_by_id(id).await
  }

  async fn children_of(
    &self,
    parent_id: Uuid,
  ) -> Result<Vec<(Position, Member)>, StoreError> {
    self.inner.children_of(parent_id).await
  }

  async fn place_member(
    &self,
    wallet: &str,
    sponsor_wallet: &str,
    placement: Placement,
  ) -> Result<Member, StoreError> {
    let lost = self
      .losses
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if lost {
      return Err(StoreError::SlotTaken {
        parent:   placement.parent_id,
        position: placement.position,
      });
    }
    self.inner.place_member(wallet, sponsor_wallet, placement).await
  }

  async fn ancestors_of(
    &self,
    member_id: Uuid,
    max_depth: Option<u32>,
  ) -> Result<Vec<(u32, Member)>, StoreError> {
    self.inner.ancestors_of(member_id, max_depth).await
  }

  async fn descendants_of(
    &self,
    member_id: Uuid,
    max_depth: Option<u32>,
  ) -> Result<Vec<(u32, Member)>, StoreError> {
    self.inner.descendants_of(member_id, max_depth).await
  }

  async fn record_distribution(
    &self,
    wallet: &str,
    level: u8,
    rewards: Vec<NewReward>,
  ) -> Result<Vec<Reward>, StoreError> {
    self.inner.record_distribution(wallet, level, rewards).await
  }

  async fn pending_rewards(
    &self,
    wallet: &str,
    currency: Currency,
  ) -> Result<Vec<Reward>, StoreError> {
    self.inner.pending_rewards(wallet, currency).await
  }

  async fn rewards_for(
    &self,
    wallet: &str,
    status: Option<RewardStatus>,
  ) -> Result<Vec<Reward>, StoreError> {
    self.inner.rewards_for(wallet, status).await
  }

  async fn create_transfer_intent(
    &self,
    wallet: &str,
    currency: Currency,
    amount: Decimal,
  ) -> Result<TransferIntent, StoreError> {
    self.inner.create_transfer_intent(wallet, currency, amount).await
  }

  async fn mark_intent_settled(
    &self,
    intent_id: Uuid,
    tx_hash: &str,
  ) -> Result<(), StoreError> {
    self.inner.mark_intent_settled(intent_id, tx_hash).await
  }

  async fn mark_intent_failed(&self, intent_id: Uuid) -> Result<(), StoreError> {
    self.inner.mark_intent_failed(intent_id).await
  }

  async fn open_intents(&self) -> Result<Vec<TransferIntent>, StoreError> {
    self.inner.open_intents().await
  }

  async fn apply_bcc_withdrawal(
    &self,
    wallet: &str,
    intent_id: Uuid,
    txn: NewTransaction,
  ) -> Result<Transaction, StoreError> {
    self.inner.apply_bcc_withdrawal(wallet, intent_id, txn).await
  }

  async fn apply_usdt_withdrawal(
    &self,
    wallet: &str,
    intent_id: Uuid,
    plan: ClaimPlan,
    txn: NewTransaction,
  ) -> Result<Transaction, StoreError> {
    self.inner.apply_usdt_withdrawal(wallet, intent_id, plan, txn).await
  }

  async fn transactions_for(
    &self,
    wallet: &str,
  ) -> Result<Vec<Transaction>, StoreError> {
    self.inner.transactions_for(wallet).await
  }
}

// ─── Placement ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn direct_slots_fill_in_position_order() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());

  let root = engine.register_root(&wallet(1)).await.unwrap();

  let (_, p2) = engine.place(&wallet(2), &wallet(1)).await.unwrap();
  let (_, p3) = engine.place(&wallet(3), &wallet(1)).await.unwrap();
  let (_, p4) = engine.place(&wallet(4), &wallet(1)).await.unwrap();

  assert_eq!(p2.parent_id, root.member_id);
  assert_eq!(p2.position, Position::First);
  assert_eq!(p3.position, Position::Second);
  assert_eq!(p4.position, Position::Third);

  // Fourth referral spills into the earliest-registered line.
  let (_, p5) = engine.place(&wallet(5), &wallet(1)).await.unwrap();
  let r2 = s.member_by_wallet(&wallet(2)).await.unwrap().unwrap();
  assert_eq!(p5.parent_id, r2.member_id);
  assert_eq!(p5.position, Position::First);
}

#[tokio::test]
async fn breadth_first_fill_never_skips_a_layer() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  let root = engine.register_root(&wallet(1)).await.unwrap();

  // 3 + 9 members fill layers 1 and 2 completely; the 13th opens layer 3.
  for n in 2..=14 {
    engine.place(&wallet(n), &wallet(1)).await.unwrap();
  }

  let descendants = s.descendants_of(root.member_id, None).await.unwrap();
  let count_at = |d: u32| descendants.iter().filter(|(depth, _)| *depth == d).count();
  assert_eq!(count_at(1), 3);
  assert_eq!(count_at(2), 9);
  assert_eq!(count_at(3), 1);
}

#[tokio::test]
async fn spillover_stays_inside_the_sponsor_subtree() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();

  // Two lines under the root.
  let (a, _) = engine.place(&wallet(2), &wallet(1)).await.unwrap();
  engine.place(&wallet(3), &wallet(1)).await.unwrap();

  // Fill a's own matrix, then one more referral of a.
  let (d, _) = engine.place(&wallet(4), &a.wallet).await.unwrap();
  engine.place(&wallet(5), &a.wallet).await.unwrap();
  engine.place(&wallet(6), &a.wallet).await.unwrap();
  let (g, placement) = engine.place(&wallet(7), &a.wallet).await.unwrap();

  // g landed under a's first child, not under some unrelated branch.
  assert_eq!(placement.parent_id, d.member_id);
  assert_eq!(g.sponsor_wallet.as_deref(), Some(a.wallet.as_str()));
}

#[tokio::test]
async fn placement_rejects_unknown_sponsor_and_duplicates() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();

  let err = engine.place(&wallet(2), &wallet(42)).await.unwrap_err();
  assert!(matches!(err, Error::SponsorNotFound(_)));

  engine.place(&wallet(2), &wallet(1)).await.unwrap();
  let err = engine.place(&wallet(2), &wallet(1)).await.unwrap_err();
  assert!(matches!(err, Error::AlreadyPlaced(_)));

  let err = engine.place("not-a-wallet", &wallet(1)).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn wallets_are_normalized_to_lowercase() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();

  let shouty = format!("  {}  ", wallet(2).to_ascii_uppercase());
  let (member, _) = engine.place(&shouty, &wallet(1)).await.unwrap();
  assert_eq!(member.wallet, wallet(2));
}

#[tokio::test]
async fn placement_retries_after_losing_a_slot_race() {
  let s = store().await;
  let racy = RacySlotStore::losing(s.clone(), 1);
  let engine = PlacementEngine::new(racy);
  let root = engine.register_root(&wallet(1)).await.unwrap();

  // The insert loses one race, the search re-runs, the retry lands.
  let (_, placement) = engine.place(&wallet(2), &wallet(1)).await.unwrap();
  assert_eq!(placement.parent_id, root.member_id);
  assert_eq!(placement.position, Position::First);

  let children = s.children_of(root.member_id).await.unwrap();
  assert_eq!(children.len(), 1);
  assert_eq!(children[0].1.wallet, wallet(2));
}

#[tokio::test]
async fn placement_contention_surfaces_after_bounded_retries() {
  let s = store().await;
  let racy = RacySlotStore::losing(s.clone(), u32::MAX);
  let engine = PlacementEngine::new(racy).with_max_attempts(3);
  engine.register_root(&wallet(1)).await.unwrap();

  let err = engine.place(&wallet(2), &wallet(1)).await.unwrap_err();
  assert!(matches!(err, Error::PlacementContention { attempts: 3 }));
  assert!(s.member_by_wallet(&wallet(2)).await.unwrap().is_none());
}

// ─── Distribution ────────────────────────────────────────────────────────────

#[tokio::test]
async fn level_one_distribution_pays_sponsor_layers_and_bcc() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();
  engine.place(&wallet(2), &wallet(1)).await.unwrap();
  engine.place(&wallet(3), &wallet(2)).await.unwrap();

  let rewards = ledger(&s).distribute(&wallet(3), 1).await.unwrap();

  let sponsor_bonus = rewards
    .iter()
    .find(|r| r.kind == RewardKind::DirectSponsor)
    .unwrap();
  assert_eq!(sponsor_bonus.recipient_wallet, wallet(2));
  assert_eq!(sponsor_bonus.amount, dec!(100));
  assert_eq!(sponsor_bonus.status, RewardStatus::Instant);

  // Level 1 reaches one layer: the placement parent only.
  let layers: Vec<_> = rewards
    .iter()
    .filter(|r| r.kind == RewardKind::LayerPayout)
    .collect();
  assert_eq!(layers.len(), 1);
  assert_eq!(layers[0].recipient_wallet, wallet(2));
  assert_eq!(layers[0].layer, Some(1));
  assert_eq!(layers[0].amount, dec!(5));
  assert_eq!(layers[0].status, RewardStatus::Pending);
  assert!(layers[0].expires_at.unwrap() > Utc::now());

  let member = s.member_by_wallet(&wallet(3)).await.unwrap().unwrap();
  assert_eq!(member.current_level, 1);
  assert_eq!(member.bcc_balance, dec!(100));
}

#[tokio::test]
async fn upgrade_reaches_deeper_layers() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();
  engine.place(&wallet(2), &wallet(1)).await.unwrap();
  engine.place(&wallet(3), &wallet(2)).await.unwrap();
  engine.place(&wallet(4), &wallet(3)).await.unwrap();

  let rewards = ledger(&s).distribute(&wallet(4), 2).await.unwrap();

  let layers: Vec<_> = rewards
    .iter()
    .filter(|r| r.kind == RewardKind::LayerPayout)
    .collect();
  assert_eq!(layers.len(), 2);
  assert_eq!(layers[0].recipient_wallet, wallet(3));
  assert_eq!(layers[0].layer, Some(1));
  assert_eq!(layers[1].recipient_wallet, wallet(2));
  assert_eq!(layers[1].layer, Some(2));
  // 5% of the level-2 price (200).
  assert!(layers.iter().all(|r| r.amount == dec!(10)));

  // No direct-sponsor bonus on upgrades.
  assert!(rewards.iter().all(|r| r.kind != RewardKind::DirectSponsor));
}

#[tokio::test]
async fn retried_distribution_does_not_double_the_bcc_credit() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();
  engine.place(&wallet(2), &wallet(1)).await.unwrap();

  ledger(&s).distribute(&wallet(2), 1).await.unwrap();
  let retried = ledger(&s).distribute(&wallet(2), 1).await.unwrap();

  assert!(retried.iter().all(|r| r.kind != RewardKind::BccToken));
  let member = s.member_by_wallet(&wallet(2)).await.unwrap().unwrap();
  assert_eq!(member.bcc_balance, dec!(100));
}

#[tokio::test]
async fn distribution_rejects_invalid_levels_and_unknown_members() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();

  let err = ledger(&s).distribute(&wallet(1), 0).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  let err = ledger(&s).distribute(&wallet(1), 20).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  let err = ledger(&s).distribute(&wallet(9), 1).await.unwrap_err();
  assert!(matches!(err, Error::MemberNotFound(_)));
}

// ─── Withdrawal ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn usdt_withdrawal_claims_fifo_and_splits() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  let root = engine.register_root(&wallet(1)).await.unwrap();

  for amount in [dec!(40), dec!(50), dec!(60)] {
    seed_pending(&s, &root, amount).await;
  }

  let p = processor(&s, MockTransfer::ok());
  let receipt = p.withdraw(&wallet(1), Currency::Usdt, dec!(70)).await.unwrap();
  assert!(receipt.tx_hash.starts_with("0xhash"));

  // $40 claimed whole; $50 split into instant 30 + pending 20; $60 untouched.
  let pending = s.pending_rewards(&wallet(1), Currency::Usdt).await.unwrap();
  let amounts: Vec<Decimal> = pending.iter().map(|r| r.amount).collect();
  assert_eq!(amounts, vec![dec!(60), dec!(20)]);
  assert_eq!(amounts.iter().copied().sum::<Decimal>(), dec!(80));

  let txns = s.transactions_for(&wallet(1)).await.unwrap();
  assert_eq!(txns.len(), 1);
  assert_eq!(txns[0].amount, dec!(70));

  // The outbox record was reconciled in the same transaction.
  assert!(s.open_intents().await.unwrap().is_empty());
}

#[tokio::test]
async fn bcc_withdrawal_drains_and_then_rejects() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();
  engine.place(&wallet(2), &wallet(1)).await.unwrap();
  ledger(&s).distribute(&wallet(2), 1).await.unwrap(); // 100 BCC

  let p = processor(&s, MockTransfer::ok());
  p.withdraw(&wallet(2), Currency::Bcc, dec!(100)).await.unwrap();

  let member = s.member_by_wallet(&wallet(2)).await.unwrap().unwrap();
  assert_eq!(member.bcc_balance, Decimal::ZERO);

  let err = p.withdraw(&wallet(2), Currency::Bcc, dec!(1)).await.unwrap_err();
  assert!(matches!(err, Error::InsufficientBalance { .. }));
  let member = s.member_by_wallet(&wallet(2)).await.unwrap().unwrap();
  assert_eq!(member.bcc_balance, Decimal::ZERO);
}

#[tokio::test]
async fn overdraw_leaves_every_ledger_row_untouched() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  let root = engine.register_root(&wallet(1)).await.unwrap();
  seed_pending(&s, &root, dec!(40)).await;

  let transfer = MockTransfer::ok();
  let p = processor(&s, transfer.clone());
  let err = p.withdraw(&wallet(1), Currency::Usdt, dec!(41)).await.unwrap_err();
  assert!(matches!(err, Error::InsufficientBalance { .. }));

  // The transfer collaborator was never even called.
  assert_eq!(transfer.calls.load(Ordering::SeqCst), 0);
  let pending = s.pending_rewards(&wallet(1), Currency::Usdt).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert!(s.transactions_for(&wallet(1)).await.unwrap().is_empty());
}

#[tokio::test]
async fn failed_transfer_mutates_nothing() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  let root = engine.register_root(&wallet(1)).await.unwrap();
  seed_pending(&s, &root, dec!(40)).await;

  let p = processor(&s, MockTransfer::failing());
  let err = p.withdraw(&wallet(1), Currency::Usdt, dec!(40)).await.unwrap_err();
  assert!(matches!(err, Error::TransferFailed(_)));

  let pending = s.pending_rewards(&wallet(1), Currency::Usdt).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].status, RewardStatus::Pending);
  assert!(s.transactions_for(&wallet(1)).await.unwrap().is_empty());

  // The intent was closed as failed, so nothing remains to recover.
  assert!(s.open_intents().await.unwrap().is_empty());
}

#[tokio::test]
async fn non_positive_amounts_are_rejected() {
  let s = store().await;
  let p = processor(&s, MockTransfer::ok());
  let err = p.withdraw(&wallet(1), Currency::Bcc, Decimal::ZERO).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
  let err = p.withdraw(&wallet(1), Currency::Bcc, dec!(-5)).await.unwrap_err();
  assert!(matches!(err, Error::Validation(_)));
}

#[tokio::test]
async fn concurrent_withdrawals_for_one_wallet_serialize() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();
  engine.place(&wallet(2), &wallet(1)).await.unwrap();
  ledger(&s).distribute(&wallet(2), 1).await.unwrap(); // 100 BCC

  let p = Arc::new(processor(&s, MockTransfer::ok()));
  let w = wallet(2);
  let (a, b) = tokio::join!(
    p.withdraw(&w, Currency::Bcc, dec!(70)),
    p.withdraw(&w, Currency::Bcc, dec!(70)),
  );

  // Exactly one wins; the loser sees the post-withdrawal balance.
  assert!(a.is_ok() != b.is_ok());
  let loser = if a.is_ok() { b } else { a };
  assert!(matches!(loser.unwrap_err(), Error::InsufficientBalance { .. }));

  let member = s.member_by_wallet(&wallet(2)).await.unwrap().unwrap();
  assert_eq!(member.bcc_balance, dec!(30));
}

#[tokio::test]
async fn withdrawal_emits_an_activity_event() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  engine.register_root(&wallet(1)).await.unwrap();
  engine.place(&wallet(2), &wallet(1)).await.unwrap();
  ledger(&s).distribute(&wallet(2), 1).await.unwrap();

  let (activity, mut rx) = ChannelActivityLog::new(8);
  let p = WithdrawalProcessor::new(
    s.clone(),
    MockTransfer::ok(),
    Arc::new(activity),
  );
  p.withdraw(&wallet(2), Currency::Bcc, dec!(50)).await.unwrap();

  let event = rx.recv().await.unwrap();
  assert_eq!(event.actor, wallet(2));
  assert_eq!(event.action, "withdrawal");
  assert_eq!(event.metadata["currency"], "BCC");
}

// ─── Recovery ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn recovery_completes_a_settled_but_unreconciled_intent() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  let root = engine.register_root(&wallet(1)).await.unwrap();
  seed_pending(&s, &root, dec!(40)).await;
  seed_pending(&s, &root, dec!(50)).await;

  // A crash between settlement and reconciliation leaves an intent carrying
  // a hash with no matching ledger mutation.
  let intent = s
    .create_transfer_intent(&wallet(1), Currency::Usdt, dec!(60))
    .await
    .unwrap();
  s.mark_intent_settled(intent.intent_id, "0xlost").await.unwrap();

  let p = processor(&s, MockTransfer::ok());
  assert_eq!(p.recover().await.unwrap(), 1);

  // $40 claimed whole, $50 split into instant 20 + pending 30.
  let pending = s.pending_rewards(&wallet(1), Currency::Usdt).await.unwrap();
  let amounts: Vec<Decimal> = pending.iter().map(|r| r.amount).collect();
  assert_eq!(amounts, vec![dec!(30)]);

  let txns = s.transactions_for(&wallet(1)).await.unwrap();
  assert_eq!(txns.len(), 1);
  assert_eq!(txns[0].amount, dec!(60));
  assert_eq!(txns[0].tx_hash.as_deref(), Some("0xlost"));

  assert!(s.open_intents().await.unwrap().is_empty());
}

#[tokio::test]
async fn recovery_refuses_an_intent_the_ledger_cannot_cover() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  let root = engine.register_root(&wallet(1)).await.unwrap();
  seed_pending(&s, &root, dec!(40)).await;

  // A settled intent for more than the wallet's pending total: the claim
  // walk alone would consume the 40 and drop the other 20 on the floor.
  let intent = s
    .create_transfer_intent(&wallet(1), Currency::Usdt, dec!(60))
    .await
    .unwrap();
  s.mark_intent_settled(intent.intent_id, "0xgap").await.unwrap();

  let p = processor(&s, MockTransfer::ok());
  assert_eq!(p.recover().await.unwrap(), 0);

  // Nothing claimed, no transaction, and the intent stays open for the
  // operator.
  let pending = s.pending_rewards(&wallet(1), Currency::Usdt).await.unwrap();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].amount, dec!(40));
  assert!(s.transactions_for(&wallet(1)).await.unwrap().is_empty());

  let open = s.open_intents().await.unwrap();
  assert_eq!(open.len(), 1);
  assert_eq!(open[0].intent_id, intent.intent_id);
  assert_eq!(open[0].state, IntentState::Settled);
}

#[tokio::test]
async fn recovery_never_retries_an_unsettled_intent() {
  let s = store().await;
  let engine = PlacementEngine::new(s.clone());
  let root = engine.register_root(&wallet(1)).await.unwrap();
  seed_pending(&s, &root, dec!(40)).await;

  // No hash: whether the transfer ever fired is unknowable.
  s.create_transfer_intent(&wallet(1), Currency::Usdt, dec!(40))
    .await
    .unwrap();

  let transfer = MockTransfer::ok();
  let p = processor(&s, transfer.clone());
  assert_eq!(p.recover().await.unwrap(), 0);

  // Nothing moved and the intent is left for the operator.
  assert_eq!(transfer.calls.load(Ordering::SeqCst), 0);
  assert_eq!(s.pending_rewards(&wallet(1), Currency::Usdt).await.unwrap().len(), 1);
  assert!(s.transactions_for(&wallet(1)).await.unwrap().is_empty());

  let open = s.open_intents().await.unwrap();
  assert_eq!(open.len(), 1);
  assert_eq!(open[0].state, IntentState::Created);
}
