//! [`WithdrawalProcessor`] — balance check, external transfer, ledger
//! reconciliation.
//!
//! The single most important concurrency contract in the core: no two
//! withdrawal reconciliations for the same wallet may interleave. A
//! per-wallet async mutex is held from the balance read through the
//! external transfer to the ledger mutation.
//!
//! No ledger state is touched until the transfer collaborator has returned
//! a definitive success with a hash. A store failure *after* that point is
//! the one genuine reconciliation risk: it is logged as a
//! reconciliation-required event (never silently dropped) and surfaced as
//! an internal error.

use std::{
  collections::HashMap,
  sync::{Arc, Mutex as StdMutex, Weak},
};

use rust_decimal::Decimal;
use serde_json::json;
use tokio::sync::Mutex;

use trellis_core::{
  Error, Result,
  activity::{ActivityEvent, ActivityLog},
  member::normalize_wallet,
  reward::{
    ClaimPlan, Currency, IntentState, NewTransaction, PartialClaim, Reward,
    TransactionKind, TransferIntent, WithdrawalReceipt,
  },
  store::MatrixStore,
  transfer::ChainTransfer,
};

// ─── Claim planning ──────────────────────────────────────────────────────────

/// Walk `pending` (already oldest-first) consuming `amount`: rewards whose
/// amount fits are claimed whole; the first that does not fit is split, and
/// the walk stops. Callers must have verified that the pending total covers
/// `amount`.
pub fn plan_claims(pending: &[Reward], amount: Decimal) -> ClaimPlan {
  let mut plan = ClaimPlan::default();
  let mut remaining = amount;

  for reward in pending {
    if remaining <= Decimal::ZERO {
      break;
    }
    if reward.amount <= remaining {
      plan.full.push(reward.reward_id);
      remaining -= reward.amount;
    } else {
      plan.partial = Some(PartialClaim {
        reward_id: reward.reward_id,
        claimed:   remaining,
        remainder: reward.amount - remaining,
      });
      break;
    }
  }

  plan
}

// ─── Per-wallet serialisation ────────────────────────────────────────────────

/// Registry of per-wallet async mutexes. Entries are held weakly: a wallet
/// with no withdrawal in flight keeps no live lock, and released slots are
/// pruned on the next miss, so the map tracks in-flight wallets rather
/// than every wallet ever seen.
#[derive(Default)]
struct WalletLocks {
  inner: StdMutex<HashMap<String, Weak<Mutex<()>>>>,
}

impl WalletLocks {
  fn for_wallet(&self, wallet: &str) -> Arc<Mutex<()>> {
    let mut map = self.inner.lock().expect("wallet lock registry poisoned");
    if let Some(lock) = map.get(wallet).and_then(Weak::upgrade) {
      return lock;
    }
    map.retain(|_, slot| slot.strong_count() > 0);
    let lock = Arc::new(Mutex::new(()));
    map.insert(wallet.to_string(), Arc::downgrade(&lock));
    lock
  }
}

// ─── Processor ───────────────────────────────────────────────────────────────

pub struct WithdrawalProcessor<S, T> {
  store:    Arc<S>,
  transfer: Arc<T>,
  activity: Arc<dyn ActivityLog>,
  locks:    WalletLocks,
}

impl<S, T> WithdrawalProcessor<S, T>
where
  S: MatrixStore,
  T: ChainTransfer,
{
  pub fn new(store: Arc<S>, transfer: Arc<T>, activity: Arc<dyn ActivityLog>) -> Self {
    Self { store, transfer, activity, locks: WalletLocks::default() }
  }

  /// Withdraw `amount` of `currency` to the member's own wallet.
  ///
  /// Strict order: balance check under the wallet lock, external transfer,
  /// then — only on a settled transfer — one reconciliation transaction,
  /// then a best-effort activity event.
  pub async fn withdraw(
    &self,
    wallet: &str,
    currency: Currency,
    amount: Decimal,
  ) -> Result<WithdrawalReceipt> {
    if amount <= Decimal::ZERO {
      return Err(Error::Validation(format!(
        "withdrawal amount must be positive, got {amount}"
      )));
    }
    let wallet = normalize_wallet(wallet)?;

    let lock = self.locks.for_wallet(&wallet);
    let _guard = lock.lock().await;

    let member = self
      .store
      .member_by_wallet(&wallet)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::MemberNotFound(wallet.clone()))?;

    // Read the claimable state under the lock; it cannot move until the
    // reconciliation below has committed.
    let (available, pending) = match currency {
      Currency::Bcc => (member.bcc_balance, Vec::new()),
      Currency::Usdt => {
        let pending = self
          .store
          .pending_rewards(&wallet, Currency::Usdt)
          .await
          .map_err(Into::into)?;
        (pending.iter().map(|r| r.amount).sum(), pending)
      }
    };

    if amount > available {
      return Err(Error::InsufficientBalance { currency, requested: amount, available });
    }

    // Outbox record first: a crash after the transfer settles must leave a
    // detectable trail.
    let intent = self
      .store
      .create_transfer_intent(&wallet, currency, amount)
      .await
      .map_err(Into::into)?;

    let receipt = match self.transfer.transfer(currency, &wallet, amount).await {
      Ok(receipt) => receipt,
      Err(e) => {
        if let Err(mark) = self.store.mark_intent_failed(intent.intent_id).await {
          let mark: Error = mark.into();
          tracing::warn!(
            intent = %intent.intent_id,
            error = %mark,
            "could not mark transfer intent failed"
          );
        }
        return Err(Error::TransferFailed(e.to_string()));
      }
    };

    if let Err(mark) = self
      .store
      .mark_intent_settled(intent.intent_id, &receipt.tx_hash)
      .await
    {
      // The reconciliation below retires the intent either way; losing the
      // settled marker only matters if that also fails.
      let mark: Error = mark.into();
      tracing::warn!(
        intent = %intent.intent_id,
        tx_hash = %receipt.tx_hash,
        error = %mark,
        "could not mark transfer intent settled"
      );
    }

    let txn = NewTransaction {
      wallet:       wallet.clone(),
      kind:         TransactionKind::Withdrawal,
      currency,
      amount,
      tx_hash:      Some(receipt.tx_hash.clone()),
      block_number: receipt.block_number,
    };

    let result = match currency {
      Currency::Bcc => {
        self
          .store
          .apply_bcc_withdrawal(&wallet, intent.intent_id, txn)
          .await
      }
      Currency::Usdt => {
        let plan = plan_claims(&pending, amount);
        self
          .store
          .apply_usdt_withdrawal(&wallet, intent.intent_id, plan, txn)
          .await
      }
    };

    let transaction = match result {
      Ok(t) => t,
      Err(e) => {
        // Funds have moved but the ledger did not: never drop this
        // silently. The intent row carries the hash for the recovery
        // pass.
        let err: Error = e.into();
        tracing::error!(
          %wallet,
          %currency,
          %amount,
          intent = %intent.intent_id,
          tx_hash = %receipt.tx_hash,
          error = %err,
          reconciliation_required = true,
          "ledger reconciliation failed after settled transfer"
        );
        return Err(Error::Internal(format!(
          "reconciliation required for transfer {}: {err}",
          receipt.tx_hash
        )));
      }
    };

    self.activity.record(ActivityEvent::member(
      wallet.clone(),
      "withdrawal",
      json!({
        "currency": currency.to_string(),
        "amount": amount,
        "tx_hash": receipt.tx_hash,
        "transaction_id": transaction.transaction_id,
      }),
    ));

    tracing::info!(
      %wallet,
      %currency,
      %amount,
      tx_hash = %receipt.tx_hash,
      "withdrawal settled"
    );

    Ok(WithdrawalReceipt {
      transaction_id: transaction.transaction_id,
      tx_hash:        receipt.tx_hash,
    })
  }

  /// Finish withdrawals whose transfer settled but whose ledger mutation
  /// never committed (a crash between the two). Intended to run at startup,
  /// before traffic is accepted. Returns how many intents were completed.
  ///
  /// Intents still in `created` state carry no hash, so whether the
  /// transfer fired is unknowable from here; they are logged for the
  /// operator, never retried automatically.
  pub async fn recover(&self) -> Result<u32> {
    let intents = self.store.open_intents().await.map_err(Into::into)?;
    let mut completed = 0;

    for intent in intents {
      match (intent.state, intent.tx_hash.clone()) {
        (IntentState::Settled, Some(hash)) => {
          match self.complete_intent(&intent, &hash).await {
            Ok(()) => completed += 1,
            Err(e) => {
              tracing::error!(
                intent = %intent.intent_id,
                wallet = %intent.wallet,
                tx_hash = %hash,
                error = %e,
                reconciliation_required = true,
                "could not recover settled transfer intent"
              );
            }
          }
        }
        _ => {
          tracing::warn!(
            intent = %intent.intent_id,
            wallet = %intent.wallet,
            "stale transfer intent with no settled hash"
          );
        }
      }
    }

    Ok(completed)
  }

  async fn complete_intent(
    &self,
    intent: &TransferIntent,
    tx_hash: &str,
  ) -> Result<()> {
    let lock = self.locks.for_wallet(&intent.wallet);
    let _guard = lock.lock().await;

    let txn = NewTransaction {
      wallet:       intent.wallet.clone(),
      kind:         TransactionKind::Withdrawal,
      currency:     intent.currency,
      amount:       intent.amount,
      tx_hash:      Some(tx_hash.to_string()),
      block_number: None,
    };

    match intent.currency {
      Currency::Bcc => {
        self
          .store
          .apply_bcc_withdrawal(&intent.wallet, intent.intent_id, txn)
          .await
          .map_err(Into::into)?;
      }
      Currency::Usdt => {
        let pending = self
          .store
          .pending_rewards(&intent.wallet, Currency::Usdt)
          .await
          .map_err(Into::into)?;
        // The plan walk stops at the intent amount, so an uncovered
        // shortfall would silently vanish. Leave the intent open instead.
        let available: Decimal = pending.iter().map(|r| r.amount).sum();
        if intent.amount > available {
          return Err(Error::Internal(format!(
            "reconciliation required for transfer {tx_hash}: pending \
             rewards cover {available} of {}",
            intent.amount
          )));
        }
        let plan = plan_claims(&pending, intent.amount);
        self
          .store
          .apply_usdt_withdrawal(&intent.wallet, intent.intent_id, plan, txn)
          .await
          .map_err(Into::into)?;
      }
    }

    tracing::info!(
      intent = %intent.intent_id,
      wallet = %intent.wallet,
      %tx_hash,
      "recovered unreconciled withdrawal"
    );
    Ok(())
  }
}

// ─── Unit tests ──────────────────────────────────────────────────────────────
