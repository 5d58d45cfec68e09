//! [`SqliteStore`] — the SQLite implementation of [`MatrixStore`].
//!
//! Every multi-row write that must be atomic (member + edge + closure rows,
//! one distribution event, one withdrawal reconciliation) runs inside a
//! single SQLite transaction in one `conn.call` closure.

use std::path::Path;

use chrono::Utc;
use rusqlite::OptionalExtension as _;
use rust_decimal::Decimal;
use uuid::Uuid;

use trellis_core::{
  member::{Member, MemberStatus, Placement, Position},
  reward::{
    ClaimPlan, Currency, IntentState, NewReward, NewTransaction, Reward,
    RewardKind, RewardStatus, Transaction, TransactionStatus, TransferIntent,
  },
  store::MatrixStore,
};

use crate::{
  encode::{
    RawIntent, RawMember, RawReward, RawTransaction, decode_decimal_in_tx,
    encode_currency, encode_decimal, encode_dt, encode_intent_state,
    encode_member_status, encode_reward_kind, encode_reward_status,
    encode_txn_kind, encode_txn_status, encode_uuid,
  },
  schema::SCHEMA,
  Error, Result,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A Trellis matrix store backed by a single SQLite file.
///
/// Cloning is cheap — the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store — useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Translate a UNIQUE-constraint failure from the placement insert into
  /// the domain conflict it represents.
  fn map_placement_conflict(
    err: Error,
    wallet: &str,
    placement: Placement,
  ) -> Error {
    if let Error::Database(tokio_rusqlite::Error::Rusqlite(
      rusqlite::Error::SqliteFailure(f, Some(msg)),
    )) = &err
      && f.code == rusqlite::ErrorCode::ConstraintViolation
    {
      if msg.contains("placements.parent_id") {
        return Error::SlotTaken {
          parent:   placement.parent_id,
          position: placement.position,
        };
      }
      if msg.contains("members.wallet") || msg.contains("placements.child_id") {
        return Error::AlreadyPlaced(wallet.to_string());
      }
    }
    err
  }

  /// Recover a domain error smuggled out of a `conn.call` closure as
  /// [`tokio_rusqlite::Error::Other`].
  fn unwrap_domain(err: tokio_rusqlite::Error) -> Error {
    match err {
      tokio_rusqlite::Error::Other(boxed) => match boxed.downcast::<Error>() {
        Ok(domain) => *domain,
        Err(boxed) => Error::Database(tokio_rusqlite::Error::Other(boxed)),
      },
      other => Error::Database(other),
    }
  }
}

/// Wrap a domain error for transport out of a `conn.call` closure. The open
/// transaction rolls back on drop.
fn abort(err: Error) -> tokio_rusqlite::Error {
  tokio_rusqlite::Error::Other(Box::new(err))
}

// ─── Query fragments ─────────────────────────────────────────────────────────

fn member_select(where_clause: &str) -> String {
  format!("SELECT {} FROM members WHERE {where_clause}", RawMember::COLUMNS)
}

/// Shared shape of the ancestor/descendant closure queries. `side` is the
/// column matched against the probe id, `join_on` the column joined to
/// members.
fn closure_select(side: &str, join_on: &str) -> String {
  format!(
    "SELECT c.depth, {cols}
     FROM closure c
     JOIN members m ON m.member_id = c.{join_on}
     WHERE c.{side} = ?1 AND c.depth > 0 AND c.depth <= ?2
     ORDER BY c.depth ASC, m.joined_at ASC",
    cols = RawMember::COLUMNS
      .split(", ")
      .map(|c| format!("m.{c}"))
      .collect::<Vec<_>>()
      .join(", "),
  )
}

// ─── MatrixStore impl ────────────────────────────────────────────────────────

impl MatrixStore for SqliteStore {
  type Error = Error;

  // ── Members ───────────────────────────────────────────────────────────────

  async fn add_root(&self, wallet: &str) -> Result<Member> {
    let member = Member {
      member_id:      Uuid::new_v4(),
      wallet:         wallet.to_string(),
      sponsor_wallet: None,
      current_level:  0,
      bcc_balance:    Decimal::ZERO,
      status:         MemberStatus::Active,
      joined_at:      Utc::now(),
    };

    let id_str     = encode_uuid(member.member_id);
    let wallet_str = member.wallet.clone();
    let status_str = encode_member_status(member.status);
    let at_str     = encode_dt(member.joined_at);

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO members
             (member_id, wallet, sponsor_wallet, current_level, bcc_balance, status, joined_at)
           VALUES (?1, ?2, NULL, 0, '0', ?3, ?4)",
          rusqlite::params![id_str, wallet_str, status_str, at_str],
        )?;
        tx.execute(
          "INSERT INTO closure (ancestor_id, descendant_id, depth) VALUES (?1, ?1, 0)",
          rusqlite::params![id_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await;

    match result {
      Ok(()) => Ok(member),
      Err(e) => {
        let placement = Placement {
          parent_id: member.member_id,
          position:  Position::First,
        };
        Err(Self::map_placement_conflict(e.into(), wallet, placement))
      }
    }
  }

  async fn member_by_wallet(&self, wallet: &str) -> Result<Option<Member>> {
    let wallet = wallet.to_string();
    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &member_select("wallet = ?1"),
              rusqlite::params![wallet],
              |row| RawMember::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn member_by_id(&self, id: Uuid) -> Result<Option<Member>> {
    let id_str = encode_uuid(id);
    let raw: Option<RawMember> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &member_select("member_id = ?1"),
              rusqlite::params![id_str],
              |row| RawMember::from_row(row, 0),
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawMember::into_member).transpose()
  }

  async fn children_of(&self, parent_id: Uuid) -> Result<Vec<(Position, Member)>> {
    let parent_str = encode_uuid(parent_id);

    let raws: Vec<(i64, RawMember)> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT p.position, {cols}
           FROM placements p
           JOIN members m ON m.member_id = p.child_id
           WHERE p.parent_id = ?1
           ORDER BY p.position ASC",
          cols = RawMember::COLUMNS
            .split(", ")
            .map(|c| format!("m.{c}"))
            .collect::<Vec<_>>()
            .join(", "),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![parent_str], |row| {
            Ok((row.get::<_, i64>(0)?, RawMember::from_row(row, 1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(pos, raw)| {
        let position = Position::try_from(pos as u8)
          .map_err(|e| Error::Corrupt(e.to_string()))?;
        Ok((position, raw.into_member()?))
      })
      .collect()
  }

  // ── Placement ─────────────────────────────────────────────────────────────

  async fn place_member(
    &self,
    wallet: &str,
    sponsor_wallet: &str,
    placement: Placement,
  ) -> Result<Member> {
    let member = Member {
      member_id:      Uuid::new_v4(),
      wallet:         wallet.to_string(),
      sponsor_wallet: Some(sponsor_wallet.to_string()),
      current_level:  0,
      bcc_balance:    Decimal::ZERO,
      status:         MemberStatus::Active,
      joined_at:      Utc::now(),
    };

    let child_str   = encode_uuid(member.member_id);
    let wallet_str  = member.wallet.clone();
    let sponsor_str = sponsor_wallet.to_string();
    let parent_str  = encode_uuid(placement.parent_id);
    let pos         = placement.position.as_u8() as i64;
    let status_str  = encode_member_status(member.status);
    let at_str      = encode_dt(member.joined_at);

    let result = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO members
             (member_id, wallet, sponsor_wallet, current_level, bcc_balance, status, joined_at)
           VALUES (?1, ?2, ?3, 0, '0', ?4, ?5)",
          rusqlite::params![child_str, wallet_str, sponsor_str, status_str, at_str],
        )?;
        tx.execute(
          "INSERT INTO placements (parent_id, child_id, position, created_at)
           VALUES (?1, ?2, ?3, ?4)",
          rusqlite::params![parent_str, child_str, pos, at_str],
        )?;
        // One closure row per ancestor of the parent (the parent's own
        // depth-0 self row becomes the depth-1 parent row), plus the new
        // member's self row.
        tx.execute(
          "INSERT INTO closure (ancestor_id, descendant_id, depth)
           SELECT ancestor_id, ?2, depth + 1 FROM closure WHERE descendant_id = ?1
           UNION ALL
           SELECT ?2, ?2, 0",
          rusqlite::params![parent_str, child_str],
        )?;
        tx.commit()?;
        Ok(())
      })
      .await;

    match result {
      Ok(()) => Ok(member),
      Err(e) => Err(Self::map_placement_conflict(e.into(), wallet, placement)),
    }
  }

  // ── Closure queries ───────────────────────────────────────────────────────

  async fn ancestors_of(
    &self,
    member_id: Uuid,
    max_depth: Option<u32>,
  ) -> Result<Vec<(u32, Member)>> {
    let id_str = encode_uuid(member_id);
    let cap    = max_depth.map(i64::from).unwrap_or(i64::MAX);

    let raws: Vec<(i64, RawMember)> = self
      .conn
      .call(move |conn| {
        let sql = closure_select("descendant_id", "ancestor_id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, cap], |row| {
            Ok((row.get::<_, i64>(0)?, RawMember::from_row(row, 1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(depth, raw)| Ok((depth as u32, raw.into_member()?)))
      .collect()
  }

  async fn descendants_of(
    &self,
    member_id: Uuid,
    max_depth: Option<u32>,
  ) -> Result<Vec<(u32, Member)>> {
    let id_str = encode_uuid(member_id);
    let cap    = max_depth.map(i64::from).unwrap_or(i64::MAX);

    let raws: Vec<(i64, RawMember)> = self
      .conn
      .call(move |conn| {
        let sql = closure_select("ancestor_id", "descendant_id");
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str, cap], |row| {
            Ok((row.get::<_, i64>(0)?, RawMember::from_row(row, 1)?))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(|(depth, raw)| Ok((depth as u32, raw.into_member()?)))
      .collect()
  }

  // ── Rewards ───────────────────────────────────────────────────────────────

  async fn record_distribution(
    &self,
    wallet: &str,
    level: u8,
    rewards: Vec<NewReward>,
  ) -> Result<Vec<Reward>> {
    let now = Utc::now();

    // Assign ids and timestamps up front: the store owns `reward_id` and
    // `created_at`, callers never supply them.
    let built: Vec<Reward> = rewards
      .into_iter()
      .map(|input| Reward {
        reward_id:        Uuid::new_v4(),
        recipient_wallet: input.recipient_wallet,
        source_wallet:    input.source_wallet,
        kind:             input.kind,
        currency:         input.currency,
        amount:           input.amount,
        status:           input.status,
        layer:            input.layer,
        level:            input.level,
        created_at:       now,
        expires_at:       input.expires_at,
        notes:            input.notes,
      })
      .collect();

    struct RewardRow {
      reward_id:        String,
      recipient_wallet: String,
      source_wallet:    String,
      kind:             &'static str,
      currency:         &'static str,
      amount:           String,
      status:           &'static str,
      layer:            Option<i64>,
      level:            Option<i64>,
      created_at:       String,
      expires_at:       Option<String>,
      notes:            Option<String>,
      is_bcc:           bool,
    }

    let rows: Vec<RewardRow> = built
      .iter()
      .map(|r| RewardRow {
        reward_id:        encode_uuid(r.reward_id),
        recipient_wallet: r.recipient_wallet.clone(),
        source_wallet:    r.source_wallet.clone(),
        kind:             encode_reward_kind(r.kind),
        currency:         encode_currency(r.currency),
        amount:           encode_decimal(r.amount),
        status:           encode_reward_status(r.status),
        layer:            r.layer.map(i64::from),
        level:            r.level.map(i64::from),
        created_at:       encode_dt(r.created_at),
        expires_at:       r.expires_at.map(encode_dt),
        notes:            r.notes.clone(),
        is_bcc:           r.kind == RewardKind::BccToken,
      })
      .collect();

    let wallet_str = wallet.to_string();
    let level_i64  = level as i64;

    let inserted: Vec<usize> = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut kept = Vec::with_capacity(rows.len());

        for (i, row) in rows.iter().enumerate() {
          let sql = if row.is_bcc {
            // The partial unique index makes a retried BCC credit a no-op.
            "INSERT INTO rewards
               (reward_id, recipient_wallet, source_wallet, kind, currency,
                amount, status, layer, level, created_at, expires_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
             ON CONFLICT (source_wallet, level) WHERE kind = 'bcc_token'
             DO NOTHING"
          } else {
            "INSERT INTO rewards
               (reward_id, recipient_wallet, source_wallet, kind, currency,
                amount, status, layer, level, created_at, expires_at, notes)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
          };

          let changed = tx.execute(
            sql,
            rusqlite::params![
              row.reward_id,
              row.recipient_wallet,
              row.source_wallet,
              row.kind,
              row.currency,
              row.amount,
              row.status,
              row.layer,
              row.level,
              row.created_at,
              row.expires_at,
              row.notes,
            ],
          )?;

          if changed == 0 {
            continue;
          }
          kept.push(i);

          if row.is_bcc {
            let balance_str: String = tx.query_row(
              "SELECT bcc_balance FROM members WHERE wallet = ?1",
              rusqlite::params![row.recipient_wallet],
              |r| r.get(0),
            )?;
            let balance = decode_decimal_in_tx(&balance_str)?;
            let amount  = decode_decimal_in_tx(&row.amount)?;
            tx.execute(
              "UPDATE members SET bcc_balance = ?1 WHERE wallet = ?2",
              rusqlite::params![
                encode_decimal(balance + amount),
                row.recipient_wallet
              ],
            )?;
          }
        }

        tx.execute(
          "UPDATE members SET current_level = ?1
           WHERE wallet = ?2 AND current_level < ?1",
          rusqlite::params![level_i64, wallet_str],
        )?;

        tx.commit()?;
        Ok(kept)
      })
      .await?;

    Ok(
      built
        .into_iter()
        .enumerate()
        .filter(|(i, _)| inserted.contains(i))
        .map(|(_, r)| r)
        .collect(),
    )
  }

  async fn pending_rewards(
    &self,
    wallet: &str,
    currency: Currency,
  ) -> Result<Vec<Reward>> {
    let wallet       = wallet.to_string();
    let currency_str = encode_currency(currency).to_owned();

    let raws: Vec<RawReward> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM rewards
           WHERE recipient_wallet = ?1 AND currency = ?2 AND status = 'pending'
           ORDER BY created_at ASC, reward_id ASC",
          RawReward::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![wallet, currency_str], |row| {
            RawReward::from_row(row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReward::into_reward).collect()
  }

  async fn rewards_for(
    &self,
    wallet: &str,
    status: Option<RewardStatus>,
  ) -> Result<Vec<Reward>> {
    let wallet     = wallet.to_string();
    let status_str = status.map(encode_reward_status).map(str::to_owned);

    let raws: Vec<RawReward> = self
      .conn
      .call(move |conn| {
        let rows = if let Some(s) = status_str {
          let sql = format!(
            "SELECT {} FROM rewards
             WHERE recipient_wallet = ?1 AND status = ?2
             ORDER BY created_at ASC, reward_id ASC",
            RawReward::COLUMNS,
          );
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![wallet, s], |row| RawReward::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        } else {
          let sql = format!(
            "SELECT {} FROM rewards
             WHERE recipient_wallet = ?1
             ORDER BY created_at ASC, reward_id ASC",
            RawReward::COLUMNS,
          );
          let mut stmt = conn.prepare(&sql)?;
          stmt
            .query_map(rusqlite::params![wallet], |row| RawReward::from_row(row))?
            .collect::<rusqlite::Result<Vec<_>>>()?
        };
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReward::into_reward).collect()
  }

  // ── Transfer intents ──────────────────────────────────────────────────────

  async fn create_transfer_intent(
    &self,
    wallet: &str,
    currency: Currency,
    amount: Decimal,
  ) -> Result<TransferIntent> {
    let now = Utc::now();
    let intent = TransferIntent {
      intent_id:  Uuid::new_v4(),
      wallet:     wallet.to_string(),
      currency,
      amount,
      tx_hash:    None,
      state:      IntentState::Created,
      created_at: now,
      updated_at: now,
    };

    let id_str       = encode_uuid(intent.intent_id);
    let wallet_str   = intent.wallet.clone();
    let currency_str = encode_currency(currency);
    let amount_str   = encode_decimal(amount);
    let state_str    = encode_intent_state(intent.state);
    let at_str       = encode_dt(now);

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO transfer_intents
             (intent_id, wallet, currency, amount, tx_hash, state, created_at, updated_at)
           VALUES (?1, ?2, ?3, ?4, NULL, ?5, ?6, ?6)",
          rusqlite::params![
            id_str, wallet_str, currency_str, amount_str, state_str, at_str
          ],
        )?;
        Ok(())
      })
      .await?;

    Ok(intent)
  }

  async fn mark_intent_settled(&self, intent_id: Uuid, tx_hash: &str) -> Result<()> {
    let id_str   = encode_uuid(intent_id);
    let hash_str = tx_hash.to_string();
    let at_str   = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE transfer_intents
           SET state = ?4, tx_hash = ?2, updated_at = ?3
           WHERE intent_id = ?1",
          rusqlite::params![
            id_str,
            hash_str,
            at_str,
            encode_intent_state(IntentState::Settled)
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn mark_intent_failed(&self, intent_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(intent_id);
    let at_str = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE transfer_intents
           SET state = ?3, updated_at = ?2
           WHERE intent_id = ?1",
          rusqlite::params![
            id_str,
            at_str,
            encode_intent_state(IntentState::Failed)
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn open_intents(&self) -> Result<Vec<TransferIntent>> {
    let raws: Vec<RawIntent> = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM transfer_intents
           WHERE state IN ('created', 'settled')
           ORDER BY created_at ASC",
          RawIntent::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |row| RawIntent::from_row(row))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawIntent::into_intent).collect()
  }

  // ── Withdrawal reconciliation ─────────────────────────────────────────────

  async fn apply_bcc_withdrawal(
    &self,
    wallet: &str,
    intent_id: Uuid,
    txn: NewTransaction,
  ) -> Result<Transaction> {
    let transaction = build_transaction(txn);
    let row         = encode_transaction(&transaction);

    let wallet_str = wallet.to_string();
    let amount_str = row.amount.clone();
    let intent_str = encode_uuid(intent_id);
    let now_str    = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let balance_str: String = tx.query_row(
          "SELECT bcc_balance FROM members WHERE wallet = ?1",
          rusqlite::params![wallet_str],
          |r| r.get(0),
        )?;
        let balance = decode_decimal_in_tx(&balance_str)?;
        let amount  = decode_decimal_in_tx(&amount_str)?;
        if amount > balance {
          // Rolls back via drop; the processor's wallet lock should make
          // this unreachable.
          return Err(abort(Error::BalanceOverdraw {
            wallet: wallet_str.clone(),
            amount: amount_str.clone(),
          }));
        }

        tx.execute(
          "UPDATE members SET bcc_balance = ?1 WHERE wallet = ?2",
          rusqlite::params![encode_decimal(balance - amount), wallet_str],
        )?;
        insert_transaction_row(&tx, &row)?;
        reconcile_intent(&tx, &intent_str, &now_str)?;

        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Self::unwrap_domain)?;

    Ok(transaction)
  }

  async fn apply_usdt_withdrawal(
    &self,
    wallet: &str,
    intent_id: Uuid,
    plan: ClaimPlan,
    txn: NewTransaction,
  ) -> Result<Transaction> {
    let transaction = build_transaction(txn);
    let row         = encode_transaction(&transaction);

    let full       = plan.full;
    let partial    = plan.partial;
    let wallet_str = wallet.to_string();
    let sibling_id = encode_uuid(Uuid::new_v4());
    let intent_str = encode_uuid(intent_id);
    let now_str    = encode_dt(Utc::now());

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        for reward_id in &full {
          let changed = tx.execute(
            "UPDATE rewards SET status = 'instant'
             WHERE reward_id = ?1 AND recipient_wallet = ?2
               AND status = 'pending'",
            rusqlite::params![encode_uuid(*reward_id), wallet_str],
          )?;
          if changed != 1 {
            return Err(abort(Error::RewardNotPending(*reward_id)));
          }
        }

        if let Some(p) = &partial {
          // Shrink the claimed slice in place, then carry the leftover in a
          // fresh pending sibling: conservation of the original amount.
          let id_str = encode_uuid(p.reward_id);
          let changed = tx.execute(
            "UPDATE rewards SET amount = ?2, status = 'instant'
             WHERE reward_id = ?1 AND recipient_wallet = ?3
               AND status = 'pending'",
            rusqlite::params![id_str, encode_decimal(p.claimed), wallet_str],
          )?;
          if changed != 1 {
            return Err(abort(Error::RewardNotPending(p.reward_id)));
          }
          tx.execute(
            "INSERT INTO rewards
               (reward_id, recipient_wallet, source_wallet, kind, currency,
                amount, status, layer, level, created_at, expires_at, notes)
             SELECT ?2, recipient_wallet, source_wallet, kind, currency,
                    ?3, 'pending', layer, level, ?4, expires_at, notes
             FROM rewards WHERE reward_id = ?1",
            rusqlite::params![
              id_str,
              sibling_id,
              encode_decimal(p.remainder),
              now_str
            ],
          )?;
        }

        insert_transaction_row(&tx, &row)?;
        reconcile_intent(&tx, &intent_str, &now_str)?;

        tx.commit()?;
        Ok(())
      })
      .await
      .map_err(Self::unwrap_domain)?;

    Ok(transaction)
  }

  async fn transactions_for(&self, wallet: &str) -> Result<Vec<Transaction>> {
    let wallet = wallet.to_string();

    let raws: Vec<RawTransaction> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM transactions
           WHERE wallet = ?1
           ORDER BY created_at DESC",
          RawTransaction::COLUMNS,
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![wallet], |row| {
            RawTransaction::from_row(row)
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws
      .into_iter()
      .map(RawTransaction::into_transaction)
      .collect()
  }
}

// ─── Transaction helpers ─────────────────────────────────────────────────────

/// Transactions are only ever inserted confirmed; the external transfer has
/// already settled by the time the store sees one.
fn build_transaction(input: NewTransaction) -> Transaction {
  Transaction {
    transaction_id: Uuid::new_v4(),
    wallet:         input.wallet,
    kind:           input.kind,
    currency:       input.currency,
    amount:         input.amount,
    status:         TransactionStatus::Confirmed,
    tx_hash:        input.tx_hash,
    block_number:   input.block_number,
    created_at:     Utc::now(),
  }
}

struct TransactionRow {
  transaction_id: String,
  wallet:         String,
  kind:           &'static str,
  currency:       &'static str,
  amount:         String,
  status:         &'static str,
  tx_hash:        Option<String>,
  block_number:   Option<i64>,
  created_at:     String,
}

fn encode_transaction(t: &Transaction) -> TransactionRow {
  TransactionRow {
    transaction_id: encode_uuid(t.transaction_id),
    wallet:         t.wallet.clone(),
    kind:           encode_txn_kind(t.kind),
    currency:       encode_currency(t.currency),
    amount:         encode_decimal(t.amount),
    status:         encode_txn_status(t.status),
    tx_hash:        t.tx_hash.clone(),
    block_number:   t.block_number.map(|b| b as i64),
    created_at:     encode_dt(t.created_at),
  }
}

/// Retire the withdrawal's intent in the same transaction as the ledger
/// mutation it records.
fn reconcile_intent(
  tx: &rusqlite::Transaction<'_>,
  intent_id: &str,
  now: &str,
) -> rusqlite::Result<()> {
  tx.execute(
    "UPDATE transfer_intents SET state = ?3, updated_at = ?2
     WHERE intent_id = ?1",
    rusqlite::params![
      intent_id,
      now,
      encode_intent_state(IntentState::Reconciled)
    ],
  )?;
  Ok(())
}

fn insert_transaction_row(
  tx: &rusqlite::Transaction<'_>,
  row: &TransactionRow,
) -> rusqlite::Result<()> {
  tx.execute(
    "INSERT INTO transactions
       (transaction_id, wallet, kind, currency, amount, status,
        tx_hash, block_number, created_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
    rusqlite::params![
      row.transaction_id,
      row.wallet,
      row.kind,
      row.currency,
      row.amount,
      row.status,
      row.tx_hash,
      row.block_number,
      row.created_at,
    ],
  )?;
  Ok(())
}
