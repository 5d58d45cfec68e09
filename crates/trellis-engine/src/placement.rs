//! [`PlacementEngine`] — breadth-first spillover placement.
//!
//! The search is idempotent given current store state, so slot races are
//! handled by letting the store's `(parent_id, position)` uniqueness
//! constraint reject the loser and re-running the search. No lock is held
//! across the search and the insert.

use std::{collections::VecDeque, sync::Arc};

use uuid::Uuid;

use trellis_core::{
  Error, Result,
  member::{Member, Placement, Position, normalize_wallet},
  store::MatrixStore,
};

/// How many times a placement is retried after losing a slot race before
/// the conflict is surfaced to the caller.
const DEFAULT_MAX_ATTEMPTS: u32 = 5;

pub struct PlacementEngine<S> {
  store:        Arc<S>,
  max_attempts: u32,
}

impl<S: MatrixStore> PlacementEngine<S> {
  pub fn new(store: Arc<S>) -> Self {
    Self { store, max_attempts: DEFAULT_MAX_ATTEMPTS }
  }

  pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
    self.max_attempts = max_attempts.max(1);
    self
  }

  /// Create the tree root — the only member without a sponsor.
  pub async fn register_root(&self, wallet: &str) -> Result<Member> {
    let wallet = normalize_wallet(wallet)?;
    let member = self.store.add_root(&wallet).await.map_err(Into::into)?;
    tracing::info!(wallet = %member.wallet, "registered matrix root");
    Ok(member)
  }

  /// Place `new_wallet` into the first open slot in the sponsor's subtree.
  ///
  /// The sponsor's three slots fill completely (in position order) before
  /// any member spills into a lower layer, and spillover never escapes the
  /// sponsor's own subtree.
  pub async fn place(
    &self,
    new_wallet: &str,
    sponsor_wallet: &str,
  ) -> Result<(Member, Placement)> {
    let new_wallet     = normalize_wallet(new_wallet)?;
    let sponsor_wallet = normalize_wallet(sponsor_wallet)?;

    let sponsor = self
      .store
      .member_by_wallet(&sponsor_wallet)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::SponsorNotFound(sponsor_wallet.clone()))?;

    if self
      .store
      .member_by_wallet(&new_wallet)
      .await
      .map_err(Into::into)?
      .is_some()
    {
      return Err(Error::AlreadyPlaced(new_wallet));
    }

    for attempt in 1..=self.max_attempts {
      let placement = self.find_open_slot(sponsor.member_id).await?;
      match self
        .store
        .place_member(&new_wallet, &sponsor_wallet, placement)
        .await
      {
        Ok(member) => {
          tracing::info!(
            wallet = %member.wallet,
            sponsor = %sponsor_wallet,
            parent = %placement.parent_id,
            position = %placement.position,
            "placed member"
          );
          return Ok((member, placement));
        }
        Err(e) => match e.into() {
          Error::SlotTaken { parent, position } => {
            tracing::debug!(
              %parent, %position, attempt,
              "placement slot raced, re-running search"
            );
          }
          other => return Err(other),
        },
      }
    }

    Err(Error::PlacementContention { attempts: self.max_attempts })
  }

  /// Classic BFS over the subtree rooted at the sponsor: probe each node's
  /// three slots in position order, enqueue its children in position order,
  /// stop at the first open slot.
  async fn find_open_slot(&self, sponsor_id: Uuid) -> Result<Placement> {
    let mut queue = VecDeque::from([sponsor_id]);

    while let Some(node) = queue.pop_front() {
      let children = self.store.children_of(node).await.map_err(Into::into)?;

      for position in Position::ALL {
        if !children.iter().any(|(p, _)| *p == position) {
          return Ok(Placement { parent_id: node, position });
        }
      }

      // children_of returns position order, so the queue stays level-
      // ordered and earliest-line-first within each level.
      for (_, child) in children {
        queue.push_back(child.member_id);
      }
    }

    // A finite ternary tree always has an open leaf slot.
    Err(Error::Internal("matrix search exhausted".to_string()))
  }
}
