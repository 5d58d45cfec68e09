//! [`RewardLedger`] — distribution of rewards for registrations and level
//! purchases.
//!
//! One distribution event produces at most: one direct-sponsor reward (on a
//! level-1 registration), one layer payout per qualifying ancestor within
//! the level's payout reach, and one BCC credit. The store persists the
//! whole set in a single transaction; the BCC step is idempotent per
//! `(wallet, level)`, so retrying a failed distribution is safe.

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use trellis_core::{
  Error, Result,
  levels::LevelTable,
  member::{Member, MemberStatus, normalize_wallet},
  reward::{Currency, NewReward, Reward, RewardKind, RewardStatus},
  store::MatrixStore,
};

/// Operator-supplied distribution parameters. Injected at construction,
/// never read from the environment.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
  /// Fixed USDT bonus to the referring sponsor on a level-1 registration.
  pub direct_referral_bonus: Decimal,
  /// Fraction of the purchased level's price paid to each qualifying
  /// ancestor layer.
  pub layer_cut:             Decimal,
  /// Claim window stamped on pending layer payouts.
  pub payout_window:         Duration,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    Self {
      direct_referral_bonus: Decimal::from(100),
      // 5% of the level price per layer.
      layer_cut:             Decimal::new(5, 2),
      payout_window:         Duration::hours(72),
    }
  }
}

pub struct RewardLedger<S> {
  store:  Arc<S>,
  levels: LevelTable,
  config: LedgerConfig,
}

impl<S: MatrixStore> RewardLedger<S> {
  pub fn new(store: Arc<S>, levels: LevelTable, config: LedgerConfig) -> Self {
    Self { store, levels, config }
  }

  /// Distribute rewards for `wallet` purchasing `level` (level 1 being the
  /// registration purchase). Returns the rewards actually created; on a
  /// retry after a partial failure the BCC credit is skipped, never
  /// doubled.
  pub async fn distribute(&self, wallet: &str, level: u8) -> Result<Vec<Reward>> {
    let wallet = normalize_wallet(wallet)?;
    let level_cfg = self
      .levels
      .get(level)
      .ok_or_else(|| Error::Validation(format!("invalid level: {level}")))?;

    let member = self
      .store
      .member_by_wallet(&wallet)
      .await
      .map_err(Into::into)?
      .ok_or_else(|| Error::MemberNotFound(wallet.clone()))?;

    let mut rewards = Vec::new();

    // Fixed referral bonus on the registration purchase, paid to the
    // *sponsor*, who under spillover may not be the placement parent.
    if level == 1
      && let Some(sponsor) = &member.sponsor_wallet
    {
      rewards.push(NewReward {
        recipient_wallet: sponsor.clone(),
        source_wallet:    wallet.clone(),
        kind:             RewardKind::DirectSponsor,
        currency:         Currency::Usdt,
        amount:           self.config.direct_referral_bonus,
        status:           RewardStatus::Instant,
        layer:            None,
        level:            None,
        expires_at:       None,
        notes:            None,
      });
    }

    // Layer payouts: walk the ancestor chain by increasing depth, capped by
    // the purchased level's reach.
    let reach = self.levels.payout_layers(level);
    let ancestors = self
      .store
      .ancestors_of(member.member_id, Some(reach))
      .await
      .map_err(Into::into)?;

    let layer_amount = (level_cfg.price_usdt * self.config.layer_cut).round_dp(2);
    let expires_at = Utc::now() + self.config.payout_window;

    for (depth, ancestor) in ancestors {
      if !qualifies(&ancestor) {
        continue;
      }
      rewards.push(NewReward {
        recipient_wallet: ancestor.wallet.clone(),
        source_wallet:    wallet.clone(),
        kind:             RewardKind::LayerPayout,
        currency:         Currency::Usdt,
        amount:           layer_amount,
        status:           RewardStatus::Pending,
        layer:            Some(depth),
        level:            None,
        expires_at:       Some(expires_at),
        notes:            None,
      });
    }

    if level_cfg.bcc_reward > Decimal::ZERO {
      rewards.push(NewReward {
        recipient_wallet: wallet.clone(),
        source_wallet:    wallet.clone(),
        kind:             RewardKind::BccToken,
        currency:         Currency::Bcc,
        amount:           level_cfg.bcc_reward,
        status:           RewardStatus::Instant,
        layer:            None,
        level:            Some(level),
        expires_at:       None,
        notes:            None,
      });
    }

    let inserted = self
      .store
      .record_distribution(&wallet, level, rewards)
      .await
      .map_err(Into::into)?;

    tracing::info!(
      %wallet,
      level,
      rewards = inserted.len(),
      "distributed rewards"
    );

    Ok(inserted)
  }
}

/// Suspended ancestors earn nothing; they keep their place in the tree but
/// their layer is skipped, not redistributed.
fn qualifies(ancestor: &Member) -> bool {
  ancestor.status == MemberStatus::Active
}
