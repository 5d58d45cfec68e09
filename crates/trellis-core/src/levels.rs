//! The level configuration table: `level -> {price_usdt, bcc_reward}`.
//!
//! Supplied by the operator at construction time (no env-sourced globals);
//! [`LevelTable::standard`] carries the default pricing schedule.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::member::MAX_LEVEL;

/// Static configuration for one purchasable level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelConfig {
  pub level:      u8,
  pub price_usdt: Decimal,
  /// BCC credited once per `(wallet, level)`; zero means no credit.
  pub bcc_reward: Decimal,
}

/// The full level table, indexed 1..=19.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelTable {
  levels: Vec<LevelConfig>,
}

impl LevelTable {
  /// Build from an explicit list. Entries must cover levels 1..=19 exactly
  /// once each, in order.
  pub fn new(levels: Vec<LevelConfig>) -> crate::Result<Self> {
    if levels.len() != MAX_LEVEL as usize {
      return Err(crate::Error::Validation(format!(
        "level table must have {MAX_LEVEL} entries, got {}",
        levels.len()
      )));
    }
    for (i, cfg) in levels.iter().enumerate() {
      if cfg.level != i as u8 + 1 {
        return Err(crate::Error::Validation(format!(
          "level table entry {i} has level {}, expected {}",
          cfg.level,
          i + 1
        )));
      }
    }
    Ok(Self { levels })
  }

  /// The default schedule: level N costs `100 * N` USDT; the first three
  /// levels also grant a BCC credit.
  pub fn standard() -> Self {
    let levels = (1..=MAX_LEVEL)
      .map(|level| LevelConfig {
        level,
        price_usdt: Decimal::from(100u32 * level as u32),
        bcc_reward: match level {
          1 => Decimal::from(100),
          2 => Decimal::from(150),
          3 => Decimal::from(200),
          _ => Decimal::ZERO,
        },
      })
      .collect();
    Self { levels }
  }

  pub fn get(&self, level: u8) -> Option<&LevelConfig> {
    if (1..=MAX_LEVEL).contains(&level) {
      self.levels.get(level as usize - 1)
    } else {
      None
    }
  }

  /// How many layers up a level-N purchase pays: level N reaches N
  /// ancestors, capped at the tree's 19-layer depth.
  pub fn payout_layers(&self, level: u8) -> u32 {
    level.min(MAX_LEVEL) as u32
  }
}
