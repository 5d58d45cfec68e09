//! The Trellis operational engine.
//!
//! Three components over any [`trellis_core::store::MatrixStore`]:
//!
//! - [`PlacementEngine`] — breadth-first spillover placement into the 3x3
//!   matrix, with bounded retry on slot races.
//! - [`RewardLedger`] — turns a registration or level purchase into
//!   direct-sponsor, layer-payout, and BCC rewards.
//! - [`WithdrawalProcessor`] — serialises withdrawals per wallet, gates all
//!   ledger mutation on a settled external transfer, and reconciles the
//!   reward set FIFO (with at most one split).

pub mod activity;
pub mod ledger;
pub mod placement;
pub mod withdraw;

pub use activity::ChannelActivityLog;
pub use ledger::{LedgerConfig, RewardLedger};
pub use placement::PlacementEngine;
pub use withdraw::{WithdrawalProcessor, plan_claims};

#[cfg(test)]
mod tests;
