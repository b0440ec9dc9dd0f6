//! Reward engine errors.

use gatefall_core::{Amount, PoolId};
use gatefall_ledger::LedgerError;
use thiserror::Error;

/// Reward engine failure modes. Ledger rejections (insufficient stake,
/// busy wallets) pass through unchanged so callers see one taxonomy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RewardError {
    /// The pool id is not configured.
    #[error("unknown pool {0}")]
    UnknownPool(PoolId),

    /// Bet outside the configured min/max range.
    #[error("bet {stake} outside allowed range [{min}, {max}]")]
    BetOutOfRange {
        /// The rejected stake.
        stake: Amount,
        /// Configured minimum.
        min: Amount,
        /// Configured maximum.
        max: Amount,
    },

    /// Ledger rejection while charging the stake or paying out.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Convenience alias for reward operations.
pub type RewardResult<T> = Result<T, RewardError>;
