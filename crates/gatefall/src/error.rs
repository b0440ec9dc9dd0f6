//! Top-level error taxonomy.
//!
//! Everything the core can reject flows up through [`GameError`], so a
//! server handler matches one enum. Validation, resource, and
//! concurrency rejections are safe to surface to users; an
//! `Integrity` rejection from the ledger means a wallet was frozen for
//! manual reconciliation and must never be auto-retried.

use gatefall_combat::CombatError;
use gatefall_core::ConfigError;
use gatefall_gear::GearError;
use gatefall_ledger::LedgerError;
use gatefall_reward::RewardError;
use thiserror::Error;

/// Any rejection from the assembled game core.
#[derive(Error, Debug)]
pub enum GameError {
    /// Configuration parse or invariant failure.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Ledger rejection.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Reward engine rejection.
    #[error(transparent)]
    Reward(#[from] RewardError),

    /// Gear rejection.
    #[error(transparent)]
    Gear(#[from] GearError),

    /// Combat rejection.
    #[error(transparent)]
    Combat(#[from] CombatError),
}

/// Convenience alias for core operations.
pub type GameResult<T> = Result<T, GameError>;
