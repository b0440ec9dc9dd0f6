//! Gear tracker errors.

use gatefall_core::ItemInstanceId;
use gatefall_ledger::LedgerError;
use thiserror::Error;

/// Gear operation failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GearError {
    /// No such item instance.
    #[error("unknown item {0}")]
    UnknownItem(ItemInstanceId),

    /// The acting player does not own the item.
    #[error("item {0} is owned by another player")]
    NotOwner(ItemInstanceId),

    /// The item is at zero durability and cannot be used.
    #[error("item {0} is broken")]
    Broken(ItemInstanceId),

    /// Ledger rejection on repair fee or trade settlement.
    #[error(transparent)]
    Ledger(#[from] LedgerError),
}

/// Convenience alias for gear operations.
pub type GearResult<T> = Result<T, GearError>;
