//! Ledger error types.

use gatefall_core::{Amount, CurrencyCode, WalletId};
use thiserror::Error;

/// Everything that can go wrong while committing a balance change.
///
/// Rejections are total: a failed operation leaves every wallet and the
/// supply book exactly as they were.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    /// The wallet id is not registered.
    #[error("unknown wallet {0}")]
    UnknownWallet(WalletId),

    /// The currency is not registered.
    #[error("unknown currency {0}")]
    UnknownCurrency(CurrencyCode),

    /// A wallet with that id already exists.
    #[error("wallet {0} already exists")]
    DuplicateWallet(WalletId),

    /// A currency with that symbol already exists.
    #[error("currency {0} already registered")]
    DuplicateCurrency(CurrencyCode),

    /// Debit exceeds the available balance.
    #[error("insufficient funds in {wallet} for {currency}: need {needed}, have {available}")]
    InsufficientFunds {
        /// The wallet being debited.
        wallet: WalletId,
        /// The currency of the debit.
        currency: CurrencyCode,
        /// Total required including tax legs.
        needed: Amount,
        /// What the wallet actually holds.
        available: Amount,
    },

    /// Minting would push the circulating supply past the configured cap.
    #[error("supply cap for {currency} exceeded: cap {cap}, would reach {would_reach}")]
    SupplyCapExceeded {
        /// The capped currency.
        currency: CurrencyCode,
        /// The configured cap.
        cap: Amount,
        /// Circulating supply after the rejected mint.
        would_reach: Amount,
    },

    /// A hold on the wallet blocks this operation.
    #[error("wallet {wallet} is held ({hold}); operation blocked")]
    HoldBlocks {
        /// The held wallet.
        wallet: WalletId,
        /// Human-readable hold kind.
        hold: &'static str,
    },

    /// Lock acquisition timed out; the caller should retry.
    #[error("wallet {0} is busy")]
    Busy(WalletId),

    /// Sender and receiver are the same wallet.
    #[error("transfer from {0} to itself")]
    SelfTransfer(WalletId),

    /// Zero-amount operations are rejected rather than recorded.
    #[error("zero amount")]
    ZeroAmount,

    /// Balance arithmetic would overflow the fixed-point range.
    #[error("amount overflow")]
    Overflow,

    /// Journal write or replay failure.
    #[error("journal: {0}")]
    Journal(String),

    /// Audit found wallets holding more or less than circulating supply.
    /// Fatal for the currency; never auto-corrected.
    #[error("integrity: {currency} wallets hold {held}, supply book says {circulating}")]
    Integrity {
        /// The inconsistent currency.
        currency: CurrencyCode,
        /// Sum across all wallets.
        held: Amount,
        /// Supply book value.
        circulating: Amount,
    },
}

/// Convenience alias for ledger operations.
pub type LedgerResult<T> = Result<T, LedgerError>;
