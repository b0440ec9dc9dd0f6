//! Wallet slots and holds.
//!
//! Each wallet is an `Arc<WalletSlot>` holding its own `parking_lot`
//! mutex, so two transfers touching disjoint wallets never contend.
//! Deadlock freedom comes from lock ordering: multi-wallet operations
//! always acquire locks in ascending `WalletId` order, with a bounded
//! timeout that surfaces as [`LedgerError::Busy`] instead of blocking
//! forever.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use gatefall_core::{Amount, CurrencyCode, PlayerId, WalletId};
use parking_lot::{Mutex, MutexGuard};

use crate::error::{LedgerError, LedgerResult};

/// How long a commit waits on a contended wallet before reporting
/// [`LedgerError::Busy`].
pub const LOCK_TIMEOUT: Duration = Duration::from_millis(50);

/// A restriction on wallet activity.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Hold {
    /// No restriction.
    #[default]
    None,
    /// Administrative freeze: no debits, no credits.
    Frozen,
    /// The owner died and was raised as a shadow. Credits still land
    /// (posthumous rewards, refunds) but the shadow cannot spend.
    Shadow,
}

impl Hold {
    /// Whether a debit from this wallet is allowed.
    #[must_use]
    pub const fn allows_debit(self) -> bool {
        matches!(self, Self::None)
    }

    /// Whether a credit to this wallet is allowed.
    #[must_use]
    pub const fn allows_credit(self) -> bool {
        !matches!(self, Self::Frozen)
    }

    const fn label(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Frozen => "frozen",
            Self::Shadow => "shadow",
        }
    }
}

impl fmt::Display for Hold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Mutable wallet contents, guarded by the slot mutex.
#[derive(Debug, Default)]
pub struct WalletState {
    balances: HashMap<CurrencyCode, Amount>,
    hold: Hold,
}

impl WalletState {
    /// Balance in one currency (zero if never credited).
    #[must_use]
    pub fn balance(&self, currency: CurrencyCode) -> Amount {
        self.balances.get(&currency).copied().unwrap_or(Amount::ZERO)
    }

    /// Snapshot of all non-zero balances.
    #[must_use]
    pub fn balances(&self) -> Vec<(CurrencyCode, Amount)> {
        let mut out: Vec<_> = self
            .balances
            .iter()
            .filter(|(_, amount)| !amount.is_zero())
            .map(|(&code, &amount)| (code, amount))
            .collect();
        out.sort_by_key(|(code, _)| *code);
        out
    }

    /// Current hold.
    #[must_use]
    pub const fn hold(&self) -> Hold {
        self.hold
    }

    pub(crate) fn set_hold(&mut self, hold: Hold) {
        self.hold = hold;
    }

    /// Adds `amount`, failing on overflow. Does not check the hold; the
    /// caller validates holds before moving any money.
    pub(crate) fn credit(&mut self, currency: CurrencyCode, amount: Amount) -> LedgerResult<()> {
        let slot = self.balances.entry(currency).or_insert(Amount::ZERO);
        *slot = slot.checked_add(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Overwrites one balance with a pre-validated value. Used by
    /// multi-leg commits that plan all final balances before applying.
    pub(crate) fn set_balance(&mut self, currency: CurrencyCode, amount: Amount) {
        self.balances.insert(currency, amount);
    }

    /// Removes `amount`; the caller must have verified sufficiency.
    pub(crate) fn debit(&mut self, currency: CurrencyCode, amount: Amount) -> LedgerResult<()> {
        let slot = self.balances.entry(currency).or_insert(Amount::ZERO);
        *slot = slot.checked_sub(amount).ok_or(LedgerError::Overflow)?;
        Ok(())
    }
}

/// One wallet: immutable identity plus its own lock.
#[derive(Debug)]
pub struct WalletSlot {
    id: WalletId,
    owner: Option<PlayerId>,
    state: Mutex<WalletState>,
}

impl WalletSlot {
    pub(crate) fn new(id: WalletId, owner: Option<PlayerId>) -> Self {
        Self {
            id,
            owner,
            state: Mutex::new(WalletState::default()),
        }
    }

    /// The wallet id.
    #[must_use]
    pub const fn id(&self) -> WalletId {
        self.id
    }

    /// Owning player, `None` for system wallets.
    #[must_use]
    pub const fn owner(&self) -> Option<PlayerId> {
        self.owner
    }

    /// Acquires the wallet lock with the standard bounded timeout.
    pub(crate) fn lock(&self) -> LedgerResult<MutexGuard<'_, WalletState>> {
        self.state
            .try_lock_for(LOCK_TIMEOUT)
            .ok_or(LedgerError::Busy(self.id))
    }
}

impl Hold {
    /// Static label for error messages and journal records.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        self.label()
    }
}
