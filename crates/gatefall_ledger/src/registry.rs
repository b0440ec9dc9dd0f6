//! Currency registry and supply accounting.
//!
//! Circulating supply is tracked per currency under its own lock so a
//! CRYSTAL mint never contends with an EXON settlement. Mints check the
//! configured cap before any wallet is credited; burns are the only way
//! supply decreases.

use std::collections::HashMap;

use gatefall_core::{Amount, CurrencyCode, CurrencySpec, GameConfig};
use parking_lot::Mutex;

use crate::error::{LedgerError, LedgerResult};

#[derive(Debug, Default)]
struct SupplyBook {
    circulating: Amount,
}

/// Per-currency spec plus its live supply book.
#[derive(Debug)]
struct CurrencyEntry {
    spec: CurrencySpec,
    supply: Mutex<SupplyBook>,
}

/// All registered currencies.
#[derive(Debug)]
pub struct CurrencyRegistry {
    entries: HashMap<CurrencyCode, CurrencyEntry>,
}

impl CurrencyRegistry {
    /// Builds a registry from validated configuration.
    #[must_use]
    pub fn from_config(config: &GameConfig) -> Self {
        let entries = config
            .currencies
            .iter()
            .map(|spec| {
                (
                    spec.symbol,
                    CurrencyEntry {
                        spec: spec.clone(),
                        supply: Mutex::new(SupplyBook::default()),
                    },
                )
            })
            .collect();
        Self { entries }
    }

    /// The spec for a currency.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCurrency`] if not registered.
    pub fn spec(&self, code: CurrencyCode) -> LedgerResult<&CurrencySpec> {
        self.entries
            .get(&code)
            .map(|e| &e.spec)
            .ok_or(LedgerError::UnknownCurrency(code))
    }

    /// Current circulating supply.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCurrency`] if not registered.
    pub fn circulating(&self, code: CurrencyCode) -> LedgerResult<Amount> {
        self.entries
            .get(&code)
            .map(|e| e.supply.lock().circulating)
            .ok_or(LedgerError::UnknownCurrency(code))
    }

    /// Records a mint, enforcing the supply cap. Called with the target
    /// wallet already locked so the credit cannot fail after the supply
    /// book has been updated.
    pub(crate) fn record_mint(&self, code: CurrencyCode, amount: Amount) -> LedgerResult<()> {
        let entry = self
            .entries
            .get(&code)
            .ok_or(LedgerError::UnknownCurrency(code))?;
        let mut book = entry.supply.lock();
        let would_reach = book
            .circulating
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        if let Some(cap) = entry.spec.max_supply {
            if would_reach > cap {
                return Err(LedgerError::SupplyCapExceeded {
                    currency: code,
                    cap,
                    would_reach,
                });
            }
        }
        book.circulating = would_reach;
        Ok(())
    }

    /// Records a burn. The caller has already debited the source wallet.
    pub(crate) fn record_burn(&self, code: CurrencyCode, amount: Amount) -> LedgerResult<()> {
        let entry = self
            .entries
            .get(&code)
            .ok_or(LedgerError::UnknownCurrency(code))?;
        let mut book = entry.supply.lock();
        book.circulating = book
            .circulating
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow)?;
        Ok(())
    }

    /// Reverses a mint after a downstream failure (credit overflow or a
    /// rejected journal append).
    pub(crate) fn unwind_mint(&self, code: CurrencyCode, amount: Amount) {
        if let Some(entry) = self.entries.get(&code) {
            let mut book = entry.supply.lock();
            book.circulating = book.circulating.saturating_sub(amount);
        }
    }

    /// Reverses a burn after a rejected journal append. Restores a value
    /// the book just held, so the cap cannot reject it.
    pub(crate) fn unwind_burn(&self, code: CurrencyCode, amount: Amount) {
        if let Some(entry) = self.entries.get(&code) {
            let mut book = entry.supply.lock();
            book.circulating = book.circulating.saturating_add(amount);
        }
    }

    /// Registers a new currency at zero supply. Administrative,
    /// single-writer.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateCurrency`] if the symbol is taken.
    pub fn register(&mut self, spec: CurrencySpec) -> LedgerResult<()> {
        if self.entries.contains_key(&spec.symbol) {
            return Err(LedgerError::DuplicateCurrency(spec.symbol));
        }
        self.entries.insert(
            spec.symbol,
            CurrencyEntry {
                spec,
                supply: Mutex::new(SupplyBook::default()),
            },
        );
        Ok(())
    }

    /// Retunes a currency's tax rates. Administrative, single-writer.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCurrency`] if not registered.
    pub fn set_tax_rates(
        &mut self,
        code: CurrencyCode,
        base_tax_bp: u32,
        guild_tax_bp: u32,
    ) -> LedgerResult<()> {
        let entry = self
            .entries
            .get_mut(&code)
            .ok_or(LedgerError::UnknownCurrency(code))?;
        entry.spec.base_tax_bp = base_tax_bp;
        entry.spec.guild_tax_bp = guild_tax_bp;
        Ok(())
    }

    /// Moves a currency's supply cap. A cap below the circulating
    /// supply is rejected; `None` removes the cap.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCurrency`],
    /// [`LedgerError::SupplyCapExceeded`] for a cap below circulating
    /// supply.
    pub fn set_max_supply(
        &mut self,
        code: CurrencyCode,
        cap: Option<Amount>,
    ) -> LedgerResult<()> {
        let entry = self
            .entries
            .get_mut(&code)
            .ok_or(LedgerError::UnknownCurrency(code))?;
        let circulating = entry.supply.lock().circulating;
        if let Some(cap) = cap {
            if cap < circulating {
                return Err(LedgerError::SupplyCapExceeded {
                    currency: code,
                    cap,
                    would_reach: circulating,
                });
            }
        }
        entry.spec.max_supply = cap;
        Ok(())
    }

    /// Builds a registry from new configuration, carrying over the live
    /// circulating supply of every currency both sides know. The caller
    /// has already verified the new caps cover the carried supply.
    #[must_use]
    pub fn reload(old: &Self, config: &GameConfig) -> Self {
        let fresh = Self::from_config(config);
        for (code, entry) in &fresh.entries {
            if let Some(previous) = old.entries.get(code) {
                entry.supply.lock().circulating = previous.supply.lock().circulating;
            }
        }
        fresh
    }

    /// Iterates all registered currency codes, sorted.
    #[must_use]
    pub fn codes(&self) -> Vec<CurrencyCode> {
        let mut codes: Vec<_> = self.entries.keys().copied().collect();
        codes.sort();
        codes
    }
}
