//! # The Ledger
//!
//! Central multi-currency ledger. Every committed operation is atomic:
//! validation happens before any balance moves, multi-wallet commits
//! lock wallets in ascending id order, and a commit either applies all
//! its legs or none of them.
//!
//! ## Transfer anatomy
//!
//! A taxed transfer of `gross` splits into three legs:
//!
//! ```text
//! sender  -gross
//! base tax sink  +round_half_even(gross * base_tax_bp)
//! guild tax sink +round_half_even(gross * guild_tax_bp)   (guild context only)
//! receiver       +gross - base - guild
//! ```
//!
//! The legs reconcile exactly; no raw unit is created or destroyed.

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gatefall_core::{Amount, CurrencyCode, CurrencySpec, GameConfig, PlayerId, TransactionId, WalletId};
use parking_lot::RwLock;
use tracing::debug;

use crate::error::{LedgerError, LedgerResult};
use crate::journal::{Journal, JournalRecord, MintReason};
use crate::receipt::{OpKey, Receipt, ReceiptStore};
use crate::registry::CurrencyRegistry;
use crate::wallet::{Hold, WalletSlot};

/// The multi-currency wallet ledger.
pub struct Ledger {
    config: GameConfig,
    registry: CurrencyRegistry,
    wallets: RwLock<HashMap<WalletId, Arc<WalletSlot>>>,
    next_tx: AtomicU64,
    journal: Option<Journal>,
    receipts: ReceiptStore,
}

impl Ledger {
    /// Builds an in-memory ledger (no journal) with the system sink
    /// wallets pre-created.
    #[must_use]
    pub fn new(config: GameConfig) -> Self {
        let ledger = Self {
            registry: CurrencyRegistry::from_config(&config),
            config,
            wallets: RwLock::new(HashMap::new()),
            next_tx: AtomicU64::new(1),
            journal: None,
            receipts: ReceiptStore::default(),
        };
        ledger.create_system_wallets();
        ledger
    }

    /// Opens a journaled ledger, replaying any existing journal so
    /// balances and the supply book match the last intact commit.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Journal`] on I/O failure, or any replay error
    /// (a replayed record that no longer satisfies the supply cap means
    /// the configuration shrank below history and is rejected).
    pub fn open(config: GameConfig, path: impl AsRef<Path>) -> LedgerResult<Self> {
        let (journal, records) = Journal::open(path)?;
        let mut ledger = Self::new(config);
        for record in &records {
            ledger.replay_record(record)?;
        }
        let replayed = records.len() as u64;
        ledger.next_tx.store(replayed + 1, Ordering::SeqCst);
        ledger.journal = Some(journal);
        debug!(records = replayed, "journal replayed");
        Ok(ledger)
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &GameConfig {
        &self.config
    }

    /// Swaps in a validated configuration. Rejected if any new supply
    /// cap sits below the currency's circulating supply.
    ///
    /// # Errors
    ///
    /// [`LedgerError::SupplyCapExceeded`] for a cap below circulating
    /// supply; [`LedgerError::UnknownCurrency`] if a currency with live
    /// supply was removed.
    pub fn reload(&mut self, config: GameConfig) -> LedgerResult<()> {
        for code in self.registry.codes() {
            let circulating = self.registry.circulating(code)?;
            match config.currency(code) {
                Some(spec) => {
                    if let Some(cap) = spec.max_supply {
                        if circulating > cap {
                            return Err(LedgerError::SupplyCapExceeded {
                                currency: code,
                                cap,
                                would_reach: circulating,
                            });
                        }
                    }
                }
                None if !circulating.is_zero() => {
                    return Err(LedgerError::UnknownCurrency(code));
                }
                None => {}
            }
        }
        self.registry = CurrencyRegistry::reload(&self.registry, &config);
        self.config = config;
        Ok(())
    }

    // ===== WALLET LIFECYCLE =====

    /// Registers a new currency at runtime, at zero supply.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateCurrency`].
    pub fn register_currency(&mut self, spec: CurrencySpec) -> LedgerResult<()> {
        self.registry.register(spec.clone())?;
        self.config.currencies.push(spec);
        Ok(())
    }

    /// Retunes a currency's transfer tax rates.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCurrency`].
    pub fn set_tax_rates(
        &mut self,
        currency: CurrencyCode,
        base_tax_bp: u32,
        guild_tax_bp: u32,
    ) -> LedgerResult<()> {
        self.registry
            .set_tax_rates(currency, base_tax_bp, guild_tax_bp)?;
        if let Some(spec) = self
            .config
            .currencies
            .iter_mut()
            .find(|c| c.symbol == currency)
        {
            spec.base_tax_bp = base_tax_bp;
            spec.guild_tax_bp = guild_tax_bp;
        }
        Ok(())
    }

    /// Moves a currency's supply cap; a cap below circulating supply is
    /// rejected outright.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCurrency`],
    /// [`LedgerError::SupplyCapExceeded`].
    pub fn set_max_supply(
        &mut self,
        currency: CurrencyCode,
        cap: Option<Amount>,
    ) -> LedgerResult<()> {
        self.registry.set_max_supply(currency, cap)?;
        if let Some(spec) = self
            .config
            .currencies
            .iter_mut()
            .find(|c| c.symbol == currency)
        {
            spec.max_supply = cap;
        }
        Ok(())
    }

    /// Registers a player wallet.
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateWallet`] if the id is taken.
    pub fn create_wallet(&self, id: WalletId, owner: PlayerId) -> LedgerResult<()> {
        self.insert_wallet(id, Some(owner))
    }

    /// Registers a system wallet (no owner).
    ///
    /// # Errors
    ///
    /// [`LedgerError::DuplicateWallet`] if the id is taken.
    pub fn create_system_wallet(&self, id: WalletId) -> LedgerResult<()> {
        self.insert_wallet(id, None)
    }

    fn insert_wallet(&self, id: WalletId, owner: Option<PlayerId>) -> LedgerResult<()> {
        let mut wallets = self.wallets.write();
        if wallets.contains_key(&id) {
            return Err(LedgerError::DuplicateWallet(id));
        }
        wallets.insert(id, Arc::new(WalletSlot::new(id, owner)));
        Ok(())
    }

    fn create_system_wallets(&self) {
        let sinks = self.config.sinks;
        for id in [
            sinks.base_tax_sink,
            sinks.guild_tax_sink,
            sinks.unclaimed_sink,
            sinks.house,
        ] {
            // Duplicate sink ids in config collapse to one wallet.
            let _ = self.create_system_wallet(id);
        }
    }

    fn slot(&self, id: WalletId) -> LedgerResult<Arc<WalletSlot>> {
        self.wallets
            .read()
            .get(&id)
            .cloned()
            .ok_or(LedgerError::UnknownWallet(id))
    }

    /// Balance of one wallet in one currency.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownWallet`] / [`LedgerError::Busy`].
    pub fn balance(&self, wallet: WalletId, currency: CurrencyCode) -> LedgerResult<Amount> {
        Ok(self.slot(wallet)?.lock()?.balance(currency))
    }

    /// All non-zero balances of a wallet.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownWallet`] / [`LedgerError::Busy`].
    pub fn balances(&self, wallet: WalletId) -> LedgerResult<Vec<(CurrencyCode, Amount)>> {
        Ok(self.slot(wallet)?.lock()?.balances())
    }

    /// Current hold on a wallet.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownWallet`] / [`LedgerError::Busy`].
    pub fn hold(&self, wallet: WalletId) -> LedgerResult<Hold> {
        Ok(self.slot(wallet)?.lock()?.hold())
    }

    /// Sets the hold on a wallet (journaled).
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownWallet`] / [`LedgerError::Busy`] /
    /// [`LedgerError::Journal`].
    pub fn set_hold(&self, wallet: WalletId, hold: Hold) -> LedgerResult<TransactionId> {
        let slot = self.slot(wallet)?;
        let mut state = slot.lock()?;
        let tx = self.alloc_tx();
        self.journal_append(&JournalRecord::HoldChange {
            tx,
            wallet,
            hold: match hold {
                Hold::None => 0,
                Hold::Frozen => 1,
                Hold::Shadow => 2,
            },
        })?;
        state.set_hold(hold);
        debug!(%wallet, %hold, %tx, "hold changed");
        Ok(tx)
    }

    // ===== SUPPLY OPERATIONS =====

    /// Mints `amount` into `to`, enforcing the supply cap and (for gate
    /// rewards) the currency's reward eligibility.
    ///
    /// # Errors
    ///
    /// [`LedgerError::SupplyCapExceeded`], [`LedgerError::UnknownCurrency`]
    /// (also returned for a gate-reward mint of an ineligible currency),
    /// hold and lookup failures.
    pub fn mint(
        &self,
        to: WalletId,
        currency: CurrencyCode,
        amount: Amount,
        reason: MintReason,
    ) -> LedgerResult<TransactionId> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        let spec = self.registry.spec(currency)?;
        if reason == MintReason::GateReward && !spec.gate_reward_eligible {
            return Err(LedgerError::UnknownCurrency(currency));
        }
        let slot = self.slot(to)?;
        let mut state = slot.lock()?;
        if !state.hold().allows_credit() {
            return Err(LedgerError::HoldBlocks {
                wallet: to,
                hold: state.hold().as_str(),
            });
        }
        let credited = state
            .balance(currency)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;
        self.registry.record_mint(currency, amount)?;
        let tx = self.alloc_tx();
        // Write-ahead under the wallet lock; unwind the supply book if
        // the append fails so nothing committed.
        if let Err(err) = self.journal_append(&JournalRecord::Mint {
            tx,
            to,
            currency,
            amount,
            reason,
        }) {
            self.registry.unwind_mint(currency, amount);
            return Err(err);
        }
        state.set_balance(currency, credited);
        debug!(%to, %currency, %amount, ?reason, %tx, "mint");
        Ok(tx)
    }

    /// Burns `amount` from `from`, shrinking circulating supply.
    ///
    /// # Errors
    ///
    /// [`LedgerError::InsufficientFunds`], hold and lookup failures.
    pub fn burn(
        &self,
        from: WalletId,
        currency: CurrencyCode,
        amount: Amount,
    ) -> LedgerResult<TransactionId> {
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        self.registry.spec(currency)?;
        let slot = self.slot(from)?;
        let mut state = slot.lock()?;
        if !state.hold().allows_debit() {
            return Err(LedgerError::HoldBlocks {
                wallet: from,
                hold: state.hold().as_str(),
            });
        }
        let available = state.balance(currency);
        if available < amount {
            return Err(LedgerError::InsufficientFunds {
                wallet: from,
                currency,
                needed: amount,
                available,
            });
        }
        let remaining = available
            .checked_sub(amount)
            .ok_or(LedgerError::Overflow)?;
        self.registry.record_burn(currency, amount)?;
        let tx = self.alloc_tx();
        // Write-ahead under the wallet lock; restore the supply book if
        // the append fails so nothing committed.
        if let Err(err) = self.journal_append(&JournalRecord::Burn {
            tx,
            from,
            currency,
            amount,
        }) {
            self.registry.unwind_burn(currency, amount);
            return Err(err);
        }
        state.set_balance(currency, remaining);
        debug!(%from, %currency, %amount, %tx, "burn");
        Ok(tx)
    }

    /// Circulating supply of a currency.
    ///
    /// # Errors
    ///
    /// [`LedgerError::UnknownCurrency`].
    pub fn circulating(&self, currency: CurrencyCode) -> LedgerResult<Amount> {
        self.registry.circulating(currency)
    }

    /// Sums a currency across every wallet. Quiescent callers (tests,
    /// audits) can compare this against [`Self::circulating`].
    ///
    /// # Errors
    ///
    /// [`LedgerError::Busy`] if a wallet stays contended.
    pub fn total_held(&self, currency: CurrencyCode) -> LedgerResult<Amount> {
        let slots: Vec<_> = self.wallets.read().values().cloned().collect();
        let mut total = Amount::ZERO;
        for slot in slots {
            let balance = slot.lock()?.balance(currency);
            total = total.checked_add(balance).ok_or(LedgerError::Overflow)?;
        }
        Ok(total)
    }

    /// Conservation audit: wallets must hold exactly the circulating
    /// supply. A mismatch is an integrity fault; the caller freezes the
    /// affected wallets for manual reconciliation rather than retrying.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Integrity`] on mismatch, [`LedgerError::Busy`] if
    /// the ledger is not quiescent enough to sum.
    pub fn audit(&self, currency: CurrencyCode) -> LedgerResult<Amount> {
        let held = self.total_held(currency)?;
        let circulating = self.circulating(currency)?;
        if held != circulating {
            return Err(LedgerError::Integrity {
                currency,
                held,
                circulating,
            });
        }
        Ok(circulating)
    }

    // ===== TRANSFERS =====

    /// Taxed transfer. Debits `gross` from `from`, routes the base and
    /// (in guild context) guild tax legs to their sinks, and credits the
    /// remainder to `to`. Retries under the same `key` return the
    /// original receipt without moving money.
    ///
    /// # Errors
    ///
    /// See [`LedgerError`]; a rejection leaves all four wallets untouched.
    pub fn transfer(
        &self,
        key: OpKey,
        from: WalletId,
        to: WalletId,
        currency: CurrencyCode,
        gross: Amount,
        guild_context: bool,
    ) -> LedgerResult<Receipt> {
        if let Some(receipt) = self.receipts.get(key) {
            return Ok(receipt);
        }
        if gross.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if from == to {
            return Err(LedgerError::SelfTransfer(from));
        }
        let spec = self.registry.spec(currency)?;
        let base_tax = gross.mul_bp_banker(spec.base_tax_bp);
        let guild_tax = if guild_context {
            gross.mul_bp_banker(spec.guild_tax_bp)
        } else {
            Amount::ZERO
        };
        let net = gross
            .checked_sub(base_tax)
            .and_then(|n| n.checked_sub(guild_tax))
            .ok_or(LedgerError::Overflow)?;

        let sinks = self.config.sinks;
        // Per-wallet signed legs; merged so a wallet appearing twice
        // (e.g. a transfer straight into a sink) still locks once.
        let mut legs: Vec<(WalletId, Amount, Amount)> = Vec::with_capacity(4);
        let mut add_leg = |wallet: WalletId, debit: Amount, credit: Amount| {
            if let Some(entry) = legs.iter_mut().find(|(id, _, _)| *id == wallet) {
                entry.1 = entry.1.saturating_add(debit);
                entry.2 = entry.2.saturating_add(credit);
            } else {
                legs.push((wallet, debit, credit));
            }
        };
        add_leg(from, gross, Amount::ZERO);
        add_leg(to, Amount::ZERO, net);
        if !base_tax.is_zero() {
            add_leg(sinks.base_tax_sink, Amount::ZERO, base_tax);
        }
        if !guild_tax.is_zero() {
            add_leg(sinks.guild_tax_sink, Amount::ZERO, guild_tax);
        }
        legs.sort_by_key(|(id, _, _)| *id);

        let slots = legs
            .iter()
            .map(|(id, _, _)| self.slot(*id))
            .collect::<LedgerResult<Vec<_>>>()?;
        let mut guards = Vec::with_capacity(slots.len());
        for slot in &slots {
            guards.push(slot.lock()?);
        }

        // Validate every leg before touching anything.
        let mut planned = Vec::with_capacity(legs.len());
        for ((wallet, debit, credit), guard) in legs.iter().zip(guards.iter()) {
            let hold = guard.hold();
            if !debit.is_zero() && !hold.allows_debit() {
                return Err(LedgerError::HoldBlocks {
                    wallet: *wallet,
                    hold: hold.as_str(),
                });
            }
            if !credit.is_zero() && !hold.allows_credit() {
                return Err(LedgerError::HoldBlocks {
                    wallet: *wallet,
                    hold: hold.as_str(),
                });
            }
            let current = guard.balance(currency);
            let after_debit = current.checked_sub(*debit).ok_or_else(|| {
                LedgerError::InsufficientFunds {
                    wallet: *wallet,
                    currency,
                    needed: *debit,
                    available: current,
                }
            })?;
            let after = after_debit
                .checked_add(*credit)
                .ok_or(LedgerError::Overflow)?;
            planned.push(after);
        }

        // Write-ahead: the record lands in the journal while the
        // wallets are still locked and before any balance moves. A
        // failed append commits nothing, and journal order matches
        // commit order.
        let tx = self.alloc_tx();
        self.journal_append(&JournalRecord::Transfer {
            tx,
            from,
            to,
            currency,
            gross,
            base_tax,
            guild_tax,
        })?;
        for (guard, after) in guards.iter_mut().zip(planned) {
            guard.set_balance(currency, after);
        }
        drop(guards);

        let receipt = self.receipts.put(
            key,
            Receipt {
                tx,
                net,
                tax: base_tax.saturating_add(guild_tax),
            },
        );
        debug!(%from, %to, %currency, %gross, %net, %tx, guild = guild_context, "transfer");
        Ok(receipt)
    }

    /// Untaxed debit into the house wallet (gacha stake, coin-flip bet,
    /// repair fee). Idempotent under `key`.
    ///
    /// # Errors
    ///
    /// See [`LedgerError`].
    pub fn charge(
        &self,
        key: OpKey,
        from: WalletId,
        currency: CurrencyCode,
        amount: Amount,
    ) -> LedgerResult<Receipt> {
        let house = self.config.sinks.house;
        self.move_untaxed(Some(key), from, house, currency, amount, true)
    }

    /// Untaxed credit from the house wallet (coin-flip win). Idempotent
    /// under `key`.
    ///
    /// # Errors
    ///
    /// See [`LedgerError`]; fails if the house itself lacks funds.
    pub fn payout(
        &self,
        key: OpKey,
        to: WalletId,
        currency: CurrencyCode,
        amount: Amount,
    ) -> LedgerResult<Receipt> {
        let house = self.config.sinks.house;
        self.move_untaxed(Some(key), house, to, currency, amount, true)
    }

    /// Moves previously confiscated funds from the unclaimed sink to a
    /// survivor's wallet. Untaxed and idempotent under `key`.
    ///
    /// # Errors
    ///
    /// See [`LedgerError`]; fails if the sink no longer holds `amount`.
    pub fn claim_from_sink(
        &self,
        key: OpKey,
        to: WalletId,
        currency: CurrencyCode,
        amount: Amount,
    ) -> LedgerResult<Receipt> {
        let sink = self.config.sinks.unclaimed_sink;
        self.move_untaxed(Some(key), sink, to, currency, amount, true)
    }

    /// Confiscates `share_bp` of the wallet's balance in `currency` into
    /// the unclaimed sink. Bypasses holds (a dead player's shadow hold
    /// does not shield the penalty). Returns the amount taken.
    ///
    /// # Errors
    ///
    /// See [`LedgerError`].
    pub fn confiscate(
        &self,
        from: WalletId,
        currency: CurrencyCode,
        share_bp: u32,
    ) -> LedgerResult<(TransactionId, Amount)> {
        let balance = self.balance(from, currency)?;
        let amount = balance.mul_bp(share_bp);
        if amount.is_zero() {
            return Ok((TransactionId(0), Amount::ZERO));
        }
        let sink = self.config.sinks.unclaimed_sink;
        let receipt = self.move_untaxed(None, from, sink, currency, amount, false)?;
        Ok((receipt.tx, amount))
    }

    fn move_untaxed(
        &self,
        key: Option<OpKey>,
        from: WalletId,
        to: WalletId,
        currency: CurrencyCode,
        amount: Amount,
        respect_holds: bool,
    ) -> LedgerResult<Receipt> {
        if let Some(key) = key {
            if let Some(receipt) = self.receipts.get(key) {
                return Ok(receipt);
            }
        }
        if amount.is_zero() {
            return Err(LedgerError::ZeroAmount);
        }
        if from == to {
            return Err(LedgerError::SelfTransfer(from));
        }
        self.registry.spec(currency)?;

        let (first, second) = if from < to { (from, to) } else { (to, from) };
        let first_slot = self.slot(first)?;
        let second_slot = self.slot(second)?;
        let mut first_guard = first_slot.lock()?;
        let mut second_guard = second_slot.lock()?;
        let (from_guard, to_guard) = if from < to {
            (&mut first_guard, &mut second_guard)
        } else {
            (&mut second_guard, &mut first_guard)
        };

        if respect_holds {
            if !from_guard.hold().allows_debit() {
                return Err(LedgerError::HoldBlocks {
                    wallet: from,
                    hold: from_guard.hold().as_str(),
                });
            }
            if !to_guard.hold().allows_credit() {
                return Err(LedgerError::HoldBlocks {
                    wallet: to,
                    hold: to_guard.hold().as_str(),
                });
            }
        }
        let available = from_guard.balance(currency);
        let remaining = available.checked_sub(amount).ok_or({
            LedgerError::InsufficientFunds {
                wallet: from,
                currency,
                needed: amount,
                available,
            }
        })?;
        let credited = to_guard
            .balance(currency)
            .checked_add(amount)
            .ok_or(LedgerError::Overflow)?;

        // Write-ahead while both wallets stay locked; a failed append
        // commits nothing.
        let tx = self.alloc_tx();
        self.journal_append(&JournalRecord::Move {
            tx,
            from,
            to,
            currency,
            amount,
        })?;
        from_guard.set_balance(currency, remaining);
        to_guard.set_balance(currency, credited);
        drop(first_guard);
        drop(second_guard);
        let receipt = Receipt {
            tx,
            net: amount,
            tax: Amount::ZERO,
        };
        let receipt = match key {
            Some(key) => self.receipts.put(key, receipt),
            None => receipt,
        };
        debug!(%from, %to, %currency, %amount, %tx, "move");
        Ok(receipt)
    }

    // ===== INTERNALS =====

    fn alloc_tx(&self) -> TransactionId {
        TransactionId(self.next_tx.fetch_add(1, Ordering::SeqCst))
    }

    fn journal_append(&self, record: &JournalRecord) -> LedgerResult<()> {
        match &self.journal {
            Some(journal) => journal.append(record),
            None => Ok(()),
        }
    }

    /// Applies one journal record during replay. Wallets are created on
    /// first sight (ownership is rebuilt by the account layer, not the
    /// journal); holds and caps are not re-validated because the record
    /// already committed once.
    fn replay_record(&mut self, record: &JournalRecord) -> LedgerResult<()> {
        match record {
            JournalRecord::Transfer {
                from,
                to,
                currency,
                gross,
                base_tax,
                guild_tax,
                ..
            } => {
                let net = gross
                    .checked_sub(*base_tax)
                    .and_then(|n| n.checked_sub(*guild_tax))
                    .ok_or_else(|| LedgerError::Journal("transfer legs exceed gross".into()))?;
                self.replay_debit(*from, *currency, *gross)?;
                self.replay_credit(*to, *currency, net)?;
                self.replay_credit(self.config.sinks.base_tax_sink, *currency, *base_tax)?;
                self.replay_credit(self.config.sinks.guild_tax_sink, *currency, *guild_tax)?;
            }
            JournalRecord::Mint {
                to,
                currency,
                amount,
                ..
            } => {
                self.registry.record_mint(*currency, *amount)?;
                self.replay_credit(*to, *currency, *amount)?;
            }
            JournalRecord::Burn {
                from,
                currency,
                amount,
                ..
            } => {
                self.replay_debit(*from, *currency, *amount)?;
                self.registry.record_burn(*currency, *amount)?;
            }
            JournalRecord::Move {
                from,
                to,
                currency,
                amount,
                ..
            } => {
                self.replay_debit(*from, *currency, *amount)?;
                self.replay_credit(*to, *currency, *amount)?;
            }
            JournalRecord::HoldChange { wallet, hold, .. } => {
                let hold = match hold {
                    0 => Hold::None,
                    1 => Hold::Frozen,
                    2 => Hold::Shadow,
                    other => {
                        return Err(LedgerError::Journal(format!("bad hold code {other}")));
                    }
                };
                self.ensure_wallet(*wallet);
                if let Ok(slot) = self.slot(*wallet) {
                    slot.lock()?.set_hold(hold);
                }
            }
        }
        Ok(())
    }

    fn ensure_wallet(&self, id: WalletId) {
        let _ = self.insert_wallet(id, None);
    }

    fn replay_credit(
        &self,
        wallet: WalletId,
        currency: CurrencyCode,
        amount: Amount,
    ) -> LedgerResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.ensure_wallet(wallet);
        self.slot(wallet)?.lock()?.credit(currency, amount)
    }

    fn replay_debit(
        &self,
        wallet: WalletId,
        currency: CurrencyCode,
        amount: Amount,
    ) -> LedgerResult<()> {
        if amount.is_zero() {
            return Ok(());
        }
        self.ensure_wallet(wallet);
        self.slot(wallet)?.lock()?.debit(currency, amount)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn crystal() -> CurrencyCode {
        CurrencyCode::new("CRYSTAL").unwrap()
    }

    fn funded_ledger() -> (Ledger, WalletId, WalletId) {
        let ledger = Ledger::new(GameConfig::stock());
        let alice = WalletId(100);
        let bob = WalletId(101);
        ledger.create_wallet(alice, PlayerId(1)).unwrap();
        ledger.create_wallet(bob, PlayerId(2)).unwrap();
        ledger
            .mint(alice, crystal(), Amount::from_whole(1_000), MintReason::Admin)
            .unwrap();
        (ledger, alice, bob)
    }

    #[test]
    fn transfer_splits_tax_exactly() {
        let (ledger, alice, bob) = funded_ledger();
        let gross = Amount::from_whole(100);
        let receipt = ledger
            .transfer(OpKey(1), alice, bob, crystal(), gross, true)
            .unwrap();

        let base = ledger
            .balance(ledger.config().sinks.base_tax_sink, crystal())
            .unwrap();
        let guild = ledger
            .balance(ledger.config().sinks.guild_tax_sink, crystal())
            .unwrap();
        assert_eq!(base, Amount::from_whole(13));
        assert_eq!(guild, Amount::from_whole(2));
        assert_eq!(receipt.net, Amount::from_whole(85));
        assert_eq!(
            ledger.balance(bob, crystal()).unwrap(),
            Amount::from_whole(85)
        );
        assert_eq!(
            ledger.balance(alice, crystal()).unwrap(),
            Amount::from_whole(900)
        );
        // Conservation across the whole ledger.
        assert_eq!(
            ledger.total_held(crystal()).unwrap(),
            ledger.circulating(crystal()).unwrap()
        );
    }

    #[test]
    fn no_guild_context_skips_guild_leg() {
        let (ledger, alice, bob) = funded_ledger();
        let receipt = ledger
            .transfer(OpKey(2), alice, bob, crystal(), Amount::from_whole(100), false)
            .unwrap();
        assert_eq!(receipt.net, Amount::from_whole(87));
        assert!(ledger
            .balance(ledger.config().sinks.guild_tax_sink, crystal())
            .unwrap()
            .is_zero());
    }

    #[test]
    fn duplicate_key_replays_receipt() {
        let (ledger, alice, bob) = funded_ledger();
        let first = ledger
            .transfer(OpKey(3), alice, bob, crystal(), Amount::from_whole(10), false)
            .unwrap();
        let second = ledger
            .transfer(OpKey(3), alice, bob, crystal(), Amount::from_whole(10), false)
            .unwrap();
        assert_eq!(first, second);
        // Only one debit happened.
        assert_eq!(
            ledger.balance(alice, crystal()).unwrap(),
            Amount::from_whole(990)
        );
    }

    #[test]
    fn insufficient_funds_leaves_everything_untouched() {
        let (ledger, alice, bob) = funded_ledger();
        let err = ledger
            .transfer(OpKey(4), alice, bob, crystal(), Amount::from_whole(2_000), false)
            .unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientFunds { .. }));
        assert_eq!(
            ledger.balance(alice, crystal()).unwrap(),
            Amount::from_whole(1_000)
        );
        assert!(ledger.balance(bob, crystal()).unwrap().is_zero());
        assert!(ledger
            .balance(ledger.config().sinks.base_tax_sink, crystal())
            .unwrap()
            .is_zero());
    }

    #[test]
    fn shadow_hold_blocks_debits_not_credits() {
        let (ledger, alice, bob) = funded_ledger();
        ledger.set_hold(alice, Hold::Shadow).unwrap();

        let err = ledger
            .transfer(OpKey(5), alice, bob, crystal(), Amount::from_whole(10), false)
            .unwrap_err();
        assert!(matches!(err, LedgerError::HoldBlocks { .. }));

        // Credits still land on a shadow wallet.
        ledger
            .mint(bob, crystal(), Amount::from_whole(50), MintReason::Admin)
            .unwrap();
        ledger
            .transfer(OpKey(6), bob, alice, crystal(), Amount::from_whole(10), false)
            .unwrap();
        assert!(ledger.balance(alice, crystal()).unwrap() > Amount::from_whole(1_000));
    }

    #[test]
    fn frozen_hold_blocks_both_directions() {
        let (ledger, alice, bob) = funded_ledger();
        ledger.set_hold(bob, Hold::Frozen).unwrap();
        let err = ledger
            .transfer(OpKey(7), alice, bob, crystal(), Amount::from_whole(10), false)
            .unwrap_err();
        assert!(matches!(err, LedgerError::HoldBlocks { wallet, .. } if wallet == bob));
    }

    #[test]
    fn confiscate_bypasses_shadow_hold() {
        let (ledger, alice, _) = funded_ledger();
        ledger.set_hold(alice, Hold::Shadow).unwrap();
        let (_, taken) = ledger.confiscate(alice, crystal(), 1_000).unwrap();
        assert_eq!(taken, Amount::from_whole(100));
        assert_eq!(
            ledger
                .balance(ledger.config().sinks.unclaimed_sink, crystal())
                .unwrap(),
            Amount::from_whole(100)
        );
    }

    #[test]
    fn mint_rejects_past_cap() {
        let ledger = Ledger::new(GameConfig::stock());
        let wallet = WalletId(200);
        ledger.create_wallet(wallet, PlayerId(9)).unwrap();
        ledger
            .mint(
                wallet,
                crystal(),
                Amount::from_whole(100_000_000),
                MintReason::Admin,
            )
            .unwrap();
        let err = ledger
            .mint(wallet, crystal(), Amount::from_raw(1), MintReason::Admin)
            .unwrap_err();
        assert!(matches!(err, LedgerError::SupplyCapExceeded { .. }));
        // Burn frees headroom again.
        ledger.burn(wallet, crystal(), Amount::from_whole(1)).unwrap();
        ledger
            .mint(wallet, crystal(), Amount::from_whole(1), MintReason::Admin)
            .unwrap();
    }

    #[test]
    fn gate_reward_mint_requires_eligibility() {
        let ledger = Ledger::new(GameConfig::stock());
        let wallet = WalletId(300);
        ledger.create_wallet(wallet, PlayerId(3)).unwrap();
        let sol = CurrencyCode::new("SOL").unwrap();
        assert!(ledger
            .mint(wallet, sol, Amount::ONE, MintReason::GateReward)
            .is_err());
        assert!(ledger
            .mint(wallet, crystal(), Amount::ONE, MintReason::GateReward)
            .is_ok());
    }

    #[test]
    fn charge_and_payout_round_trip_through_house() {
        let (ledger, alice, _) = funded_ledger();
        let house = ledger.config().sinks.house;
        ledger
            .charge(OpKey(10), alice, crystal(), Amount::from_whole(100))
            .unwrap();
        assert_eq!(
            ledger.balance(house, crystal()).unwrap(),
            Amount::from_whole(100)
        );
        ledger
            .payout(OpKey(11), alice, crystal(), Amount::from_whole(200))
            .unwrap_err(); // house cannot cover it
        ledger
            .payout(OpKey(12), alice, crystal(), Amount::from_whole(100))
            .unwrap();
        assert_eq!(
            ledger.balance(alice, crystal()).unwrap(),
            Amount::from_whole(1_000)
        );
    }

    #[test]
    fn journaled_ledger_recovers_balances() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");
        {
            let ledger = Ledger::open(GameConfig::stock(), &path).unwrap();
            let alice = WalletId(100);
            let bob = WalletId(101);
            ledger.create_wallet(alice, PlayerId(1)).unwrap();
            ledger.create_wallet(bob, PlayerId(2)).unwrap();
            ledger
                .mint(alice, crystal(), Amount::from_whole(500), MintReason::Admin)
                .unwrap();
            ledger
                .transfer(OpKey(1), alice, bob, crystal(), Amount::from_whole(100), true)
                .unwrap();
            ledger.set_hold(bob, Hold::Shadow).unwrap();
        }
        let recovered = Ledger::open(GameConfig::stock(), &path).unwrap();
        assert_eq!(
            recovered.balance(WalletId(100), crystal()).unwrap(),
            Amount::from_whole(400)
        );
        assert_eq!(
            recovered.balance(WalletId(101), crystal()).unwrap(),
            Amount::from_whole(85)
        );
        assert_eq!(recovered.hold(WalletId(101)).unwrap(), Hold::Shadow);
        assert_eq!(
            recovered.circulating(crystal()).unwrap(),
            Amount::from_whole(500)
        );
        assert_eq!(
            recovered.total_held(crystal()).unwrap(),
            recovered.circulating(crystal()).unwrap()
        );
    }

    #[test]
    fn rejected_journal_append_commits_nothing() {
        use std::sync::atomic::Ordering;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ledger.journal");
        let ledger = Ledger::open(GameConfig::stock(), &path).unwrap();
        let alice = WalletId(100);
        let bob = WalletId(101);
        ledger.create_wallet(alice, PlayerId(1)).unwrap();
        ledger.create_wallet(bob, PlayerId(2)).unwrap();
        ledger
            .mint(alice, crystal(), Amount::from_whole(100), MintReason::Admin)
            .unwrap();

        let journal = ledger.journal.as_ref().unwrap();
        journal.fail_appends.store(true, Ordering::SeqCst);

        assert!(matches!(
            ledger.transfer(OpKey(9), alice, bob, crystal(), Amount::from_whole(40), false),
            Err(LedgerError::Journal(_))
        ));
        assert!(matches!(
            ledger.mint(bob, crystal(), Amount::from_whole(5), MintReason::Admin),
            Err(LedgerError::Journal(_))
        ));
        assert!(matches!(
            ledger.burn(alice, crystal(), Amount::from_whole(5)),
            Err(LedgerError::Journal(_))
        ));

        // Nothing moved, supply unwound, no receipt stored for the key.
        assert_eq!(
            ledger.balance(alice, crystal()).unwrap(),
            Amount::from_whole(100)
        );
        assert_eq!(ledger.balance(bob, crystal()).unwrap(), Amount::ZERO);
        assert_eq!(
            ledger.circulating(crystal()).unwrap(),
            Amount::from_whole(100)
        );

        journal.fail_appends.store(false, Ordering::SeqCst);

        // The same key now commits exactly once.
        let receipt = ledger
            .transfer(OpKey(9), alice, bob, crystal(), Amount::from_whole(40), false)
            .unwrap();
        let replay = ledger
            .transfer(OpKey(9), alice, bob, crystal(), Amount::from_whole(40), false)
            .unwrap();
        assert_eq!(receipt.tx, replay.tx);
        assert_eq!(
            ledger.balance(alice, crystal()).unwrap(),
            Amount::from_whole(60)
        );
        assert_eq!(
            ledger.total_held(crystal()).unwrap(),
            ledger.circulating(crystal()).unwrap()
        );
    }

    #[test]
    fn reload_rejects_cap_below_supply() {
        let (mut ledger, _alice, _bob) = funded_ledger();
        let mut config = GameConfig::stock();
        for spec in &mut config.currencies {
            if spec.symbol == crystal() {
                spec.max_supply = Some(Amount::from_whole(10));
            }
        }
        assert!(matches!(
            ledger.reload(config),
            Err(LedgerError::SupplyCapExceeded { .. })
        ));
    }
}
