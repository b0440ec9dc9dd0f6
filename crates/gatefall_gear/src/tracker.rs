//! The durability tracker.
//!
//! Each item instance sits behind its own mutex, so concurrent wear
//! from different gates serializes per item without a global lock.
//! Repairs and trades move money through the ledger first; the item
//! state only changes after the payment committed.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gatefall_core::{
    Amount, GameConfig, ItemInstanceId, PlayerId, Tier, WalletId, WearConfig,
};
use gatefall_ledger::{Ledger, OpKey};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use rand_chacha::rand_core::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::error::{GearError, GearResult};
use crate::item::{ItemInstance, ItemTemplate, DURABILITY_FULL};

/// Combat telemetry an item accrued, fed into the wear formula.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct WearInput {
    /// Damage points absorbed or dealt through the item.
    pub damage_taken: u32,
    /// Mana points channeled through the item.
    pub mana_used: u32,
    /// Whole minutes spent inside the gate.
    pub minutes_in_gate: u32,
}

impl WearInput {
    /// Durability loss in milli-percent units under the given weights.
    #[must_use]
    pub fn loss(&self, wear: &WearConfig) -> u32 {
        let loss = u64::from(self.damage_taken) * u64::from(wear.per_damage_point)
            + u64::from(self.mana_used) * u64::from(wear.per_mana_point)
            + u64::from(self.minutes_in_gate) * u64::from(wear.per_minute);
        u32::try_from(loss).unwrap_or(u32::MAX)
    }
}

/// Result of an upgrade attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct UpgradeOutcome {
    /// Whether the level went up.
    pub success: bool,
    /// Fee charged (charged on failure too).
    pub cost: Amount,
    /// Level after the attempt.
    pub level: u32,
}

fn tier_fee_multiplier(tier: Tier) -> u64 {
    match tier {
        Tier::Basic => 1,
        Tier::Intermediate => 2,
        Tier::Excellent => 5,
        Tier::Legendary => 10,
        Tier::Immortal => 25,
    }
}

/// Equipment and durability tracker.
pub struct GearTracker {
    config: Arc<RwLock<GameConfig>>,
    ledger: Arc<RwLock<Ledger>>,
    items: RwLock<HashMap<ItemInstanceId, Arc<Mutex<ItemInstance>>>>,
    next_id: AtomicU64,
}

impl GearTracker {
    /// Wires the tracker to the shared configuration and ledger.
    #[must_use]
    pub fn new(config: Arc<RwLock<GameConfig>>, ledger: Arc<RwLock<Ledger>>) -> Self {
        Self {
            config,
            ledger,
            items: RwLock::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }
    }

    /// Creates a fresh instance of a template for a player, at full
    /// durability.
    pub fn grant(
        &self,
        template: ItemTemplate,
        owner: PlayerId,
        owner_wallet: WalletId,
    ) -> ItemInstanceId {
        let id = ItemInstanceId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let instance = ItemInstance {
            id,
            template,
            owner,
            owner_wallet,
            durability: DURABILITY_FULL,
            level: 0,
        };
        self.items.write().insert(id, Arc::new(Mutex::new(instance)));
        id
    }

    fn slot(&self, id: ItemInstanceId) -> GearResult<Arc<Mutex<ItemInstance>>> {
        self.items
            .read()
            .get(&id)
            .cloned()
            .ok_or(GearError::UnknownItem(id))
    }

    /// Snapshot of an instance.
    ///
    /// # Errors
    ///
    /// [`GearError::UnknownItem`].
    pub fn get(&self, id: ItemInstanceId) -> GearResult<ItemInstance> {
        Ok(self.slot(id)?.lock().clone())
    }

    /// All instances owned by a player.
    #[must_use]
    pub fn owned_by(&self, owner: PlayerId) -> Vec<ItemInstance> {
        self.items
            .read()
            .values()
            .map(|slot| slot.lock().clone())
            .filter(|item| item.owner == owner)
            .collect()
    }

    /// Applies combat wear to an item. Durability floors at zero; the
    /// item is then broken until repaired. Returns remaining durability
    /// in milli-percent units.
    ///
    /// # Errors
    ///
    /// [`GearError::UnknownItem`].
    pub fn apply_wear(&self, id: ItemInstanceId, input: WearInput) -> GearResult<u32> {
        let wear = self.config.read().wear;
        let loss = input.loss(&wear);
        let slot = self.slot(id)?;
        let mut item = slot.lock();
        item.durability = item.durability.saturating_sub(loss);
        debug!(%id, loss, remaining = item.durability, "wear applied");
        Ok(item.durability)
    }

    /// Repairs an item to full durability. The fee is the missing
    /// durability (in centipercent) times the configured price, charged
    /// to the payer through the ledger before the durability resets.
    /// Repairing an undamaged item is free and a no-op.
    ///
    /// # Errors
    ///
    /// [`GearError::UnknownItem`], [`GearError::NotOwner`], ledger
    /// rejections on the fee.
    pub fn repair(
        &self,
        id: ItemInstanceId,
        payer: PlayerId,
        payer_wallet: WalletId,
        key: OpKey,
    ) -> GearResult<Amount> {
        let wear = self.config.read().wear;
        let slot = self.slot(id)?;
        let mut item = slot.lock();
        if item.owner != payer {
            return Err(GearError::NotOwner(id));
        }
        let missing_cp = item.missing_cp();
        if missing_cp == 0 {
            return Ok(Amount::ZERO);
        }
        let cost = wear
            .repair_price_per_cp
            .checked_mul_int(u64::from(missing_cp))
            .ok_or(GearError::Ledger(gatefall_ledger::LedgerError::Overflow))?;
        self.ledger
            .read()
            .charge(key, payer_wallet, wear.repair_currency, cost)?;
        item.durability = DURABILITY_FULL;
        debug!(%id, %cost, "repaired");
        Ok(cost)
    }

    /// Attempts a level upgrade. The fee (`100 * (level + 1)` whole
    /// units scaled by the item tier, in the repair currency) is charged
    /// win or lose; success is drawn from the caller-supplied seed and
    /// probability so the draw replays for audits. Broken items must be
    /// repaired first.
    ///
    /// # Errors
    ///
    /// [`GearError::NotOwner`], [`GearError::Broken`], ledger
    /// rejections on the fee.
    pub fn upgrade(
        &self,
        id: ItemInstanceId,
        payer: PlayerId,
        payer_wallet: WalletId,
        success_bp: u32,
        seed: u64,
        key: OpKey,
    ) -> GearResult<UpgradeOutcome> {
        let wear = self.config.read().wear;
        let slot = self.slot(id)?;
        let mut item = slot.lock();
        if item.owner != payer {
            return Err(GearError::NotOwner(id));
        }
        if item.is_broken() {
            return Err(GearError::Broken(id));
        }
        let cost = Amount::from_whole(
            100u64
                .saturating_mul(u64::from(item.level) + 1)
                .saturating_mul(tier_fee_multiplier(item.template.tier)),
        );
        self.ledger
            .read()
            .charge(key, payer_wallet, wear.repair_currency, cost)?;
        let success = ChaCha8Rng::seed_from_u64(seed).gen_range(0..10_000u32) < success_bp;
        if success {
            item.level += 1;
        }
        debug!(%id, success, %cost, level = item.level, "upgrade attempted");
        Ok(UpgradeOutcome {
            success,
            cost,
            level: item.level,
        })
    }

    /// Reassigns ownership without payment. Used by the combat engine
    /// for death drops claimed by survivors and for routing unclaimed
    /// drops to the system account.
    ///
    /// # Errors
    ///
    /// [`GearError::UnknownItem`].
    pub fn reassign(
        &self,
        id: ItemInstanceId,
        new_owner: PlayerId,
        new_wallet: WalletId,
    ) -> GearResult<()> {
        let slot = self.slot(id)?;
        let mut item = slot.lock();
        item.owner = new_owner;
        item.owner_wallet = new_wallet;
        Ok(())
    }

    /// Trades an item: the buyer pays the (taxed) price and ownership
    /// moves in the same operation. The item lock is held across the
    /// payment so no concurrent wear or second trade can interleave.
    ///
    /// # Errors
    ///
    /// [`GearError::NotOwner`] if the seller does not own the item;
    /// ledger rejections on payment.
    pub fn trade(
        &self,
        id: ItemInstanceId,
        seller: PlayerId,
        buyer: PlayerId,
        buyer_wallet: WalletId,
        price: Amount,
        currency: gatefall_core::CurrencyCode,
        guild_context: bool,
        key: OpKey,
    ) -> GearResult<()> {
        let slot = self.slot(id)?;
        let mut item = slot.lock();
        if item.owner != seller {
            return Err(GearError::NotOwner(id));
        }
        let seller_wallet = item.owner_wallet;
        self.ledger.read().transfer(
            key,
            buyer_wallet,
            seller_wallet,
            currency,
            price,
            guild_context,
        )?;
        item.owner = buyer;
        item.owner_wallet = buyer_wallet;
        debug!(%id, %seller, %buyer, %price, "traded");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::{ItemKind, UNITS_PER_CP};
    use gatefall_core::{CurrencyCode, Element, Tier};
    use gatefall_ledger::MintReason;

    fn crystal() -> CurrencyCode {
        CurrencyCode::new("CRYSTAL").unwrap()
    }

    fn sword() -> ItemTemplate {
        ItemTemplate {
            name: "Iron Sword".to_string(),
            kind: ItemKind::Weapon,
            tier: Tier::Basic,
            element: Element::Neutral,
            attack: 10,
            defense: 0,
        }
    }

    fn tracker_with_wallet() -> (GearTracker, PlayerId, WalletId) {
        let config = Arc::new(RwLock::new(GameConfig::stock()));
        let ledger = Arc::new(RwLock::new(Ledger::new(config.read().clone())));
        let player = PlayerId(1);
        let wallet = WalletId(100);
        {
            let l = ledger.read();
            l.create_wallet(wallet, player).unwrap();
            l.mint(wallet, crystal(), Amount::from_whole(10_000), MintReason::Admin)
                .unwrap();
        }
        (GearTracker::new(config, ledger), player, wallet)
    }

    #[test]
    fn wear_formula_matches_weights() {
        let (tracker, player, wallet) = tracker_with_wallet();
        let id = tracker.grant(sword(), player, wallet);
        // 100 damage * 10 + 200 mana * 5 + 10 min * 100 = 3000 units = 3%.
        let remaining = tracker
            .apply_wear(
                id,
                WearInput {
                    damage_taken: 100,
                    mana_used: 200,
                    minutes_in_gate: 10,
                },
            )
            .unwrap();
        assert_eq!(remaining, DURABILITY_FULL - 3_000);
        assert_eq!(tracker.get(id).unwrap().durability_percent(), 97);
    }

    #[test]
    fn durability_floors_at_zero_and_breaks() {
        let (tracker, player, wallet) = tracker_with_wallet();
        let id = tracker.grant(sword(), player, wallet);
        tracker
            .apply_wear(
                id,
                WearInput {
                    damage_taken: u32::MAX,
                    ..WearInput::default()
                },
            )
            .unwrap();
        let item = tracker.get(id).unwrap();
        assert!(item.is_broken());
        assert_eq!(item.durability, 0);
    }

    #[test]
    fn repair_charges_by_missing_durability() {
        let (tracker, player, wallet) = tracker_with_wallet();
        let id = tracker.grant(sword(), player, wallet);
        tracker
            .apply_wear(
                id,
                WearInput {
                    minutes_in_gate: 10, // 1000 units = 100 cp
                    ..WearInput::default()
                },
            )
            .unwrap();
        let cost = tracker.repair(id, player, wallet, OpKey(1)).unwrap();
        let price_per_cp = GameConfig::stock().wear.repair_price_per_cp;
        assert_eq!(cost, price_per_cp.checked_mul_int(100).unwrap());
        assert_eq!(tracker.get(id).unwrap().durability, DURABILITY_FULL);

        // Second repair is free.
        let again = tracker.repair(id, player, wallet, OpKey(2)).unwrap();
        assert!(again.is_zero());
    }

    #[test]
    fn repair_fails_without_funds_and_leaves_item_broken() {
        let (tracker, player, _wallet) = tracker_with_wallet();
        let poor = WalletId(200);
        tracker
            .ledger
            .read()
            .create_wallet(poor, PlayerId(2))
            .unwrap();
        let id = tracker.grant(sword(), PlayerId(2), poor);
        tracker
            .apply_wear(
                id,
                WearInput {
                    damage_taken: 100_000,
                    ..WearInput::default()
                },
            )
            .unwrap();
        let err = tracker.repair(id, PlayerId(2), poor, OpKey(3)).unwrap_err();
        assert!(matches!(err, GearError::Ledger(_)));
        assert!(tracker.get(id).unwrap().is_broken());
    }

    #[test]
    fn upgrade_charges_win_or_lose_and_blocks_broken_items() {
        let (tracker, player, wallet) = tracker_with_wallet();
        let id = tracker.grant(sword(), player, wallet);

        // A guaranteed success: level goes up, fee = 100 * (0+1) * 1.
        let outcome = tracker
            .upgrade(id, player, wallet, 10_000, 7, OpKey(20))
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.cost, Amount::from_whole(100));
        assert_eq!(outcome.level, 1);

        // A guaranteed failure still charges, now 100 * (1+1) * 1.
        let outcome = tracker
            .upgrade(id, player, wallet, 0, 7, OpKey(21))
            .unwrap();
        assert!(!outcome.success);
        assert_eq!(outcome.cost, Amount::from_whole(200));
        assert_eq!(outcome.level, 1);
        assert_eq!(
            tracker.ledger.read().balance(wallet, crystal()).unwrap(),
            Amount::from_whole(9_700)
        );

        tracker
            .apply_wear(
                id,
                WearInput {
                    damage_taken: u32::MAX,
                    ..WearInput::default()
                },
            )
            .unwrap();
        let err = tracker
            .upgrade(id, player, wallet, 10_000, 7, OpKey(22))
            .unwrap_err();
        assert!(matches!(err, GearError::Broken(_)));
    }

    #[test]
    fn trade_moves_ownership_with_payment() {
        let (tracker, seller, seller_wallet) = tracker_with_wallet();
        let buyer = PlayerId(2);
        let buyer_wallet = WalletId(200);
        {
            let l = tracker.ledger.read();
            l.create_wallet(buyer_wallet, buyer).unwrap();
            l.mint(buyer_wallet, crystal(), Amount::from_whole(500), MintReason::Admin)
                .unwrap();
        }
        let id = tracker.grant(sword(), seller, seller_wallet);
        tracker
            .trade(
                id,
                seller,
                buyer,
                buyer_wallet,
                Amount::from_whole(100),
                crystal(),
                false,
                OpKey(9),
            )
            .unwrap();
        let item = tracker.get(id).unwrap();
        assert_eq!(item.owner, buyer);
        assert_eq!(item.owner_wallet, buyer_wallet);
        // Seller received net of the 13% base tax.
        let seller_balance = tracker
            .ledger
            .read()
            .balance(seller_wallet, crystal())
            .unwrap();
        assert_eq!(seller_balance, Amount::from_whole(10_087));
    }

    #[test]
    fn trade_by_non_owner_is_rejected() {
        let (tracker, seller, seller_wallet) = tracker_with_wallet();
        let id = tracker.grant(sword(), seller, seller_wallet);
        let err = tracker
            .trade(
                id,
                PlayerId(99),
                PlayerId(2),
                WalletId(200),
                Amount::from_whole(1),
                crystal(),
                false,
                OpKey(10),
            )
            .unwrap_err();
        assert!(matches!(err, GearError::NotOwner(_)));
    }

    #[test]
    fn units_per_cp_consistency() {
        assert_eq!(DURABILITY_FULL / UNITS_PER_CP, 10_000);
    }
}
