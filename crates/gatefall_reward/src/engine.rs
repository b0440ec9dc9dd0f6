//! The reward engine: gacha rolls and the coin-flip game.
//!
//! Ordering contract: the stake is charged through the ledger *before*
//! any randomness is drawn, so an `InsufficientFunds` rejection can
//! never consume a roll. Every completed draw is logged as a
//! [`RewardPull`] carrying the derived seed, which replays the outcome
//! exactly.

use std::collections::HashMap;
use std::sync::Arc;

use gatefall_behavior::{ActivityEvent, BehaviorEngine};
use gatefall_core::{Amount, GachaPoolConfig, GameConfig, PlayerId, PoolId, Tier, WalletId};
use gatefall_ledger::{Ledger, OpKey, Receipt};
use parking_lot::{Mutex, RwLock};
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{RewardError, RewardResult};
use crate::perturb;
use crate::rng::{rng_from_seed, RollSecret};

/// Reserved pool id for the coin-flip game's roll counters and audit
/// records.
pub const COIN_FLIP_POOL: PoolId = PoolId(0);

/// XOR mask deriving the payout idempotency key from the charge key, so
/// one caller-supplied key covers both legs of a winning flip.
const PAYOUT_KEY_MASK: u128 = 1 << 127;

/// XOR mask deriving the stake-refund key from the charge key, used
/// when the house cannot cover a winning payout.
const REFUND_KEY_MASK: u128 = 3 << 126;

/// Audit record for one completed draw. Never mutated after creation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardPull {
    /// Who rolled.
    pub player: PlayerId,
    /// Against which pool ([`COIN_FLIP_POOL`] for flips).
    pub pool: PoolId,
    /// Stake charged.
    pub stake: Amount,
    /// Pity counter before the roll.
    pub pity_before: u32,
    /// Pity counter after the roll.
    pub pity_after: u32,
    /// Resulting tier (`None` for a lost flip).
    pub tier: Option<Tier>,
    /// The derived RNG seed; replaying it reproduces the outcome.
    pub seed: u64,
}

/// Outcome of a gacha roll.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RollOutcome {
    /// Awarded tier.
    pub tier: Tier,
    /// Pity counter before this roll.
    pub pity_before: u32,
    /// Pity counter after this roll.
    pub pity_after: u32,
    /// Whether the pity guarantee forced the tier.
    pub pity_triggered: bool,
    /// Derived RNG seed.
    pub seed: u64,
    /// Ledger receipt for the stake charge.
    pub charge: Receipt,
}

/// Outcome of a coin flip.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FlipOutcome {
    /// Did the player win.
    pub won: bool,
    /// Amount paid out (zero on loss; exactly twice the stake on win).
    pub payout: Amount,
    /// The win probability used, basis points.
    pub win_probability_bp: u32,
    /// Derived RNG seed.
    pub seed: u64,
}

/// Behavior-weighted reward engine.
pub struct RewardEngine {
    config: Arc<RwLock<GameConfig>>,
    ledger: Arc<RwLock<Ledger>>,
    behavior: BehaviorEngine,
    secret: RollSecret,
    counters: Mutex<HashMap<(PlayerId, PoolId), u64>>,
    pity: Mutex<HashMap<(PlayerId, PoolId), u32>>,
    pulls: Mutex<Vec<RewardPull>>,
}

impl RewardEngine {
    /// Wires the engine to its collaborators.
    #[must_use]
    pub fn new(
        config: Arc<RwLock<GameConfig>>,
        ledger: Arc<RwLock<Ledger>>,
        behavior: BehaviorEngine,
        secret: RollSecret,
    ) -> Self {
        Self {
            config,
            ledger,
            behavior,
            secret,
            counters: Mutex::new(HashMap::new()),
            pity: Mutex::new(HashMap::new()),
            pulls: Mutex::new(Vec::new()),
        }
    }

    /// The roll secret, shared with the combat engine so session draws
    /// come from the same key.
    #[must_use]
    pub const fn secret(&self) -> RollSecret {
        self.secret
    }

    /// Current pity counter for a (player, pool) pair.
    #[must_use]
    pub fn pity(&self, player: PlayerId, pool: PoolId) -> u32 {
        self.pity.lock().get(&(player, pool)).copied().unwrap_or(0)
    }

    /// Snapshot of the audit log.
    #[must_use]
    pub fn pulls(&self) -> Vec<RewardPull> {
        self.pulls.lock().clone()
    }

    /// One gacha roll. Charges `stake` from `wallet` (idempotent under
    /// `key`), draws a tier from the pool's behavior-adjusted weights,
    /// and advances the pity counter. The pool's `pity_threshold`-th
    /// consecutive non-top roll is forced into the guaranteed tier.
    ///
    /// # Errors
    ///
    /// [`RewardError::UnknownPool`], or any ledger rejection from the
    /// stake charge (in which case no randomness was drawn).
    pub fn roll(
        &self,
        player: PlayerId,
        wallet: WalletId,
        pool: PoolId,
        stake: Amount,
        key: OpKey,
    ) -> RewardResult<RollOutcome> {
        let (weights_bp, pity_threshold, guaranteed_tier, stake_currency) = {
            let config = self.config.read();
            let spec = Self::pool_spec(&config, pool)?;
            (
                spec.tier_weights_bp,
                spec.pity_threshold,
                spec.guaranteed_tier,
                spec.stake_currency,
            )
        };

        // Stake first; a rejection here must not consume randomness.
        let charge = self
            .ledger
            .read()
            .charge(key, wallet, stake_currency, stake)?;

        let counter = self.next_counter(player, pool);
        let seed = self.secret.pool_roll_seed(player, pool, counter);
        let pity_before = self.pity(player, pool);

        let profile = self.behavior.profile(player);
        let adjusted = perturb::adjust_tier_weights(weights_bp, &profile);

        let pity_triggered = pity_before + 1 >= pity_threshold;
        let tier = if pity_triggered {
            guaranteed_tier
        } else {
            draw_tier(&adjusted, seed)
        };

        let pity_after = if tier.is_top() { 0 } else { pity_before + 1 };
        self.pity.lock().insert((player, pool), pity_after);

        self.behavior.record_event(player, ActivityEvent::GachaPull);
        self.log_pull(RewardPull {
            player,
            pool,
            stake,
            pity_before,
            pity_after,
            tier: Some(tier),
            seed,
        });
        debug!(%player, %pool, ?tier, pity_before, pity_after, seed, "gacha roll");

        Ok(RollOutcome {
            tier,
            pity_before,
            pity_after,
            pity_triggered,
            seed,
            charge,
        })
    }

    /// One coin flip. Charges the stake, draws against the player's
    /// band-clamped win probability, and pays exactly `2 x stake` on a
    /// win.
    ///
    /// # Errors
    ///
    /// [`RewardError::BetOutOfRange`], ledger rejections from the stake
    /// charge, or a ledger rejection if the house cannot cover a win;
    /// in the latter case the stake is handed back before the error
    /// surfaces.
    pub fn coin_flip(
        &self,
        player: PlayerId,
        wallet: WalletId,
        stake: Amount,
        key: OpKey,
    ) -> RewardResult<FlipOutcome> {
        let (currency, min, max, gambling) = {
            let config = self.config.read();
            let g = config.gambling.clone();
            (
                g.currency,
                Amount::from_whole(g.min_bet),
                Amount::from_whole(g.max_bet),
                g,
            )
        };
        if stake < min || stake > max {
            return Err(RewardError::BetOutOfRange { stake, min, max });
        }

        let profile = self.behavior.profile(player);
        let win_probability_bp = perturb::win_probability_bp(&profile, &gambling);

        self.ledger.read().charge(key, wallet, currency, stake)?;

        let counter = self.next_counter(player, COIN_FLIP_POOL);
        let seed = self.secret.pool_roll_seed(player, COIN_FLIP_POOL, counter);
        let mut rng = rng_from_seed(seed);
        let won = rng.gen_range(0..10_000u32) < win_probability_bp;

        let stake_ratio_bp = if max.is_zero() {
            0
        } else {
            u32::try_from(stake.raw().saturating_mul(10_000) / max.raw()).unwrap_or(10_000)
        };
        self.behavior
            .record_event(player, ActivityEvent::BetPlaced { stake_ratio_bp });

        let payout = if won {
            let amount = stake.checked_mul_int(2).ok_or(RewardError::Ledger(
                gatefall_ledger::LedgerError::Overflow,
            ))?;
            let ledger = self.ledger.read();
            if let Err(err) =
                ledger.payout(OpKey(key.0 ^ PAYOUT_KEY_MASK), wallet, currency, amount)
            {
                // The house cannot cover the win. The stake it just took
                // goes back before the error surfaces; the house always
                // holds at least the stake at this point.
                if let Err(refund_err) =
                    ledger.payout(OpKey(key.0 ^ REFUND_KEY_MASK), wallet, currency, stake)
                {
                    warn!(%player, %stake, error = %refund_err, "stake refund failed");
                }
                return Err(err.into());
            }
            drop(ledger);
            self.behavior.record_event(player, ActivityEvent::BetWon);
            amount
        } else {
            Amount::ZERO
        };

        self.log_pull(RewardPull {
            player,
            pool: COIN_FLIP_POOL,
            stake,
            pity_before: 0,
            pity_after: 0,
            tier: None,
            seed,
        });
        debug!(%player, won, %payout, win_probability_bp, seed, "coin flip");

        Ok(FlipOutcome {
            won,
            payout,
            win_probability_bp,
            seed,
        })
    }

    fn pool_spec(config: &GameConfig, pool: PoolId) -> RewardResult<&GachaPoolConfig> {
        config
            .pools
            .iter()
            .find(|p| p.id == pool.0)
            .ok_or(RewardError::UnknownPool(pool))
    }

    fn next_counter(&self, player: PlayerId, pool: PoolId) -> u64 {
        let mut counters = self.counters.lock();
        let counter = counters.entry((player, pool)).or_insert(0);
        *counter += 1;
        *counter
    }

    fn log_pull(&self, pull: RewardPull) {
        self.pulls.lock().push(pull);
    }
}

/// Weighted tier selection from the derived seed.
fn draw_tier(weights_bp: &[u32; 5], seed: u64) -> Tier {
    let total: u64 = weights_bp.iter().map(|&w| u64::from(w)).sum();
    let mut rng = rng_from_seed(seed);
    let mut roll = rng.gen_range(0..total.max(1));
    for (idx, &weight) in weights_bp.iter().enumerate() {
        let weight = u64::from(weight);
        if roll < weight {
            return Tier::ALL[idx];
        }
        roll -= weight;
    }
    Tier::Basic
}

#[cfg(test)]
mod tests {
    use super::*;
    use gatefall_core::CurrencyCode;
    use gatefall_ledger::MintReason;

    fn crystal() -> CurrencyCode {
        CurrencyCode::new("CRYSTAL").unwrap()
    }

    fn engine_with_funds(balance: u64) -> (RewardEngine, PlayerId, WalletId) {
        let config = Arc::new(RwLock::new(GameConfig::stock()));
        let ledger = Arc::new(RwLock::new(Ledger::new(config.read().clone())));
        let player = PlayerId(1);
        let wallet = WalletId(100);
        {
            let l = ledger.read();
            l.create_wallet(wallet, player).unwrap();
            l.mint(wallet, crystal(), Amount::from_whole(balance), MintReason::Admin)
                .unwrap();
        }
        let behavior = BehaviorEngine::spawn(9_000);
        let engine = RewardEngine::new(config, ledger, behavior, RollSecret::test_secret());
        (engine, player, wallet)
    }

    #[test]
    fn roll_charges_stake() {
        let (engine, player, wallet) = engine_with_funds(1_000);
        let outcome = engine
            .roll(player, wallet, PoolId(1), Amount::from_whole(10), OpKey(1))
            .unwrap();
        assert_eq!(outcome.charge.net, Amount::from_whole(10));
        let remaining = engine
            .ledger
            .read()
            .balance(wallet, crystal())
            .unwrap();
        assert_eq!(remaining, Amount::from_whole(990));
    }

    #[test]
    fn insufficient_stake_draws_nothing() {
        let (engine, player, wallet) = engine_with_funds(5);
        let err = engine
            .roll(player, wallet, PoolId(1), Amount::from_whole(10), OpKey(2))
            .unwrap_err();
        assert!(matches!(
            err,
            RewardError::Ledger(gatefall_ledger::LedgerError::InsufficientFunds { .. })
        ));
        assert!(engine.pulls().is_empty());
        assert_eq!(engine.pity(player, PoolId(1)), 0);
    }

    #[test]
    fn unknown_pool_is_rejected_before_charge() {
        let (engine, player, wallet) = engine_with_funds(1_000);
        let err = engine
            .roll(player, wallet, PoolId(99), Amount::from_whole(10), OpKey(3))
            .unwrap_err();
        assert!(matches!(err, RewardError::UnknownPool(_)));
        assert_eq!(
            engine.ledger.read().balance(wallet, crystal()).unwrap(),
            Amount::from_whole(1_000)
        );
    }

    #[test]
    fn pity_counts_misses_and_resets_on_top_hit() {
        let (engine, player, wallet) = engine_with_funds(1_000_000);
        let mut key = 10u128;
        let mut saw_reset = false;
        let mut previous = 0;
        for _ in 0..200 {
            key += 1;
            let outcome = engine
                .roll(player, wallet, PoolId(1), Amount::from_whole(1), OpKey(key))
                .unwrap();
            if outcome.tier.is_top() {
                assert_eq!(outcome.pity_after, 0);
                saw_reset = true;
            } else {
                assert_eq!(outcome.pity_after, outcome.pity_before + 1);
            }
            assert_eq!(outcome.pity_before, previous);
            previous = outcome.pity_after;
        }
        assert!(saw_reset, "200 rolls at 10% top odds should hit at least once");
    }

    #[test]
    fn pity_threshold_forces_guaranteed_tier() {
        let (engine, player, wallet) = engine_with_funds(1_000_000);
        // Neutralize randomness: a pool where the top tiers have zero
        // weight can only reach them through the guarantee.
        {
            let mut config = engine.config.write();
            config.pools[0].tier_weights_bp = [6_000, 3_000, 1_000, 0, 0];
            config.pools[0].pity_threshold = 5;
        }
        let mut key = 1_000u128;
        for expected_pity in 1..=4u32 {
            key += 1;
            let outcome = engine
                .roll(player, wallet, PoolId(1), Amount::from_whole(1), OpKey(key))
                .unwrap();
            assert!(!outcome.tier.is_top());
            assert_eq!(outcome.pity_after, expected_pity);
        }
        key += 1;
        let forced = engine
            .roll(player, wallet, PoolId(1), Amount::from_whole(1), OpKey(key))
            .unwrap();
        assert!(forced.pity_triggered);
        assert_eq!(forced.tier, Tier::Legendary);
        assert_eq!(forced.pity_after, 0);
    }

    #[test]
    fn flip_pays_double_or_nothing() {
        let (engine, player, wallet) = engine_with_funds(1_000_000);
        // Fund the house so wins can be covered.
        {
            let l = engine.ledger.read();
            let house = l.config().sinks.house;
            l.mint(house, crystal(), Amount::from_whole(1_000_000), MintReason::Admin)
                .unwrap();
        }
        let before = engine.ledger.read().balance(wallet, crystal()).unwrap();
        let stake = Amount::from_whole(100);
        let outcome = engine.coin_flip(player, wallet, stake, OpKey(5_000)).unwrap();
        let after = engine.ledger.read().balance(wallet, crystal()).unwrap();
        if outcome.won {
            assert_eq!(outcome.payout, Amount::from_whole(200));
            assert_eq!(after, before.checked_add(stake).unwrap());
        } else {
            assert!(outcome.payout.is_zero());
            assert_eq!(after, before.checked_sub(stake).unwrap());
        }
    }

    #[test]
    fn flip_rejects_out_of_range_bets() {
        let (engine, player, wallet) = engine_with_funds(1_000_000);
        for stake in [Amount::from_whole(99), Amount::from_whole(10_001)] {
            let err = engine.coin_flip(player, wallet, stake, OpKey(6_000)).unwrap_err();
            assert!(matches!(err, RewardError::BetOutOfRange { .. }));
        }
    }

    #[test]
    fn house_shortfall_refunds_the_stake() {
        let (engine, player, wallet) = engine_with_funds(1_000_000);
        let house = engine.ledger.read().config().sinks.house;
        let stake = Amount::from_whole(100);
        let mut key = 9_000u128;
        let mut refunded = false;
        for _ in 0..100 {
            key += 1;
            let before = engine.ledger.read().balance(wallet, crystal()).unwrap();
            match engine.coin_flip(player, wallet, stake, OpKey(key)) {
                Ok(outcome) => {
                    assert!(!outcome.won, "an empty house cannot settle a win");
                    // Keep the house drained so the next win cannot be
                    // covered.
                    let l = engine.ledger.read();
                    let held = l.balance(house, crystal()).unwrap();
                    l.burn(house, crystal(), held).unwrap();
                }
                Err(err) => {
                    assert!(matches!(
                        err,
                        RewardError::Ledger(
                            gatefall_ledger::LedgerError::InsufficientFunds { .. }
                        )
                    ));
                    // The stake came back with the error.
                    let after = engine.ledger.read().balance(wallet, crystal()).unwrap();
                    assert_eq!(after, before);
                    refunded = true;
                    break;
                }
            }
        }
        assert!(refunded, "a win against an empty house should surface within 100 flips");
    }

    #[test]
    fn fairness_band_holds_over_many_flips() {
        let (engine, player, wallet) = engine_with_funds(100_000_000);
        {
            let l = engine.ledger.read();
            let house = l.config().sinks.house;
            // The house cannot mint past the cap; cover payouts from an
            // admin grant instead.
            l.mint(house, crystal(), Amount::from_whole(1), MintReason::Admin)
                .ok();
        }
        let mut wins = 0u32;
        let total = 10_000u32;
        let mut key = 100_000u128;
        for _ in 0..total {
            key += 1;
            // Draw without settling payouts: sample the probability only.
            let profile = engine.behavior.profile(player);
            let p = perturb::win_probability_bp(&profile, &engine.config.read().gambling);
            let counter = engine.next_counter(player, COIN_FLIP_POOL);
            let seed = engine.secret.pool_roll_seed(player, COIN_FLIP_POOL, counter);
            let mut rng = rng_from_seed(seed);
            if rng.gen_range(0..10_000u32) < p {
                wins += 1;
            }
            let _ = (wallet, key);
        }
        let rate_bp = wins * 10_000 / total;
        assert!((4_500..=5_500).contains(&rate_bp), "win rate {rate_bp}bp");
    }
}
