//! # Game Configuration
//!
//! All balance data lives in external TOML files: currency specs, gate
//! grade tables, the element dominance table, loot/gacha tier tables,
//! gambling limits, durability wear weights, and combat tuning.
//!
//! Loaded once at process start; the facade crate revalidates and swaps a
//! fresh snapshot on administrative reload. Validation enforces the
//! registry invariants (e.g. a new `max_supply` must cover the currency's
//! `current_supply`) before any engine sees the new values.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::amount::Amount;
use crate::error::{ConfigError, ConfigResult};
use crate::ids::{CurrencyCode, WalletId};
use crate::types::{Element, GateGrade, Tier};

/// Declarative description of one currency.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CurrencySpec {
    /// Symbol, at most 8 ASCII alphanumerics.
    pub symbol: CurrencyCode,
    /// True for currencies settled on an external chain; the ledger only
    /// records an opaque settlement reference for these.
    #[serde(default)]
    pub is_externally_settled: bool,
    /// Hard supply cap. `None` = unlimited.
    #[serde(default)]
    pub max_supply: Option<Amount>,
    /// Whether gates may mint this currency as a reward.
    #[serde(default)]
    pub gate_reward_eligible: bool,
    /// Base transfer tax in basis points (1300 = 13%).
    #[serde(default = "default_base_tax_bp")]
    pub base_tax_bp: u32,
    /// Additional guild tax in basis points, charged on top of the base
    /// tax when either party acts in a guild context (additive, not
    /// compounding).
    #[serde(default = "default_guild_tax_bp")]
    pub guild_tax_bp: u32,
}

const fn default_base_tax_bp() -> u32 {
    1_300
}

const fn default_guild_tax_bp() -> u32 {
    200
}

/// Well-known system wallets.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SinkConfig {
    /// Receives base-tax legs and any rounding remainder.
    pub base_tax_sink: WalletId,
    /// Receives guild-tax legs.
    pub guild_tax_sink: WalletId,
    /// Receives unclaimed death drops and confiscations.
    pub unclaimed_sink: WalletId,
    /// The gambling/gacha house wallet: stakes flow in, payouts flow out.
    pub house: WalletId,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            base_tax_sink: WalletId(1),
            guild_tax_sink: WalletId(2),
            unclaimed_sink: WalletId(3),
            house: WalletId(4),
        }
    }
}

/// Per-grade gate tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateGradeSpec {
    /// The grade this row describes.
    pub grade: GateGrade,
    /// Minimum hunter level to enter.
    pub min_level: u32,
    /// Beast level ceiling.
    pub max_level: u32,
    /// Crystal reward range (whole crystals).
    pub crystal_min: u64,
    /// Crystal reward range (whole crystals).
    pub crystal_max: u64,
    /// Beast count range per instance.
    pub beasts_min: u32,
    /// Beast count range per instance.
    pub beasts_max: u32,
    /// Wall-clock time limit for the session, in seconds.
    pub time_limit_secs: u64,
    /// Re-entry cooldown per player, in seconds.
    pub cooldown_secs: u64,
}

impl GateGradeSpec {
    fn defaults() -> Vec<Self> {
        GateGrade::ALL
            .iter()
            .map(|&grade| {
                let (crystal_min, crystal_max) = grade.default_crystal_range();
                let idx = grade as u32;
                Self {
                    grade,
                    min_level: [1, 10, 20, 35, 50, 70, 120][idx as usize],
                    max_level: [10, 20, 35, 50, 70, 120, 999][idx as usize],
                    crystal_min,
                    crystal_max,
                    beasts_min: 2 + idx,
                    beasts_max: 5 + idx,
                    time_limit_secs: 900 + u64::from(idx) * 300,
                    cooldown_secs: 300 + u64::from(idx) * 120,
                }
            })
            .collect()
    }
}

/// One entry in the partial element table: how much damage `attacker`
/// deals into `defender`, in basis points (10000 = unmodified).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementPairRule {
    /// Attacking element.
    pub attacker: Element,
    /// Defending element.
    pub defender: Element,
    /// Damage modifier in basis points.
    pub modifier_bp: u32,
}

/// A configured reward pool (gacha banner or loot table).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GachaPoolConfig {
    /// Pool identifier.
    pub id: u64,
    /// Human-readable name.
    pub name: String,
    /// Currency the stake is charged in.
    pub stake_currency: CurrencyCode,
    /// Tier weights in basis points, indexed by [`Tier`] discriminant.
    /// Must sum to 10000.
    pub tier_weights_bp: [u32; 5],
    /// Rolls below the top two tiers before the guarantee triggers.
    pub pity_threshold: u32,
    /// Tier awarded when the pity guarantee triggers.
    pub guaranteed_tier: Tier,
}

impl GachaPoolConfig {
    fn defaults(stake_currency: CurrencyCode) -> Vec<Self> {
        vec![Self {
            id: 1,
            name: "Standard Summon".to_string(),
            stake_currency,
            tier_weights_bp: [4_500, 3_000, 1_500, 800, 200],
            pity_threshold: 90,
            guaranteed_tier: Tier::Legendary,
        }]
    }
}

/// Coin-flip gambling tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamblingConfig {
    /// Currency bets are placed in.
    pub currency: CurrencyCode,
    /// Minimum stake (whole units).
    pub min_bet: u64,
    /// Maximum stake (whole units).
    pub max_bet: u64,
    /// Lower bound of the allowed win probability, in basis points.
    pub fairness_floor_bp: u32,
    /// Upper bound of the allowed win probability, in basis points.
    pub fairness_ceil_bp: u32,
}

/// Durability wear weights, in milli-centipercent of max durability
/// (10 = 1 centipercent = 0.01%).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WearConfig {
    /// Loss per point of damage taken (default 0.01%).
    pub per_damage_point: u32,
    /// Loss per point of mana spent (default 0.005%).
    pub per_mana_point: u32,
    /// Loss per minute inside a gate (default 0.1%).
    pub per_minute: u32,
    /// Repair price per missing centipercent, in raw currency units.
    pub repair_price_per_cp: Amount,
    /// Currency repairs are paid in.
    pub repair_currency: CurrencyCode,
}

/// Combat resolution tuning.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CombatConfig {
    /// Critical hit chance in basis points (2000 = 20%).
    pub crit_chance_bp: u32,
    /// Critical hit damage bonus in basis points (5000 = +50%).
    pub crit_bonus_bp: u32,
    /// Damage modifier for an element attacking one it dominates.
    pub element_advantage_bp: u32,
    /// Damage modifier for an element attacking one that dominates it.
    pub element_disadvantage_bp: u32,
    /// Holy<->Shadow mutual modifier (maximal weakness both ways).
    pub holy_shadow_bp: u32,
    /// Currency share confiscated on death, in basis points.
    pub death_penalty_bp: u32,
    /// Inventory share dropped on death, in basis points.
    pub death_drop_bp: u32,
    /// Solo reward bonus in basis points (20000 = x2).
    pub solo_bonus_bp: u32,
    /// Party reward multiplier per party size, basis points; index 0 is
    /// solo, the last entry covers larger parties.
    pub party_multiplier_bp: Vec<u32>,
    /// Maximum party size.
    pub max_party_size: usize,
    /// Automatic tick interval in milliseconds.
    pub tick_interval_ms: u64,
    /// Watchdog: sessions with no tick progress for this long fail.
    pub watchdog_timeout_ms: u64,
    /// How long a terminal session accepts death-drop claims before its
    /// leftovers route to the unclaimed sink.
    pub claim_window_ms: u64,
}

impl Default for CombatConfig {
    fn default() -> Self {
        Self {
            crit_chance_bp: 2_000,
            crit_bonus_bp: 5_000,
            element_advantage_bp: 12_500,
            element_disadvantage_bp: 8_000,
            holy_shadow_bp: 15_000,
            death_penalty_bp: 1_000,
            death_drop_bp: 2_500,
            solo_bonus_bp: 20_000,
            party_multiplier_bp: vec![10_000, 6_000, 4_000, 3_000, 2_500],
            max_party_size: 5,
            tick_interval_ms: 1_000,
            watchdog_timeout_ms: 30_000,
            claim_window_ms: 60_000,
        }
    }
}

/// Behavior scoring tuning.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorConfig {
    /// Exponential decay factor in basis points (9000 = keep 90% of the
    /// old score per event).
    pub decay_bp: u32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self { decay_bp: 9_000 }
    }
}

/// The complete persisted configuration surface.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GameConfig {
    /// All registered currencies.
    pub currencies: Vec<CurrencySpec>,
    /// System sink wallets.
    #[serde(default)]
    pub sinks: SinkConfig,
    /// Gate grade table.
    #[serde(default = "GateGradeSpec::defaults")]
    pub gates: Vec<GateGradeSpec>,
    /// Partial element dominance table; pairs not listed fall back to the
    /// advantage/disadvantage defaults in [`CombatConfig`].
    #[serde(default)]
    pub elements: Vec<ElementPairRule>,
    /// Reward pools.
    #[serde(default)]
    pub pools: Vec<GachaPoolConfig>,
    /// Gambling limits and fairness band.
    pub gambling: GamblingConfig,
    /// Durability wear weights.
    pub wear: WearConfig,
    /// Combat tuning.
    #[serde(default)]
    pub combat: CombatConfig,
    /// Behavior scoring tuning.
    #[serde(default)]
    pub behavior: BehaviorConfig,
}

impl GameConfig {
    /// Parses a TOML document and validates it.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] on parse failure or invariant violation.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self =
            toml::from_str(text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// The stock configuration: SOL + EXON (externally settled) and
    /// CRYSTAL (off-chain, gate-reward eligible, 100M cap), with the
    /// default tuning everywhere else.
    #[must_use]
    pub fn stock() -> Self {
        let crystal = CurrencyCode::from_raw(*b"CRYSTAL\0");
        let config = Self {
            currencies: vec![
                CurrencySpec {
                    symbol: CurrencyCode::from_raw(*b"SOL\0\0\0\0\0"),
                    is_externally_settled: true,
                    max_supply: Some(Amount::from_whole(100_000_000)),
                    gate_reward_eligible: false,
                    base_tax_bp: 1_300,
                    guild_tax_bp: 200,
                },
                CurrencySpec {
                    symbol: CurrencyCode::from_raw(*b"EXON\0\0\0\0"),
                    is_externally_settled: true,
                    max_supply: Some(Amount::from_whole(100_000_000)),
                    gate_reward_eligible: false,
                    base_tax_bp: 1_300,
                    guild_tax_bp: 200,
                },
                CurrencySpec {
                    symbol: crystal,
                    is_externally_settled: false,
                    max_supply: Some(Amount::from_whole(100_000_000)),
                    gate_reward_eligible: true,
                    base_tax_bp: 1_300,
                    guild_tax_bp: 200,
                },
            ],
            sinks: SinkConfig::default(),
            gates: GateGradeSpec::defaults(),
            elements: Vec::new(),
            pools: GachaPoolConfig::defaults(crystal),
            gambling: GamblingConfig {
                currency: crystal,
                min_bet: 100,
                max_bet: 10_000,
                fairness_floor_bp: 4_500,
                fairness_ceil_bp: 5_500,
            },
            wear: WearConfig {
                per_damage_point: 10,
                per_mana_point: 5,
                per_minute: 100,
                repair_price_per_cp: Amount::from_raw(100_000_000), // 0.1 crystal per 0.01%
                repair_currency: crystal,
            },
            combat: CombatConfig::default(),
            behavior: BehaviorConfig::default(),
        };
        debug_assert!(config.validate().is_ok());
        config
    }

    /// Returns the spec for a currency, if registered.
    #[must_use]
    pub fn currency(&self, code: CurrencyCode) -> Option<&CurrencySpec> {
        self.currencies.iter().find(|c| c.symbol == code)
    }

    /// Returns the grade row for a gate grade.
    #[must_use]
    pub fn gate(&self, grade: GateGrade) -> Option<&GateGradeSpec> {
        self.gates.iter().find(|g| g.grade == grade)
    }

    /// Party reward multiplier for a party of `size`, in basis points.
    #[must_use]
    pub fn party_multiplier_bp(&self, size: usize) -> u32 {
        let table = &self.combat.party_multiplier_bp;
        if table.is_empty() {
            return 10_000;
        }
        let idx = size.saturating_sub(1).min(table.len() - 1);
        table[idx]
    }

    /// Validates every invariant the engines rely on.
    ///
    /// # Errors
    ///
    /// Returns the first violated invariant.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.currencies.is_empty() {
            return Err(ConfigError::OutOfRange {
                field: "currencies",
                detail: "at least one currency is required".to_string(),
            });
        }
        for spec in &self.currencies {
            if spec.base_tax_bp + spec.guild_tax_bp >= 10_000 {
                return Err(ConfigError::InvalidCurrency {
                    symbol: spec.symbol.as_str().to_string(),
                    reason: "combined tax rate must stay below 100%".to_string(),
                });
            }
        }
        if self.gambling.fairness_floor_bp > self.gambling.fairness_ceil_bp
            || self.gambling.fairness_ceil_bp > 10_000
            || !(self.gambling.fairness_floor_bp..=self.gambling.fairness_ceil_bp)
                .contains(&5_000)
        {
            return Err(ConfigError::OutOfRange {
                field: "gambling.fairness_band",
                detail: "band must be within [0, 10000] and contain 5000".to_string(),
            });
        }
        if self.gambling.min_bet == 0 || self.gambling.min_bet > self.gambling.max_bet {
            return Err(ConfigError::OutOfRange {
                field: "gambling.bets",
                detail: "0 < min_bet <= max_bet required".to_string(),
            });
        }
        for pool in &self.pools {
            let total: u32 = pool.tier_weights_bp.iter().sum();
            if total != 10_000 {
                return Err(ConfigError::OutOfRange {
                    field: "pools.tier_weights_bp",
                    detail: format!("pool {} weights sum to {total}, expected 10000", pool.id),
                });
            }
            if pool.pity_threshold == 0 {
                return Err(ConfigError::OutOfRange {
                    field: "pools.pity_threshold",
                    detail: format!("pool {} pity threshold must be positive", pool.id),
                });
            }
            if !pool.guaranteed_tier.is_top() {
                return Err(ConfigError::OutOfRange {
                    field: "pools.guaranteed_tier",
                    detail: format!("pool {} guarantee must be a top tier", pool.id),
                });
            }
            if self.currency(pool.stake_currency).is_none() {
                return Err(ConfigError::InvalidCurrency {
                    symbol: pool.stake_currency.as_str().to_string(),
                    reason: format!("pool {} stakes an unregistered currency", pool.id),
                });
            }
        }
        for rule in &self.elements {
            if rule.modifier_bp == 0 || rule.modifier_bp > 30_000 {
                return Err(ConfigError::OutOfRange {
                    field: "elements.modifier_bp",
                    detail: format!(
                        "{:?} vs {:?} modifier {} outside (0, 30000]",
                        rule.attacker, rule.defender, rule.modifier_bp
                    ),
                });
            }
        }
        let mut grades_seen: HashMap<GateGrade, ()> = HashMap::new();
        for gate in &self.gates {
            if grades_seen.insert(gate.grade, ()).is_some() {
                return Err(ConfigError::OutOfRange {
                    field: "gates",
                    detail: format!("duplicate grade row {:?}", gate.grade),
                });
            }
            if gate.crystal_min > gate.crystal_max
                || gate.beasts_min == 0
                || gate.beasts_min > gate.beasts_max
            {
                return Err(ConfigError::OutOfRange {
                    field: "gates",
                    detail: format!("grade {:?} has an inverted range", gate.grade),
                });
            }
        }
        if self.combat.max_party_size == 0 {
            return Err(ConfigError::OutOfRange {
                field: "combat.max_party_size",
                detail: "must be at least 1".to_string(),
            });
        }
        if self.behavior.decay_bp >= 10_000 {
            return Err(ConfigError::OutOfRange {
                field: "behavior.decay_bp",
                detail: "decay must be below 10000".to_string(),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stock_config_is_valid() {
        let config = GameConfig::stock();
        assert!(config.validate().is_ok());
        assert_eq!(config.currencies.len(), 3);
        let crystal = config
            .currency(CurrencyCode::new("CRYSTAL").unwrap())
            .unwrap();
        assert!(crystal.gate_reward_eligible);
        assert_eq!(crystal.max_supply, Some(Amount::from_whole(100_000_000)));
    }

    #[test]
    fn toml_roundtrip() {
        let config = GameConfig::stock();
        let text = toml::to_string(&config).unwrap();
        let parsed = GameConfig::from_toml_str(&text).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn rejects_bad_fairness_band() {
        let mut config = GameConfig::stock();
        config.gambling.fairness_floor_bp = 5_600;
        config.gambling.fairness_ceil_bp = 6_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_weight_sum_mismatch() {
        let mut config = GameConfig::stock();
        config.pools[0].tier_weights_bp = [5_000, 3_000, 1_500, 800, 200];
        assert!(config.validate().is_err());
    }

    #[test]
    fn party_multiplier_clamps_to_table_tail() {
        let config = GameConfig::stock();
        assert_eq!(config.party_multiplier_bp(1), 10_000);
        assert_eq!(config.party_multiplier_bp(2), 6_000);
        assert_eq!(config.party_multiplier_bp(9), 2_500);
    }
}
