//! Status effects.
//!
//! Independent timed effects with per-effect application chances and
//! cure requirements. `Decapitated` is special: it short-circuits the
//! victim to dead for the rest of the session, reversible only through
//! a resurrection capability.

use serde::{Deserialize, Serialize};

/// Everything a skill or beast can inflict.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum StatusEffect {
    /// Damage over time (fire).
    Burn,
    /// Damage over time (toxin).
    Poison,
    /// Skip turns while frozen.
    Frozen,
    /// Reduced damage dealt.
    Feared,
    /// Chance to hit a random target, including allies.
    Confused,
    /// Permanently reduced attack until cured.
    Dismembered,
    /// Immediate death for the session.
    Decapitated,
}

/// What cures an effect.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cure {
    /// Wears off after its duration.
    TimeOnly,
    /// Needs a cure item or healing skill.
    Item,
    /// Only resurrection applies.
    Resurrection,
}

impl StatusEffect {
    /// Base application chance in basis points, rolled per hit that can
    /// inflict the effect.
    #[must_use]
    pub const fn base_chance_bp(self) -> u32 {
        match self {
            Self::Burn | Self::Poison | Self::Frozen => 1_500,
            Self::Feared | Self::Confused => 1_000,
            Self::Dismembered => 500,
            Self::Decapitated => 200,
        }
    }

    /// Default duration in ticks (ignored for `Decapitated`).
    #[must_use]
    pub const fn default_duration(self) -> u32 {
        match self {
            Self::Burn | Self::Poison => 5,
            Self::Frozen => 2,
            Self::Feared | Self::Confused => 3,
            Self::Dismembered => u32::MAX,
            Self::Decapitated => 0,
        }
    }

    /// Damage per tick while active, as a share of the victim's max HP
    /// in basis points.
    #[must_use]
    pub const fn tick_damage_bp(self) -> u32 {
        match self {
            Self::Burn => 300,
            Self::Poison => 200,
            _ => 0,
        }
    }

    /// How the effect is removed.
    #[must_use]
    pub const fn cure(self) -> Cure {
        match self {
            Self::Burn | Self::Frozen | Self::Feared | Self::Confused => Cure::TimeOnly,
            Self::Poison | Self::Dismembered => Cure::Item,
            Self::Decapitated => Cure::Resurrection,
        }
    }

    /// Whether landing this effect immediately kills the victim.
    #[must_use]
    pub const fn is_lethal(self) -> bool {
        matches!(self, Self::Decapitated)
    }
}

/// A live effect on a combatant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStatus {
    /// Which effect.
    pub effect: StatusEffect,
    /// Ticks left before it wears off (only meaningful for
    /// `Cure::TimeOnly` effects).
    pub remaining_ticks: u32,
}

impl ActiveStatus {
    /// Fresh application at the default duration.
    #[must_use]
    pub const fn new(effect: StatusEffect) -> Self {
        Self {
            effect,
            remaining_ticks: effect.default_duration(),
        }
    }

    /// Advances one tick; returns false once the effect should drop.
    pub fn advance(&mut self) -> bool {
        if matches!(self.effect.cure(), Cure::TimeOnly) {
            self.remaining_ticks = self.remaining_ticks.saturating_sub(1);
            self.remaining_ticks > 0
        } else {
            true
        }
    }
}
