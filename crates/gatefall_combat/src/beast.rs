//! Magic beasts: the opposition inside a gate.

use gatefall_core::{BeastTier, Element, GateGradeSpec};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

use crate::status::{ActiveStatus, StatusEffect};

/// One spawned beast instance.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Beast {
    /// Spawn index within the session.
    pub index: u32,
    /// Power tier.
    pub tier: BeastTier,
    /// Level within the gate's range.
    pub level: u32,
    /// Elemental affinity.
    pub element: Element,
    /// Remaining hit points.
    pub hp: u32,
    /// Hit points at spawn, the base for damage-over-time effects.
    pub max_hp: u32,
    /// Attack stat.
    pub attack: u32,
    /// Effects hunters have landed on it.
    pub statuses: Vec<ActiveStatus>,
}

impl Beast {
    /// Statuses this tier can inflict on hit.
    #[must_use]
    pub fn inflictable(&self) -> &'static [StatusEffect] {
        match self.tier {
            BeastTier::Normal => &[
                StatusEffect::Burn,
                StatusEffect::Poison,
                StatusEffect::Frozen,
            ],
            BeastTier::Elite => &[
                StatusEffect::Burn,
                StatusEffect::Poison,
                StatusEffect::Frozen,
                StatusEffect::Feared,
            ],
            BeastTier::Boss => &[
                StatusEffect::Poison,
                StatusEffect::Feared,
                StatusEffect::Confused,
                StatusEffect::Dismembered,
            ],
            BeastTier::Monarch => &[
                StatusEffect::Feared,
                StatusEffect::Confused,
                StatusEffect::Dismembered,
                StatusEffect::Decapitated,
            ],
        }
    }

    /// Whether the beast still fights.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.hp > 0
    }

    /// Whether a status is currently active.
    #[must_use]
    pub fn has_status(&self, effect: StatusEffect) -> bool {
        self.statuses.iter().any(|s| s.effect == effect)
    }

    /// Whether the beast swings back this round.
    #[must_use]
    pub fn can_act(&self) -> bool {
        self.is_alive() && !self.has_status(StatusEffect::Frozen)
    }
}

const SPAWN_ELEMENTS: [Element; 6] = [
    Element::Fire,
    Element::Water,
    Element::Wind,
    Element::Earth,
    Element::Neutral,
    Element::Shadow,
];

/// Rolls the beast roster for a session from the gate's grade spec.
/// The last spawn of an A-grade-or-higher gate is upgraded to a boss;
/// Monarch gates end in a monarch.
#[must_use]
pub fn spawn_roster(spec: &GateGradeSpec, rng: &mut ChaCha8Rng) -> Vec<Beast> {
    let count = rng.gen_range(spec.beasts_min..=spec.beasts_max.max(spec.beasts_min));
    let mut roster = Vec::with_capacity(count as usize);
    for index in 0..count {
        let level = rng.gen_range(spec.min_level..=spec.max_level.max(spec.min_level));
        let is_last = index + 1 == count;
        let tier = match (is_last, spec.grade as u32) {
            (true, 6) => BeastTier::Monarch,
            (true, g) if g >= 4 => BeastTier::Boss,
            _ if rng.gen_range(0..10_000u32) < 1_500 => BeastTier::Elite,
            _ => BeastTier::Normal,
        };
        let element = SPAWN_ELEMENTS[rng.gen_range(0..SPAWN_ELEMENTS.len())];
        let power = tier.power_bp();
        let base_hp = 50 + level * 12;
        let attack = 5 + level * 3;
        let hp = u32::try_from(u64::from(base_hp) * u64::from(power) / 10_000).unwrap_or(base_hp);
        roster.push(Beast {
            index,
            tier,
            level,
            element,
            hp,
            max_hp: hp,
            attack: u32::try_from(u64::from(attack) * u64::from(power) / 10_000)
                .unwrap_or(attack),
            statuses: Vec::new(),
        });
    }
    roster
}
