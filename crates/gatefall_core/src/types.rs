//! Enumerated game domain types: reward tiers, gate grades, elements,
//! beast tiers.

use serde::{Deserialize, Serialize};

/// Reward rarity tier, shared by gacha pools, loot rolls, and item
/// templates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum Tier {
    /// ~45% of pulls.
    Basic = 0,
    /// ~30% of pulls.
    Intermediate = 1,
    /// ~15% of pulls.
    Excellent = 2,
    /// ~8% of pulls (pity-guaranteed tier).
    Legendary = 3,
    /// ~2% of pulls.
    Immortal = 4,
}

impl Tier {
    /// All tiers, lowest first.
    pub const ALL: [Self; 5] = [
        Self::Basic,
        Self::Intermediate,
        Self::Excellent,
        Self::Legendary,
        Self::Immortal,
    ];

    /// Default pull weight in basis points (10000 = 100%).
    #[inline]
    #[must_use]
    pub const fn base_weight_bp(self) -> u32 {
        match self {
            Self::Basic => 4_500,
            Self::Intermediate => 3_000,
            Self::Excellent => 1_500,
            Self::Legendary => 800,
            Self::Immortal => 200,
        }
    }

    /// Whether a pull of this tier resets the pity counter.
    #[inline]
    #[must_use]
    pub const fn is_top(self) -> bool {
        matches!(self, Self::Legendary | Self::Immortal)
    }

    /// Converts from the stored discriminant.
    #[inline]
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value {
            0 => Self::Basic,
            1 => Self::Intermediate,
            2 => Self::Excellent,
            3 => Self::Legendary,
            _ => Self::Immortal,
        }
    }
}

/// Gate difficulty grade. Higher grades gate harder beasts and larger
/// crystal reward ranges.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum GateGrade {
    /// Entry-level gates.
    E = 0,
    /// D-grade.
    D = 1,
    /// C-grade.
    C = 2,
    /// B-grade.
    B = 3,
    /// A-grade.
    A = 4,
    /// S-grade.
    S = 5,
    /// Monarch-grade: the hardest gates in the world.
    Monarch = 6,
}

impl GateGrade {
    /// All grades, easiest first.
    pub const ALL: [Self; 7] = [
        Self::E,
        Self::D,
        Self::C,
        Self::B,
        Self::A,
        Self::S,
        Self::Monarch,
    ];

    /// Default crystal reward range (whole crystals, min..=max).
    #[must_use]
    pub const fn default_crystal_range(self) -> (u64, u64) {
        match self {
            Self::E => (10, 50),
            Self::D => (40, 200),
            Self::C => (150, 750),
            Self::B => (500, 2_500),
            Self::A => (2_000, 10_000),
            Self::S => (8_000, 40_000),
            Self::Monarch => (30_000, 150_000),
        }
    }
}

/// Magic-beast tier inside a gate.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum BeastTier {
    /// Baseline beast.
    Normal = 0,
    /// Tougher variant (~2x power).
    Elite = 1,
    /// Gate boss (~5x power).
    Boss = 2,
    /// Monarch-class beast (~10x power).
    Monarch = 3,
}

impl BeastTier {
    /// Power multiplier in basis points over a Normal beast of the same
    /// level.
    #[inline]
    #[must_use]
    pub const fn power_bp(self) -> u32 {
        match self {
            Self::Normal => 10_000,
            Self::Elite => 20_000,
            Self::Boss => 50_000,
            Self::Monarch => 100_000,
        }
    }

    /// Loot-quality multiplier in basis points applied to drop rolls.
    #[inline]
    #[must_use]
    pub const fn loot_bp(self) -> u32 {
        match self {
            Self::Normal => 10_000,
            Self::Elite => 12_500,
            Self::Boss => 17_500,
            Self::Monarch => 25_000,
        }
    }
}

/// The seven combat elements.
///
/// Neutral never modifies damage. Holy and Shadow are maximally weak to
/// each other. The remaining pairs come from the configured partial table.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
#[repr(u8)]
pub enum Element {
    /// No elemental alignment.
    Neutral = 0,
    /// Fire.
    Fire = 1,
    /// Water.
    Water = 2,
    /// Wind.
    Wind = 3,
    /// Earth.
    Earth = 4,
    /// Holy.
    Holy = 5,
    /// Shadow.
    Shadow = 6,
}

impl Element {
    /// All elements.
    pub const ALL: [Self; 7] = [
        Self::Neutral,
        Self::Fire,
        Self::Water,
        Self::Wind,
        Self::Earth,
        Self::Holy,
        Self::Shadow,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tier_weights_sum_to_one() {
        let total: u32 = Tier::ALL.iter().map(|t| t.base_weight_bp()).sum();
        assert_eq!(total, 10_000);
    }

    #[test]
    fn top_tiers_reset_pity() {
        assert!(Tier::Legendary.is_top());
        assert!(Tier::Immortal.is_top());
        assert!(!Tier::Excellent.is_top());
    }

    #[test]
    fn grade_ranges_grow_monotonically() {
        let mut prev_max = 0;
        for grade in GateGrade::ALL {
            let (min, max) = grade.default_crystal_range();
            assert!(min < max);
            assert!(max > prev_max);
            prev_max = max;
        }
    }
}
