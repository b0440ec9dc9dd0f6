//! Item templates and owned instances.
//!
//! Templates are immutable data; instances carry the mutable state
//! (durability, level, owner). Durability is tracked in milli-percent
//! units (0..=100_000 where 1_000 = 1%) so the wear formula stays in
//! integers at the precision the weights are specified in.

use gatefall_core::{Element, ItemInstanceId, PlayerId, Tier, WalletId};
use serde::{Deserialize, Serialize};

/// Full durability in milli-percent units.
pub const DURABILITY_FULL: u32 = 100_000;

/// Milli-percent units per centipercent (0.01%).
pub const UNITS_PER_CP: u32 = 10;

/// What slot an item occupies.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemKind {
    /// Main-hand weapon.
    Weapon,
    /// Body armor.
    Armor,
    /// Ring, amulet, charm.
    Accessory,
}

/// Immutable item template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemTemplate {
    /// Display name.
    pub name: String,
    /// Slot.
    pub kind: ItemKind,
    /// Rarity tier.
    pub tier: Tier,
    /// Elemental affinity carried into combat.
    pub element: Element,
    /// Base attack contribution.
    pub attack: u32,
    /// Base defense contribution.
    pub defense: u32,
}

/// A player-owned instance of a template.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemInstance {
    /// Instance id.
    pub id: ItemInstanceId,
    /// The template this instantiates.
    pub template: ItemTemplate,
    /// Current owner.
    pub owner: PlayerId,
    /// Wallet the owner trades/repairs through.
    pub owner_wallet: WalletId,
    /// Remaining durability in milli-percent units.
    pub durability: u32,
    /// Upgrade level.
    pub level: u32,
}

impl ItemInstance {
    /// A broken item is unusable until repaired.
    #[must_use]
    pub const fn is_broken(&self) -> bool {
        self.durability == 0
    }

    /// Durability on the public 0..=100 percent scale (truncating).
    #[must_use]
    pub const fn durability_percent(&self) -> u32 {
        self.durability / 1_000
    }

    /// Missing durability in centipercent, the unit repair pricing uses.
    #[must_use]
    pub const fn missing_cp(&self) -> u32 {
        (DURABILITY_FULL - self.durability) / UNITS_PER_CP
    }
}
