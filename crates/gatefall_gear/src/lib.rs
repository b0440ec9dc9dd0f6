//! # Gatefall Gear
//!
//! Equipment instances and durability. Combat telemetry (damage, mana,
//! time in gate) wears items down by configured weights; durability
//! floors at zero and the item breaks until repaired. Repairs and
//! trades settle through the ledger before any item state changes.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod item;
pub mod tracker;

pub use error::{GearError, GearResult};
pub use item::{ItemInstance, ItemKind, ItemTemplate, DURABILITY_FULL, UNITS_PER_CP};
pub use tracker::{GearTracker, UpgradeOutcome, WearInput};
