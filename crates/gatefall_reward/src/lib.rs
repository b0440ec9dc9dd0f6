//! # Gatefall Reward
//!
//! Weighted probabilistic outcomes for the game economy:
//!
//! - **Gacha rolls** with behavior-adjusted tier weights and a pity
//!   guarantee bounding worst-case variance
//! - **Coin flips** paying exactly double-or-nothing, with the win
//!   probability clamped to a configured fairness band
//! - **Gate loot** scaled by grade, defeated-beast tiers, party size,
//!   and party quality
//!
//! Determinism contract: every draw derives its randomness from a
//! SipHash-2-4 keyed seed over the identifiers that make it unique.
//! Stakes are charged through the ledger before any randomness is
//! drawn, and each completed draw is logged with its seed for
//! replay-based auditing.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod error;
pub mod loot;
pub mod perturb;
pub mod rng;

pub use engine::{FlipOutcome, RewardEngine, RewardPull, RollOutcome, COIN_FLIP_POOL};
pub use error::{RewardError, RewardResult};
pub use loot::{compute_loot, split_award, LootAward, LootContext};
pub use rng::{rng_from_seed, RollSecret};
