//! # Gatefall Behavior
//!
//! Per-player rolling behavior profiles: gate-hunting, gambling,
//! trading, social activity, and risk tolerance, each an exponentially
//! decayed score on a 0..=100 scale (integer centi-points internally).
//!
//! Pure read-side input to the reward engine; recording an event has no
//! currency or combat side effects, and reads never block.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod engine;
pub mod profile;

pub use engine::BehaviorEngine;
pub use profile::{ActivityEvent, BehaviorProfile, Score, SCORE_SCALE};
