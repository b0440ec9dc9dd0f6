//! Behavior-driven probability perturbation.
//!
//! Pure, deterministic functions from a [`BehaviorProfile`] to bounded
//! weight multipliers. Bounds are hard: no profile, however extreme, can
//! push a multiplier outside [80%, 120%] or a win probability outside
//! the configured fairness band. That keeps behavior-responsive odds
//! auditable and non-predatory.

use gatefall_behavior::BehaviorProfile;
use gatefall_core::{GamblingConfig, Tier};

/// Lower clamp for weight multipliers, basis points.
pub const MULTIPLIER_FLOOR_BP: u32 = 8_000;
/// Upper clamp for weight multipliers, basis points.
pub const MULTIPLIER_CEIL_BP: u32 = 12_000;

const NEUTRAL: i64 = 5_000;

/// Maps a centi-point score to a signed deviation in basis points,
/// scaled so a maxed score moves the full `span`.
fn deviation_bp(score_centi: u32, span: i64) -> i64 {
    (i64::from(score_centi) - NEUTRAL) * span / NEUTRAL
}

fn clamp_multiplier(raw: i64) -> u32 {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        raw.clamp(i64::from(MULTIPLIER_FLOOR_BP), i64::from(MULTIPLIER_CEIL_BP)) as u32
    }
}

/// Adjusts gacha tier weights for one player. Heavy gamblers see their
/// top-tier odds shaved (never below 80% of base); dedicated gate
/// hunters see them nudged up (never above 120%). Lower tiers absorb
/// the difference through renormalization at selection time.
#[must_use]
pub fn adjust_tier_weights(base_bp: [u32; 5], profile: &BehaviorProfile) -> [u32; 5] {
    let gambling_penalty = deviation_bp(profile.gambling.centi(), 2_000);
    let hunting_bonus = deviation_bp(profile.gate_hunting.centi(), 1_000);
    let multiplier = clamp_multiplier(10_000 - gambling_penalty + hunting_bonus);

    let mut adjusted = base_bp;
    for (idx, weight) in adjusted.iter_mut().enumerate() {
        let tier = Tier::ALL[idx];
        if tier.is_top() {
            *weight =
                u32::try_from(u64::from(*weight) * u64::from(multiplier) / 10_000).unwrap_or(0);
        }
    }
    adjusted
}

/// Loot quality multiplier for gate rewards, basis points. Pure in the
/// profile; bounded to the same [80%, 120%] envelope.
#[must_use]
pub fn loot_quality_bp(profile: &BehaviorProfile) -> u32 {
    let hunting_bonus = deviation_bp(profile.gate_hunting.centi(), 1_500);
    let risk_bonus = deviation_bp(profile.risk.centi(), 500);
    clamp_multiplier(10_000 + hunting_bonus + risk_bonus)
}

/// Coin-flip win probability in basis points, clamped to the fairness
/// band. Starts at the fair 5000 and bends slightly against habitual
/// gamblers and toward risk-averse players.
#[must_use]
pub fn win_probability_bp(profile: &BehaviorProfile, gambling: &GamblingConfig) -> u32 {
    let gambling_penalty = deviation_bp(profile.gambling.centi(), 400);
    let risk_penalty = deviation_bp(profile.risk.centi(), 100);
    let raw = 5_000 - gambling_penalty - risk_penalty;
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    {
        raw.clamp(
            i64::from(gambling.fairness_floor_bp),
            i64::from(gambling.fairness_ceil_bp),
        ) as u32
    }
}
