//! Behavior profiles and the events that shape them.
//!
//! Scores live in integer centi-points (0..=10000 maps to the public
//! 0..=100 scale) so the decay update and the reward engine's
//! perturbation stay exact and replayable. No floats anywhere.

use gatefall_core::GateGrade;
use serde::{Deserialize, Serialize};

/// Full scale of a behavior score in centi-points.
pub const SCORE_SCALE: u32 = 10_000;

/// A behavior score in centi-points.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Score(u32);

impl Score {
    /// Neutral midpoint (50 on the public scale).
    pub const NEUTRAL: Self = Self(SCORE_SCALE / 2);

    /// Raw centi-points, 0..=10000.
    #[must_use]
    pub const fn centi(self) -> u32 {
        self.0
    }

    /// Whole points on the 0..=100 scale (truncating).
    #[must_use]
    pub const fn points(self) -> u32 {
        self.0 / 100
    }

    /// Clamping constructor from centi-points.
    #[must_use]
    pub fn from_centi(value: u32) -> Self {
        Self(value.min(SCORE_SCALE))
    }

    /// One decay step toward `target`:
    /// `score' = (score * decay + target * (scale - decay)) / scale`.
    #[must_use]
    pub fn decay_toward(self, target: u32, decay_bp: u32) -> Self {
        let decay = u64::from(decay_bp.min(SCORE_SCALE));
        let scale = u64::from(SCORE_SCALE);
        let target = u64::from(target.min(SCORE_SCALE));
        let next = (u64::from(self.0) * decay + target * (scale - decay)) / scale;
        #[allow(clippy::cast_possible_truncation)]
        Self((next as u32).min(SCORE_SCALE))
    }
}

/// One observed activity event.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ActivityEvent {
    /// Entered a gate; `risky` marks an attempt near the bottom of the
    /// grade's level band.
    GateEntered {
        /// Gate grade entered.
        grade: GateGrade,
        /// Entry at the low end of the level band.
        risky: bool,
    },
    /// Cleared a gate of the given grade.
    GateCleared(GateGrade),
    /// Failed or abandoned a gate.
    GateFailed(GateGrade),
    /// Placed a gambling bet; `stake_ratio_bp` is stake / max_bet in
    /// basis points, a proxy for risk appetite.
    BetPlaced {
        /// Stake relative to the configured maximum bet.
        stake_ratio_bp: u32,
    },
    /// Won a gambling bet.
    BetWon,
    /// Pulled from a gacha pool.
    GachaPull,
    /// Completed a player-to-player trade.
    TradeCompleted,
    /// Listed an item on the market.
    MarketListing,
    /// Entered a gate as part of a party.
    PartyJoined,
    /// Guild contribution (guild-context trade, shared clear).
    GuildActivity,
    /// Guild or party social action (invite, chat, shared claim).
    SocialAction,
    /// Died inside a gate.
    DiedInGate,
}

/// Per-player rolling profile. Every score decays toward the target
/// implied by each incoming event; untouched dimensions decay toward
/// their own current value (i.e. stay put).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BehaviorProfile {
    /// Tendency to hunt gates.
    pub gate_hunting: Score,
    /// Tendency to gamble.
    pub gambling: Score,
    /// Trading activity.
    pub trading: Score,
    /// Social/party activity.
    pub social: Score,
    /// Risk tolerance (bet sizing, high-grade gate attempts).
    pub risk: Score,
}

impl Default for BehaviorProfile {
    fn default() -> Self {
        Self {
            gate_hunting: Score::NEUTRAL,
            gambling: Score::NEUTRAL,
            trading: Score::NEUTRAL,
            social: Score::NEUTRAL,
            risk: Score::NEUTRAL,
        }
    }
}

impl BehaviorProfile {
    /// Applies one event with the configured decay factor.
    pub fn apply(&mut self, event: ActivityEvent, decay_bp: u32) {
        match event {
            ActivityEvent::GateEntered { grade, risky } => {
                self.gate_hunting = self.gate_hunting.decay_toward(9_000, decay_bp);
                let risk_target =
                    3_500 + (grade as u32) * 700 + if risky { 1_500 } else { 0 };
                self.risk = self.risk.decay_toward(risk_target, decay_bp);
            }
            ActivityEvent::GateCleared(grade) => {
                self.gate_hunting = self.gate_hunting.decay_toward(SCORE_SCALE, decay_bp);
                // High-grade clears read as risk appetite.
                let risk_target = 4_000 + (grade as u32) * 1_000;
                self.risk = self.risk.decay_toward(risk_target, decay_bp);
            }
            ActivityEvent::GateFailed(_) => {
                self.gate_hunting = self.gate_hunting.decay_toward(7_000, decay_bp);
                self.risk = self.risk.decay_toward(3_000, decay_bp);
            }
            ActivityEvent::BetPlaced { stake_ratio_bp } => {
                self.gambling = self.gambling.decay_toward(SCORE_SCALE, decay_bp);
                let risk_target = 3_000 + stake_ratio_bp.min(SCORE_SCALE) * 7 / 10;
                self.risk = self.risk.decay_toward(risk_target, decay_bp);
            }
            ActivityEvent::BetWon => {
                self.gambling = self.gambling.decay_toward(9_000, decay_bp);
            }
            ActivityEvent::GachaPull => {
                self.gambling = self.gambling.decay_toward(8_000, decay_bp);
            }
            ActivityEvent::TradeCompleted => {
                self.trading = self.trading.decay_toward(SCORE_SCALE, decay_bp);
            }
            ActivityEvent::MarketListing => {
                self.trading = self.trading.decay_toward(9_000, decay_bp);
            }
            ActivityEvent::PartyJoined => {
                self.social = self.social.decay_toward(9_000, decay_bp);
            }
            ActivityEvent::GuildActivity => {
                self.social = self.social.decay_toward(SCORE_SCALE, decay_bp);
                self.trading = self.trading.decay_toward(8_000, decay_bp);
            }
            ActivityEvent::SocialAction => {
                self.social = self.social.decay_toward(SCORE_SCALE, decay_bp);
            }
            ActivityEvent::DiedInGate => {
                self.risk = self.risk.decay_toward(2_000, decay_bp);
            }
        }
    }
}
