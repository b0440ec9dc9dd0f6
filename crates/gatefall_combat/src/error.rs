//! Combat engine errors.

use gatefall_core::{GateId, PlayerId, SessionId};
use gatefall_gear::GearError;
use gatefall_ledger::LedgerError;
use gatefall_reward::RewardError;
use thiserror::Error;

/// Gate and combat resolution failures.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CombatError {
    /// No gate registered under that id.
    #[error("unknown gate {0}")]
    UnknownGate(GateId),

    /// No live session under that id.
    #[error("unknown session {0}")]
    UnknownSession(SessionId),

    /// Player must wait out the gate's re-entry cooldown.
    #[error("gate {gate} on cooldown for {player}, {remaining_secs}s remaining")]
    GateOnCooldown {
        /// The gate.
        gate: GateId,
        /// The cooling-down player.
        player: PlayerId,
        /// Seconds until re-entry.
        remaining_secs: u64,
    },

    /// Party exceeds the configured maximum size.
    #[error("party of {size} exceeds maximum {max}")]
    PartyTooLarge {
        /// Requested party size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// An empty party cannot enter.
    #[error("party is empty")]
    EmptyParty,

    /// Hunter level outside the gate's entry band.
    #[error("{player} at level {level} is outside gate band {min}..={max}")]
    LevelOutOfRange {
        /// The player.
        player: PlayerId,
        /// Their level.
        level: u32,
        /// Gate minimum level.
        min: u32,
        /// Gate maximum level.
        max: u32,
    },

    /// Player already has a live session.
    #[error("{player} is already in session {session}")]
    AlreadyInSession {
        /// The busy player.
        player: PlayerId,
        /// Their live session.
        session: SessionId,
    },

    /// The session is no longer accepting commands.
    #[error("session {0} is not active")]
    SessionNotActive(SessionId),

    /// The actor is not a participant of the session.
    #[error("{0} is not in this session")]
    NotAParticipant(PlayerId),

    /// Resurrection target is not dead, or the caster lacks the skill.
    #[error("resurrection not applicable")]
    CannotResurrect,

    /// Nothing claimable for that fallen participant.
    #[error("no unclaimed drops for {0}")]
    NothingToClaim(PlayerId),

    /// Ledger rejection during settlement.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// Gear rejection during wear commit or drop reassignment.
    #[error(transparent)]
    Gear(#[from] GearError),

    /// Reward engine rejection.
    #[error(transparent)]
    Reward(#[from] RewardError),
}

/// Convenience alias for combat operations.
pub type CombatResult<T> = Result<T, CombatError>;
