//! Gate combat: entry checks, automatic tick resolution, status
//! effects, resurrection, and terminal settlement.
//!
//! The split mirrors the rest of the workspace: [`session`] is the pure
//! deterministic state machine, [`engine`] owns the threads and the
//! side effects. Everything random inside a session derives from one
//! seed, so a session replays identically given the same roster.

pub mod beast;
pub mod elements;
pub mod engine;
pub mod error;
pub mod session;
pub mod skills;
pub mod status;

pub use beast::Beast;
pub use engine::{
    CombatEngine, ParticipantView, SessionSnapshot, SettlementSummary,
};
pub use error::{CombatError, CombatResult};
pub use session::{
    EntrantSpec, GateSession, LifeState, Participant, SessionEvent, SessionStatus, Telemetry,
};
pub use skills::{JobGraph, JobNode, Resurrection, Skill};
pub use status::{ActiveStatus, Cure, StatusEffect};
