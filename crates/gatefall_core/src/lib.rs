//! # Gatefall Core
//!
//! Shared leaf crate for the Gatefall server core.
//!
//! ## CRITICAL RULE
//!
//! This crate must NEVER depend on the engine crates (`gatefall_ledger`,
//! `gatefall_combat`, ...). Everything here is plain data: identifiers,
//! fixed-point money, tier/grade/element enums, and the TOML configuration
//! surface that every engine reads at startup.

#![deny(missing_docs)]
#![deny(unsafe_code)]

pub mod amount;
pub mod config;
pub mod error;
pub mod ids;
pub mod types;

pub use amount::Amount;
pub use config::{
    BehaviorConfig, CombatConfig, CurrencySpec, ElementPairRule, GachaPoolConfig, GameConfig,
    GamblingConfig, GateGradeSpec, SinkConfig, WearConfig,
};
pub use error::{ConfigError, ConfigResult};
pub use ids::{CurrencyCode, GateId, ItemInstanceId, PlayerId, PoolId, SessionId, TransactionId, WalletId};
pub use types::{BeastTier, Element, GateGrade, Tier};
