//! Configuration error types.

use thiserror::Error;

/// Errors raised while loading or validating the game configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// TOML could not be parsed.
    #[error("invalid configuration file: {0}")]
    Parse(String),

    /// A currency entry is malformed.
    #[error("invalid currency {symbol:?}: {reason}")]
    InvalidCurrency {
        /// The offending symbol as written.
        symbol: String,
        /// What was wrong with it.
        reason: String,
    },

    /// A new supply cap is below the currency's current supply.
    #[error("supply cap for {symbol} is below current supply")]
    InvalidSupplyCap {
        /// The currency whose cap was rejected.
        symbol: String,
    },

    /// A numeric field is outside its allowed range.
    #[error("{field} out of range: {detail}")]
    OutOfRange {
        /// Which field failed validation.
        field: &'static str,
        /// Why it failed.
        detail: String,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;
