//! # Gatefall Ledger
//!
//! Multi-currency wallet ledger for the game economy:
//!
//! - **Taxed transfers** with exact, banker's-rounded base and guild tax
//!   legs routed to sink wallets
//! - **Supply caps**: mints are rejected once a currency's circulating
//!   supply would pass its configured maximum
//! - **Holds**: frozen wallets move nothing; shadow wallets (raised by
//!   Arise) receive but never spend
//! - **Idempotent commits**: retries under the same [`OpKey`] replay the
//!   stored [`Receipt`] instead of moving money twice
//! - **Journal**: every commit appends a CRC-framed record; replaying
//!   the journal rebuilds balances and the supply book exactly
//!
//! Concurrency model: one `parking_lot` mutex per wallet, acquired in
//! ascending [`WalletId`](gatefall_core::WalletId) order with a bounded
//! timeout, so disjoint transfers run in parallel and contention
//! surfaces as a retriable `Busy` error rather than a deadlock.

#![deny(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod journal;
pub mod ledger;
pub mod receipt;
pub mod registry;
pub mod wallet;

pub use error::{LedgerError, LedgerResult};
pub use journal::{Journal, JournalRecord, MintReason};
pub use ledger::Ledger;
pub use receipt::{OpKey, Receipt, ReceiptStore};
pub use registry::CurrencyRegistry;
pub use wallet::{Hold, WalletSlot, LOCK_TIMEOUT};
