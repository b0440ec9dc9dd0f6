//! Idempotent commit receipts.
//!
//! Callers that retry (network edges, the combat resolver re-driving a
//! payout after a watchdog restart) attach an [`OpKey`]. The first commit
//! under a key stores its receipt; any later attempt with the same key
//! returns that stored receipt without moving money again.

use std::collections::HashMap;

use gatefall_core::{Amount, TransactionId};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

/// Caller-chosen idempotency key. Uniqueness is the caller's contract;
/// the ledger only promises at-most-once execution per key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OpKey(pub u128);

/// What a committed operation settled to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The committed transaction id.
    pub tx: TransactionId,
    /// Net amount credited to the primary beneficiary (after tax).
    pub net: Amount,
    /// Total tax withheld (base + guild).
    pub tax: Amount,
}

/// Concurrent receipt map.
#[derive(Debug, Default)]
pub struct ReceiptStore {
    entries: RwLock<HashMap<OpKey, Receipt>>,
}

impl ReceiptStore {
    /// Looks up a previously committed receipt.
    #[must_use]
    pub fn get(&self, key: OpKey) -> Option<Receipt> {
        self.entries.read().get(&key).copied()
    }

    /// Stores a receipt. First writer wins; a racing duplicate keeps the
    /// original receipt.
    pub fn put(&self, key: OpKey, receipt: Receipt) -> Receipt {
        *self.entries.write().entry(key).or_insert(receipt)
    }

    /// Number of stored receipts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// True when no receipts are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
