//! Typed identifiers used across every engine crate.
//!
//! All ids are plain integers (or a packed ASCII code for currencies) so
//! they can be hashed, ordered, and serialized without allocation. Lock
//! ordering in the ledger relies on `WalletId`'s `Ord`.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

macro_rules! id_type {
    ($(#[$doc:meta])* $name:ident) => {
        $(#[$doc])*
        #[derive(
            Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        #[repr(transparent)]
        pub struct $name(pub u64);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!(stringify!($name), "({})"), self.0)
            }
        }
    };
}

id_type!(
    /// A player account.
    PlayerId
);
id_type!(
    /// A wallet. Players own exactly one; system sinks (tax collector,
    /// unclaimed-loot sink, gambling house) are ordinary wallets too.
    WalletId
);
id_type!(
    /// A committed ledger transaction. Monotonic per process.
    TransactionId
);
id_type!(
    /// A gate template (grade, rewards range, time limit, cooldown).
    GateId
);
id_type!(
    /// A live gate session instance.
    SessionId
);
id_type!(
    /// A reward pool (gacha banner, loot table, the coin-flip table).
    PoolId
);
id_type!(
    /// An owned equipment instance (NOT the item template).
    ItemInstanceId
);

/// A currency symbol packed into 8 ASCII bytes, zero-padded.
///
/// Copyable and orderable so it can key maps and sort deterministically
/// without touching the heap. Symbols longer than 8 bytes are rejected at
/// configuration load.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(transparent)]
pub struct CurrencyCode([u8; 8]);

impl CurrencyCode {
    /// Packs a symbol. Returns `None` if empty, longer than 8 bytes, or
    /// not ASCII alphanumeric.
    #[must_use]
    pub fn new(symbol: &str) -> Option<Self> {
        let bytes = symbol.as_bytes();
        if bytes.is_empty() || bytes.len() > 8 {
            return None;
        }
        if !bytes.iter().all(|b| b.is_ascii_alphanumeric()) {
            return None;
        }
        let mut packed = [0u8; 8];
        packed[..bytes.len()].copy_from_slice(bytes);
        Some(Self(packed))
    }

    /// The symbol as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        let len = self.0.iter().position(|&b| b == 0).unwrap_or(8);
        // Construction guarantees ASCII.
        std::str::from_utf8(&self.0[..len]).unwrap_or("")
    }

    /// Raw packed bytes (journal framing).
    #[must_use]
    pub const fn raw(&self) -> [u8; 8] {
        self.0
    }

    /// Rebuilds from raw packed bytes.
    #[must_use]
    pub const fn from_raw(raw: [u8; 8]) -> Self {
        Self(raw)
    }
}

impl fmt::Debug for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "CurrencyCode({})", self.as_str())
    }
}

impl fmt::Display for CurrencyCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for CurrencyCode {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for CurrencyCode {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::new(&s).ok_or_else(|| {
            serde::de::Error::custom(format!("invalid currency symbol: {s:?}"))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn currency_code_roundtrip() {
        let code = CurrencyCode::new("CRYSTAL").unwrap();
        assert_eq!(code.as_str(), "CRYSTAL");
        assert_eq!(CurrencyCode::from_raw(code.raw()), code);
    }

    #[test]
    fn currency_code_rejects_bad_symbols() {
        assert!(CurrencyCode::new("").is_none());
        assert!(CurrencyCode::new("TOOLONGSYM").is_none());
        assert!(CurrencyCode::new("BAD SYM").is_none());
    }

    #[test]
    fn wallet_ids_order_numerically() {
        assert!(WalletId(2) < WalletId(10));
    }
}
