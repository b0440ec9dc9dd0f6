//! # Fixed-Point Currency Amounts
//!
//! **CRITICAL: NO FLOATING POINT IN FINANCIAL CALCULATIONS**
//!
//! Every wallet balance, tax leg, and supply counter is an [`Amount`]:
//! a `u64` storing value * 10^9 (9 fractional digits).
//!
//! ## Why Fixed-Point?
//!
//! - Deterministic: same calculation = same result on all hardware
//! - No rounding drift: the ledger must reconcile to zero net creation
//!   outside mint/burn
//! - Auditable: tax splits are reproducible from the journal
//!
//! Tax legs use banker's rounding (`mul_bp_banker`) so the split of a
//! gross amount into net + taxes is exact and unbiased.

use std::fmt;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Number of fractional decimal digits.
pub const DECIMAL_PLACES: u32 = 9;

/// Raw units per whole unit.
const MULTIPLIER: u64 = 10u64.pow(DECIMAL_PLACES);

/// A non-negative fixed-point currency amount with 9 fractional digits.
///
/// # Range
///
/// 0.000000000 ..= 18,446,744,073.709551615
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[repr(transparent)]
pub struct Amount(u64);

impl Amount {
    /// Zero.
    pub const ZERO: Self = Self(0);

    /// One whole unit.
    pub const ONE: Self = Self(MULTIPLIER);

    /// Maximum representable amount.
    pub const MAX: Self = Self(u64::MAX);

    /// Creates an amount from a whole number of units.
    #[inline]
    #[must_use]
    pub const fn from_whole(whole: u64) -> Self {
        Self(whole * MULTIPLIER)
    }

    /// Creates an amount from raw 10^-9 units.
    #[inline]
    #[must_use]
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    /// Raw 10^-9 units.
    #[inline]
    #[must_use]
    pub const fn raw(self) -> u64 {
        self.0
    }

    /// Whole-unit part.
    #[inline]
    #[must_use]
    pub const fn whole(self) -> u64 {
        self.0 / MULTIPLIER
    }

    /// Fractional part in 10^-9 units (0..10^9).
    #[inline]
    #[must_use]
    pub const fn frac(self) -> u32 {
        (self.0 % MULTIPLIER) as u32
    }

    /// True if zero.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Checked addition.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, rhs: Self) -> Option<Self> {
        match self.0.checked_add(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked subtraction.
    #[inline]
    #[must_use]
    pub const fn checked_sub(self, rhs: Self) -> Option<Self> {
        match self.0.checked_sub(rhs.0) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Checked multiplication by an integer.
    #[inline]
    #[must_use]
    pub const fn checked_mul_int(self, rhs: u64) -> Option<Self> {
        match self.0.checked_mul(rhs) {
            Some(v) => Some(Self(v)),
            None => None,
        }
    }

    /// Saturating addition.
    #[inline]
    #[must_use]
    pub const fn saturating_add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }

    /// Saturating subtraction.
    #[inline]
    #[must_use]
    pub const fn saturating_sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }

    /// Multiplies by basis points (10000 = 100%), truncating.
    ///
    /// Use for scaling factors where unbiased splitting does not matter
    /// (loot multipliers, penalties applied to a single party).
    #[inline]
    #[must_use]
    pub const fn mul_bp(self, basis_points: u32) -> Self {
        let result = (self.0 as u128 * basis_points as u128) / 10_000;
        // Scaling factors in this codebase never exceed u64 range in
        // practice; saturate rather than wrap if one ever does.
        if result > u64::MAX as u128 {
            Self::MAX
        } else {
            Self(result as u64)
        }
    }

    /// Multiplies by basis points with banker's rounding (half to even)
    /// on the final 10^-9 unit.
    ///
    /// Tax legs use this so that `net + base_tax + guild_tax == gross`
    /// reconciles exactly with an unbiased split.
    #[inline]
    #[must_use]
    pub const fn mul_bp_banker(self, basis_points: u32) -> Self {
        let numerator = self.0 as u128 * basis_points as u128;
        let quotient = numerator / 10_000;
        let remainder = numerator % 10_000;
        let rounded = if remainder > 5_000 {
            quotient + 1
        } else if remainder == 5_000 {
            // half to even
            if quotient % 2 == 0 {
                quotient
            } else {
                quotient + 1
            }
        } else {
            quotient
        };
        if rounded > u64::MAX as u128 {
            Self::MAX
        } else {
            Self(rounded as u64)
        }
    }
}

// The operator impls saturate. Money movement goes through the checked
// methods so an overflow is a rejected operation, never a silent clamp;
// the operators exist for display math and aggregate tallies where
// clamping at the range ends beats panicking.
impl Add for Amount {
    type Output = Self;
    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl AddAssign for Amount {
    #[inline]
    fn add_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_add(rhs.0);
    }
}

impl Sub for Amount {
    type Output = Self;
    #[inline]
    fn sub(self, rhs: Self) -> Self {
        Self(self.0.saturating_sub(rhs.0))
    }
}

impl SubAssign for Amount {
    #[inline]
    fn sub_assign(&mut self, rhs: Self) {
        self.0 = self.0.saturating_sub(rhs.0);
    }
}

impl fmt::Debug for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Amount({}.{:09})", self.whole(), self.frac())
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:09}", self.whole(), self.frac())
    }
}

impl FromStr for Amount {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (whole_str, frac_str) = match s.split_once('.') {
            Some((w, f)) => (w, f),
            None => (s, ""),
        };
        if frac_str.len() > DECIMAL_PLACES as usize {
            return Err(format!("too many fractional digits in {s:?}"));
        }
        let whole: u64 = whole_str
            .parse()
            .map_err(|_| format!("invalid amount {s:?}"))?;
        let frac: u64 = if frac_str.is_empty() {
            0
        } else {
            let padded = format!("{frac_str:0<9}");
            padded.parse().map_err(|_| format!("invalid amount {s:?}"))?
        };
        whole
            .checked_mul(MULTIPLIER)
            .and_then(|w| w.checked_add(frac))
            .map(Amount)
            .ok_or_else(|| format!("amount out of range: {s:?}"))
    }
}

impl Serialize for Amount {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Amount {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        // Configs may write either "12.5" or a bare integer of whole units.
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Repr {
            Text(String),
            Whole(u64),
        }
        match Repr::deserialize(deserializer)? {
            Repr::Text(s) => s.parse().map_err(serde::de::Error::custom),
            Repr::Whole(w) => Ok(Amount::from_whole(w)),
        }
    }
}
