use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A strictly positive amount in minor currency units (cents, rials, ...).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u64", into = "u64")]
pub struct Amount(u64);

impl Amount {
    pub fn new(value: u64) -> Result<Self> {
        if value > 0 {
            Ok(Self(value))
        } else {
            Err(LedgerError::InvalidAmount(
                "amount must be positive".to_string(),
            ))
        }
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl TryFrom<u64> for Amount {
    type Error = LedgerError;

    fn try_from(value: u64) -> Result<Self> {
        Self::new(value)
    }
}

impl From<Amount> for u64 {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Currency precision: the number of decimal places between major and minor units.
///
/// Passed explicitly wherever decimal amounts cross the boundary into minor
/// units, so the engine never depends on a global currency setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Scale(u32);

impl Scale {
    pub const MAX: u32 = 18;

    pub fn new(places: u32) -> Result<Self> {
        if places <= Self::MAX {
            Ok(Self(places))
        } else {
            Err(LedgerError::InvalidAmount(format!(
                "scale {} exceeds the maximum of {}",
                places,
                Self::MAX
            )))
        }
    }

    pub fn places(&self) -> u32 {
        self.0
    }

    /// Converts a non-negative decimal in major units into minor units.
    ///
    /// Fails when the value is negative, carries more decimal places than the
    /// scale allows, or does not fit into `u64`.
    pub fn to_minor(&self, value: Decimal) -> Result<u64> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(LedgerError::InvalidAmount(format!(
                "{} is negative",
                value
            )));
        }
        let factor = Decimal::from(10u64.pow(self.0));
        let scaled = value
            .checked_mul(factor)
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{} is too large", value)))?;
        if !scaled.fract().is_zero() {
            return Err(LedgerError::InvalidAmount(format!(
                "{} has more than {} decimal places",
                value, self.0
            )));
        }
        scaled
            .trunc()
            .to_u64()
            .ok_or_else(|| LedgerError::InvalidAmount(format!("{} is too large", value)))
    }

    /// Converts minor units back into a normalized decimal in major units.
    pub fn to_major(&self, minor: u64) -> Decimal {
        Decimal::from_i128_with_scale(i128::from(minor), self.0).normalize()
    }
}

impl Default for Scale {
    fn default() -> Self {
        Self(2)
    }
}
