use crate::error::{Result, TrackingError};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign};
use std::str::FromStr;

/// A non-negative monetary value quantized to 2 decimal places.
///
/// Wrapper around `rust_decimal::Decimal` so fee and payment math is exact;
/// floating-point summation is not allowed anywhere in this crate.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(Decimal);

impl Money {
    pub const ZERO: Self = Self(Decimal::ZERO);

    /// Creates a monetary value, rejecting negatives and quantizing to cents.
    pub fn new(value: Decimal) -> Result<Self> {
        if value.is_sign_negative() && !value.is_zero() {
            return Err(TrackingError::Validation(
                "Fee amount cannot be negative".to_string(),
            ));
        }
        Ok(Self(value.round_dp(2)))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > Decimal::ZERO
    }
}

impl Add for Money {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl AddAssign for Money {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl Sum for Money {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::ZERO, |acc, m| acc + m)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut v = self.0;
        v.rescale(2);
        write!(f, "{}", v)
    }
}

impl FromStr for Money {
    type Err = TrackingError;

    fn from_str(s: &str) -> Result<Self> {
        let value = Decimal::from_str(s.trim())
            .map_err(|_| TrackingError::Validation(format!("Malformed amount: {s}")))?;
        Self::new(value)
    }
}

/// A payment amount, bounded below at 0.01.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChargeAmount(Decimal);

impl ChargeAmount {
    pub fn new(value: Money) -> Result<Self> {
        if value.value() < dec!(0.01) {
            return Err(TrackingError::InvalidAmount);
        }
        Ok(Self(value.value()))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl fmt::Display for ChargeAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut v = self.0;
        v.rescale(2);
        write!(f, "{}", v)
    }
}
