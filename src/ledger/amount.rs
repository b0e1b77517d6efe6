use std::fmt;
use std::ops::Neg;
use std::str::FromStr;

use rust_decimal::prelude::FromPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use super::error::{LedgerError, Result};

/// Number of decimals after the point used to store every balance and entry amount
pub const SCALE: u32 = 4;

/// Fixed-point amount of the virtual currency.
///
/// Values are always kept at [`SCALE`] decimals. Anything coming from outside
/// (strings, floats, arbitrary decimals) is rounded half-up, away from zero,
/// before it becomes an [`Amount`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
  pub const ZERO: Amount = Amount(Decimal::ZERO);

  pub fn new(value: Decimal) -> Self {
    Self(round(value, SCALE))
  }

  /// Build an amount from a float, rounding to [`SCALE`] decimals.
  pub fn from_f64(value: f64) -> Result<Self> {
    Decimal::from_f64(value)
      .map(Self::new)
      .ok_or_else(|| LedgerError::InvalidAmount(value.to_string()))
  }

  pub fn value(&self) -> Decimal {
    self.0
  }

  /// Round to a coarser scale. Scales above [`SCALE`] have no effect.
  pub fn round_to(&self, scale: u32) -> Self {
    Self(round(self.0, scale.min(SCALE)))
  }

  pub fn checked_add(&self, other: Amount) -> Option<Amount> {
    self.0.checked_add(other.0).map(Self::new)
  }

  pub fn checked_sub(&self, other: Amount) -> Option<Amount> {
    self.0.checked_sub(other.0).map(Self::new)
  }

  pub fn is_positive(&self) -> bool {
    self.0 > Decimal::ZERO
  }

  pub fn is_negative(&self) -> bool {
    self.0 < Decimal::ZERO
  }

  pub fn is_zero(&self) -> bool {
    self.0.is_zero()
  }

  pub fn abs(&self) -> Self {
    Self(self.0.abs())
  }
}

fn round(value: Decimal, scale: u32) -> Decimal {
  let mut rounded = value.round_dp_with_strategy(scale, RoundingStrategy::MidpointAwayFromZero);
  // Normalizes "-0" and keeps a stable textual representation.
  if rounded.is_zero() {
    rounded = Decimal::ZERO;
  }
  rounded.rescale(SCALE);
  rounded
}

impl From<Decimal> for Amount {
  fn from(value: Decimal) -> Self {
    Self::new(value)
  }
}

impl From<i64> for Amount {
  fn from(value: i64) -> Self {
    Self::new(Decimal::from(value))
  }
}

impl FromStr for Amount {
  type Err = LedgerError;

  fn from_str(s: &str) -> Result<Self> {
    Decimal::from_str(s.trim())
      .map(Self::new)
      .map_err(|_| LedgerError::InvalidAmount(s.to_string()))
  }
}

impl Neg for Amount {
  type Output = Amount;

  fn neg(self) -> Self::Output {
    Self::new(-self.0)
  }
}

impl fmt::Display for Amount {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{:.4}", self.0)
  }
}
