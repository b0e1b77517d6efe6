use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::{
  amount::Amount,
  error::{LedgerError, Result},
};

/// Opaque identity of the account owning a wallet.
/// The ledger never looks at anything else about an account.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }
}

impl From<&str> for AccountId {
  fn from(id: &str) -> Self {
    Self::new(id)
  }
}

impl From<String> for AccountId {
  fn from(id: String) -> Self {
    Self(id)
  }
}

impl From<u64> for AccountId {
  fn from(id: u64) -> Self {
    Self(id.to_string())
  }
}

impl From<Uuid> for AccountId {
  fn from(id: Uuid) -> Self {
    Self(id.to_string())
  }
}

impl fmt::Display for AccountId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

/// Wallet identifier. The ordering is used to lock wallet pairs consistently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WalletId(Uuid);

impl WalletId {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl Default for WalletId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for WalletId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

/// Balance of one before and after a mutation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceChange {
  pub before: Amount,
  pub after: Amount,
}

/// Current balance of the virtual currency for a single account.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Wallet {
  id: WalletId,
  account_id: AccountId,
  balance: Amount,
  unit_code: String,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

impl Wallet {
  pub fn new(account_id: AccountId, unit_code: impl Into<String>) -> Self {
    let now = Utc::now();
    Self {
      id: WalletId::new(),
      account_id,
      balance: Amount::from(0),
      unit_code: unit_code.into(),
      created_at: now,
      updated_at: now,
    }
  }

  pub fn id(&self) -> WalletId {
    self.id
  }

  pub fn account_id(&self) -> &AccountId {
    &self.account_id
  }

  pub fn balance(&self) -> Amount {
    self.balance
  }

  pub fn unit_code(&self) -> &str {
    &self.unit_code
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn updated_at(&self) -> DateTime<Utc> {
    self.updated_at
  }

  /// Apply a signed amount to the balance.
  ///
  /// This is the only way to change a balance. It fails without touching the
  /// wallet when the result would be negative.
  pub(crate) fn apply(&mut self, amount: Amount) -> Result<BalanceChange> {
    let before = self.balance;
    let after = before
      .checked_add(amount)
      .ok_or_else(|| LedgerError::InvalidAmount(amount.to_string()))?;

    if after.is_negative() {
      return Err(LedgerError::InsufficientBalance {
        available: before,
        required: amount.abs(),
      });
    }

    self.balance = after;
    self.updated_at = Utc::now();
    Ok(BalanceChange { before, after })
  }

  #[cfg(test)]
  pub(crate) fn with_balance(account_id: AccountId, balance: Amount) -> Self {
    Self {
      balance,
      ..Self::new(account_id, "COIN")
    }
  }
}

/// Balance of a wallet as exposed in reports
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WalletBalance {
  pub account_id: AccountId,
  pub balance: Amount,
  pub unit_code: String,
}

impl WalletBalance {
  pub fn new(account_id: AccountId, balance: Amount, unit_code: impl Into<String>) -> Self {
    Self {
      account_id,
      balance,
      unit_code: unit_code.into(),
    }
  }
}

impl From<&Wallet> for WalletBalance {
  fn from(wallet: &Wallet) -> Self {
    Self::new(wallet.account_id.clone(), wallet.balance, wallet.unit_code.as_str())
  }
}
