use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::LedgerError;

/// Closed set of the transaction kinds a ledger entry can have.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
  Deposit,
  Withdrawal,
  Spend,
  Refund,
  Bonus,
  AdjustmentCredit,
  AdjustmentDebit,
  TransferLeg,
}

impl TransactionType {
  pub const ALL: [TransactionType; 8] = [
    TransactionType::Deposit,
    TransactionType::Withdrawal,
    TransactionType::Spend,
    TransactionType::Refund,
    TransactionType::Bonus,
    TransactionType::AdjustmentCredit,
    TransactionType::AdjustmentDebit,
    TransactionType::TransferLeg,
  ];

  pub fn as_str(&self) -> &'static str {
    match self {
      TransactionType::Deposit => "deposit",
      TransactionType::Withdrawal => "withdrawal",
      TransactionType::Spend => "spend",
      TransactionType::Refund => "refund",
      TransactionType::Bonus => "bonus",
      TransactionType::AdjustmentCredit => "adjustment_credit",
      TransactionType::AdjustmentDebit => "adjustment_debit",
      TransactionType::TransferLeg => "transfer_leg",
    }
  }

  /// Whether the kind can be used to increase a balance
  pub fn is_credit(&self) -> bool {
    matches!(
      self,
      TransactionType::Deposit
        | TransactionType::Refund
        | TransactionType::Bonus
        | TransactionType::AdjustmentCredit
        | TransactionType::TransferLeg
    )
  }

  /// Whether the kind can be used to decrease a balance
  pub fn is_debit(&self) -> bool {
    matches!(
      self,
      TransactionType::Withdrawal
        | TransactionType::Spend
        | TransactionType::AdjustmentDebit
        | TransactionType::TransferLeg
    )
  }

  /// Whether the kind may be passed by regular callers. Adjustments are only
  /// produced by the administrative path.
  pub fn is_administrative(&self) -> bool {
    matches!(
      self,
      TransactionType::AdjustmentCredit | TransactionType::AdjustmentDebit
    )
  }

  pub fn is_valid(name: &str) -> bool {
    name.parse::<TransactionType>().is_ok()
  }
}

impl FromStr for TransactionType {
  type Err = LedgerError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    let name = s.trim();
    Self::ALL
      .iter()
      .copied()
      .find(|kind| kind.as_str().eq_ignore_ascii_case(name))
      .ok_or_else(|| LedgerError::InvalidTransactionType(name.to_string()))
  }
}

impl fmt::Display for TransactionType {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}
