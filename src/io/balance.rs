use serde::Serialize;

use crate::ledger::{self, Amount};

/// A report on a wallet balance used to serialize into a CSV file
#[derive(Debug, PartialEq, Serialize)]
pub struct WalletBalance {
  account: String,
  balance: String,
  unit: String,
}

impl From<ledger::WalletBalance> for WalletBalance {
  /// Balances are always written with the four decimals of the ledger.
  fn from(balance: ledger::WalletBalance) -> Self {
    WalletBalance {
      account: balance.account_id.to_string(),
      balance: format_amount(balance.balance),
      unit: balance.unit_code,
    }
  }
}

fn format_amount(amount: Amount) -> String {
  amount.to_string()
}

#[cfg(test)]
mod tests {

  use rust_decimal_macros::dec;

  use super::*;

  #[test]
  fn from_ledger_wallet_balance() {
    let balance = ledger::WalletBalance::new("alice".into(), Amount::new(dec!(100.12345)), "COIN");

    let report: WalletBalance = balance.into();

    assert_eq!(
      report,
      WalletBalance {
        account: "alice".to_string(),
        balance: "100.1235".to_string(),
        unit: "COIN".to_string(),
      }
    )
  }

  #[test]
  fn format_amount_keeps_scale() {
    let cases = vec![
      (dec!(0), "0.0000"),
      (dec!(-0.00004), "0.0000"),
      (dec!(0.00005), "0.0001"),
      (dec!(25), "25.0000"),
    ];

    for (input, expected) in cases {
      assert_eq!(format_amount(Amount::new(input)).as_str(), expected);
    }
  }
}
