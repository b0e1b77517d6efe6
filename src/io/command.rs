use std::convert::TryFrom;

use anyhow::{anyhow, Context, Result};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::ledger::{self, Amount, TransactionType};

/// The operations supported by the reader
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
  Deposit,
  Withdraw,
  Adjust,
  Transfer,
}

/// A deserializable command.
///
/// `kind` is the transaction type of deposits and withdrawals, and the reason of an adjustment.
/// `counterparty` is the receiver of a transfer, and the admin performing an adjustment.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Command {
  op: Operation,

  account: String,

  #[serde(default)]
  counterparty: Option<String>,

  amount: Decimal,

  #[serde(default)]
  kind: Option<String>,

  #[serde(default)]
  reference: Option<String>,
}

impl TryFrom<Command> for ledger::Command {
  type Error = anyhow::Error;

  /// Conversion from a deserializable Command into one that can be executed by a ledger.
  fn try_from(command: Command) -> Result<Self> {
    if command.account.is_empty() {
      return Err(anyhow!("missing account"));
    }
    let account = command.account.as_str().into();
    let amount = Amount::new(command.amount);

    match command.op {
      Operation::Deposit => Ok(ledger::Command::Deposit {
        account,
        amount,
        kind: kind_or(command.kind, TransactionType::Deposit)?,
        idempotency_ref: command.reference,
      }),
      Operation::Withdraw => Ok(ledger::Command::Withdraw {
        account,
        amount,
        kind: kind_or(command.kind, TransactionType::Withdrawal)?,
        idempotency_ref: command.reference,
      }),
      Operation::Adjust => Ok(ledger::Command::Adjust {
        account,
        amount,
        reason: command.kind.context("adjustment without reason")?,
        admin: command.counterparty.context("adjustment without admin")?,
      }),
      Operation::Transfer => Ok(ledger::Command::Transfer {
        from: account,
        to: command
          .counterparty
          .context("transfer without counterparty")?
          .as_str()
          .into(),
        amount,
        idempotency_ref: command.reference,
      }),
    }
  }
}

fn kind_or(kind: Option<String>, default: TransactionType) -> Result<TransactionType> {
  match kind {
    Some(kind) => kind.parse().map_err(anyhow::Error::from),
    None => Ok(default),
  }
}
