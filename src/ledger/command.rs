use super::{amount::Amount, transaction_type::TransactionType, wallet::AccountId};

/// Operations that can be replayed against a ledger.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
  Deposit {
    account: AccountId,
    amount: Amount,
    kind: TransactionType,
    idempotency_ref: Option<String>,
  },
  Withdraw {
    account: AccountId,
    amount: Amount,
    kind: TransactionType,
    idempotency_ref: Option<String>,
  },
  /// `amount` is signed, negative values remove funds.
  Adjust {
    account: AccountId,
    amount: Amount,
    reason: String,
    admin: String,
  },
  Transfer {
    from: AccountId,
    to: AccountId,
    amount: Amount,
    idempotency_ref: Option<String>,
  },
}

impl Command {
  /// The account whose wallet is debited or credited first
  pub fn account(&self) -> &AccountId {
    match self {
      Command::Deposit { account, .. }
      | Command::Withdraw { account, .. }
      | Command::Adjust { account, .. } => account,
      Command::Transfer { from, .. } => from,
    }
  }
}
