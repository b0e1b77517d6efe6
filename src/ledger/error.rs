use thiserror::Error;

use super::{
  amount::Amount,
  entry::EntryId,
  wallet::{AccountId, WalletId},
};

pub type Result<T> = core::result::Result<T, LedgerError>;

/// Possible errors that can happen while mutating a wallet.
/// Every one of them is reported to the caller, none is swallowed by the ledger.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum LedgerError {
  #[error("Invalid amount: {0}")]
  InvalidAmount(String),

  #[error("Invalid transaction type: {0}")]
  InvalidTransactionType(String),

  #[error("Insufficient balance: available {available}, required {required}")]
  InsufficientBalance { available: Amount, required: Amount },

  #[error("Duplicate transaction: {0}")]
  DuplicateTransaction(String),

  #[error("Timed out waiting for the lock of wallet {0}")]
  WalletLockTimeout(WalletId),

  #[error("Cannot transfer from account {0} to itself")]
  SelfTransfer(AccountId),

  /// The deposit leg of a transfer failed and the refund to the sender failed too.
  /// Funds are missing from circulation until an operator reconciles them.
  #[error(
    "Critical compensation failure for transfer {transfer_ref}: {amount} withdrawn from {account} \
     in entry {withdrawal} could not be restored (deposit: {deposit_error}; refund: {refund_error})"
  )]
  CriticalCompensationFailure {
    transfer_ref: String,
    account: AccountId,
    amount: Amount,
    withdrawal: EntryId,
    deposit_error: String,
    refund_error: String,
  },

  #[error("Storage error: {0}")]
  Storage(String),

  #[error("Invalid configuration: {0}")]
  Config(String),
}

impl LedgerError {
  /// Whether retrying the very same call (with the same idempotency reference) is safe and may succeed.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      LedgerError::WalletLockTimeout(_) | LedgerError::Storage(_)
    )
  }

  /// Whether the error needs an operator to look at the ledger.
  pub fn is_critical(&self) -> bool {
    matches!(self, LedgerError::CriticalCompensationFailure { .. })
  }
}
