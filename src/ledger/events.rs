//! Domain events published by the wallet service once a mutation is committed,
//! and the separate alerting path used for failures needing an operator.

use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

use super::{
  amount::Amount,
  entry::{EntryId, LedgerEntry},
  transaction_type::TransactionType,
  wallet::{AccountId, WalletId},
};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LedgerEvent {
  TransactionCreated {
    entry_id: EntryId,
    wallet_id: WalletId,
    account_id: AccountId,
    kind: TransactionType,
    amount: Amount,
    balance_after: Amount,
  },
  TransferCompleted {
    from_account: AccountId,
    to_account: AccountId,
    withdrawal: EntryId,
    deposit: EntryId,
    amount: Amount,
  },
  BalanceAdjusted {
    entry_id: EntryId,
    wallet_id: WalletId,
    account_id: AccountId,
    amount: Amount,
    admin: String,
    reason: String,
  },
  LowBalanceReached {
    wallet_id: WalletId,
    account_id: AccountId,
    balance: Amount,
    threshold: Amount,
  },
}

impl LedgerEvent {
  pub fn transaction_created(account_id: &AccountId, entry: &LedgerEntry) -> Self {
    LedgerEvent::TransactionCreated {
      entry_id: entry.id(),
      wallet_id: entry.wallet_id(),
      account_id: account_id.clone(),
      kind: entry.kind(),
      amount: entry.amount(),
      balance_after: entry.balance_after(),
    }
  }
}

/// Receiver of the domain events. Implementations must not block.
pub trait EventSink: Send + Sync {
  fn publish(&self, event: LedgerEvent);
}

/// Discards every event
#[derive(Debug, Default)]
pub struct NoopEventSink;

impl EventSink for NoopEventSink {
  fn publish(&self, _event: LedgerEvent) {}
}

/// Forwards events to an unbounded channel drained by the collaborators.
#[derive(Debug, Clone)]
pub struct ChannelEventSink(UnboundedSender<LedgerEvent>);

impl ChannelEventSink {
  pub fn new() -> (Self, UnboundedReceiver<LedgerEvent>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (Self(sender), receiver)
  }
}

impl EventSink for ChannelEventSink {
  fn publish(&self, event: LedgerEvent) {
    if self.0.send(event).is_err() {
      tracing::debug!("ledger event dropped, no receiver left");
    }
  }
}

/// Details of a transfer whose refund to the sender could not be committed.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompensationFailure {
  pub transfer_ref: String,
  pub from_account: AccountId,
  pub to_account: AccountId,
  pub amount: Amount,
  pub withdrawal: EntryId,
  pub deposit_error: String,
  pub refund_error: String,
}

/// Out-of-band channel for conditions that require manual reconciliation.
pub trait AlertSink: Send + Sync {
  fn critical(&self, failure: &CompensationFailure);
}

/// Reports alerts through the log at the highest severity, under their own target
/// so they can be routed apart from the regular output.
#[derive(Debug, Default)]
pub struct TracingAlertSink;

impl AlertSink for TracingAlertSink {
  fn critical(&self, failure: &CompensationFailure) {
    tracing::error!(
      target: "wallet_ledger::alert",
      transfer_ref = %failure.transfer_ref,
      from_account = %failure.from_account,
      to_account = %failure.to_account,
      amount = %failure.amount,
      withdrawal = %failure.withdrawal,
      deposit_error = %failure.deposit_error,
      refund_error = %failure.refund_error,
      "transfer compensation failed, manual reconciliation required"
    );
  }
}
