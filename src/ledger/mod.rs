//! This module contains the domain logic of the ledger
//!
//! Every balance lives in a [`Wallet`], and every change to a balance is recorded as an immutable [`LedgerEntry`]
//! holding the balance before and after it. The [`WalletService`] is the only way to mutate wallets:
//! it validates the request, serializes the mutations of each wallet through [`WalletLocks`],
//! deduplicates retries by idempotency reference and commits wallet and entry together through a [`LedgerStore`].
//!
//! The [`InMemoryLedgerStore`] keeps everything in memory. Other backends can be plugged in by implementing [`LedgerStore`].
//

mod amount;
mod command;
mod entry;
mod error;
mod events;
mod locks;
mod service;
mod store;
mod transaction_type;
mod wallet;

pub use amount::{Amount, SCALE};
pub use command::Command;
pub use entry::{
  EntryDetails, EntryId, EntryStatus, LedgerEntry, Metadata, Reference, ReferenceKind,
};
pub use error::{LedgerError, Result};
pub use events::{
  AlertSink, ChannelEventSink, CompensationFailure, EventSink, LedgerEvent, NoopEventSink,
  TracingAlertSink,
};
pub use locks::{WalletGuard, WalletLocks};
pub use service::{Ledger, TransferDetails, WalletService};
pub use store::{InMemoryLedgerStore, LedgerStore, Page};
pub use transaction_type::TransactionType;
pub use wallet::{AccountId, BalanceChange, Wallet, WalletBalance, WalletId};
