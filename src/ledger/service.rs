use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{
  amount::Amount,
  command::Command,
  entry::{EntryDetails, LedgerEntry, Reference, ReferenceKind},
  error::{LedgerError, Result},
  events::{
    AlertSink, CompensationFailure, EventSink, LedgerEvent, NoopEventSink, TracingAlertSink,
  },
  locks::WalletLocks,
  store::{LedgerStore, Page},
  transaction_type::TransactionType,
  wallet::{AccountId, Wallet, WalletBalance},
};
use crate::config::{DuplicatePolicy, LedgerConfig};

/// Interface used by the processors to drive a ledger from a stream of commands.
#[async_trait]
pub trait Ledger {
  /// Execute a command and return the entries it produced (or replayed).
  async fn execute(&self, command: Command) -> Result<Vec<LedgerEntry>>;
  /// Current balance of every known wallet, sorted by account.
  async fn balances(&self) -> Result<Vec<WalletBalance>>;
}

/// Descriptions and reference shared by both legs of a transfer
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TransferDetails {
  pub description_from: Option<String>,
  pub description_to: Option<String>,
  pub idempotency_ref: Option<String>,
}

impl TransferDetails {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn descriptions(mut self, from: impl Into<String>, to: impl Into<String>) -> Self {
    self.description_from = Some(from.into());
    self.description_to = Some(to.into());
    self
  }

  pub fn idempotency_ref(mut self, idempotency_ref: impl Into<String>) -> Self {
    self.idempotency_ref = Some(idempotency_ref.into());
    self
  }
}

/// A signed change requested for one wallet
#[derive(Debug)]
struct Mutation {
  amount: Amount,
  kind: TransactionType,
  details: EntryDetails,
}

#[derive(Debug)]
enum Outcome {
  Created(LedgerEntry),
  Replayed(LedgerEntry),
}

#[derive(Debug)]
enum TransferOutcome {
  Completed {
    withdrawal: LedgerEntry,
    deposit: LedgerEntry,
  },
  Replayed {
    withdrawal: LedgerEntry,
    deposit: LedgerEntry,
  },
  Compensated {
    withdrawal: LedgerEntry,
    refund: LedgerEntry,
    error: LedgerError,
  },
  Unrecoverable {
    withdrawal: LedgerEntry,
    failure: CompensationFailure,
  },
}

/// Entry point for every balance mutation.
///
/// A mutation runs with the wallet locked: idempotency lookup, balance computation
/// and the atomic commit of wallet + entry. Events are published once the lock is released.
pub struct WalletService<S> {
  store: S,
  config: LedgerConfig,
  locks: WalletLocks,
  events: Arc<dyn EventSink>,
  alerts: Arc<dyn AlertSink>,
}

impl<S> WalletService<S>
where
  S: LedgerStore,
{
  pub fn new(store: S, config: LedgerConfig) -> Result<Self> {
    config.validate()?;
    Ok(Self {
      store,
      locks: WalletLocks::new(config.lock_timeout),
      config,
      events: Arc::new(NoopEventSink),
      alerts: Arc::new(TracingAlertSink),
    })
  }

  pub fn with_event_sink<E>(mut self, events: E) -> Self
  where
    E: EventSink + 'static,
  {
    self.events = Arc::new(events);
    self
  }

  pub fn with_alert_sink<A>(mut self, alerts: A) -> Self
  where
    A: AlertSink + 'static,
  {
    self.alerts = Arc::new(alerts);
    self
  }

  pub fn config(&self) -> &LedgerConfig {
    &self.config
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub async fn get_or_create_wallet(&self, account: &AccountId) -> Result<Wallet> {
    self
      .store
      .get_or_create_wallet(account, &self.config.unit_code)
      .await
  }

  pub async fn get_balance(&self, account: &AccountId) -> Result<Amount> {
    self
      .get_or_create_wallet(account)
      .await
      .map(|wallet| wallet.balance())
  }

  /// Entries of the account, newest first. `page` starts at 1 and the page size is capped by the configuration.
  pub async fn get_transaction_history(
    &self,
    account: &AccountId,
    page: usize,
    page_size: usize,
  ) -> Result<Page<LedgerEntry>> {
    let page = page.max(1);
    let page_size = page_size.clamp(1, self.config.max_page_size);
    match self.store.find_wallet(account).await? {
      Some(wallet) => self.store.history(wallet.id(), page, page_size).await,
      None => Ok(Page::empty(page, page_size)),
    }
  }

  pub async fn deposit(
    &self,
    account: &AccountId,
    amount: Amount,
    kind: TransactionType,
    details: EntryDetails,
  ) -> Result<LedgerEntry> {
    if !kind.is_credit() || kind.is_administrative() {
      return Err(LedgerError::InvalidTransactionType(kind.to_string()));
    }
    let amount = self.positive(amount)?;
    let mutation = Mutation {
      amount,
      kind,
      details: self.with_reference(details),
    };
    self.mutate(account, mutation).await
  }

  pub async fn withdraw(
    &self,
    account: &AccountId,
    amount: Amount,
    kind: TransactionType,
    details: EntryDetails,
  ) -> Result<LedgerEntry> {
    if !kind.is_debit() || kind.is_administrative() {
      return Err(LedgerError::InvalidTransactionType(kind.to_string()));
    }
    let amount = self.positive(amount)?;
    let mutation = Mutation {
      amount: -amount,
      kind,
      details: self.with_reference(details),
    };
    self.mutate(account, mutation).await
  }

  /// Administrative override of a balance by a signed amount.
  ///
  /// Any kind restriction is bypassed but the balance still cannot go negative.
  /// Whether `admin` may do this is decided by the caller.
  pub async fn adjust(
    &self,
    account: &AccountId,
    amount: Amount,
    reason: &str,
    admin: &str,
  ) -> Result<LedgerEntry> {
    let amount = amount.round_to(self.config.scale);
    if amount.is_zero() {
      return Err(LedgerError::InvalidAmount(amount.to_string()));
    }
    let kind = if amount.is_positive() {
      TransactionType::AdjustmentCredit
    } else {
      TransactionType::AdjustmentDebit
    };
    let details = EntryDetails::new()
      .description(format!("Administrative adjustment: {}", reason))
      .reference(Reference::new(ReferenceKind::AdminAction, admin))
      .meta("reason", reason)
      .meta("admin", admin);
    let mutation = Mutation {
      amount,
      kind,
      details: self.with_reference(details),
    };

    let entry = self.mutate(account, mutation).await?;
    tracing::info!(%account, amount = %entry.amount(), admin, reason, "balance adjusted");
    self.events.publish(LedgerEvent::BalanceAdjusted {
      entry_id: entry.id(),
      wallet_id: entry.wallet_id(),
      account_id: account.clone(),
      amount: entry.amount(),
      admin: admin.to_string(),
      reason: reason.to_string(),
    });
    Ok(entry)
  }

  /// Move funds between two accounts.
  ///
  /// The withdrawal leg always runs first. If the deposit leg fails, the sender is refunded
  /// under a new reference and the deposit error is returned. If the refund fails too,
  /// [`LedgerError::CriticalCompensationFailure`] is returned and reported to the alert sink.
  /// A refunded transfer can be retried under the same reference.
  pub async fn transfer(
    &self,
    from: &AccountId,
    to: &AccountId,
    amount: Amount,
    details: TransferDetails,
  ) -> Result<(LedgerEntry, LedgerEntry)> {
    if from == to {
      return Err(LedgerError::SelfTransfer(from.clone()));
    }
    let amount = self.positive(amount)?;
    // Both legs are always linked by a reference, even when deduplication is disabled.
    let transfer_ref = details
      .idempotency_ref
      .clone()
      .unwrap_or_else(generate_reference);

    let from_wallet = self.get_or_create_wallet(from).await?;
    let to_wallet = self.get_or_create_wallet(to).await?;

    let outcome = {
      let _guards = self
        .locks
        .acquire_pair(from_wallet.id(), to_wallet.id())
        .await?;
      self
        .transfer_locked(from, to, amount, &transfer_ref, &details)
        .await?
    };

    match outcome {
      TransferOutcome::Completed {
        withdrawal,
        deposit,
      } => {
        tracing::info!(%from, %to, %amount, %transfer_ref, "transfer completed");
        self.publish_entry(from, &withdrawal);
        self.publish_entry(to, &deposit);
        self.events.publish(LedgerEvent::TransferCompleted {
          from_account: from.clone(),
          to_account: to.clone(),
          withdrawal: withdrawal.id(),
          deposit: deposit.id(),
          amount,
        });
        Ok((withdrawal, deposit))
      }
      TransferOutcome::Replayed {
        withdrawal,
        deposit,
      } => Ok((withdrawal, deposit)),
      TransferOutcome::Compensated {
        withdrawal,
        refund,
        error,
      } => {
        tracing::warn!(%from, %to, %amount, %transfer_ref, %error, "transfer compensated");
        // The balance ends where it started, so no threshold is crossed.
        self.publish_created(from, &withdrawal);
        self.publish_created(from, &refund);
        Err(error)
      }
      TransferOutcome::Unrecoverable {
        withdrawal,
        failure,
      } => {
        tracing::error!(
          %from, %to, %amount, %transfer_ref,
          deposit_error = %failure.deposit_error,
          refund_error = %failure.refund_error,
          "transfer compensation failed"
        );
        self.publish_entry(from, &withdrawal);
        self.alerts.critical(&failure);
        Err(LedgerError::CriticalCompensationFailure {
          transfer_ref: failure.transfer_ref,
          account: failure.from_account,
          amount: failure.amount,
          withdrawal: failure.withdrawal,
          deposit_error: failure.deposit_error,
          refund_error: failure.refund_error,
        })
      }
    }
  }

  async fn mutate(&self, account: &AccountId, mutation: Mutation) -> Result<LedgerEntry> {
    let wallet = self.get_or_create_wallet(account).await?;

    let outcome = {
      let _guard = self.locks.acquire(wallet.id()).await?;
      let wallet = self.locked_wallet(account).await?;
      match self
        .find_duplicate(&wallet, mutation.details.idempotency_ref.as_deref())
        .await?
      {
        Some(existing) => Outcome::Replayed(self.replay(existing, &mutation)?),
        None => Outcome::Created(self.commit(wallet, mutation).await?),
      }
    };

    match outcome {
      Outcome::Created(entry) => {
        self.publish_entry(account, &entry);
        Ok(entry)
      }
      Outcome::Replayed(entry) => {
        tracing::debug!(%account, entry_id = %entry.id(), "replaying idempotent mutation");
        Ok(entry)
      }
    }
  }

  /// Runs with both wallets locked.
  async fn transfer_locked(
    &self,
    from: &AccountId,
    to: &AccountId,
    amount: Amount,
    transfer_ref: &str,
    details: &TransferDetails,
  ) -> Result<TransferOutcome> {
    let from_wallet = self.locked_wallet(from).await?;
    let to_wallet = self.locked_wallet(to).await?;

    if let Some(withdrawal) = self.find_duplicate(&from_wallet, Some(transfer_ref)).await? {
      let withdrawal_leg = transfer_leg(-amount, to, transfer_ref, None);
      match self.find_duplicate(&to_wallet, Some(transfer_ref)).await? {
        Some(deposit) => {
          let withdrawal = self.replay(withdrawal, &withdrawal_leg)?;
          let deposit = self.replay(deposit, &transfer_leg(amount, from, transfer_ref, None))?;
          return Ok(TransferOutcome::Replayed {
            withdrawal,
            deposit,
          });
        }
        None => {
          // A refunded attempt is run again under the same reference.
          let compensated = same_request(&withdrawal, &withdrawal_leg)
            && self
              .compensated(&from_wallet, transfer_ref, &withdrawal)
              .await?;
          if !compensated {
            return Err(LedgerError::DuplicateTransaction(transfer_ref.to_string()));
          }
          tracing::info!(%from, %to, %amount, %transfer_ref, "retrying compensated transfer");
        }
      }
    }

    let withdrawal = self
      .commit(
        from_wallet,
        transfer_leg(-amount, to, transfer_ref, details.description_from.clone()),
      )
      .await?;

    let deposit_leg = transfer_leg(amount, from, transfer_ref, details.description_to.clone());
    let deposit_error = match self.commit(to_wallet, deposit_leg).await {
      Ok(deposit) => {
        return Ok(TransferOutcome::Completed {
          withdrawal,
          deposit,
        })
      }
      Err(err) => err,
    };

    match self.refund(from, amount, transfer_ref, &withdrawal).await {
      Ok(refund) => Ok(TransferOutcome::Compensated {
        withdrawal,
        refund,
        error: deposit_error,
      }),
      Err(refund_error) => Ok(TransferOutcome::Unrecoverable {
        failure: CompensationFailure {
          transfer_ref: transfer_ref.to_string(),
          from_account: from.clone(),
          to_account: to.clone(),
          amount,
          withdrawal: withdrawal.id(),
          deposit_error: deposit_error.to_string(),
          refund_error: refund_error.to_string(),
        },
        withdrawal,
      }),
    }
  }

  /// Give back to the sender what a failed transfer took. Runs with the sender wallet still locked.
  async fn refund(
    &self,
    from: &AccountId,
    amount: Amount,
    transfer_ref: &str,
    withdrawal: &LedgerEntry,
  ) -> Result<LedgerEntry> {
    let wallet = self.locked_wallet(from).await?;
    let details = EntryDetails::new()
      .description("Refund of failed transfer")
      .idempotency_ref(refund_reference(transfer_ref))
      .reference(Reference::new(ReferenceKind::Transfer, transfer_ref))
      .meta("transfer_ref", transfer_ref)
      .meta("compensates", withdrawal.id().to_string());
    let mutation = Mutation {
      amount,
      kind: TransactionType::Refund,
      details,
    };
    self.commit(wallet, mutation).await
  }

  async fn commit(&self, mut wallet: Wallet, mutation: Mutation) -> Result<LedgerEntry> {
    let change = wallet.apply(mutation.amount)?;
    let entry = LedgerEntry::new(
      wallet.id(),
      mutation.amount,
      mutation.kind,
      self.config.default_status,
      change,
      mutation.details,
    )?;
    self.store.commit(&wallet, &entry).await?;
    tracing::debug!(
      account = %wallet.account_id(),
      entry_id = %entry.id(),
      kind = %entry.kind(),
      amount = %entry.amount(),
      balance = %entry.balance_after(),
      "entry committed"
    );
    Ok(entry)
  }

  /// Current state of a wallet, to be read once its lock is held.
  async fn locked_wallet(&self, account: &AccountId) -> Result<Wallet> {
    self
      .store
      .find_wallet(account)
      .await?
      .ok_or_else(|| LedgerError::Storage(format!("wallet of {} disappeared", account)))
  }

  async fn find_duplicate(
    &self,
    wallet: &Wallet,
    idempotency_ref: Option<&str>,
  ) -> Result<Option<LedgerEntry>> {
    let idempotency_ref = match idempotency_ref {
      Some(idempotency_ref) if self.config.idempotency.enabled => idempotency_ref,
      _ => return Ok(None),
    };
    let since = Utc::now()
      .checked_sub_signed(self.config.idempotency.retention)
      .unwrap_or(DateTime::<Utc>::MIN_UTC);
    self
      .store
      .find_entry_by_reference(wallet.id(), idempotency_ref, since)
      .await
  }

  /// Whether the latest withdrawal leg of a transfer was given back by a refund.
  async fn compensated(
    &self,
    from_wallet: &Wallet,
    transfer_ref: &str,
    withdrawal: &LedgerEntry,
  ) -> Result<bool> {
    let refund = self
      .find_duplicate(from_wallet, Some(&refund_reference(transfer_ref)))
      .await?;
    let withdrawal_id = withdrawal.id().to_string();
    Ok(refund.map_or(false, |refund| {
      refund
        .metadata()
        .get("compensates")
        .and_then(|compensates| compensates.as_str())
        == Some(withdrawal_id.as_str())
    }))
  }

  /// Decide what a retried mutation gets back. A reference reused for a different
  /// amount or kind is never replayed.
  fn replay(&self, existing: LedgerEntry, mutation: &Mutation) -> Result<LedgerEntry> {
    match self.config.idempotency.on_duplicate {
      DuplicatePolicy::Replay if same_request(&existing, mutation) => Ok(existing),
      _ => Err(LedgerError::DuplicateTransaction(
        existing.idempotency_ref().unwrap_or_default().to_string(),
      )),
    }
  }

  fn positive(&self, amount: Amount) -> Result<Amount> {
    let amount = amount.round_to(self.config.scale);
    if amount.is_positive() {
      Ok(amount)
    } else {
      Err(LedgerError::InvalidAmount(amount.to_string()))
    }
  }

  /// With idempotency enabled every mutation carries a reference, generated when missing.
  fn with_reference(&self, mut details: EntryDetails) -> EntryDetails {
    if self.config.idempotency.enabled && details.idempotency_ref.is_none() {
      details.idempotency_ref = Some(generate_reference());
    }
    details
  }

  fn publish_created(&self, account: &AccountId, entry: &LedgerEntry) {
    self
      .events
      .publish(LedgerEvent::transaction_created(account, entry));
  }

  fn publish_entry(&self, account: &AccountId, entry: &LedgerEntry) {
    self.publish_created(account, entry);

    if let Some(threshold) = self.config.low_balance_threshold {
      if entry.balance_before() >= threshold && entry.balance_after() < threshold {
        tracing::info!(
          %account,
          balance = %entry.balance_after(),
          %threshold,
          "low balance reached"
        );
        self.events.publish(LedgerEvent::LowBalanceReached {
          wallet_id: entry.wallet_id(),
          account_id: account.clone(),
          balance: entry.balance_after(),
          threshold,
        });
      }
    }
  }
}

fn same_request(existing: &LedgerEntry, mutation: &Mutation) -> bool {
  existing.amount() == mutation.amount && existing.kind() == mutation.kind
}

fn refund_reference(transfer_ref: &str) -> String {
  format!("{}:refund", transfer_ref)
}

fn generate_reference() -> String {
  Uuid::new_v4().to_string()
}

fn transfer_leg(
  amount: Amount,
  counterparty: &AccountId,
  transfer_ref: &str,
  description: Option<String>,
) -> Mutation {
  let description = description.unwrap_or_else(|| {
    if amount.is_negative() {
      format!("Transfer to {}", counterparty)
    } else {
      format!("Transfer from {}", counterparty)
    }
  });
  let details = EntryDetails::new()
    .description(description)
    .idempotency_ref(transfer_ref)
    .reference(Reference::new(ReferenceKind::Transfer, transfer_ref))
    .meta("transfer_ref", transfer_ref)
    .meta("counterparty", counterparty.as_str());
  Mutation {
    amount,
    kind: TransactionType::TransferLeg,
    details,
  }
}

#[async_trait]
impl<S> Ledger for WalletService<S>
where
  S: LedgerStore,
{
  async fn execute(&self, command: Command) -> Result<Vec<LedgerEntry>> {
    match command {
      Command::Deposit {
        account,
        amount,
        kind,
        idempotency_ref,
      } => {
        let details = EntryDetails {
          idempotency_ref,
          ..EntryDetails::default()
        };
        self
          .deposit(&account, amount, kind, details)
          .await
          .map(|entry| vec![entry])
      }
      Command::Withdraw {
        account,
        amount,
        kind,
        idempotency_ref,
      } => {
        let details = EntryDetails {
          idempotency_ref,
          ..EntryDetails::default()
        };
        self
          .withdraw(&account, amount, kind, details)
          .await
          .map(|entry| vec![entry])
      }
      Command::Adjust {
        account,
        amount,
        reason,
        admin,
      } => self
        .adjust(&account, amount, &reason, &admin)
        .await
        .map(|entry| vec![entry]),
      Command::Transfer {
        from,
        to,
        amount,
        idempotency_ref,
      } => {
        let details = TransferDetails {
          idempotency_ref,
          ..TransferDetails::default()
        };
        self
          .transfer(&from, &to, amount, details)
          .await
          .map(|(withdrawal, deposit)| vec![withdrawal, deposit])
      }
    }
  }

  async fn balances(&self) -> Result<Vec<WalletBalance>> {
    let wallets = self.store.wallets().await?;
    Ok(wallets.iter().map(WalletBalance::from).collect())
  }
}
