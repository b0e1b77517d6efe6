use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;

use super::{
  entry::LedgerEntry,
  error::{LedgerError, Result},
  wallet::{AccountId, Wallet, WalletId},
};

/// One page of a listing, `page` starting at 1.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
  pub items: Vec<T>,
  pub page: usize,
  pub page_size: usize,
  pub total: usize,
}

impl<T> Page<T> {
  pub fn empty(page: usize, page_size: usize) -> Self {
    Self {
      items: Vec::new(),
      page,
      page_size,
      total: 0,
    }
  }

  pub fn total_pages(&self) -> usize {
    if self.page_size == 0 {
      0
    } else {
      (self.total + self.page_size - 1) / self.page_size
    }
  }

  pub fn has_next(&self) -> bool {
    self.page < self.total_pages()
  }
}

/// Persistence used by the wallet service.
///
/// Implementations only need to guarantee that [`LedgerStore::commit`] is atomic,
/// mutual exclusion between writers of the same wallet is handled by the service.
#[async_trait]
pub trait LedgerStore: Send + Sync {
  async fn find_wallet(&self, account_id: &AccountId) -> Result<Option<Wallet>>;

  /// Return the wallet of the account, creating an empty one on first access.
  async fn get_or_create_wallet(&self, account_id: &AccountId, unit_code: &str) -> Result<Wallet>;

  /// Find an entry of the wallet carrying the idempotency reference and created at or after `since`.
  async fn find_entry_by_reference(
    &self,
    wallet_id: WalletId,
    idempotency_ref: &str,
    since: DateTime<Utc>,
  ) -> Result<Option<LedgerEntry>>;

  /// Persist the updated wallet and its new entry as a single unit: both or none.
  async fn commit(&self, wallet: &Wallet, entry: &LedgerEntry) -> Result<()>;

  /// Entries of the wallet, newest first.
  async fn history(
    &self,
    wallet_id: WalletId,
    page: usize,
    page_size: usize,
  ) -> Result<Page<LedgerEntry>>;

  async fn wallets(&self) -> Result<Vec<Wallet>>;
}

#[derive(Debug, Default)]
struct State {
  wallets: HashMap<AccountId, Wallet>,
  entries: HashMap<WalletId, Vec<LedgerEntry>>,
}

/// Implementation of the [`LedgerStore`] that keeps wallets and entries in memory.
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
  state: RwLock<State>,
}

impl InMemoryLedgerStore {
  pub fn new() -> Self {
    Self::default()
  }

  #[cfg(test)]
  pub(crate) async fn insert_entry(&self, entry: LedgerEntry) {
    let mut state = self.state.write().await;
    state.entries.entry(entry.wallet_id()).or_default().push(entry);
  }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
  async fn find_wallet(&self, account_id: &AccountId) -> Result<Option<Wallet>> {
    Ok(self.state.read().await.wallets.get(account_id).cloned())
  }

  async fn get_or_create_wallet(&self, account_id: &AccountId, unit_code: &str) -> Result<Wallet> {
    let mut state = self.state.write().await;
    let wallet = state
      .wallets
      .entry(account_id.clone())
      .or_insert_with(|| {
        tracing::debug!(%account_id, "creating wallet");
        Wallet::new(account_id.clone(), unit_code)
      });
    Ok(wallet.clone())
  }

  async fn find_entry_by_reference(
    &self,
    wallet_id: WalletId,
    idempotency_ref: &str,
    since: DateTime<Utc>,
  ) -> Result<Option<LedgerEntry>> {
    let state = self.state.read().await;
    let found = state.entries.get(&wallet_id).and_then(|entries| {
      entries
        .iter()
        .rev()
        .take_while(|entry| entry.created_at() >= since)
        .find(|entry| entry.idempotency_ref() == Some(idempotency_ref))
        .cloned()
    });
    Ok(found)
  }

  async fn commit(&self, wallet: &Wallet, entry: &LedgerEntry) -> Result<()> {
    if entry.wallet_id() != wallet.id() {
      return Err(LedgerError::Storage(format!(
        "entry {} belongs to wallet {}, not {}",
        entry.id(),
        entry.wallet_id(),
        wallet.id()
      )));
    }

    let mut state = self.state.write().await;
    let stored = state
      .wallets
      .get_mut(wallet.account_id())
      .filter(|stored| stored.id() == wallet.id())
      .ok_or_else(|| LedgerError::Storage(format!("unknown wallet {}", wallet.id())))?;
    *stored = wallet.clone();
    state
      .entries
      .entry(wallet.id())
      .or_default()
      .push(entry.clone());
    Ok(())
  }

  async fn history(
    &self,
    wallet_id: WalletId,
    page: usize,
    page_size: usize,
  ) -> Result<Page<LedgerEntry>> {
    let state = self.state.read().await;
    let entries = match state.entries.get(&wallet_id) {
      Some(entries) => entries,
      None => return Ok(Page::empty(page, page_size)),
    };

    let items = entries
      .iter()
      .rev()
      .skip(page.saturating_sub(1) * page_size)
      .take(page_size)
      .cloned()
      .collect();

    Ok(Page {
      items,
      page,
      page_size,
      total: entries.len(),
    })
  }

  async fn wallets(&self) -> Result<Vec<Wallet>> {
    let state = self.state.read().await;
    let mut wallets: Vec<Wallet> = state.wallets.values().cloned().collect();
    wallets.sort_by(|a, b| a.account_id().cmp(b.account_id()));
    Ok(wallets)
  }
}

#[cfg(test)]
mod tests {

  use chrono::Duration;
  use rust_decimal_macros::dec;

  use super::*;
  use crate::ledger::{
    amount::Amount,
    entry::{EntryDetails, EntryStatus},
    transaction_type::TransactionType,
  };

  fn credit(wallet: &mut Wallet, amount: Amount, idempotency_ref: Option<&str>) -> LedgerEntry {
    let change = wallet.apply(amount).unwrap();
    let details = EntryDetails {
      idempotency_ref: idempotency_ref.map(str::to_string),
      ..EntryDetails::default()
    };
    LedgerEntry::new(
      wallet.id(),
      amount,
      TransactionType::Deposit,
      EntryStatus::Completed,
      change,
      details,
    )
    .unwrap()
  }

  #[tokio::test]
  async fn get_or_create_wallet_is_lazy_and_stable() {
    let store = InMemoryLedgerStore::new();
    let account: AccountId = "alice".into();

    assert_eq!(store.find_wallet(&account).await, Ok(None));

    let created = store.get_or_create_wallet(&account, "COIN").await.unwrap();
    let again = store.get_or_create_wallet(&account, "GEM").await.unwrap();

    assert_eq!(created.id(), again.id());
    assert_eq!(again.unit_code(), "COIN");
    assert_eq!(store.find_wallet(&account).await, Ok(Some(created)));
  }

  #[tokio::test]
  async fn commit_updates_wallet_and_appends_entry() {
    let store = InMemoryLedgerStore::new();
    let mut wallet = store.get_or_create_wallet(&"alice".into(), "COIN").await.unwrap();
    let entry = credit(&mut wallet, Amount::new(dec!(10)), None);

    store.commit(&wallet, &entry).await.unwrap();

    let stored = store.find_wallet(&"alice".into()).await.unwrap().unwrap();
    assert_eq!(stored.balance(), Amount::new(dec!(10)));
    let history = store.history(wallet.id(), 1, 10).await.unwrap();
    assert_eq!(history.items, vec![entry]);
  }

  #[tokio::test]
  async fn commit_rejects_unknown_wallet() {
    let store = InMemoryLedgerStore::new();
    let mut wallet = Wallet::new("ghost".into(), "COIN");
    let entry = credit(&mut wallet, Amount::new(dec!(10)), None);

    let result = store.commit(&wallet, &entry).await;

    assert!(matches!(result, Err(LedgerError::Storage(_))));
    assert_eq!(store.wallets().await.unwrap(), vec![]);
  }

  #[tokio::test]
  async fn find_entry_by_reference_within_window() {
    let store = InMemoryLedgerStore::new();
    let mut wallet = store.get_or_create_wallet(&"alice".into(), "COIN").await.unwrap();
    let mut old = credit(&mut wallet, Amount::new(dec!(1)), Some("old"));
    *old.created_at_mut() = Utc::now() - Duration::hours(48);
    store.insert_entry(old).await;
    let recent = credit(&mut wallet, Amount::new(dec!(2)), Some("recent"));
    store.commit(&wallet, &recent).await.unwrap();

    let since = Utc::now() - Duration::hours(24);

    assert_eq!(
      store.find_entry_by_reference(wallet.id(), "recent", since).await,
      Ok(Some(recent))
    );
    assert_eq!(
      store.find_entry_by_reference(wallet.id(), "old", since).await,
      Ok(None)
    );
    assert_eq!(
      store
        .find_entry_by_reference(WalletId::new(), "recent", since)
        .await,
      Ok(None)
    );
  }

  #[tokio::test]
  async fn history_is_paginated_newest_first() {
    let store = InMemoryLedgerStore::new();
    let mut wallet = store.get_or_create_wallet(&"alice".into(), "COIN").await.unwrap();
    let mut entries = vec![];
    for i in 1..=5i64 {
      let entry = credit(&mut wallet, Amount::from(i), None);
      store.commit(&wallet, &entry).await.unwrap();
      entries.push(entry);
    }

    let first = store.history(wallet.id(), 1, 2).await.unwrap();
    let last = store.history(wallet.id(), 3, 2).await.unwrap();
    let beyond = store.history(wallet.id(), 4, 2).await.unwrap();

    assert_eq!(first.items, vec![entries[4].clone(), entries[3].clone()]);
    assert_eq!(first.total, 5);
    assert_eq!(first.total_pages(), 3);
    assert!(first.has_next());
    assert_eq!(last.items, vec![entries[0].clone()]);
    assert!(!last.has_next());
    assert!(beyond.items.is_empty());
  }

  #[tokio::test]
  async fn wallets_sorted_by_account() {
    let store = InMemoryLedgerStore::new();
    store.get_or_create_wallet(&"bob".into(), "COIN").await.unwrap();
    store.get_or_create_wallet(&"alice".into(), "COIN").await.unwrap();

    let accounts: Vec<String> = store
      .wallets()
      .await
      .unwrap()
      .iter()
      .map(|wallet| wallet.account_id().to_string())
      .collect();

    assert_eq!(accounts, vec!["alice".to_string(), "bob".to_string()]);
  }
}
