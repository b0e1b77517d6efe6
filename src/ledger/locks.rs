use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, OwnedMutexGuard};

use super::{
  error::{LedgerError, Result},
  wallet::WalletId,
};

/// Exclusive access to one wallet, released on drop.
#[derive(Debug)]
pub struct WalletGuard {
  wallet_id: WalletId,
  _guard: OwnedMutexGuard<()>,
}

impl WalletGuard {
  pub fn wallet_id(&self) -> WalletId {
    self.wallet_id
  }
}

/// Per-wallet mutual exclusion with bounded waiting.
///
/// Mutations of the same wallet are serialized, mutations of different wallets never wait on each other.
#[derive(Debug)]
pub struct WalletLocks {
  locks: Mutex<HashMap<WalletId, Arc<Mutex<()>>>>,
  timeout: Duration,
}

impl WalletLocks {
  pub fn new(timeout: Duration) -> Self {
    Self {
      locks: Mutex::new(HashMap::new()),
      timeout,
    }
  }

  pub async fn acquire(&self, wallet_id: WalletId) -> Result<WalletGuard> {
    let lock = {
      let mut locks = self.locks.lock().await;
      locks.entry(wallet_id).or_default().clone()
    };

    match tokio::time::timeout(self.timeout, lock.lock_owned()).await {
      Ok(guard) => Ok(WalletGuard {
        wallet_id,
        _guard: guard,
      }),
      Err(_) => {
        tracing::warn!(%wallet_id, timeout = ?self.timeout, "wallet lock timed out");
        Err(LedgerError::WalletLockTimeout(wallet_id))
      }
    }
  }

  /// Lock two different wallets, always in ascending id order so that two transfers
  /// between the same wallets in opposite directions cannot deadlock.
  /// The guards are returned in the order of the arguments.
  pub async fn acquire_pair(
    &self,
    first: WalletId,
    second: WalletId,
  ) -> Result<(WalletGuard, WalletGuard)> {
    if first <= second {
      let first_guard = self.acquire(first).await?;
      let second_guard = self.acquire(second).await?;
      Ok((first_guard, second_guard))
    } else {
      let second_guard = self.acquire(second).await?;
      let first_guard = self.acquire(first).await?;
      Ok((first_guard, second_guard))
    }
  }
}
