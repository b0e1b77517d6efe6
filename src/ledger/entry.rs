use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use super::{
  amount::Amount,
  error::{LedgerError, Result},
  transaction_type::TransactionType,
  wallet::{BalanceChange, WalletId},
};

/// Free-form structured data attached to an entry
pub type Metadata = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EntryId(Uuid);

impl EntryId {
  pub fn new() -> Self {
    Self(Uuid::new_v4())
  }
}

impl Default for EntryId {
  fn default() -> Self {
    Self::new()
  }
}

impl fmt::Display for EntryId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    self.0.fmt(f)
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
  Pending,
  Completed,
  Failed,
  Refunded,
}

impl Default for EntryStatus {
  fn default() -> Self {
    EntryStatus::Completed
  }
}

impl FromStr for EntryStatus {
  type Err = LedgerError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "pending" => Ok(EntryStatus::Pending),
      "completed" => Ok(EntryStatus::Completed),
      "failed" => Ok(EntryStatus::Failed),
      "refunded" => Ok(EntryStatus::Refunded),
      other => Err(LedgerError::Config(format!("unknown entry status {:?}", other))),
    }
  }
}

/// Kind of the external entity an entry points at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReferenceKind {
  Order,
  AdminAction,
  Transfer,
  Promotion,
}

/// Pointer to an entity outside the ledger. It is stored, never resolved.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Reference {
  pub kind: ReferenceKind,
  pub id: String,
}

impl Reference {
  pub fn new(kind: ReferenceKind, id: impl Into<String>) -> Self {
    Self { kind, id: id.into() }
  }
}

/// Caller supplied details of a mutation.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntryDetails {
  pub description: Option<String>,
  pub metadata: Metadata,
  pub idempotency_ref: Option<String>,
  pub reference: Option<Reference>,
}

impl EntryDetails {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn description(mut self, description: impl Into<String>) -> Self {
    self.description = Some(description.into());
    self
  }

  pub fn idempotency_ref(mut self, idempotency_ref: impl Into<String>) -> Self {
    self.idempotency_ref = Some(idempotency_ref.into());
    self
  }

  pub fn reference(mut self, reference: Reference) -> Self {
    self.reference = Some(reference);
    self
  }

  pub fn meta(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }
}

/// Immutable record of one balance mutation.
///
/// Fields are only readable. The `amount` is positive for credits and negative for debits,
/// and `balance_after == balance_before + amount` always holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LedgerEntry {
  id: EntryId,
  wallet_id: WalletId,
  amount: Amount,
  kind: TransactionType,
  status: EntryStatus,
  idempotency_ref: Option<String>,
  description: Option<String>,
  metadata: Metadata,
  balance_before: Amount,
  balance_after: Amount,
  reference: Option<Reference>,
  created_at: DateTime<Utc>,
}

impl LedgerEntry {
  pub(crate) fn new(
    wallet_id: WalletId,
    amount: Amount,
    kind: TransactionType,
    status: EntryStatus,
    change: BalanceChange,
    details: EntryDetails,
  ) -> Result<Self> {
    if change.before.checked_add(amount) != Some(change.after) {
      return Err(LedgerError::InvalidAmount(format!(
        "{} + {} does not match {}",
        change.before, amount, change.after
      )));
    }

    Ok(Self {
      id: EntryId::new(),
      wallet_id,
      amount,
      kind,
      status,
      idempotency_ref: details.idempotency_ref,
      description: details.description,
      metadata: details.metadata,
      balance_before: change.before,
      balance_after: change.after,
      reference: details.reference,
      created_at: Utc::now(),
    })
  }

  pub fn id(&self) -> EntryId {
    self.id
  }

  pub fn wallet_id(&self) -> WalletId {
    self.wallet_id
  }

  pub fn amount(&self) -> Amount {
    self.amount
  }

  pub fn kind(&self) -> TransactionType {
    self.kind
  }

  pub fn status(&self) -> EntryStatus {
    self.status
  }

  pub fn idempotency_ref(&self) -> Option<&str> {
    self.idempotency_ref.as_deref()
  }

  pub fn description(&self) -> Option<&str> {
    self.description.as_deref()
  }

  pub fn metadata(&self) -> &Metadata {
    &self.metadata
  }

  pub fn balance_before(&self) -> Amount {
    self.balance_before
  }

  pub fn balance_after(&self) -> Amount {
    self.balance_after
  }

  pub fn reference(&self) -> Option<&Reference> {
    self.reference.as_ref()
  }

  pub fn created_at(&self) -> DateTime<Utc> {
    self.created_at
  }

  pub fn is_credit(&self) -> bool {
    self.amount.is_positive()
  }

  #[cfg(test)]
  pub(crate) fn created_at_mut(&mut self) -> &mut DateTime<Utc> {
    &mut self.created_at
  }
}
