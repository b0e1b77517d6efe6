//! Configuration consumed by the [`WalletService`](crate::ledger::WalletService).

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::Duration as RetentionWindow;

use crate::ledger::{Amount, EntryStatus, LedgerError, Result, SCALE};

/// What to do when a mutation reuses an idempotency reference already seen in the retention window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DuplicatePolicy {
  /// Return the entry created by the first call, without applying anything.
  Replay,
  /// Fail with [`LedgerError::DuplicateTransaction`].
  Reject,
}

impl FromStr for DuplicatePolicy {
  type Err = LedgerError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "replay" => Ok(DuplicatePolicy::Replay),
      "reject" => Ok(DuplicatePolicy::Reject),
      other => Err(LedgerError::Config(format!(
        "unknown duplicate policy {:?}",
        other
      ))),
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct IdempotencyConfig {
  pub enabled: bool,
  /// How long a reference stays reserved for its wallet
  pub retention: RetentionWindow,
  pub on_duplicate: DuplicatePolicy,
}

impl Default for IdempotencyConfig {
  fn default() -> Self {
    Self {
      enabled: false,
      retention: RetentionWindow::hours(24),
      on_duplicate: DuplicatePolicy::Replay,
    }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
  /// Status given to every committed entry
  pub default_status: EntryStatus,

  /// Unit code of newly created wallets
  pub unit_code: String,

  pub idempotency: IdempotencyConfig,

  /// A [`LowBalanceReached`](crate::ledger::LedgerEvent::LowBalanceReached) event is published
  /// when a balance goes from at least this value to below it.
  pub low_balance_threshold: Option<Amount>,

  /// Decimals kept from incoming amounts, at most [`SCALE`]
  pub scale: u32,

  /// How long a mutation waits for exclusive access to a wallet
  pub lock_timeout: Duration,

  pub max_page_size: usize,
}

impl Default for LedgerConfig {
  fn default() -> Self {
    Self {
      default_status: EntryStatus::Completed,
      unit_code: "COIN".to_string(),
      idempotency: IdempotencyConfig::default(),
      low_balance_threshold: None,
      scale: SCALE,
      lock_timeout: Duration::from_millis(5000),
      max_page_size: 100,
    }
  }
}

impl LedgerConfig {
  /// Create configuration from environment variables, falling back to the defaults
  ///
  /// - `LEDGER_DEFAULT_STATUS`: `pending`, `completed`, `failed` or `refunded`
  /// - `LEDGER_UNIT_CODE`
  /// - `LEDGER_IDEMPOTENCY_ENABLED`: `true` or `false`
  /// - `LEDGER_IDEMPOTENCY_RETENTION_HOURS`
  /// - `LEDGER_IDEMPOTENCY_ON_DUPLICATE`: `replay` or `reject`
  /// - `LEDGER_LOW_BALANCE_THRESHOLD`: decimal amount
  /// - `LEDGER_SCALE`: `0` to `4`
  /// - `LEDGER_LOCK_TIMEOUT_MS`
  /// - `LEDGER_MAX_PAGE_SIZE`
  pub fn from_env() -> Result<Self> {
    Self::from_lookup(|name| env::var(name).ok())
  }

  fn from_lookup<F>(lookup: F) -> Result<Self>
  where
    F: Fn(&str) -> Option<String>,
  {
    let defaults = Self::default();
    let parse = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

    let config = Self {
      default_status: parse_or(parse("LEDGER_DEFAULT_STATUS"), defaults.default_status)?,
      unit_code: parse("LEDGER_UNIT_CODE").unwrap_or(defaults.unit_code),
      idempotency: IdempotencyConfig {
        enabled: parse_or(
          parse("LEDGER_IDEMPOTENCY_ENABLED"),
          defaults.idempotency.enabled,
        )?,
        retention: retention_hours(parse_or::<i64>(
          parse("LEDGER_IDEMPOTENCY_RETENTION_HOURS"),
          24,
        )?)?,
        on_duplicate: parse_or(
          parse("LEDGER_IDEMPOTENCY_ON_DUPLICATE"),
          defaults.idempotency.on_duplicate,
        )?,
      },
      low_balance_threshold: parse("LEDGER_LOW_BALANCE_THRESHOLD")
        .map(|value| value.parse::<Amount>())
        .transpose()?,
      scale: parse_or(parse("LEDGER_SCALE"), defaults.scale)?,
      lock_timeout: parse_or::<u64>(parse("LEDGER_LOCK_TIMEOUT_MS"), 5000)
        .map(Duration::from_millis)?,
      max_page_size: parse_or(parse("LEDGER_MAX_PAGE_SIZE"), defaults.max_page_size)?,
    };

    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<()> {
    if self.scale > SCALE {
      return Err(LedgerError::Config(format!(
        "scale {} is above the storage scale {}",
        self.scale, SCALE
      )));
    }
    if self.max_page_size == 0 {
      return Err(LedgerError::Config("max page size must be positive".to_string()));
    }
    if self.idempotency.retention <= RetentionWindow::zero() {
      return Err(LedgerError::Config(
        "idempotency retention must be positive".to_string(),
      ));
    }
    if self.idempotency.retention > max_retention() {
      return Err(LedgerError::Config(format!(
        "idempotency retention is above {} days",
        MAX_RETENTION_DAYS
      )));
    }
    if matches!(self.low_balance_threshold, Some(threshold) if threshold.is_negative()) {
      return Err(LedgerError::Config(
        "low balance threshold cannot be negative".to_string(),
      ));
    }
    Ok(())
  }
}

/// Longest window a reference can stay reserved
pub const MAX_RETENTION_DAYS: i64 = 3650;

fn max_retention() -> RetentionWindow {
  RetentionWindow::days(MAX_RETENTION_DAYS)
}

fn retention_hours(hours: i64) -> Result<RetentionWindow> {
  RetentionWindow::try_hours(hours).ok_or_else(|| {
    LedgerError::Config(format!("idempotency retention of {} hours is out of range", hours))
  })
}

fn parse_or<T>(value: Option<String>, default: T) -> Result<T>
where
  T: FromStr,
  T::Err: ToString,
{
  match value {
    Some(value) => value
      .trim()
      .parse()
      .map_err(|err: T::Err| LedgerError::Config(format!("{:?}: {}", value, err.to_string()))),
    None => Ok(default),
  }
}
