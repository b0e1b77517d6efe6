//! Structured logging setup for the binary.

use anyhow::Result;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default directives when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info";

/// Install the global subscriber.
///
/// Levels come from `RUST_LOG`. Output goes to stderr because stdout carries the balance report.
/// Critical alerts are logged under the `wallet_ledger::alert` target, e.g. `RUST_LOG=warn,wallet_ledger::alert=error`.
pub fn init() -> Result<()> {
  let env_filter =
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

  let fmt_layer = tracing_subscriber::fmt::layer()
    .with_target(true)
    .with_writer(std::io::stderr);

  tracing_subscriber::registry()
    .with(env_filter)
    .with(fmt_layer)
    .try_init()?;

  Ok(())
}
