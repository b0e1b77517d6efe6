use anyhow::Result;
use tokio_stream::StreamExt;

use crate::io::{BalanceReportWriter, CommandsReader};
use crate::ledger::Ledger;

/// This is a simple processor of ledger commands that
/// - reads commands from a [`CommandsReader`]
/// - executes them one by one using a [`Ledger`]
/// - writes a report with the balance of every wallet using a [`BalanceReportWriter`]
///
/// Malformed records and rejected commands are logged and skipped, they never stop the processing.
///
pub async fn run<R, L, W>(
  mut commands_reader: R,
  ledger: L,
  mut balance_report_writer: W,
) -> Result<()>
where
  R: CommandsReader,
  L: Ledger,
  W: BalanceReportWriter,
{
  let mut commands = commands_reader.read_commands();
  let (mut executed, mut skipped) = (0usize, 0usize);

  while let Some(maybe_command) = commands.next().await {
    let command = match maybe_command {
      Ok(command) => command,
      Err(err) => {
        tracing::warn!(error = %err, "skipping malformed record");
        skipped += 1;
        continue;
      }
    };

    let account = command.account().clone();
    match ledger.execute(command).await {
      Ok(entries) => {
        tracing::debug!(%account, entries = entries.len(), "command executed");
        executed += 1;
      }
      Err(err) if err.is_critical() => {
        tracing::error!(%account, error = %err, "command left the ledger inconsistent");
        skipped += 1;
      }
      Err(err) => {
        tracing::warn!(%account, error = %err, retryable = err.is_retryable(), "command rejected");
        skipped += 1;
      }
    }
  }

  tracing::info!(executed, skipped, "all commands processed");

  let balances = ledger.balances().await?;
  let wallets = balance_report_writer
    .write_balance_report(balances.into_iter())
    .await?;
  tracing::info!(wallets, "balance report written");
  Ok(())
}
