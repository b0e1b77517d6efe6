use anyhow::Result;
use tokio::io::AsyncRead;

use wallet_ledger::config::LedgerConfig;
use wallet_ledger::io::{CsvBalanceReportWriter, CsvCommandsReader};
use wallet_ledger::ledger::{ChannelEventSink, InMemoryLedgerStore, WalletService};
use wallet_ledger::{logging, processors};

#[tokio::main]
async fn main() -> Result<()> {
  logging::init()?;

  let config = LedgerConfig::from_env()?;
  tracing::info!(?config, "starting ledger");

  let (event_sink, mut events) = ChannelEventSink::new();
  let events_drain = tokio::spawn(async move {
    while let Some(event) = events.recv().await {
      tracing::debug!(?event, "ledger event");
    }
  });

  let reader = get_commands_async_read().await?;
  let commands_reader = CsvCommandsReader::new(reader);
  let ledger = WalletService::new(InMemoryLedgerStore::new(), config)?.with_event_sink(event_sink);
  let balance_report_writer = CsvBalanceReportWriter::new(tokio::io::stdout());

  processors::simple::run(commands_reader, ledger, balance_report_writer).await?;

  // The service owning the sender was dropped by the processor, so the drain ends.
  events_drain.await?;
  Ok(())
}

type CommandsAsyncRead = Box<dyn AsyncRead + Unpin + Send + Sync>;

/// This allows to use either a file if the path is specified in the command line,
/// or the stdin otherwise, which might be more convenient for pipe the data.
async fn get_commands_async_read() -> Result<CommandsAsyncRead> {
  match std::env::args().nth(1) {
    Some(path) => tokio::fs::File::open(path)
      .await
      .map(|file| Box::new(file) as CommandsAsyncRead)
      .map_err(anyhow::Error::from),
    None => Ok(Box::new(tokio::io::stdin()) as CommandsAsyncRead),
  }
}
