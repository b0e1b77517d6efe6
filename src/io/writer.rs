use anyhow::Result;
use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tokio_stream::StreamExt;

use crate::ledger::WalletBalance;

/// Header of the CSV balance report, matching the fields of [`super::balance::WalletBalance`]
const HEADER: &str = "account,balance,unit\n";

/// Interface for a balance report writer
#[async_trait(?Send)]
pub trait BalanceReportWriter {
  /// Write the balances provided by the [`Iterator`] and return how many wallets were reported.
  async fn write_balance_report<'a, T>(&'a mut self, report: T) -> Result<usize>
  where
    T: Iterator<Item = WalletBalance> + 'a;
}

/// An implementation of [`BalanceReportWriter`] for the CSV format.
///
/// The header is always written, so a ledger without wallets still yields a parseable report.
pub struct CsvBalanceReportWriter<W>(W);

impl<W> CsvBalanceReportWriter<W>
where
  W: AsyncWrite + Unpin + Send + Sync,
{
  pub fn new(writer: W) -> Self {
    Self(writer)
  }
}

#[async_trait(?Send)]
impl<W> BalanceReportWriter for CsvBalanceReportWriter<W>
where
  W: AsyncWrite + Unpin + Send + Sync,
{
  async fn write_balance_report<'a, T>(&'a mut self, report: T) -> Result<usize>
  where
    T: Iterator<Item = WalletBalance> + 'a,
  {
    let mut report = Box::pin(tokio_stream::iter(
      report.map(super::balance::WalletBalance::from),
    ));

    let mut written = 0usize;
    {
      let mut serializer = csv_async::AsyncSerializer::from_writer(&mut self.0);
      while let Some(balance) = report.next().await {
        serializer.serialize(balance).await?;
        written += 1;
      }
      serializer.flush().await?;
    }

    // The serializer only emits the header along with the first row.
    if written == 0 {
      self.0.write_all(HEADER.as_bytes()).await?;
      self.0.flush().await?;
    }

    tracing::debug!(wallets = written, "balance report written");
    Ok(written)
  }
}
