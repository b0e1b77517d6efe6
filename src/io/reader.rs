use std::convert::TryFrom;

use anyhow::Result;
use tokio::io::AsyncRead;
use tokio_stream::{Stream, StreamExt};

use crate::ledger::Command;

/// Number of columns of a command record
const COLUMNS: usize = 6;

/// Interface to read ledger commands from an external source
pub trait CommandsReader {
  /// Read commands and return an [`Stream`] of possibly successful commands.
  /// Each item yielded by the stream is either `Ok` if the command was read successfully,
  /// or `Err` if there was any kind of problem (like wrong format).
  fn read_commands<'a>(&'a mut self) -> Box<dyn Stream<Item = Result<Command>> + Unpin + 'a>;
}

/// Implementation of [`CommandsReader`] for the CSV format.
pub struct CsvCommandsReader<R>(R);

impl<R> CsvCommandsReader<R>
where
  R: AsyncRead + Unpin + Send + Sync,
{
  pub fn new(reader: R) -> Self {
    Self(reader)
  }
}

impl<R> CommandsReader for CsvCommandsReader<R>
where
  R: AsyncRead + Unpin + Send + Sync,
{
  fn read_commands<'a>(&'a mut self) -> Box<dyn Stream<Item = Result<Command>> + Unpin + 'a> {
    Box::new(
      csv_async::AsyncReaderBuilder::new()
        .flexible(true)
        .create_reader(&mut self.0)
        .into_records()
        .map(|maybe_record| {
          maybe_record
            .and_then(|mut record| {
              record.trim();
              while record.len() < COLUMNS {
                record.push_field("");
              }
              record.deserialize::<super::command::Command>(None)
            })
            .map_err(anyhow::Error::from)
            .and_then(Command::try_from)
        }),
    )
  }
}

#[cfg(test)]
mod tests {

  use super::*;
  use crate::ledger::{Amount, TransactionType};
  use indoc::indoc;
  use rust_decimal_macros::dec;

  #[tokio::test]
  async fn read_commands_with_format_errors() {
    let input = indoc! { "
      op,        account, counterparty, amount, kind,     reference
      deposit
      deposit,,,,,
      deposit,   alice,               ,  ten
      withdraw,  alice,               ,     5, teleport
      adjust,    alice,               ,     5
      transfer,  alice,               ,     5
      refund,    alice,               ,     5
    " }
    .as_bytes();

    let mut reader = CsvCommandsReader::new(input);

    let commands = reader
      .read_commands()
      .map(|command| command.map(|_| "ok").unwrap_or_else(|_| "err"))
      .collect::<Vec<&str>>()
      .await;

    assert_eq!(commands.iter().filter(|v| **v == "err").count(), 7);
    assert_eq!(commands.iter().filter(|v| **v == "ok").count(), 0);
  }

  #[tokio::test]
  async fn read_commands_success() {
    let input = indoc! { "
      op,        account, counterparty, amount, kind,     reference
      deposit,   alice,               ,    100
       withdraw, alice,               ,   10.5, spend,    order-1
      deposit,   bob,                 ,      5, bonus
      adjust,    bob,     root,          -2.5, clawback
      transfer,  alice,   bob,            25, ,         gift-1
    " }
    .as_bytes();

    let mut reader = CsvCommandsReader::new(input);

    let commands = reader
      .read_commands()
      .map(|command| command.map_err(|err| err.to_string()))
      .collect::<Vec<Result<Command, String>>>()
      .await;

    assert_eq!(
      commands,
      vec![
        Ok(Command::Deposit {
          account: "alice".into(),
          amount: Amount::new(dec!(100)),
          kind: TransactionType::Deposit,
          idempotency_ref: None,
        }),
        Ok(Command::Withdraw {
          account: "alice".into(),
          amount: Amount::new(dec!(10.5)),
          kind: TransactionType::Spend,
          idempotency_ref: Some("order-1".to_string()),
        }),
        Ok(Command::Deposit {
          account: "bob".into(),
          amount: Amount::new(dec!(5)),
          kind: TransactionType::Bonus,
          idempotency_ref: None,
        }),
        Ok(Command::Adjust {
          account: "bob".into(),
          amount: Amount::new(dec!(-2.5)),
          reason: "clawback".to_string(),
          admin: "root".to_string(),
        }),
        Ok(Command::Transfer {
          from: "alice".into(),
          to: "bob".into(),
          amount: Amount::new(dec!(25)),
          idempotency_ref: Some("gift-1".to_string()),
        }),
      ]
    )
  }
}
