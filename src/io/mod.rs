//! This module contains all the components needed to read and write data from files (specifically CSV)
//!
//! The [`reader`] module contains a reader of ledger commands from CSV and the [`writer`] module contains a balance report writer into CSV.
//! Other file formats can be added by implementing the traits [`CommandsReader`] and [`BalanceReportWriter`] respectively.
//!
//! The [`command`] and [`balance`] modules contain the records being deserialized and serialized.
//! They are kept apart from the ledger model so that the file layout can evolve independently.
//!

mod balance;
mod command;
mod reader;
mod writer;

pub use reader::{CommandsReader, CsvCommandsReader};
pub use writer::{BalanceReportWriter, CsvBalanceReportWriter};
