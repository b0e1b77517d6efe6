//! Processors drive a [`Ledger`](crate::ledger::Ledger) from a source of commands to a report.

pub mod simple;
