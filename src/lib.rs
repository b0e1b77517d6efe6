//! A virtual currency ledger: wallets, immutable ledger entries and the service that moves funds between them.

pub mod config;
pub mod io;
pub mod ledger;
pub mod logging;
pub mod processors;
