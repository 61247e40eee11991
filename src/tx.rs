//! Transactions.
//!
//! This module provides:
//! - Transaction ID allocation and state tracking ([`TransactionManager`])
//! - The [`Transaction`] interface operators and writers consume
//! - [`Trx`], an in-memory transaction that buffers inserts until commit

pub mod error;
pub mod manager;
pub mod trx;
pub mod types;

pub use error::TxError;
pub use manager::TransactionManager;
pub use trx::{Transaction, Trx};
pub use types::{TxId, TxState};
