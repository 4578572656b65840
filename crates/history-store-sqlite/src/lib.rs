//! SQLite backend for the delivery history ledger.
//!
//! Wraps [`tokio_rusqlite`] so all database access runs on a dedicated thread
//! without blocking the async runtime. Each write is one `BEGIN IMMEDIATE`
//! transaction that commits on success and rolls back on every other exit.

mod encode;
mod identity;
mod schema;
mod store;

pub mod error;

pub use error::{Error, Result};
pub use store::{SqliteStore, StoreConfig};
