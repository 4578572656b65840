//! Core types and trait definitions for the delivery history ledger.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! Storage backends implement [`store::HistoryStore`]; adapters depend on
//! that trait rather than on a concrete backend.

// We intentionally use native `async fn` in traits (stabilised in Rust 1.75).
// Suppress the advisory lint about `Send` bounds on the returned futures.
#![allow(async_fn_in_trait)]

pub mod error;
pub mod filter;
pub mod kind;
pub mod record;
pub mod store;

pub use error::{Error, Result};
