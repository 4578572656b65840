//! Error types for `history-core`.
//!
//! This is the taxonomy every backend converts into, so adapters can decide
//! a user-visible status without knowing which store produced the failure.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A by-id lookup found nothing. `entity` names the table or record
  /// kind, e.g. `"build"` or `"version"`.
  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: i64 },

  /// An unknown enumerated value or a dangling foreign key on write.
  #[error("constraint violation: {0}")]
  ConstraintViolation(String),

  /// A filter clause could not be classified into operator and value.
  #[error("malformed filter: {0}")]
  MalformedFilter(String),

  /// The backing store could not be reached or the transaction failed.
  #[error("storage unavailable: {0}")]
  StorageUnavailable(String),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
