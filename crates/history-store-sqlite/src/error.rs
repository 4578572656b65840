//! Error type for `history-store-sqlite`.

use rusqlite::ErrorCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("core error: {0}")]
  Core(#[from] history_core::Error),

  /// Connection or transaction failure.
  #[error("database error: {0}")]
  Database(tokio_rusqlite::Error),

  /// A unique, check, foreign-key or append-only trigger constraint failed.
  #[error("constraint violation: {0}")]
  ConstraintViolation(String),

  #[error("{entity} {id} not found")]
  NotFound { entity: &'static str, id: i64 },

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  /// A stored value could not be decoded into its domain type.
  #[error("decode error: {0}")]
  Decode(String),
}

impl From<tokio_rusqlite::Error> for Error {
  fn from(err: tokio_rusqlite::Error) -> Self {
    if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(
      code,
      message,
    )) = &err
      && code.code == ErrorCode::ConstraintViolation
    {
      return Self::ConstraintViolation(
        message.clone().unwrap_or_else(|| code.to_string()),
      );
    }
    Self::Database(err)
  }
}

impl From<Error> for history_core::Error {
  fn from(err: Error) -> Self {
    match err {
      Error::Core(e) => e,
      Error::ConstraintViolation(m) => Self::ConstraintViolation(m),
      Error::NotFound { entity, id } => Self::NotFound { entity, id },
      Error::Json(e) => Self::Serialization(e),
      Error::Database(e) => Self::StorageUnavailable(e.to_string()),
      Error::Decode(m) => Self::StorageUnavailable(m),
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
