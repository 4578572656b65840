//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("storage unavailable: {0}")]
  Unavailable(String),

  #[error("internal error: {0}")]
  Internal(String),
}

impl ApiError {
  /// Map any backend error through the shared core taxonomy.
  pub fn store(err: impl Into<history_core::Error>) -> Self {
    let err: history_core::Error = err.into();
    Self::from(err)
  }
}

impl From<history_core::Error> for ApiError {
  fn from(err: history_core::Error) -> Self {
    use history_core::Error as E;
    let message = err.to_string();
    match err {
      E::NotFound { .. } => Self::NotFound(message),
      E::ConstraintViolation(_) => Self::Conflict(message),
      E::MalformedFilter(_) => Self::BadRequest(message),
      E::StorageUnavailable(_) => Self::Unavailable(message),
      E::Serialization(_) => Self::Internal(message),
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Unavailable(m) => (StatusCode::SERVICE_UNAVAILABLE, m.clone()),
      ApiError::Internal(m) => (StatusCode::INTERNAL_SERVER_ERROR, m.clone()),
    };
    if status.is_server_error() {
      tracing::error!(%status, error = %message, "request failed");
    }
    (status, Json(json!({ "error": message }))).into_response()
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn core_errors_map_to_statuses() {
    let cases = [
      (history_core::Error::NotFound { entity: "build", id: 1 }, 404),
      (history_core::Error::ConstraintViolation("fk".into()), 409),
      (history_core::Error::MalformedFilter("x".into()), 400),
      (history_core::Error::StorageUnavailable("down".into()), 503),
    ];
    for (err, status) in cases {
      let resp = ApiError::from(err).into_response();
      assert_eq!(resp.status().as_u16(), status);
    }
  }
}
