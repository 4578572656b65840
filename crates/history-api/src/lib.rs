//! JSON REST API for the delivery history ledger.
//!
//! Exposes an axum [`Router`] backed by any
//! [`history_core::store::HistoryStore`]. TLS, auth and listener concerns
//! are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api/v1", history_api::api_router(store.clone()))
//! ```

pub mod artifacts;
pub mod builds;
pub mod deploys;
pub mod error;
pub mod promotes;
pub mod search;

use std::sync::Arc;

use axum::{Router, routing::get};
use history_core::{
  kind::RecordKind,
  record::RowId,
  store::HistoryStore,
};
use serde::Serialize;

pub use error::ApiError;

/// Body of every successful append: the new row's id.
#[derive(Debug, Serialize)]
pub struct Created {
  pub id: RowId,
}

/// Build a fully-materialised API router for `store`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type. Fixed segments (`all`, `search`, `attributes`)
/// are registered alongside `{id}` and take precedence over it.
pub fn api_router<S>(store: Arc<S>) -> Router<()>
where
  S: HistoryStore + 'static,
{
  Router::new()
    // Builds
    .route("/build", get(builds::list::<S>).post(builds::create::<S>))
    .route("/build/all", get(builds::all::<S>))
    .route("/build/search", search::kind_search::<S>(RecordKind::Build))
    .route("/build/attributes", search::kind_attributes::<S>(RecordKind::Build))
    .route("/build/{id}", get(builds::get_one::<S>))
    // Artifacts
    .route(
      "/artifact",
      get(artifacts::list::<S>).post(artifacts::create::<S>),
    )
    .route("/artifact/all", get(artifacts::all::<S>))
    .route(
      "/artifact/search",
      search::kind_search::<S>(RecordKind::Artifact),
    )
    .route(
      "/artifact/attributes",
      search::kind_attributes::<S>(RecordKind::Artifact),
    )
    .route("/artifact/{id}", get(artifacts::get_one::<S>))
    // Promotes
    .route("/promote", get(promotes::list::<S>).post(promotes::create::<S>))
    .route("/promote/all", get(promotes::all::<S>))
    .route(
      "/promote/search",
      search::kind_search::<S>(RecordKind::Promote),
    )
    .route(
      "/promote/attributes",
      search::kind_attributes::<S>(RecordKind::Promote),
    )
    .route("/promote/{id}", get(promotes::get_one::<S>))
    // Deploys
    .route("/deploy", get(deploys::list::<S>).post(deploys::create::<S>))
    .route("/deploy/all", get(deploys::all::<S>))
    .route("/deploy/search", search::kind_search::<S>(RecordKind::Deploy))
    .route(
      "/deploy/attributes",
      search::kind_attributes::<S>(RecordKind::Deploy),
    )
    .route("/deploy/{id}", get(deploys::get_one::<S>))
    // Cross-kind
    .route("/search", get(search::all_kinds::<S>))
    .route("/search/query", get(search::query::<S>))
    .route("/thing_attributes", get(search::thing_attributes))
    .with_state(store)
}

/// `GET /healthz`: liveness only; never touches the store.
pub async fn healthz() -> &'static str { "ok" }

/// A by-id lookup used as a list selector: a miss is an empty list rather
/// than a 404.
pub(crate) fn zero_or_one<T>(
  result: Result<T, history_core::Error>,
) -> Result<Vec<T>, ApiError> {
  match result {
    Ok(record) => Ok(vec![record]),
    Err(history_core::Error::NotFound { .. }) => Ok(Vec::new()),
    Err(e) => Err(e.into()),
  }
}

pub(crate) fn missing_selector(expected: &str) -> ApiError {
  ApiError::BadRequest(format!("expected one of: {expected}"))
}

#[cfg(test)]
mod tests;
