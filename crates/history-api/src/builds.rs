//! Handlers for `/build` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/build` | one of `job_url`, `build_id`, or `version_type` + `version` |
//! | `GET`  | `/build/:id` | single build or 404 |
//! | `GET`  | `/build/all` | every build |
//! | `POST` | `/build` | Body: [`NewBuild`]; returns 201 + `{"id": n}` |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use history_core::{
  record::{Build, NewBuild, RowId, VersionType},
  store::HistoryStore,
};
use serde::Deserialize;

use crate::{Created, error::ApiError, missing_selector, zero_or_one};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub job_url:      Option<String>,
  pub build_id:     Option<RowId>,
  pub version_type: Option<VersionType>,
  pub version:      Option<String>,
}

/// `GET /build?job_url=...` (first matching selector wins)
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Build>>, ApiError>
where
  S: HistoryStore,
{
  tracing::debug!(?params, "listing builds");
  let builds = match params {
    ListParams { job_url: Some(url), .. } => {
      store.get_build_by_url(url).await.map_err(ApiError::store)?
    }
    ListParams { build_id: Some(id), .. } => {
      zero_or_one(store.get_build(id).await.map_err(Into::into))?
    }
    ListParams {
      version_type: Some(version_type),
      version: Some(version),
      ..
    } => store
      .get_build_by_version(version_type, version)
      .await
      .map_err(ApiError::store)?,
    _ => return Err(missing_selector("job_url, build_id, version_type+version")),
  };
  Ok(Json(builds))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /build/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<RowId>,
) -> Result<Json<Build>, ApiError>
where
  S: HistoryStore,
{
  let build = store.get_build(id).await.map_err(ApiError::store)?;
  Ok(Json(build))
}

/// `GET /build/all`
pub async fn all<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Build>>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(store.get_all_builds().await.map_err(ApiError::store)?))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /build`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewBuild>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HistoryStore,
{
  let id = store.append_build(body).await.map_err(ApiError::store)?;
  tracing::info!(build_id = id, "created build");
  Ok((StatusCode::CREATED, Json(Created { id })))
}
