//! Handlers for `/artifact` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/artifact` | one of `filename`, `version_type` + `version`, `build_id`, `artifact_id` |
//! | `GET`  | `/artifact/:id` | single artifact or 404 |
//! | `GET`  | `/artifact/all` | every artifact |
//! | `POST` | `/artifact` | Body: [`NewArtifact`]; 409 if `build_id` is unknown |

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use history_core::{
  record::{Artifact, NewArtifact, RowId, VersionType},
  store::HistoryStore,
};
use serde::Deserialize;

use crate::{Created, error::ApiError, missing_selector, zero_or_one};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub filename:     Option<String>,
  pub version_type: Option<VersionType>,
  pub version:      Option<String>,
  pub build_id:     Option<RowId>,
  pub artifact_id:  Option<RowId>,
}

/// `GET /artifact?filename=...`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Artifact>>, ApiError>
where
  S: HistoryStore,
{
  tracing::debug!(?params, "listing artifacts");
  let artifacts = match params {
    ListParams { filename: Some(filename), .. } => store
      .get_artifact_by_filename(filename)
      .await
      .map_err(ApiError::store)?,
    ListParams {
      version_type: Some(version_type),
      version: Some(version),
      ..
    } => store
      .get_artifact_by_version(version_type, version)
      .await
      .map_err(ApiError::store)?,
    ListParams { build_id: Some(build_id), .. } => store
      .get_artifact_by_build_id(build_id)
      .await
      .map_err(ApiError::store)?,
    ListParams { artifact_id: Some(id), .. } => {
      zero_or_one(store.get_artifact(id).await.map_err(Into::into))?
    }
    _ => {
      return Err(missing_selector(
        "filename, version_type+version, build_id, artifact_id",
      ));
    }
  };
  Ok(Json(artifacts))
}

/// `GET /artifact/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<RowId>,
) -> Result<Json<Artifact>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(store.get_artifact(id).await.map_err(ApiError::store)?))
}

/// `GET /artifact/all`
pub async fn all<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Artifact>>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(store.get_all_artifacts().await.map_err(ApiError::store)?))
}

/// `POST /artifact`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewArtifact>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HistoryStore,
{
  let build_id = body.build_id;
  let id = store.append_artifact(body).await.map_err(|e| {
    match ApiError::store(e) {
      ApiError::Conflict(_) => {
        tracing::warn!(build_id, "artifact references an unknown build");
        ApiError::Conflict(format!("build {build_id} not found"))
      }
      other => other,
    }
  })?;
  tracing::info!(artifact_id = id, build_id, "created artifact");
  Ok((StatusCode::CREATED, Json(Created { id })))
}
