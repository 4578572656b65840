//! Handlers for `/deploy` endpoints.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use history_core::{
  record::{Deploy, Environment, NewDeploy, RowId, ThingType, VersionType},
  store::HistoryStore,
};
use serde::Deserialize;

use crate::{Created, error::ApiError, missing_selector, zero_or_one};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub deploy_id:    Option<RowId>,
  pub environment:  Option<Environment>,
  pub version_type: Option<VersionType>,
  pub version:      Option<String>,
  pub thing_name:   Option<String>,
  /// Narrows a `thing_name` lookup; ignored otherwise.
  pub thing_type:   Option<ThingType>,
}

/// `GET /deploy?deploy_id=...` (first matching selector wins)
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Deploy>>, ApiError>
where
  S: HistoryStore,
{
  tracing::debug!(?params, "listing deploys");
  let deploys = match params {
    ListParams { deploy_id: Some(id), .. } => {
      zero_or_one(store.get_deploy(id).await.map_err(Into::into))?
    }
    ListParams { environment: Some(environment), .. } => store
      .get_deploy_by_environment(environment)
      .await
      .map_err(ApiError::store)?,
    ListParams {
      version_type: Some(version_type),
      version: Some(version),
      ..
    } => store
      .get_deploy_by_version(version_type, version)
      .await
      .map_err(ApiError::store)?,
    ListParams { thing_name: Some(name), thing_type, .. } => store
      .get_deploy_by_thing_name(name, thing_type)
      .await
      .map_err(ApiError::store)?,
    _ => {
      return Err(missing_selector(
        "deploy_id, environment, version_type+version, thing_name",
      ));
    }
  };
  Ok(Json(deploys))
}

/// `GET /deploy/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<RowId>,
) -> Result<Json<Deploy>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(store.get_deploy(id).await.map_err(ApiError::store)?))
}

/// `GET /deploy/all`
pub async fn all<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Deploy>>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(store.get_all_deploys().await.map_err(ApiError::store)?))
}

/// `POST /deploy`. An absent or empty `servername` records no server.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(mut body): Json<NewDeploy>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HistoryStore,
{
  body.servername = body.servername.filter(|s| !s.trim().is_empty());
  let id = store.append_deploy(body).await.map_err(ApiError::store)?;
  tracing::info!(deploy_id = id, "created deploy");
  Ok((StatusCode::CREATED, Json(Created { id })))
}
