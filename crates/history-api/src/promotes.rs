//! Handlers for `/promote` endpoints.
//!
//! A promotion names a thing, not a versioned thing, so there is no version
//! selector here.

use std::sync::Arc;

use axum::{
  Json,
  extract::{Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use history_core::{
  record::{Environment, NewPromote, Promote, RowId, ThingType},
  store::HistoryStore,
};
use serde::Deserialize;

use crate::{Created, error::ApiError, missing_selector, zero_or_one};

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub thing_type:  Option<ThingType>,
  pub thing_name:  Option<String>,
  pub environment: Option<Environment>,
  pub promote_id:  Option<RowId>,
}

/// `GET /promote?thing_type=...&thing_name=...`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<ListParams>,
) -> Result<Json<Vec<Promote>>, ApiError>
where
  S: HistoryStore,
{
  tracing::debug!(?params, "listing promotes");
  let promotes = match params {
    ListParams {
      thing_type: Some(thing_type),
      thing_name: Some(thing_name),
      ..
    } => store
      .get_promote_by_thing(thing_type, thing_name)
      .await
      .map_err(ApiError::store)?,
    ListParams { environment: Some(environment), .. } => store
      .get_promote_by_environment(environment)
      .await
      .map_err(ApiError::store)?,
    ListParams { promote_id: Some(id), .. } => {
      zero_or_one(store.get_promote(id).await.map_err(Into::into))?
    }
    _ => {
      return Err(missing_selector(
        "thing_type+thing_name, environment, promote_id",
      ));
    }
  };
  Ok(Json(promotes))
}

/// `GET /promote/:id`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  Path(id): Path<RowId>,
) -> Result<Json<Promote>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(store.get_promote(id).await.map_err(ApiError::store)?))
}

/// `GET /promote/all`
pub async fn all<S>(
  State(store): State<Arc<S>>,
) -> Result<Json<Vec<Promote>>, ApiError>
where
  S: HistoryStore,
{
  Ok(Json(store.get_all_promotes().await.map_err(ApiError::store)?))
}

/// `POST /promote`
pub async fn create<S>(
  State(store): State<Arc<S>>,
  Json(body): Json<NewPromote>,
) -> Result<impl IntoResponse, ApiError>
where
  S: HistoryStore,
{
  let id = store.append_promote(body).await.map_err(ApiError::store)?;
  tracing::info!(promote_id = id, "created promote");
  Ok((StatusCode::CREATED, Json(Created { id })))
}
