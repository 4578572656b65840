//! Attribute search and column introspection.
//!
//! Query parameters use the comma-list syntax: every parameter is a field,
//! and each comma segment of its value is one clause, optionally led by a
//! comparator (`duration=<=9,>7`). `GET /search/query` instead takes one
//! conjunction string in `q` (`version_type == change* && duration <= 9`).
//!
//! A field outside a kind's columns makes that kind yield nothing; it is
//! never silently dropped.

use std::{collections::BTreeMap, sync::Arc};

use axum::{
  Json,
  extract::{Query, State},
  routing::{MethodRouter, get},
};
use history_core::{
  filter::FilterSet,
  kind::RecordKind,
  store::{HistoryStore, SearchResults},
};
use serde::Deserialize;

use crate::error::ApiError;

/// Raw query pairs, in request order, duplicates kept.
type Pairs = Vec<(String, String)>;

/// `GET /{kind}/search?field=value,...` for a fixed `kind`.
pub fn kind_search<S>(kind: RecordKind) -> MethodRouter<Arc<S>>
where
  S: HistoryStore + 'static,
{
  get(
    move |State(store): State<Arc<S>>, Query(pairs): Query<Pairs>| async move {
      let filters = FilterSet::from_params(pairs)?;
      let records = store
        .find_by_attrs(kind, &filters)
        .await
        .map_err(ApiError::store)?;
      Ok::<_, ApiError>(Json(records))
    },
  )
}

/// `GET /search?field=value,...` across every kind.
pub async fn all_kinds<S>(
  State(store): State<Arc<S>>,
  Query(pairs): Query<Pairs>,
) -> Result<Json<SearchResults>, ApiError>
where
  S: HistoryStore,
{
  let filters = FilterSet::from_params(pairs)?;
  tracing::debug!(?filters, "searching all kinds");
  let results = store
    .search(&RecordKind::ALL, &filters)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(results))
}

#[derive(Debug, Deserialize)]
pub struct QueryParams {
  /// `ALL` or one kind name such as `BUILDS`.
  #[serde(default = "all_selector")]
  pub kinds: String,
  pub q:     String,
}

fn all_selector() -> String { "ALL".to_owned() }

/// `GET /search/query?kinds=ALL&q=...`
pub async fn query<S>(
  State(store): State<Arc<S>>,
  Query(params): Query<QueryParams>,
) -> Result<Json<SearchResults>, ApiError>
where
  S: HistoryStore,
{
  let kinds = RecordKind::parse_selector(&params.kinds)?;
  let filters = FilterSet::parse_conjunction(&params.q)?;
  tracing::debug!(?kinds, ?filters, "searching by conjunction");
  let results = store
    .search(&kinds, &filters)
    .await
    .map_err(ApiError::store)?;
  Ok(Json(results))
}

/// `GET /{kind}/attributes` for a fixed `kind`: its filterable columns.
pub fn kind_attributes<S>(kind: RecordKind) -> MethodRouter<Arc<S>>
where
  S: HistoryStore + 'static,
{
  get(move || async move { Json(kind.column_names()) })
}

/// `GET /thing_attributes`: every kind's filterable columns, keyed by the
/// singular kind name.
pub async fn thing_attributes()
-> Json<BTreeMap<&'static str, Vec<&'static str>>> {
  Json(
    RecordKind::ALL
      .into_iter()
      .map(|kind| (kind.name(), kind.column_names()))
      .collect(),
  )
}

