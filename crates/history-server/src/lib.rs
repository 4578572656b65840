//! HTTP front end for the delivery history ledger.
//!
//! Mounts [`history_api::api_router`] under `/api/v1`, adds liveness and
//! build-info routes, and wraps everything in request metrics and tracing.

pub mod settings;
pub mod telemetry;

use std::sync::Arc;

use axum::{Json, Router, routing::get};
use history_core::store::HistoryStore;
use serde::Serialize;
use tower_http::trace::TraceLayer;

pub use settings::Settings;
use telemetry::MetricsLayer;

/// Build the full application router for `store`.
pub fn router<S>(store: Arc<S>) -> Router
where
  S: HistoryStore + 'static,
{
  Router::new()
    .route("/healthz", get(history_api::healthz))
    .route("/propertiez", get(propertiez))
    .nest("/api/v1", history_api::api_router(store))
    .layer(MetricsLayer)
    .layer(TraceLayer::new_for_http())
}

/// Build information baked in at compile time.
#[derive(Debug, Serialize)]
pub struct Properties {
  pub version:    &'static str,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub git_hash:   Option<&'static str>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub build_date: Option<&'static str>,
}

/// `GET /propertiez`
async fn propertiez() -> Json<Properties> {
  tracing::debug!("checking properties");
  Json(Properties {
    version:    env!("CARGO_PKG_VERSION"),
    git_hash:   option_env!("HISTORY_GIT_HASH"),
    build_date: option_env!("HISTORY_BUILD_DATE"),
  })
}

#[cfg(test)]
mod tests {
  use std::sync::OnceLock;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use history_store_sqlite::SqliteStore;
  use metrics_exporter_prometheus::PrometheusHandle;
  use tower::ServiceExt as _;

  use super::*;

  async fn fetch(uri: &str) -> (StatusCode, Vec<u8>) {
    let store = SqliteStore::open_in_memory().await.unwrap();
    let req = Request::builder().uri(uri).body(Body::empty()).unwrap();
    let resp = router(Arc::new(store)).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    (status, bytes.to_vec())
  }

  async fn get_status(uri: &str) -> StatusCode { fetch(uri).await.0 }

  /// The recorder is process-wide, so every test shares one.
  fn recorder() -> &'static PrometheusHandle {
    static HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();
    HANDLE.get_or_init(|| telemetry::install_recorder().unwrap())
  }

  #[tokio::test]
  async fn healthz_is_ok() {
    assert_eq!(get_status("/healthz").await, StatusCode::OK);
  }

  #[tokio::test]
  async fn api_is_nested_under_v1() {
    assert_eq!(get_status("/api/v1/build/all").await, StatusCode::OK);
    assert_eq!(get_status("/build/all").await, StatusCode::NOT_FOUND);
  }

  #[tokio::test]
  async fn propertiez_reports_the_package_version() {
    let (status, body) = fetch("/propertiez").await;
    assert_eq!(status, StatusCode::OK);
    let body: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
  }

  #[tokio::test]
  async fn requests_are_measured_by_matched_route() {
    let handle = recorder();
    assert_eq!(get_status("/api/v1/deploy/4242").await, StatusCode::NOT_FOUND);
    assert_eq!(get_status("/api/v1/deploy/all").await, StatusCode::OK);

    let text = handle.render();
    let errors = text
      .lines()
      .find(|l| {
        l.starts_with(telemetry::ERRORS)
          && l.contains(r#"route="/api/v1/deploy/{id}""#)
      })
      .expect("error counter for the by-id route");
    assert!(errors.contains(r#"method="GET""#));
    assert!(errors.contains(r#"code="404""#));

    let latency = format!("{}_count", telemetry::LATENCY);
    assert!(text.lines().any(|l| {
      l.starts_with(&latency)
        && l.contains(r#"route="/api/v1/deploy/all""#)
        && l.contains(r#"code="200""#)
    }));
    assert!(!text.lines().any(|l| {
      l.starts_with(telemetry::ERRORS)
        && l.contains(r#"route="/api/v1/deploy/all""#)
    }));
  }

  #[tokio::test]
  async fn metrics_router_serves_exposition_text() {
    let handle = recorder().clone();
    metrics::counter!(
      telemetry::ERRORS,
      "method" => "GET",
      "route" => "/x",
      "code" => "500"
    )
    .increment(1);
    let req = Request::builder().uri("/metrics").body(Body::empty()).unwrap();
    let resp = telemetry::metrics_router(handle).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
      .await
      .unwrap();
    let text = String::from_utf8(bytes.to_vec()).unwrap();
    assert!(text.contains(telemetry::ERRORS));
  }
}
