//! Router tests against an in-memory SQLite store.

use std::sync::Arc;

use axum::{
  Router,
  body::Body,
  http::{Request, StatusCode, header},
};
use history_store_sqlite::SqliteStore;
use serde_json::{Value, json};
use tower::ServiceExt as _;

use crate::api_router;

async fn app() -> Router {
  let store = SqliteStore::open_in_memory().await.unwrap();
  api_router(Arc::new(store))
}

async fn send(
  app: &Router,
  method: &str,
  uri: &str,
  body: Option<Value>,
) -> (StatusCode, Value) {
  let mut builder = Request::builder().method(method).uri(uri);
  let body = match body {
    Some(v) => {
      builder = builder.header(header::CONTENT_TYPE, "application/json");
      Body::from(v.to_string())
    }
    None => Body::empty(),
  };
  let resp = app
    .clone()
    .oneshot(builder.body(body).unwrap())
    .await
    .unwrap();
  let status = resp.status();
  let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX)
    .await
    .unwrap();
  let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, json)
}

async fn post_build(app: &Router, version: &str, duration: i64) -> i64 {
  let (status, body) = send(
    app,
    "POST",
    "/build",
    Some(json!({
      "version_type": "changeset",
      "version": version,
      "job_url": format!("https://ci/job/{version}"),
      "job_description": "build",
      "duration": duration,
      "result": "SUCCESS",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  body["id"].as_i64().unwrap()
}

// ── Builds ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_and_fetch_build() {
  let app = app().await;
  let id = post_build(&app, "abc", 12).await;

  let (status, body) = send(&app, "GET", &format!("/build/{id}"), None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["build_id"], id);
  assert_eq!(body["version"], "abc");
  assert_eq!(body["misc"], json!({}));

  let (status, body) =
    send(&app, "GET", "/build?version_type=changeset&version=abc", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body.as_array().unwrap().len(), 1);

  let (_, body) = send(&app, "GET", "/build/all", None).await;
  assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn build_list_without_selector_is_bad_request() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/build", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert!(body["error"].as_str().unwrap().contains("job_url"));
}

#[tokio::test]
async fn missing_build_is_404_but_empty_list_by_selector() {
  let app = app().await;
  let (status, _) = send(&app, "GET", "/build/41", None).await;
  assert_eq!(status, StatusCode::NOT_FOUND);

  let (status, body) = send(&app, "GET", "/build?build_id=41", None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!([]));
}

// ── Artifacts ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn artifact_for_unknown_build_conflicts() {
  let app = app().await;
  let (status, body) = send(
    &app,
    "POST",
    "/artifact",
    Some(json!({
      "version_type": "changeset",
      "version": "abc",
      "filename": "abc.tar.gz",
      "build_id": 99,
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CONFLICT);
  assert_eq!(body["error"], "build 99 not found");
}

#[tokio::test]
async fn artifacts_carry_build_columns() {
  let app = app().await;
  let build_id = post_build(&app, "r7", 20).await;
  for name in ["r7.tar.gz", "r7-docs.tar.gz"] {
    let (status, _) = send(
      &app,
      "POST",
      "/artifact",
      Some(json!({
        "version_type": "changeset",
        "version": "r7",
        "filename": name,
        "build_id": build_id,
      })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
  }

  let (status, body) = send(
    &app,
    "GET",
    "/artifact?version_type=changeset&version=r7",
    None,
  )
  .await;
  assert_eq!(status, StatusCode::OK);
  let artifacts = body.as_array().unwrap();
  assert_eq!(artifacts.len(), 2);
  for a in artifacts {
    assert_eq!(a["duration"], 20);
    assert_eq!(a["job_url"], "https://ci/job/r7");
    assert_eq!(a["thing_type"], "filename");
  }
}

// ── Promotes and deploys ─────────────────────────────────────────────────────

#[tokio::test]
async fn promote_round_trip() {
  let app = app().await;
  let (status, body) = send(
    &app,
    "POST",
    "/promote",
    Some(json!({
      "thing_type": "dockerimage",
      "thing_name": "registry/app",
      "environment": "production",
      "misc": { "approver": "ops" },
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = body["id"].as_i64().unwrap();

  let (_, body) = send(&app, "GET", "/promote?environment=production", None)
    .await;
  assert_eq!(body[0]["promote_id"], id);
  assert_eq!(body[0]["misc"]["approver"], "ops");
  assert!(body[0].get("thing_time").is_some());
}

#[tokio::test]
async fn deploy_empty_servername_is_absent() {
  let app = app().await;
  let (status, body) = send(
    &app,
    "POST",
    "/deploy",
    Some(json!({
      "thing_type": "config",
      "thing_name": "app.yaml",
      "version_type": "package",
      "version": "1.2.3",
      "environment": "qa",
      "servername": "",
    })),
  )
  .await;
  assert_eq!(status, StatusCode::CREATED);
  let id = body["id"].as_i64().unwrap();

  let (_, body) = send(&app, "GET", &format!("/deploy/{id}"), None).await;
  assert_eq!(body["environment"], "qa");
  assert!(body.get("servername").is_none());

  let (_, body) =
    send(&app, "GET", "/deploy?thing_name=app.yaml&thing_type=config", None)
      .await;
  assert_eq!(body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_enum_in_body_is_rejected() {
  let app = app().await;
  let (status, _) = send(
    &app,
    "POST",
    "/deploy",
    Some(json!({
      "thing_type": "config",
      "thing_name": "app.yaml",
      "version_type": "package",
      "version": "1.2.3",
      "environment": "staging",
    })),
  )
  .await;
  assert!(status.is_client_error());
}

// ── Search ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn kind_search_with_comparator_range() {
  let app = app().await;
  for (v, d) in [("a", 10), ("b", 9), ("c", 7)] {
    post_build(&app, v, d).await;
  }

  // duration=<=9,>7
  let (status, body) =
    send(&app, "GET", "/build/search?duration=%3C%3D9%2C%3E7", None).await;
  assert_eq!(status, StatusCode::OK);
  let found = body.as_array().unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0]["duration"], 9);

  let (status, _) =
    send(&app, "GET", "/build/search?duration=%3Csoon", None).await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn search_all_kinds_omits_empty_kinds() {
  let app = app().await;
  post_build(&app, "only", 1).await;

  let (status, body) = send(&app, "GET", "/search?version=only", None).await;
  assert_eq!(status, StatusCode::OK);
  let keys: Vec<&str> =
    body.as_object().unwrap().keys().map(String::as_str).collect();
  assert_eq!(keys, vec!["builds"]);

  // servername exists only on deploys, so nothing else can match.
  let (_, body) = send(&app, "GET", "/search?servername=web-01", None).await;
  assert_eq!(body, json!({}));
}

#[tokio::test]
async fn conjunction_query_with_wildcard() {
  let app = app().await;
  post_build(&app, "a", 10).await;
  post_build(&app, "b", 3).await;

  // version_type == change* && duration <= 9
  let uri = "/search/query?kinds=BUILDS\
             &q=version_type%20%3D%3D%20change*%20%26%26%20duration%20%3C%3D%209";
  let (status, body) = send(&app, "GET", uri, None).await;
  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["builds"].as_array().unwrap().len(), 1);
  assert_eq!(body["builds"][0]["version"], "b");

  let (status, _) =
    send(&app, "GET", "/search/query?kinds=RELEASES&q=version%3D%3Da", None)
      .await;
  assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn attribute_listings() {
  let app = app().await;
  let (status, body) = send(&app, "GET", "/deploy/attributes", None).await;
  assert_eq!(status, StatusCode::OK);
  assert!(body.as_array().unwrap().contains(&json!("servername")));

  let (_, body) = send(&app, "GET", "/thing_attributes", None).await;
  assert!(body["artifact"].as_array().unwrap().contains(&json!("job_url")));
  assert_eq!(body.as_object().unwrap().len(), 4);
}
