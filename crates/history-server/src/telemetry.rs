//! Prometheus request metrics.
//!
//! [`MetricsLayer`] observes every request into a latency histogram and
//! counts 4xx/5xx responses, both labelled by method, matched route and
//! status code. [`metrics_router`] serves the rendered exposition text.

use std::{
  future::Future,
  pin::Pin,
  task::{Context, Poll},
  time::Instant,
};

use axum::{
  Router,
  extract::{MatchedPath, State},
  http::{Request, Response},
  routing::get,
};
use metrics::{counter, histogram};
use metrics_exporter_prometheus::{
  BuildError, Matcher, PrometheusBuilder, PrometheusHandle,
};
use tower::{Layer, Service};

pub const LATENCY: &str = "http_request_latency_seconds";
pub const ERRORS: &str = "http_request_errors_total";

const LATENCY_BUCKETS: [f64; 14] = [
  0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5,
  10.0,
];

/// Route label for requests no route matched.
const UNMATCHED: &str = "unmatched";

/// Install the process-wide Prometheus recorder.
///
/// Can succeed once per process; later calls return an error.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
  PrometheusBuilder::new()
    .set_buckets_for_metric(Matcher::Full(LATENCY.to_owned()), &LATENCY_BUCKETS)?
    .install_recorder()
}

/// `GET /metrics` for a scraper.
pub fn metrics_router(handle: PrometheusHandle) -> Router {
  Router::new().route("/metrics", get(render)).with_state(handle)
}

async fn render(State(handle): State<PrometheusHandle>) -> String {
  handle.render()
}

// ─── Layer ───────────────────────────────────────────────────────────────────

/// Tower layer that records request metrics.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLayer;

impl<S> Layer<S> for MetricsLayer {
  type Service = MetricsService<S>;

  fn layer(&self, inner: S) -> Self::Service { MetricsService { inner } }
}

#[derive(Debug, Clone)]
pub struct MetricsService<S> {
  inner: S,
}

impl<S, ReqBody, ResBody> Service<Request<ReqBody>> for MetricsService<S>
where
  S: Service<Request<ReqBody>, Response = Response<ResBody>> + Send + 'static,
  S::Future: Send + 'static,
  ReqBody: Send + 'static,
  ResBody: Send + 'static,
{
  type Response = S::Response;
  type Error = S::Error;
  type Future = Pin<
    Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send>,
  >;

  fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
    self.inner.poll_ready(cx)
  }

  fn call(&mut self, req: Request<ReqBody>) -> Self::Future {
    let method = req.method().to_string();
    let route = req
      .extensions()
      .get::<MatchedPath>()
      .map_or_else(|| UNMATCHED.to_owned(), |p| p.as_str().to_owned());
    let start = Instant::now();
    let response = self.inner.call(req);

    Box::pin(async move {
      let result = response.await;
      let code = match &result {
        Ok(resp) => resp.status().as_u16(),
        Err(_) => 500,
      };
      observe(method, route, code, start.elapsed().as_secs_f64());
      result
    })
  }
}

fn observe(method: String, route: String, code: u16, seconds: f64) {
  let code = code.to_string();
  if code.starts_with('4') || code.starts_with('5') {
    counter!(
      ERRORS,
      "method" => method.clone(),
      "route" => route.clone(),
      "code" => code.clone()
    )
    .increment(1);
  }
  histogram!(LATENCY, "method" => method, "route" => route, "code" => code)
    .record(seconds);
}
