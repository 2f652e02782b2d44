use anyhow::Result;
use axum::http::header::HeaderName;
use axum::http::Request;
use axum::Router;
use std::time::Duration;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::{DefaultOnResponse, TraceLayer};
use tower_http::LatencyUnit;
use tracing::Level;

use crate::config;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Per-request bounds applied in front of every route. Bodies are JSON only;
/// media is uploaded elsewhere and referenced by path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub body_limit_bytes: usize,
}

impl Default for HttpLimits {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(30),
            body_limit_bytes: 256 * 1024,
        }
    }
}

impl HttpLimits {
    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        let timeout_seconds = config::u64_from_env(
            "TM_REQUEST_TIMEOUT_SECONDS",
            defaults.request_timeout.as_secs(),
        )?;
        let body_limit_bytes =
            config::u64_from_env("TM_BODY_LIMIT_BYTES", defaults.body_limit_bytes as u64)?;
        Ok(Self {
            request_timeout: Duration::from_secs(timeout_seconds),
            body_limit_bytes: usize::try_from(body_limit_bytes).unwrap_or(usize::MAX),
        })
    }
}

/// Request id, tracing span, timeout and body limit.
pub fn apply_standard_layers(router: Router, service_name: &'static str, limits: HttpLimits) -> Router {
    let trace = TraceLayer::new_for_http()
        .make_span_with(move |request: &Request<_>| {
            let request_id = request
                .headers()
                .get(REQUEST_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                service = service_name,
                method = %request.method(),
                path = %request.uri().path(),
                request_id = %request_id
            )
        })
        .on_response(
            DefaultOnResponse::new()
                .level(Level::INFO)
                .latency_unit(LatencyUnit::Millis),
        );

    let request_id_header = HeaderName::from_static(REQUEST_ID_HEADER);

    router
        .layer(trace)
        .layer(TimeoutLayer::new(limits.request_timeout))
        .layer(RequestBodyLimitLayer::new(limits.body_limit_bytes))
        .layer(PropagateRequestIdLayer::new(request_id_header.clone()))
        .layer(SetRequestIdLayer::new(request_id_header, MakeRequestUuid))
}
