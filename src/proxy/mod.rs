//! Core HTTP routing handler.
//!
//! The [`route_handler`] function is the Axum fallback that receives every
//! request outside the reserved health path, resolves it against a fresh
//! route table snapshot, and hands it to the [`Forwarder`]. Submodules
//! handle header construction ([`headers`]) and streaming dispatch
//! ([`forward`]).

pub mod forward;
pub mod headers;

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::{request::Parts, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::server::AppState;
pub use forward::{Forwarder, RequestContext};
use headers::CORRELATION_ID;

/// Per-request failures. Each one becomes an HTTP response; none is fatal.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum RouteError {
    #[error("no rule matches {host}{path}")]
    NoMatchingRule { host: String, path: String },

    #[error("request has no host")]
    MissingHost,

    #[error("backend {endpoint} unavailable: {source}")]
    BackendUnavailable {
        endpoint: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("request body exceeds the configured limit")]
    PayloadTooLarge,

    #[error("client disconnected")]
    ClientDisconnected,
}

impl RouteError {
    #[must_use]
    pub fn status(&self, no_match_status: StatusCode) -> StatusCode {
        match self {
            Self::NoMatchingRule { .. } => no_match_status,
            Self::MissingHost | Self::ClientDisconnected => StatusCode::BAD_REQUEST,
            Self::BackendUnavailable { .. } => StatusCode::BAD_GATEWAY,
            Self::PayloadTooLarge => StatusCode::PAYLOAD_TOO_LARGE,
        }
    }
}

pub async fn route_handler(
    State(state): State<Arc<AppState>>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    request: Request,
) -> Response {
    let (parts, body) = request.into_parts();
    let correlation_id = parts
        .headers
        .get(CORRELATION_ID)
        .and_then(|v| v.to_str().ok())
        .map_or_else(|| uuid::Uuid::new_v4().to_string(), String::from);

    let mut response = match dispatch(&state, parts, body, addr, &correlation_id).await {
        Ok(response) => {
            state.stats.forwarded.fetch_add(1, Ordering::Relaxed);
            response
        }
        Err(e) => error_response(&state, &e, &correlation_id),
    };

    if let Ok(val) = HeaderValue::from_str(&correlation_id) {
        response.headers_mut().insert(CORRELATION_ID, val);
    }
    response
}

async fn dispatch(
    state: &AppState,
    parts: Parts,
    body: axum::body::Body,
    addr: SocketAddr,
    correlation_id: &str,
) -> Result<Response, RouteError> {
    let host = request_host(&parts).ok_or(RouteError::MissingHost)?;
    let path = parts.uri.path().to_string();

    // One snapshot per request, used for its whole lifetime.
    let snapshot = state.table.snapshot();
    let binding = snapshot
        .resolve(&host, &path)
        .ok_or_else(|| RouteError::NoMatchingRule {
            host: host.clone(),
            path: path.clone(),
        })?;
    let endpoint = Arc::clone(&binding.endpoint);

    tracing::info!(
        correlation_id = %correlation_id,
        method = %parts.method,
        host = %host,
        path = %path,
        rule = %binding.rule,
        endpoint = %endpoint,
        "request routed"
    );

    let ctx = RequestContext {
        method: parts.method,
        uri: parts.uri,
        headers: parts.headers,
        body,
        client_ip: addr.ip(),
        correlation_id: correlation_id.to_string(),
        snapshot: Arc::clone(&snapshot),
    };
    state.forwarder.forward(ctx, endpoint).await
}

fn error_response(state: &AppState, error: &RouteError, correlation_id: &str) -> Response {
    match error {
        RouteError::NoMatchingRule { host, path } => {
            tracing::warn!(
                correlation_id = %correlation_id,
                host = %host,
                path = %path,
                "no rule matched"
            );
            state.stats.unmatched.fetch_add(1, Ordering::Relaxed);
        }
        RouteError::ClientDisconnected => {
            tracing::debug!(correlation_id = %correlation_id, "client disconnected mid-request");
        }
        RouteError::BackendUnavailable { .. } => {
            tracing::error!(correlation_id = %correlation_id, error = %error, "backend unavailable");
            state.stats.failed.fetch_add(1, Ordering::Relaxed);
        }
        RouteError::MissingHost | RouteError::PayloadTooLarge => {
            tracing::warn!(correlation_id = %correlation_id, error = %error, "request rejected");
        }
    }
    error
        .status(state.options.no_match_status)
        .into_response()
}

/// The `Host` header, or the URI authority for absolute-form requests.
fn request_host(parts: &Parts) -> Option<String> {
    parts
        .headers
        .get(hyper::header::HOST)
        .and_then(|v| v.to_str().ok())
        .or_else(|| parts.uri.host())
        .map(str::trim)
        .filter(|h| !h.is_empty())
        .map(String::from)
}
