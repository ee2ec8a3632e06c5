//! Streaming forwarder.
//!
//! [`Forwarder::forward`] sends one request to one endpoint and hands back
//! the backend's response with its body still streaming. Neither body is
//! buffered. When the client goes away axum drops the handler future and
//! the response body, which drops the backend connection with them.

use std::net::IpAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use axum::body::Body;
use axum::http::{HeaderMap, Method, Uri};
use axum::response::Response;
use futures_util::TryStreamExt;
use hyper::body::Body as _;

use super::headers::{build_forwarded_headers, strip_hop_by_hop};
use super::RouteError;
use crate::routing::{RouteSnapshot, ServiceEndpoint};
use crate::server::HttpClient;

/// Everything about one inbound request the forwarder needs.
///
/// `snapshot` is the routing view the request was matched against. It is
/// held until the backend answers, so registry changes made meanwhile never
/// redirect the request.
pub struct RequestContext {
    pub method: Method,
    pub uri: Uri,
    pub headers: HeaderMap,
    pub body: Body,
    pub client_ip: IpAddr,
    pub correlation_id: String,
    pub snapshot: Arc<RouteSnapshot>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BodyAbort {
    Disconnected,
    TooLarge,
}

#[derive(Clone)]
pub struct Forwarder {
    client: HttpClient,
    rewrite_host: bool,
}

impl Forwarder {
    #[must_use]
    pub const fn new(client: HttpClient, rewrite_host: bool) -> Self {
        Self {
            client,
            rewrite_host,
        }
    }

    pub async fn forward(
        &self,
        ctx: RequestContext,
        endpoint: Arc<ServiceEndpoint>,
    ) -> Result<Response, RouteError> {
        let RequestContext {
            method,
            uri,
            headers,
            body,
            client_ip,
            correlation_id,
            snapshot,
        } = ctx;

        let target = upstream_uri(&endpoint, &uri)?;
        let forwarded_headers = build_forwarded_headers(
            &headers,
            client_ip,
            &endpoint,
            self.rewrite_host,
            &correlation_id,
        );

        let abort = Arc::new(OnceLock::new());
        let body = watch_request_body(body, Arc::clone(&abort));

        let mut request = hyper::Request::builder()
            .method(method)
            .uri(target)
            .body(body)
            .map_err(|e| RouteError::BackendUnavailable {
                endpoint: endpoint.to_string(),
                source: Box::new(e),
            })?;
        *request.headers_mut() = forwarded_headers;

        let start = Instant::now();
        let response = match self.client.request(request).await {
            Ok(response) => response,
            Err(e) => {
                return Err(match abort.get() {
                    Some(BodyAbort::TooLarge) => RouteError::PayloadTooLarge,
                    Some(BodyAbort::Disconnected) => RouteError::ClientDisconnected,
                    None => RouteError::BackendUnavailable {
                        endpoint: endpoint.to_string(),
                        source: Box::new(e),
                    },
                });
            }
        };

        tracing::debug!(
            correlation_id = %correlation_id,
            endpoint = %endpoint,
            status = response.status().as_u16(),
            latency_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX),
            "backend responded"
        );
        drop(snapshot);

        let (mut parts, incoming) = response.into_parts();
        strip_hop_by_hop(&mut parts.headers);
        Ok(Response::from_parts(parts, Body::new(incoming)))
    }
}

/// `http://address:port` plus the original path and query.
pub fn upstream_uri(endpoint: &ServiceEndpoint, original: &Uri) -> Result<Uri, RouteError> {
    let path_and_query = original
        .path_and_query()
        .map_or("/", hyper::http::uri::PathAndQuery::as_str);
    Uri::builder()
        .scheme("http")
        .authority(endpoint.authority())
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| RouteError::BackendUnavailable {
            endpoint: endpoint.to_string(),
            source: Box::new(e),
        })
}

/// Pass the client body through, recording why it failed if it does.
///
/// A failed upload makes the backend request fail too; the recorded reason
/// lets the caller tell a client abort from an unreachable backend.
fn watch_request_body(body: Body, abort: Arc<OnceLock<BodyAbort>>) -> Body {
    if body.is_end_stream() {
        return Body::empty();
    }
    Body::from_stream(body.into_data_stream().inspect_err(move |e| {
        let reason = if is_length_limit(e) {
            BodyAbort::TooLarge
        } else {
            BodyAbort::Disconnected
        };
        let _ = abort.set(reason);
    }))
}

fn is_length_limit(err: &axum::Error) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(e) = current {
        if e.is::<http_body_util::LengthLimitError>() {
            return true;
        }
        current = e.source();
    }
    false
}
