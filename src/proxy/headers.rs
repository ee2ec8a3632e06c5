//! Header construction, forwarding, and hop-by-hop stripping.
//!
//! [`build_forwarded_headers`] clones the original client headers, strips
//! hop-by-hop headers, optionally rewrites `Host` to the backend's
//! authority, and adds proxy metadata (`X-Forwarded-For`, `X-Real-IP`,
//! `X-Forwarded-Host`, `X-Forwarded-Proto`, `Via`, `X-Correlation-Id`).

use std::net::IpAddr;
use std::sync::LazyLock;

use axum::http::{HeaderMap, HeaderName, HeaderValue};

use crate::routing::ServiceEndpoint;

pub const CORRELATION_ID: &str = "x-correlation-id";

static HOP_BY_HOP: LazyLock<Vec<HeaderName>> = LazyLock::new(|| {
    [
        "connection",
        "keep-alive",
        "transfer-encoding",
        "te",
        "trailer",
        "upgrade",
        "proxy-connection",
        "proxy-authorization",
        "proxy-authenticate",
    ]
    .iter()
    .filter_map(|name| name.parse::<HeaderName>().ok())
    .collect()
});

/// Remove hop-by-hop headers, including any named in `Connection`.
///
/// Used on both directions. `content-length` is kept: bodies are streamed
/// through unchanged.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(hyper::header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| name.trim().parse::<HeaderName>().ok())
        .collect();
    for name in listed.iter().chain(HOP_BY_HOP.iter()) {
        headers.remove(name);
    }
}

pub fn build_forwarded_headers(
    original: &HeaderMap,
    client_ip: IpAddr,
    endpoint: &ServiceEndpoint,
    rewrite_host: bool,
    correlation_id: &str,
) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);

    if rewrite_host {
        if let Ok(val) = HeaderValue::from_str(&endpoint.authority()) {
            headers.insert(hyper::header::HOST, val);
        }
    }

    // X-Forwarded-For: append to chain
    let client_ip = client_ip.to_string();
    let xff = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .map_or_else(
            || client_ip.clone(),
            |existing| format!("{existing}, {client_ip}"),
        );
    if let Ok(val) = HeaderValue::from_str(&xff) {
        headers.insert("x-forwarded-for", val);
    }

    // X-Real-IP (first IP in chain)
    let real_ip = xff.split(',').next().unwrap_or(&client_ip).trim();
    if let Ok(val) = HeaderValue::from_str(real_ip) {
        headers.insert("x-real-ip", val);
    }

    // Inbound is plain HTTP; keep a proto set by an outer proxy.
    if !headers.contains_key("x-forwarded-proto") {
        headers.insert("x-forwarded-proto", HeaderValue::from_static("http"));
    }

    if let Some(original_host) = original.get(hyper::header::HOST) {
        headers.insert("x-forwarded-host", original_host.clone());
    }

    headers.insert(hyper::header::VIA, HeaderValue::from_static("1.1 junction"));

    if let Ok(val) = HeaderValue::from_str(correlation_id) {
        headers.insert(CORRELATION_ID, val);
    }

    headers
}
