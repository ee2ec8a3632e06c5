//! Axum server setup, shared application state, and graceful shutdown.
//!
//! Contains [`AppState`] (the `Arc`-shared state holding the route table,
//! forwarder, options, stats, and uptime), [`build_router`] for
//! constructing the Axum router with middleware layers,
//! [`build_http_client`] for the backend hyper client, and
//! [`shutdown_signal`] for SIGTERM / Ctrl+C handling.

use std::sync::atomic::AtomicU64;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::body::Body;
use axum::routing::get;
use axum::Router;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use tower::ServiceBuilder;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::trace::TraceLayer;

use crate::config::RouterOptions;
use crate::health::{health_handler, HEALTH_PATH};
use crate::proxy::{self, Forwarder};
use crate::routing::RouteTable;

#[derive(Debug)]
pub struct Stats {
    pub forwarded: AtomicU64,
    pub failed: AtomicU64,
    pub unmatched: AtomicU64,
}

impl Default for Stats {
    fn default() -> Self {
        Self::new()
    }
}

impl Stats {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            forwarded: AtomicU64::new(0),
            failed: AtomicU64::new(0),
            unmatched: AtomicU64::new(0),
        }
    }
}

pub type HttpClient = Client<HttpConnector, Body>;

pub struct AppState {
    pub table: Arc<RouteTable>,
    pub forwarder: Forwarder,
    pub options: RouterOptions,
    pub start_time: Instant,
    pub stats: Stats,
}

impl AppState {
    /// Build state around an existing table, typically one a
    /// [`RegistryWatcher`](crate::registry::watcher::RegistryWatcher) writes to.
    #[must_use]
    pub fn new(table: Arc<RouteTable>, options: RouterOptions) -> Self {
        let client = build_http_client(options.connect_timeout);
        Self {
            table,
            forwarder: Forwarder::new(client, options.rewrite_host),
            options,
            start_time: Instant::now(),
            stats: Stats::new(),
        }
    }
}

/// One backend connection per forwarded request: idle connections are not
/// pooled, so a deregistered or restarted backend never sees reused sockets.
#[must_use]
pub fn build_http_client(connect_timeout: Duration) -> HttpClient {
    let mut connector = HttpConnector::new();
    connector.set_connect_timeout(Some(connect_timeout));
    connector.set_nodelay(true);
    Client::builder(TokioExecutor::new())
        .pool_max_idle_per_host(0)
        .build(connector)
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let max_body = state.options.max_body;
    Router::new()
        .route(HEALTH_PATH, get(health_handler))
        .fallback(proxy::route_handler)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(RequestBodyLimitLayer::new(max_body)),
        )
        .with_state(state)
}

pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => tracing::info!("received Ctrl+C"),
        () = terminate => tracing::info!("received SIGTERM"),
    }
}
