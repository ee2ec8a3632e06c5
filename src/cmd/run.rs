//! `junction run`: start the router.
//!
//! Resolves the services file, subscribes to it as a registry source,
//! spawns the [`RegistryWatcher`] that keeps the route table current, and
//! serves HTTP with graceful shutdown.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cli::RunArgs;
use crate::config::{sources, RouterOptions};
use crate::error::JunctionError;
use crate::logging;
use crate::registry::sources::FileSource;
use crate::registry::watcher::RegistryWatcher;
use crate::registry::EventSource;
use crate::routing::RouteTable;
use crate::server::{self, AppState};

const AUTO_DETECT: [&str; 4] = [
    "junction.yaml",
    "junction.yml",
    "junction.json",
    "junction.toml",
];

pub async fn execute(args: RunArgs) -> Result<(), JunctionError> {
    let log_format = logging::resolve_format(args.pretty, args.json);
    logging::init(&args.log_level, log_format);

    let options = RouterOptions::from_args(&args)?;

    let path = resolve_services_file(args.services.as_deref()).await?;
    let reader = sources::reader_for(&path)?;
    let source = FileSource::new(reader, Duration::from_secs(args.poll_interval));

    // A source that cannot be subscribed to at startup is fatal.
    let events = source.subscribe().await?;

    let table = Arc::new(RouteTable::new());
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);

    let mut watcher = RegistryWatcher::new(Arc::clone(&table));
    let watcher_handle = tokio::spawn(async move {
        watcher.run(events, shutdown_rx).await;
    });

    let addr: SocketAddr = format!("{}:{}", args.host, options.listen_port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!(
        addr = %addr,
        source = source.name(),
        services_file = %path.display(),
        no_match_status = options.no_match_status.as_u16(),
        "junction started"
    );

    let state = Arc::new(AppState::new(table, options));
    let router = server::build_router(state);

    // Shutdown also stops the watcher, so no table writes race the drain.
    let graceful_shutdown = async move {
        server::shutdown_signal().await;
        let _ = shutdown_tx.send(true);
    };

    axum::serve(
        listener,
        router.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(graceful_shutdown)
    .await?;

    if let Err(e) = watcher_handle.await {
        tracing::error!(error = %e, "registry watcher task failed");
    }

    tracing::info!("junction stopped");
    Ok(())
}

async fn resolve_services_file(explicit: Option<&Path>) -> Result<PathBuf, JunctionError> {
    if let Some(path) = explicit {
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(JunctionError::ServicesFileNotFound {
                path: path.to_path_buf(),
            });
        }
        return Ok(path.to_path_buf());
    }

    for name in AUTO_DETECT {
        let path = PathBuf::from(name);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tracing::info!(path = %path.display(), "auto-detected services file");
            return Ok(path);
        }
    }

    Err(JunctionError::NoServicesFile {
        hint: "Provide --services <file> or create ./junction.yaml.".into(),
    })
}
