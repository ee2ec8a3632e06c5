//! Service registry events and the sources that produce them.
//!
//! A registry source announces services coming and going as
//! [`RegistryEvent`]s on a lazy, unbounded [`EventStream`]. The
//! [`RegistryWatcher`](watcher::RegistryWatcher) consumes that stream and
//! keeps the [`RouteTable`](crate::routing::RouteTable) in sync. Event
//! payloads are raw (unvalidated); validation happens in the watcher so a
//! bad event can be rejected without touching existing routes.

pub mod sources;
pub mod watcher;

use async_trait::async_trait;
use futures_util::stream::BoxStream;

use crate::error::JunctionError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointSpec {
    pub name: String,
    pub address: String,
    pub port: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleSpec {
    pub host_pattern: String,
    pub path_prefix: String,
}

impl RuleSpec {
    #[must_use]
    pub fn new(host_pattern: &str, path_prefix: &str) -> Self {
        Self {
            host_pattern: host_pattern.to_string(),
            path_prefix: path_prefix.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RegistryEvent {
    /// A service started (or changed) and declares these rules.
    Added {
        endpoint: EndpointSpec,
        rules: Vec<RuleSpec>,
    },
    /// A service stopped; `endpoint_id` is the endpoint name.
    Removed { endpoint_id: String },
    /// The source's complete live set. Ends a replay: any endpoint the
    /// consumer still holds that is not listed here is gone.
    Synced { endpoint_ids: Vec<String> },
}

impl RegistryEvent {
    #[must_use]
    pub fn added(name: &str, address: &str, port: i64, rules: Vec<RuleSpec>) -> Self {
        Self::Added {
            endpoint: EndpointSpec {
                name: name.to_string(),
                address: address.to_string(),
                port,
            },
            rules,
        }
    }

    #[must_use]
    pub fn removed(endpoint_id: &str) -> Self {
        Self::Removed {
            endpoint_id: endpoint_id.to_string(),
        }
    }

    #[must_use]
    pub fn synced<I, S>(endpoint_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::Synced {
            endpoint_ids: endpoint_ids.into_iter().map(Into::into).collect(),
        }
    }

    /// The endpoint this event is about; `None` for [`Synced`](Self::Synced).
    #[must_use]
    pub fn endpoint_id(&self) -> Option<&str> {
        match self {
            Self::Added { endpoint, .. } => Some(&endpoint.name),
            Self::Removed { endpoint_id } => Some(endpoint_id),
            Self::Synced { .. } => None,
        }
    }
}

/// `Err` items are per-event problems (unparseable input, a lagging
/// subscriber); the stream keeps going after them. A source that may have
/// dropped events follows the error with a fresh replay ending in
/// [`RegistryEvent::Synced`]. The stream ending
/// means the source has terminated.
pub type EventStream = BoxStream<'static, Result<RegistryEvent, JunctionError>>;

// async_trait is required here because sources are used as Box<dyn EventSource>.
#[async_trait]
pub trait EventSource: Send + Sync {
    fn name(&self) -> &'static str;

    /// Open a fresh event stream. May be called again to restart after the
    /// previous stream ended; each stream starts by replaying the services
    /// the source currently knows about, closed by a `Synced` event.
    async fn subscribe(&self) -> Result<EventStream, JunctionError>;
}
