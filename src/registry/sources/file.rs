//! Services file registry source.
//!
//! On subscribe the file is loaded and validated (a broken file at startup
//! is an error), and one `Added` event is emitted per service. The file is
//! then polled; when its SHA256 changes the new version is diffed against
//! the last good one by service name. A file that fails to parse or
//! validate is reported on the stream once and the previous version stays
//! in effect until the file changes again.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::stream::{self, StreamExt};
use tokio::time::{Instant, Interval, MissedTickBehavior};

use crate::config::model::{ServiceDef, ServicesFile};
use crate::config::sources::file_source::ServicesFileReader;
use crate::config::ConfigVersion;
use crate::error::JunctionError;
use crate::registry::{EventSource, EventStream, RegistryEvent};

type Services = BTreeMap<String, ServiceDef>;

#[derive(Debug)]
pub struct FileSource {
    reader: ServicesFileReader,
    poll_interval: Duration,
}

impl FileSource {
    #[must_use]
    pub fn new(reader: ServicesFileReader, poll_interval: Duration) -> Self {
        Self {
            reader,
            poll_interval,
        }
    }
}

#[async_trait]
impl EventSource for FileSource {
    fn name(&self) -> &'static str {
        "file"
    }

    async fn subscribe(&self) -> Result<EventStream, JunctionError> {
        let (file, version) = self.reader.load().await?;
        let known = index_services(file);
        let mut initial: Vec<_> = known.values().map(|s| Ok(RegistryEvent::from(s))).collect();
        initial.push(Ok(RegistryEvent::synced(known.keys())));

        tracing::info!(
            path = %self.reader.path().display(),
            format = self.reader.format(),
            services = known.len(),
            "services file loaded"
        );

        let period = self.poll_interval.max(Duration::from_millis(10));
        let mut interval = tokio::time::interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        let state = PollState {
            reader: self.reader.clone(),
            interval,
            version,
            rejected: None,
            known,
        };
        let updates = stream::unfold(state, |mut state| async move {
            let batch = state.poll().await;
            Some((stream::iter(batch), state))
        })
        .flatten();

        Ok(stream::iter(initial).chain(updates).boxed())
    }
}

struct PollState {
    reader: ServicesFileReader,
    interval: Interval,
    version: ConfigVersion,
    rejected: Option<Rejected>,
    known: Services,
}

/// The last file state that failed, so it is reported once, not every tick.
#[derive(Debug, PartialEq, Eq)]
enum Rejected {
    Unreadable,
    Invalid(ConfigVersion),
}

impl PollState {
    async fn poll(&mut self) -> Vec<Result<RegistryEvent, JunctionError>> {
        self.interval.tick().await;

        let current = match self.reader.current_version().await {
            Ok(current) => current,
            Err(e) => return self.reject(Rejected::Unreadable, e),
        };
        if current == self.version {
            self.rejected = None;
            return Vec::new();
        }
        if self.rejected.as_ref() == Some(&Rejected::Invalid(current.clone())) {
            return Vec::new();
        }

        match self.reader.load().await {
            Ok((file, version)) => {
                let next = index_services(file);
                let events = diff_services(&self.known, &next);
                tracing::info!(
                    path = %self.reader.path().display(),
                    services = next.len(),
                    events = events.len(),
                    "services file changed"
                );
                self.known = next;
                self.version = version;
                self.rejected = None;
                events.into_iter().map(Ok).collect()
            }
            Err(e) => self.reject(Rejected::Invalid(current), e),
        }
    }

    fn reject(
        &mut self,
        rejected: Rejected,
        error: JunctionError,
    ) -> Vec<Result<RegistryEvent, JunctionError>> {
        if self.rejected.as_ref() == Some(&rejected) {
            return Vec::new();
        }
        self.rejected = Some(rejected);
        vec![Err(error)]
    }
}

fn index_services(file: ServicesFile) -> Services {
    file.services
        .into_iter()
        .map(|s| (s.name.clone(), s))
        .collect()
}

/// Events that take a table built from `old` to one built from `new`.
/// Removals come first so a rule moving between services is never
/// dropped by the stale owner's removal.
fn diff_services(old: &Services, new: &Services) -> Vec<RegistryEvent> {
    let removed = old
        .keys()
        .filter(|name| !new.contains_key(*name))
        .map(|name| RegistryEvent::removed(name));

    let added = new
        .iter()
        .filter(|(name, service)| old.get(*name) != Some(*service))
        .map(|(_, service)| RegistryEvent::from(service));

    removed.chain(added).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::model::RuleDef;

    fn service(name: &str, port: i64, host: &str) -> ServiceDef {
        ServiceDef {
            name: name.into(),
            address: name.into(),
            port,
            rules: vec![RuleDef {
                host: host.into(),
                path_prefix: String::new(),
            }],
        }
    }

    fn services(defs: Vec<ServiceDef>) -> Services {
        index_services(ServicesFile { services: defs })
    }

    #[test]
    fn unchanged_services_produce_no_events() {
        let old = services(vec![service("a", 80, "a.localhost")]);
        assert!(diff_services(&old, &old.clone()).is_empty());
    }

    #[test]
    fn vanished_service_is_removed_first() {
        let old = services(vec![service("a", 80, "a.localhost")]);
        let new = services(vec![service("b", 80, "b.localhost")]);
        let events = diff_services(&old, &new);
        assert_eq!(events[0], RegistryEvent::removed("a"));
        assert_eq!(events[1].endpoint_id(), Some("b"));
        assert_eq!(events.len(), 2);
    }

    #[test]
    fn changed_service_is_re_added() {
        let old = services(vec![service("a", 80, "a.localhost")]);
        let new = services(vec![service("a", 8080, "a.localhost")]);
        let events = diff_services(&old, &new);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            &events[0],
            RegistryEvent::Added { endpoint, .. } if endpoint.port == 8080
        ));
    }
}
