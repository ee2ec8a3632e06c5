//! Keeps the route table in step with registry events.
//!
//! The watcher is the only writer of the [`RouteTable`]. It remembers which
//! rules each endpoint registered (the reverse index) and which endpoint
//! currently owns each rule, so a `Removed` event deletes exactly what that
//! endpoint still owns. A rule later claimed by another endpoint is left
//! alone. A `Synced` event reconciles the index against the source's live
//! set, removing endpoints whose `Removed` event never arrived.

use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;

use futures_util::StreamExt;
use tokio::sync::watch;

use crate::error::ValidationError;
use crate::registry::{EndpointSpec, EventStream, RegistryEvent, RuleSpec};
use crate::routing::{RouteTable, Rule, ServiceEndpoint};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Applied {
    pub registered: usize,
    pub deregistered: usize,
}

#[derive(Debug)]
struct Registration {
    endpoint: Arc<ServiceEndpoint>,
    rules: BTreeSet<Rule>,
}

#[derive(Debug)]
pub struct RegistryWatcher {
    table: Arc<RouteTable>,
    by_endpoint: HashMap<String, Registration>,
    owners: HashMap<Rule, String>,
}

impl RegistryWatcher {
    #[must_use]
    pub fn new(table: Arc<RouteTable>) -> Self {
        Self {
            table,
            by_endpoint: HashMap::new(),
            owners: HashMap::new(),
        }
    }

    /// Apply one event. A rejected event leaves the table untouched.
    pub fn apply(&mut self, event: RegistryEvent) -> Result<Applied, ValidationError> {
        match event {
            RegistryEvent::Added { endpoint, rules } => self.add(&endpoint, &rules),
            RegistryEvent::Removed { endpoint_id } => Ok(self.remove(&endpoint_id)),
            RegistryEvent::Synced { endpoint_ids } => Ok(self.reconcile(&endpoint_ids)),
        }
    }

    /// Consume `events` until the stream ends or `shutdown` fires.
    ///
    /// Bad events and stream errors are logged and skipped. Takes `&mut self`
    /// so the same watcher (and its reverse index) can be run again on a
    /// fresh subscription.
    pub async fn run(&mut self, mut events: EventStream, mut shutdown: watch::Receiver<bool>) {
        loop {
            tokio::select! {
                next = events.next() => match next {
                    Some(Ok(event)) => {
                        let endpoint_id = event.endpoint_id().unwrap_or_default().to_string();
                        if let Err(e) = self.apply(event) {
                            tracing::warn!(
                                endpoint = %endpoint_id,
                                error = %e,
                                "registry event rejected"
                            );
                        }
                    }
                    Some(Err(e)) => {
                        tracing::warn!(error = %e, "registry stream error skipped");
                    }
                    None => {
                        tracing::info!("registry event stream ended");
                        return;
                    }
                },
                _ = shutdown.changed() => {
                    tracing::debug!("registry watcher shutting down");
                    return;
                }
            }
        }
    }

    /// Rules currently owned by `endpoint_id`.
    #[must_use]
    pub fn rules_for(&self, endpoint_id: &str) -> Vec<Rule> {
        self.by_endpoint
            .get(endpoint_id)
            .map(|r| {
                r.rules
                    .iter()
                    .filter(|rule| self.owners.get(*rule).map(String::as_str) == Some(endpoint_id))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default()
    }

    #[must_use]
    pub fn endpoint(&self, endpoint_id: &str) -> Option<Arc<ServiceEndpoint>> {
        self.by_endpoint
            .get(endpoint_id)
            .map(|r| Arc::clone(&r.endpoint))
    }

    fn add(
        &mut self,
        spec: &EndpointSpec,
        rule_specs: &[RuleSpec],
    ) -> Result<Applied, ValidationError> {
        // Validate everything before touching the table.
        let endpoint = Arc::new(ServiceEndpoint::new(&spec.name, &spec.address, spec.port)?);
        let rules = rule_specs
            .iter()
            .map(|r| {
                Rule::new(&r.host_pattern, &r.path_prefix)
                    .map_err(|e| e.in_subject(spec.name.clone()))
            })
            .collect::<Result<BTreeSet<_>, _>>()?;

        if rules.is_empty() {
            tracing::warn!(endpoint = %endpoint, "endpoint registered without rules");
        }

        let mut applied = Applied::default();
        let name = endpoint.name().to_string();

        // A re-announced endpoint drops the rules it no longer declares.
        if let Some(previous) = self.by_endpoint.remove(&name) {
            for stale in previous.rules.difference(&rules) {
                if self.release(stale, &name) {
                    applied.deregistered += 1;
                }
            }
        }

        for rule in &rules {
            self.table.register(rule.clone(), Arc::clone(&endpoint));
            applied.registered += 1;

            if let Some(prior_owner) = self.owners.insert(rule.clone(), name.clone()) {
                if prior_owner != name {
                    tracing::info!(
                        rule = %rule,
                        from = %prior_owner,
                        to = %name,
                        "rule rebound to another endpoint"
                    );
                    if let Some(prior) = self.by_endpoint.get_mut(&prior_owner) {
                        prior.rules.remove(rule);
                    }
                }
            }
        }

        tracing::info!(
            endpoint = %endpoint,
            rules = rules.len(),
            "endpoint registered"
        );
        self.by_endpoint.insert(name, Registration { endpoint, rules });
        Ok(applied)
    }

    fn remove(&mut self, endpoint_id: &str) -> Applied {
        let Some(registration) = self.by_endpoint.remove(endpoint_id) else {
            tracing::debug!(endpoint = %endpoint_id, "removal for unknown endpoint ignored");
            return Applied::default();
        };

        let mut applied = Applied::default();
        for rule in &registration.rules {
            if self.release(rule, endpoint_id) {
                applied.deregistered += 1;
            }
        }
        tracing::info!(
            endpoint = %registration.endpoint,
            rules = applied.deregistered,
            "endpoint deregistered"
        );
        applied
    }

    fn reconcile(&mut self, live: &[String]) -> Applied {
        let live: HashSet<&str> = live.iter().map(String::as_str).collect();
        let gone: Vec<String> = self
            .by_endpoint
            .keys()
            .filter(|name| !live.contains(name.as_str()))
            .cloned()
            .collect();

        let mut applied = Applied::default();
        for name in &gone {
            tracing::info!(endpoint = %name, "endpoint missing from registry resync");
            applied.deregistered += self.remove(name).deregistered;
        }
        applied
    }

    /// Deregister `rule` if `owner` still owns it.
    fn release(&mut self, rule: &Rule, owner: &str) -> bool {
        if self.owners.get(rule).map(String::as_str) != Some(owner) {
            return false;
        }
        self.owners.remove(rule);
        self.table.deregister(rule);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn added(name: &str, port: i64, rules: &[(&str, &str)]) -> RegistryEvent {
        RegistryEvent::added(
            name,
            name,
            port,
            rules.iter().map(|(h, p)| RuleSpec::new(h, p)).collect(),
        )
    }

    fn watcher() -> (RegistryWatcher, Arc<RouteTable>) {
        let table = Arc::new(RouteTable::new());
        (RegistryWatcher::new(Arc::clone(&table)), table)
    }

    #[test]
    fn added_registers_every_rule() {
        let (mut w, table) = watcher();
        let applied = w
            .apply(added("backend", 3000, &[("localhost", "/api"), ("api.localhost", "")]))
            .unwrap();
        assert_eq!(applied.registered, 2);
        assert_eq!(table.len(), 2);
        assert_eq!(w.rules_for("backend").len(), 2);
    }

    #[test]
    fn removed_deregisters_only_its_rules() {
        let (mut w, table) = watcher();
        w.apply(added("backend", 3000, &[("localhost", "/api")])).unwrap();
        w.apply(added("client", 5173, &[("localhost", "")])).unwrap();

        let applied = w.apply(RegistryEvent::removed("backend")).unwrap();
        assert_eq!(applied.deregistered, 1);
        assert_eq!(table.len(), 1);
        assert_eq!(
            table.resolve("localhost", "/api").unwrap().endpoint.name(),
            "client"
        );
    }

    #[test]
    fn invalid_rule_rejects_whole_event() {
        let (mut w, table) = watcher();
        let err = w
            .apply(added("backend", 3000, &[("localhost", "/api"), ("bad host", "")]))
            .unwrap_err();
        assert_eq!(err.subject, "backend");
        assert!(table.is_empty());
        assert!(w.endpoint("backend").is_none());
    }

    #[test]
    fn negative_port_rejected_and_existing_routes_kept() {
        let (mut w, table) = watcher();
        w.apply(added("client", 5173, &[("localhost", "")])).unwrap();
        assert!(w.apply(added("client", -5, &[("localhost", "")])).is_err());
        assert_eq!(
            table.resolve("localhost", "/").unwrap().endpoint.port(),
            5173
        );
    }

    #[test]
    fn re_added_endpoint_drops_undeclared_rules() {
        let (mut w, table) = watcher();
        w.apply(added("web", 80, &[("a.localhost", ""), ("b.localhost", "")]))
            .unwrap();
        let applied = w.apply(added("web", 8080, &[("b.localhost", "")])).unwrap();

        assert_eq!(applied.deregistered, 1);
        assert!(table.resolve("a.localhost", "/").is_none());
        assert_eq!(
            table.resolve("b.localhost", "/").unwrap().endpoint.port(),
            8080
        );
    }

    #[test]
    fn takeover_survives_removal_of_prior_owner() {
        let (mut w, table) = watcher();
        w.apply(added("old", 80, &[("localhost", "")])).unwrap();
        w.apply(added("new", 81, &[("localhost", "")])).unwrap();

        let applied = w.apply(RegistryEvent::removed("old")).unwrap();
        assert_eq!(applied.deregistered, 0);
        assert_eq!(table.resolve("localhost", "/").unwrap().endpoint.name(), "new");
        assert!(w.rules_for("old").is_empty());
    }

    #[test]
    fn synced_removes_endpoints_missing_from_live_set() {
        let (mut w, table) = watcher();
        w.apply(added("old", 80, &[("old.localhost", "")])).unwrap();
        w.apply(added("kept", 81, &[("kept.localhost", "")])).unwrap();

        let applied = w
            .apply(RegistryEvent::synced(["kept", "never-seen"]))
            .unwrap();
        assert_eq!(applied.deregistered, 1);
        assert!(table.resolve("old.localhost", "/").is_none());
        assert!(w.endpoint("old").is_none());
        assert_eq!(
            table.resolve("kept.localhost", "/").unwrap().endpoint.name(),
            "kept"
        );
    }

    #[test]
    fn synced_keeps_rules_taken_over_by_live_endpoint() {
        let (mut w, table) = watcher();
        w.apply(added("old", 80, &[("localhost", "")])).unwrap();
        w.apply(added("new", 81, &[("localhost", "")])).unwrap();

        w.apply(RegistryEvent::synced(["new"])).unwrap();
        assert_eq!(table.resolve("localhost", "/").unwrap().endpoint.name(), "new");
    }

    #[test]
    fn unknown_removal_is_noop() {
        let (mut w, table) = watcher();
        assert_eq!(
            w.apply(RegistryEvent::removed("ghost")).unwrap(),
            Applied::default()
        );
        assert!(table.is_empty());
    }
}
