//! Copy-on-write route table.
//!
//! [`RouteTable`] stores an immutable [`RouteSnapshot`] behind an
//! [`ArcSwap`]. Readers take a snapshot with a single atomic load and keep
//! it for the whole request, never waiting on writers. Writers rebuild the
//! binding list and publish it with read-copy-update, so a reader sees
//! either the old list or the new one, never a rule without its endpoint.

use std::collections::HashSet;
use std::sync::Arc;

use arc_swap::ArcSwap;

use super::endpoint::ServiceEndpoint;
use super::matcher;
use super::rule::Rule;

#[derive(Debug, Clone)]
pub struct Binding {
    pub rule: Rule,
    pub endpoint: Arc<ServiceEndpoint>,
}

impl AsRef<Rule> for Binding {
    fn as_ref(&self) -> &Rule {
        &self.rule
    }
}

/// Point-in-time view of the table, most specific rule first.
#[derive(Debug, Default)]
pub struct RouteSnapshot {
    bindings: Vec<Binding>,
}

impl RouteSnapshot {
    fn from_unsorted(mut bindings: Vec<Binding>) -> Self {
        bindings.sort_by(|a, b| {
            b.rule
                .specificity()
                .cmp(&a.rule.specificity())
                .then_with(|| a.rule.cmp(&b.rule))
        });
        Self { bindings }
    }

    #[must_use]
    pub fn bindings(&self) -> &[Binding] {
        &self.bindings
    }

    #[must_use]
    pub fn resolve(&self, host: &str, path: &str) -> Option<&Binding> {
        matcher::best_match(&self.bindings, host, path)
    }

    #[must_use]
    pub fn get(&self, rule: &Rule) -> Option<&Binding> {
        self.bindings.iter().find(|b| b.rule == *rule)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    /// Distinct endpoints referenced by at least one rule, in binding order.
    #[must_use]
    pub fn endpoints(&self) -> Vec<Arc<ServiceEndpoint>> {
        let mut seen = HashSet::new();
        self.bindings
            .iter()
            .filter(|b| seen.insert(b.endpoint.name()))
            .map(|b| Arc::clone(&b.endpoint))
            .collect()
    }

    #[must_use]
    pub fn endpoint_count(&self) -> usize {
        self.endpoints().len()
    }
}

#[derive(Debug)]
pub struct RouteTable {
    current: ArcSwap<RouteSnapshot>,
}

impl Default for RouteTable {
    fn default() -> Self {
        Self::new()
    }
}

impl RouteTable {
    #[must_use]
    pub fn new() -> Self {
        Self {
            current: ArcSwap::from_pointee(RouteSnapshot::default()),
        }
    }

    /// Bind `rule` to `endpoint`, replacing any existing binding for the
    /// same key. Returns the endpoint that was replaced.
    pub fn register(
        &self,
        rule: Rule,
        endpoint: Arc<ServiceEndpoint>,
    ) -> Option<Arc<ServiceEndpoint>> {
        let previous = self.current.rcu(|current| {
            let mut bindings: Vec<Binding> = current
                .bindings
                .iter()
                .filter(|b| b.rule != rule)
                .cloned()
                .collect();
            bindings.push(Binding {
                rule: rule.clone(),
                endpoint: Arc::clone(&endpoint),
            });
            Arc::new(RouteSnapshot::from_unsorted(bindings))
        });
        previous.get(&rule).map(|b| Arc::clone(&b.endpoint))
    }

    /// Remove the binding for `rule`. No-op when absent.
    pub fn deregister(&self, rule: &Rule) -> Option<Arc<ServiceEndpoint>> {
        if self.current.load().get(rule).is_none() {
            return None;
        }
        let previous = self.current.rcu(|current| {
            let bindings = current
                .bindings
                .iter()
                .filter(|b| b.rule != *rule)
                .cloned()
                .collect();
            Arc::new(RouteSnapshot { bindings })
        });
        previous.get(rule).map(|b| Arc::clone(&b.endpoint))
    }

    #[must_use]
    pub fn snapshot(&self) -> Arc<RouteSnapshot> {
        self.current.load_full()
    }

    /// Resolve against the current snapshot.
    #[must_use]
    pub fn resolve(&self, host: &str, path: &str) -> Option<Binding> {
        self.current.load().resolve(host, path).cloned()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.current.load().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.current.load().is_empty()
    }
}
