//! Integration tests for rule matching, the route table, and the watcher.

use std::sync::Arc;

use junction::registry::watcher::RegistryWatcher;
use junction::registry::{RegistryEvent, RuleSpec};
use junction::routing::{RouteTable, Rule, ServiceEndpoint};

fn rule(host: &str, prefix: &str) -> Rule {
    Rule::new(host, prefix).unwrap()
}

fn endpoint(name: &str, port: i64) -> Arc<ServiceEndpoint> {
    Arc::new(ServiceEndpoint::new(name, name, port).unwrap())
}

fn target(table: &RouteTable, host: &str, path: &str) -> Option<String> {
    table
        .resolve(host, path)
        .map(|b| b.endpoint.authority())
}

fn dev_stack() -> RouteTable {
    let table = RouteTable::new();
    table.register(rule("localhost", "/api"), endpoint("backend", 3000));
    table.register(rule("localhost", ""), endpoint("client", 5173));
    table.register(rule("db.localhost", ""), endpoint("phpmyadmin", 80));
    table.register(rule("*", ""), endpoint("fallback", 9000));
    table
}

#[test]
fn longest_prefix_wins_on_same_host() {
    let table = dev_stack();
    assert_eq!(
        target(&table, "localhost", "/api/todos").as_deref(),
        Some("backend:3000")
    );
    assert_eq!(
        target(&table, "localhost", "/").as_deref(),
        Some("client:5173")
    );
}

#[test]
fn exact_host_beats_wildcard() {
    let table = dev_stack();
    assert_eq!(
        target(&table, "db.localhost", "/").as_deref(),
        Some("phpmyadmin:80")
    );
    assert_eq!(
        target(&table, "other.localhost", "/").as_deref(),
        Some("fallback:9000")
    );
}

#[test]
fn exact_host_with_short_prefix_beats_wildcard_with_long_prefix() {
    let table = RouteTable::new();
    table.register(rule("*", "/api/v1/users"), endpoint("wild", 1));
    table.register(rule("example.com", "/"), endpoint("exact", 2));
    assert_eq!(
        target(&table, "example.com", "/api/v1/users/7").as_deref(),
        Some("exact:2")
    );
    assert_eq!(
        target(&table, "other.com", "/api/v1/users/7").as_deref(),
        Some("wild:1")
    );
}

#[test]
fn host_matching_ignores_case_port_and_trailing_dot() {
    let table = dev_stack();
    for host in ["DB.Localhost", "db.localhost:8080", "db.localhost.", "db.localhost.:80"] {
        assert_eq!(
            target(&table, host, "/").as_deref(),
            Some("phpmyadmin:80"),
            "host {host}"
        );
    }
}

#[test]
fn path_matching_is_case_sensitive() {
    let table = RouteTable::new();
    table.register(rule("localhost", "/api"), endpoint("backend", 3000));
    assert!(target(&table, "localhost", "/API/todos").is_none());
}

#[test]
fn no_match_without_fallback() {
    let table = RouteTable::new();
    table.register(rule("localhost", ""), endpoint("client", 5173));
    assert!(target(&table, "other.localhost", "/").is_none());
}

#[test]
fn registration_order_does_not_change_the_result() {
    let bindings = [
        (rule("localhost", "/api"), endpoint("backend", 3000)),
        (rule("localhost", ""), endpoint("client", 5173)),
        (rule("*", "/api/v2"), endpoint("v2", 4000)),
        (rule("*", ""), endpoint("fallback", 9000)),
    ];
    let requests = [
        ("localhost", "/api/v2/x"),
        ("localhost", "/"),
        ("other", "/api/v2/x"),
        ("other", "/"),
    ];

    let forward = RouteTable::new();
    for (r, e) in &bindings {
        forward.register(r.clone(), Arc::clone(e));
    }
    let reverse = RouteTable::new();
    for (r, e) in bindings.iter().rev() {
        reverse.register(r.clone(), Arc::clone(e));
    }

    for (host, path) in requests {
        assert_eq!(target(&forward, host, path), target(&reverse, host, path));
    }
    assert_eq!(
        target(&forward, "localhost", "/api/v2/x").as_deref(),
        Some("backend:3000")
    );
}

#[test]
fn register_replaces_same_key() {
    let table = RouteTable::new();
    assert!(table
        .register(rule("localhost", "/api"), endpoint("old", 1))
        .is_none());
    let replaced = table.register(rule("LOCALHOST", "/api"), endpoint("new", 2));
    assert_eq!(replaced.unwrap().name(), "old");
    assert_eq!(table.len(), 1);
    assert_eq!(
        target(&table, "localhost", "/api").as_deref(),
        Some("new:2")
    );
}

#[test]
fn snapshot_is_isolated_from_later_writes() {
    let table = dev_stack();
    let before = table.snapshot();
    table.deregister(&rule("localhost", "/api"));

    assert_eq!(before.len(), 4);
    assert_eq!(
        before
            .resolve("localhost", "/api/todos")
            .map(|b| b.endpoint.name()),
        Some("backend")
    );
    assert_eq!(
        target(&table, "localhost", "/api/todos").as_deref(),
        Some("client:5173")
    );
}

#[test]
fn watcher_drives_the_table() {
    let table = Arc::new(RouteTable::new());
    let mut watcher = RegistryWatcher::new(Arc::clone(&table));

    watcher
        .apply(RegistryEvent::added(
            "backend",
            "backend",
            3000,
            vec![RuleSpec::new("localhost", "/api")],
        ))
        .unwrap();
    watcher
        .apply(RegistryEvent::added(
            "client",
            "client",
            5173,
            vec![RuleSpec::new("localhost", "")],
        ))
        .unwrap();
    assert_eq!(
        target(&table, "localhost", "/api/todos").as_deref(),
        Some("backend:3000")
    );

    watcher.apply(RegistryEvent::removed("backend")).unwrap();
    assert_eq!(
        target(&table, "localhost", "/api/todos").as_deref(),
        Some("client:5173")
    );

    watcher.apply(RegistryEvent::removed("client")).unwrap();
    assert!(table.is_empty());
}

#[test]
fn concurrent_writers_never_expose_torn_bindings() {
    let table = Arc::new(RouteTable::new());
    table.register(rule("*", ""), endpoint("fallback", 9000));

    let writers: Vec<_> = (0..4)
        .map(|w| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for i in 0..200 {
                    let host = format!("svc{w}-{i}.localhost");
                    let r = rule(&host, "");
                    table.register(r.clone(), endpoint(&format!("svc{w}-{i}"), 1000 + i));
                    if i % 2 == 0 {
                        table.deregister(&r);
                    }
                }
            })
        })
        .collect();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let table = Arc::clone(&table);
            std::thread::spawn(move || {
                for i in 0..500 {
                    let snapshot = table.snapshot();
                    for binding in snapshot.bindings() {
                        // Every rule is paired with the endpoint it was
                        // registered with.
                        let host = binding.rule.host().to_string();
                        if binding.endpoint.name() != "fallback" {
                            assert_eq!(
                                binding.endpoint.name(),
                                host.trim_end_matches(".localhost")
                            );
                        }
                    }
                    assert!(snapshot.resolve("anything", &format!("/{i}")).is_some());
                }
            })
        })
        .collect();

    for handle in writers.into_iter().chain(readers) {
        handle.join().unwrap();
    }

    // Odd iterations survive: 4 writers x 100 rules, plus the fallback.
    assert_eq!(table.len(), 401);
}
