//! Most-specific-rule-wins selection.
//!
//! [`best_match`] keeps the candidates whose host pattern and path prefix
//! both match the request, then picks the one with the highest
//! [`Specificity`](super::Specificity). Because specificity is ordered by
//! (host exactness, prefix length) and the route table never holds two
//! rules with the same key, two distinct matching rules never tie.

use super::rule::Rule;

#[must_use]
pub fn best_match<'a, T, I>(candidates: I, host: &str, path: &str) -> Option<&'a T>
where
    T: AsRef<Rule> + 'a,
    I: IntoIterator<Item = &'a T>,
{
    let host = normalize_host(host);
    candidates
        .into_iter()
        .filter(|c| c.as_ref().matches(host, path))
        .max_by_key(|c| c.as_ref().specificity())
}

/// Strip the port and any trailing dot from a `Host` value.
///
/// `localhost:5173` becomes `localhost`; `[::1]:80` becomes `[::1]`.
#[must_use]
pub fn normalize_host(raw: &str) -> &str {
    let raw = raw.trim();
    let host = if raw.starts_with('[') {
        raw.find(']').map_or(raw, |end| &raw[..=end])
    } else {
        raw.rsplit_once(':').map_or(raw, |(name, _port)| name)
    };
    host.trim_end_matches('.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rules(specs: &[(&str, &str)]) -> Vec<Rule> {
        specs
            .iter()
            .map(|(h, p)| Rule::new(h, p).unwrap())
            .collect()
    }

    #[test]
    fn longer_prefix_wins() {
        let rules = rules(&[("localhost", ""), ("localhost", "/api")]);
        let hit = best_match(&rules, "localhost", "/api/todos").unwrap();
        assert_eq!(hit.path_prefix(), "/api");

        let hit = best_match(&rules, "localhost", "/").unwrap();
        assert_eq!(hit.path_prefix(), "");
    }

    #[test]
    fn exact_host_beats_wildcard() {
        let rules = rules(&[("*", "/"), ("db.localhost", "")]);
        let hit = best_match(&rules, "db.localhost", "/").unwrap();
        assert!(hit.host().is_exact());
    }

    #[test]
    fn order_of_candidates_does_not_matter() {
        let mut rules = rules(&[("*", ""), ("localhost", ""), ("localhost", "/api")]);
        let forward = best_match(&rules, "localhost", "/api/x").unwrap().clone();
        rules.reverse();
        let backward = best_match(&rules, "localhost", "/api/x").unwrap().clone();
        assert_eq!(forward, backward);
    }

    #[test]
    fn no_candidates_is_no_match() {
        let rules = rules(&[("localhost", "/api")]);
        assert!(best_match(&rules, "other.localhost", "/api").is_none());
        assert!(best_match(&rules, "localhost", "/web").is_none());
    }

    #[test]
    fn port_is_ignored_in_request_host() {
        let rules = rules(&[("localhost", "")]);
        assert!(best_match(&rules, "localhost:8080", "/").is_some());
    }

    #[test]
    fn normalize_host_variants() {
        assert_eq!(normalize_host("Example.com:443"), "Example.com");
        assert_eq!(normalize_host("example.com."), "example.com");
        assert_eq!(normalize_host("[::1]:8080"), "[::1]");
        assert_eq!(normalize_host("localhost"), "localhost");
    }
}
