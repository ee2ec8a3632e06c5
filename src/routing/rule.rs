//! Routing rules: a host pattern, a literal path prefix, and the
//! specificity computed from them.
//!
//! A [`Rule`] can only be built through [`Rule::new`], which validates
//! both parts. Host patterns are lowercased at construction so two
//! rules that differ only in host case compare equal and share a key
//! in the [`RouteTable`](super::RouteTable).

use std::fmt;

use crate::error::ValidationError;

const MAX_HOST_LEN: usize = 253;
const MAX_LABEL_LEN: usize = 63;

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum HostPattern {
    /// `*`, matches any host.
    Wildcard,
    /// A lowercase hostname compared case-insensitively.
    Exact(String),
}

impl HostPattern {
    pub fn parse(raw: &str) -> Result<Self, ValidationError> {
        let pattern = raw.trim();
        if pattern == "*" {
            return Ok(Self::Wildcard);
        }
        validate_hostname(pattern)?;
        Ok(Self::Exact(
            pattern.trim_end_matches('.').to_ascii_lowercase(),
        ))
    }

    /// `host` must already be normalized with [`normalize_host`](super::matcher::normalize_host).
    #[must_use]
    pub fn matches(&self, host: &str) -> bool {
        match self {
            Self::Wildcard => true,
            Self::Exact(expected) => expected.eq_ignore_ascii_case(host),
        }
    }

    #[must_use]
    pub const fn is_exact(&self) -> bool {
        matches!(self, Self::Exact(_))
    }
}

impl fmt::Display for HostPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str("*"),
            Self::Exact(host) => f.write_str(host),
        }
    }
}

/// Total order used to pick between matching rules.
///
/// Compared lexicographically: host exactness first, then prefix length.
/// The derived `Ord` relies on the field declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Specificity {
    exact_host: bool,
    prefix_len: usize,
}

impl Specificity {
    #[must_use]
    pub const fn exact_host(&self) -> bool {
        self.exact_host
    }

    #[must_use]
    pub const fn prefix_len(&self) -> usize {
        self.prefix_len
    }

    /// Integer form of the ordering, for logs and diagnostics.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn score(&self) -> u64 {
        ((self.exact_host as u64) << 32) | (self.prefix_len as u32 as u64)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Rule {
    host: HostPattern,
    path_prefix: String,
    specificity: Specificity,
}

impl Rule {
    pub fn new(host_pattern: &str, path_prefix: &str) -> Result<Self, ValidationError> {
        let host = HostPattern::parse(host_pattern)?;
        validate_path_prefix(path_prefix)?;
        let specificity = Specificity {
            exact_host: host.is_exact(),
            prefix_len: path_prefix.len(),
        };
        Ok(Self {
            host,
            path_prefix: path_prefix.to_string(),
            specificity,
        })
    }

    #[must_use]
    pub const fn host(&self) -> &HostPattern {
        &self.host
    }

    #[must_use]
    pub fn path_prefix(&self) -> &str {
        &self.path_prefix
    }

    #[must_use]
    pub const fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// Host is compared case-insensitively, path case-sensitively.
    #[must_use]
    pub fn matches(&self, host: &str, path: &str) -> bool {
        self.host.matches(host) && path.starts_with(self.path_prefix.as_str())
    }
}

impl AsRef<Rule> for Rule {
    fn as_ref(&self) -> &Rule {
        self
    }
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.host, self.path_prefix)
    }
}

fn validate_hostname(host: &str) -> Result<(), ValidationError> {
    let invalid = |message: String| ValidationError::new(host, "host_pattern", message);

    if host.is_empty() {
        return Err(invalid("host pattern cannot be empty".into())
            .with_suggestion("use '*' to match any host"));
    }
    if host.contains('*') {
        return Err(invalid(
            "wildcards are only supported as the whole pattern '*'".into(),
        ));
    }
    if let Some((name, _port)) = host.rsplit_once(':') {
        return Err(invalid("host pattern must not include a port".into())
            .with_suggestion(format!("did you mean '{name}'?")));
    }
    if host.len() > MAX_HOST_LEN {
        return Err(invalid(format!(
            "host pattern is longer than {MAX_HOST_LEN} characters"
        )));
    }

    for label in host.trim_end_matches('.').split('.') {
        if label.is_empty() {
            return Err(invalid("host pattern contains an empty label".into()));
        }
        if label.len() > MAX_LABEL_LEN {
            return Err(invalid(format!(
                "label '{label}' is longer than {MAX_LABEL_LEN} characters"
            )));
        }
        if label.starts_with('-') || label.ends_with('-') {
            return Err(invalid(format!(
                "label '{label}' cannot start or end with '-'"
            )));
        }
        if let Some(bad) = label
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || *c == '-' || *c == '_'))
        {
            return Err(invalid(format!("invalid character '{bad}' in host pattern")));
        }
    }
    Ok(())
}

fn validate_path_prefix(prefix: &str) -> Result<(), ValidationError> {
    if prefix.is_empty() {
        return Ok(());
    }
    if !prefix.starts_with('/') {
        return Err(
            ValidationError::new(prefix, "path_prefix", "path prefix must start with '/'")
                .with_suggestion(format!("did you mean '/{prefix}'?")),
        );
    }
    if let Some(bad) = prefix
        .chars()
        .find(|c| c.is_whitespace() || *c == '?' || *c == '#')
    {
        return Err(ValidationError::new(
            prefix,
            "path_prefix",
            format!("invalid character {bad:?} in path prefix"),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wildcard_matches_any_host() {
        let rule = Rule::new("*", "").unwrap();
        assert!(rule.matches("localhost", "/"));
        assert!(rule.matches("db.localhost", "/anything"));
        assert!(!rule.specificity().exact_host());
    }

    #[test]
    fn exact_host_is_case_insensitive() {
        let rule = Rule::new("LocalHost", "/api").unwrap();
        assert_eq!(rule.host(), &HostPattern::Exact("localhost".into()));
        assert!(rule.matches("LOCALHOST", "/api/todos"));
    }

    #[test]
    fn path_prefix_is_case_sensitive() {
        let rule = Rule::new("localhost", "/api").unwrap();
        assert!(!rule.matches("localhost", "/API/todos"));
    }

    #[test]
    fn hosts_differing_only_in_case_are_the_same_rule() {
        assert_eq!(
            Rule::new("Example.COM", "/a").unwrap(),
            Rule::new("example.com", "/a").unwrap()
        );
    }

    #[test]
    fn exact_host_outranks_longer_prefix_on_wildcard() {
        let exact = Rule::new("db.localhost", "").unwrap();
        let wildcard = Rule::new("*", "/very/long/prefix").unwrap();
        assert!(exact.specificity() > wildcard.specificity());
        assert!(exact.specificity().score() > wildcard.specificity().score());
    }

    #[test]
    fn longer_prefix_wins_on_same_host_kind() {
        let short = Rule::new("localhost", "").unwrap();
        let long = Rule::new("localhost", "/api").unwrap();
        assert!(long.specificity() > short.specificity());
    }

    #[test]
    fn rejects_malformed_hosts() {
        for bad in ["", "*.example.com", "local host", "localhost:8080", "a..b", "-a.com"] {
            assert!(Rule::new(bad, "").is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn port_in_host_suggests_bare_name() {
        let err = Rule::new("localhost:8080", "").unwrap_err();
        assert_eq!(err.suggestion.as_deref(), Some("did you mean 'localhost'?"));
    }

    #[test]
    fn prefix_without_slash_suggests_fix() {
        let err = Rule::new("localhost", "api").unwrap_err();
        assert_eq!(err.field, "path_prefix");
        assert_eq!(err.suggestion.as_deref(), Some("did you mean '/api'?"));
    }

    #[test]
    fn display_joins_host_and_prefix() {
        assert_eq!(Rule::new("localhost", "/api").unwrap().to_string(), "localhost/api");
        assert_eq!(Rule::new("*", "").unwrap().to_string(), "*");
    }
}
