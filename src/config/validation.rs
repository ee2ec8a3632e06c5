//! Services file validation with detailed error reporting.
//!
//! The [`validate`] function checks a parsed [`ServicesFile`] for
//! duplicate service names, invalid endpoints, malformed rules, and the
//! same rule claimed by two services. Endpoint and rule checks reuse
//! [`ServiceEndpoint::new`] and [`Rule::new`] so the file is held to
//! exactly the rules the route table enforces at runtime.

use std::collections::{HashMap, HashSet};

use super::model::ServicesFile;
use crate::error::ValidationError;
use crate::routing::{Rule, ServiceEndpoint};

pub fn validate(file: &ServicesFile) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();
    let mut seen_names = HashSet::new();
    let mut claimed: HashMap<Rule, &str> = HashMap::new();

    for (i, service) in file.services.iter().enumerate() {
        let subject = if service.name.is_empty() {
            format!("services[{i}]")
        } else {
            service.name.clone()
        };

        if !service.name.is_empty() && !seen_names.insert(service.name.as_str()) {
            errors.push(ValidationError::new(
                subject.clone(),
                "name",
                "duplicate service name",
            ));
        }

        if let Err(e) = ServiceEndpoint::new(&service.name, &service.address, service.port) {
            errors.push(e.in_subject(subject.clone()));
        }

        if service.rules.is_empty() {
            errors.push(
                ValidationError::new(subject.clone(), "rules", "service declares no rules")
                    .with_suggestion("add a rule such as { host: \"*\" }"),
            );
        }

        for rule_def in &service.rules {
            match Rule::new(&rule_def.host, &rule_def.path_prefix) {
                Ok(rule) => {
                    if let Some(owner) = claimed.get(&rule) {
                        errors.push(ValidationError::new(
                            subject.clone(),
                            "rules",
                            format!("rule '{rule}' is already declared by service '{owner}'"),
                        ));
                    } else {
                        claimed.insert(rule, service.name.as_str());
                    }
                }
                Err(e) => errors.push(e.in_subject(subject.clone())),
            }
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[must_use]
pub fn format_validation_report(path: &str, file: &ServicesFile) -> String {
    let mut lines = vec![format!(
        "  {} services, {} rules\n",
        file.services.len(),
        file.total_rules()
    )];

    for service in &file.services {
        lines.push(format!(
            "  {}  -> {}:{}",
            service.name, service.address, service.port
        ));
        for rule in &service.rules {
            let prefix = if rule.path_prefix.is_empty() {
                "(any path)"
            } else {
                rule.path_prefix.as_str()
            };
            lines.push(format!("    host {}  path {}", rule.host, prefix));
        }
    }

    format!("{} is valid\n{}", path, lines.join("\n"))
}
