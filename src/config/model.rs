//! Serde data structures for the services file.
//!
//! Contains [`ServicesFile`] (the root), [`ServiceDef`] and [`RuleDef`].
//! All types use `deny_unknown_fields` for strict parsing. Values are
//! kept raw here (the port is a signed integer, hosts are plain strings)
//! so that validation can report every problem with its service name.

use serde::{Deserialize, Serialize};

use crate::registry::{EndpointSpec, RegistryEvent, RuleSpec};

fn default_host() -> String {
    "*".to_string()
}

fn is_default_host(v: &str) -> bool {
    v == "*"
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServicesFile {
    #[serde(default)]
    pub services: Vec<ServiceDef>,
}

impl ServicesFile {
    #[must_use]
    pub fn total_rules(&self) -> usize {
        self.services.iter().map(|s| s.rules.len()).sum()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceDef {
    pub name: String,
    pub address: String,
    pub port: i64,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<RuleDef>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RuleDef {
    #[serde(default = "default_host", skip_serializing_if = "is_default_host")]
    pub host: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path_prefix: String,
}

impl From<&ServiceDef> for RegistryEvent {
    fn from(service: &ServiceDef) -> Self {
        Self::Added {
            endpoint: EndpointSpec {
                name: service.name.clone(),
                address: service.address.clone(),
                port: service.port,
            },
            rules: service
                .rules
                .iter()
                .map(|r| RuleSpec {
                    host_pattern: r.host.clone(),
                    path_prefix: r.path_prefix.clone(),
                })
                .collect(),
        }
    }
}
