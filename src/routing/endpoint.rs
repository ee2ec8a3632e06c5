//! Backend service endpoints.

use std::fmt;

use crate::error::ValidationError;

/// Network location of one backend service instance.
///
/// Fields are private: an endpoint is never edited after validation.
/// Updates build a new value and swap the `Arc` held by the route table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceEndpoint {
    name: String,
    address: String,
    port: u16,
}

impl ServiceEndpoint {
    /// `port` is taken wide so out-of-range and negative values coming from
    /// a registry event are reported instead of silently wrapping.
    pub fn new(name: &str, address: &str, port: i64) -> Result<Self, ValidationError> {
        let subject = if name.is_empty() { "(unnamed)" } else { name };

        if name.trim().is_empty() {
            return Err(ValidationError::new(
                subject,
                "name",
                "endpoint name cannot be empty",
            ));
        }
        let address = address.trim();
        if address.is_empty() {
            return Err(ValidationError::new(
                subject,
                "address",
                "endpoint address cannot be empty",
            ));
        }
        if address.contains("://") {
            return Err(ValidationError::new(
                subject,
                "address",
                "address must be a host name or IP, not a URL",
            )
            .with_suggestion("put the port in the 'port' field"));
        }
        if let Some(bad) = address
            .chars()
            .find(|c| c.is_whitespace() || matches!(c, '/' | '?' | '#' | '@'))
        {
            return Err(ValidationError::new(
                subject,
                "address",
                format!("invalid character {bad:?} in address"),
            ));
        }
        let port = u16::try_from(port)
            .ok()
            .filter(|p| *p != 0)
            .ok_or_else(|| {
                ValidationError::new(
                    subject,
                    "port",
                    format!("port {port} is outside the range 1-65535"),
                )
            })?;

        Ok(Self {
            name: name.to_string(),
            address: address.to_string(),
            port,
        })
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn address(&self) -> &str {
        &self.address
    }

    #[must_use]
    pub const fn port(&self) -> u16 {
        self.port
    }

    /// `address:port`, bracketing bare IPv6 literals.
    #[must_use]
    pub fn authority(&self) -> String {
        if self.address.contains(':') && !self.address.starts_with('[') {
            format!("[{}]:{}", self.address, self.port)
        } else {
            format!("{}:{}", self.address, self.port)
        }
    }
}

impl fmt::Display for ServiceEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.authority())
    }
}
