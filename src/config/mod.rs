//! Process options and the services file.
//!
//! [`RouterOptions`] is the fixed set of named options supplied once at
//! startup. The services file (see [`model`]) is one possible registry
//! source: it is parsed by [`sources`], checked by [`validation`], and
//! turned into registry events by
//! [`registry::sources::file`](crate::registry::sources::file).

pub mod model;
pub mod sources;
pub mod validation;

use std::time::Duration;

use hyper::StatusCode;

use crate::cli::RunArgs;
use crate::error::JunctionError;

#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ConfigVersion {
    Hash(String),
}

#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub listen_port: u16,
    pub no_match_status: StatusCode,
    pub rewrite_host: bool,
    pub connect_timeout: Duration,
    pub max_body: usize,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            listen_port: 8080,
            no_match_status: StatusCode::NOT_FOUND,
            rewrite_host: false,
            connect_timeout: Duration::from_millis(5000),
            max_body: 10 * 1024 * 1024,
        }
    }
}

impl RouterOptions {
    pub fn from_args(args: &RunArgs) -> Result<Self, JunctionError> {
        Ok(Self {
            listen_port: args.port,
            no_match_status: parse_no_match_status(args.no_match_status)?,
            rewrite_host: args.rewrite_host,
            connect_timeout: parse_connect_timeout(args.connect_timeout)?,
            max_body: args.max_body,
        })
    }
}

/// The no-match status must be a client or server error.
pub fn parse_no_match_status(code: u16) -> Result<StatusCode, JunctionError> {
    StatusCode::from_u16(code)
        .ok()
        .filter(|s| s.is_client_error() || s.is_server_error())
        .ok_or_else(|| JunctionError::InvalidOption {
            option: "no-match-status",
            message: format!("{code} is not a 4xx or 5xx status code"),
        })
}

fn parse_connect_timeout(ms: u64) -> Result<Duration, JunctionError> {
    if ms == 0 {
        return Err(JunctionError::InvalidOption {
            option: "connect-timeout",
            message: "must be greater than 0".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}
