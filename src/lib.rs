//! Junction is a host and path based reverse-proxy router.
//!
//! Every inbound HTTP request is matched against a table of routing rules
//! (a host pattern plus a path prefix) and forwarded, streaming in both
//! directions, to the backend endpoint bound to the most specific matching
//! rule. The table is kept current by a watcher that consumes service
//! registration events, so backends come and go without a restart.
//!
//! # Architecture
//!
//! - [`cli`] -- Command-line argument parsing with clap derive macros.
//! - [`cmd`] -- Subcommand dispatch and execution (run, validate, health).
//! - [`config`] -- Process options and the services file format.
//! - [`error`] -- Unified error types using `thiserror`.
//! - [`health`] -- `GET /_junction/health` endpoint handler.
//! - [`logging`] -- Structured tracing setup with JSON and pretty-print output.
//! - [`proxy`] -- Request dispatch, header construction, and streaming
//!   forwarding to the chosen backend.
//! - [`registry`] -- Registration events, event sources, and the watcher
//!   that applies them to the route table.
//! - [`routing`] -- Rules, specificity, best-match selection, and the
//!   copy-on-write route table.
//! - [`server`] -- Axum server setup, shared application state, HTTP client, and
//!   graceful shutdown.
//!
//! # Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `yaml` | YAML services file support _(enabled by default)_ |
//! | `json` | JSON services file support |
//! | `toml` | TOML services file support |
//! | `file-backends` | All file formats |
//! | `full` | All features |

// Binary crate — public functions are internal, not consumed by external users.
#![allow(clippy::missing_errors_doc)]

pub mod cli;
pub mod cmd;
pub mod config;
pub mod error;
pub mod health;
pub mod logging;
pub mod proxy;
pub mod registry;
pub mod routing;
pub mod server;
