//! Unified error types for Junction.
//!
//! Defines [`JunctionError`] (startup, CLI and config failures) and
//! [`ValidationError`] for rejected rules, endpoints and services files.
//! Per-request failures live in [`RouteError`](crate::proxy::RouteError)
//! because they are always turned into an HTTP response, never propagated.

use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub subject: String,
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

impl ValidationError {
    #[must_use]
    pub fn new(subject: impl Into<String>, field: &str, message: impl Into<String>) -> Self {
        Self {
            subject: subject.into(),
            field: field.to_string(),
            message: message.into(),
            suggestion: None,
        }
    }

    #[must_use]
    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    /// Re-label the error with the service it was found in.
    #[must_use]
    pub fn in_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = subject.into();
        self
    }
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "  {}: {} — {}", self.subject, self.field, self.message)?;
        if let Some(ref suggestion) = self.suggestion {
            write!(f, " ({suggestion})")?;
        }
        Ok(())
    }
}

impl std::error::Error for ValidationError {}

fn format_errors(errors: &[ValidationError]) -> String {
    use std::fmt::Write;
    let mut buf = String::new();
    for (i, e) in errors.iter().enumerate() {
        if i > 0 {
            buf.push('\n');
        }
        // write! to String is infallible
        let _ = write!(buf, "{e}");
    }
    buf
}

#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum JunctionError {
    #[error("No services file found.\n\n  {hint}")]
    NoServicesFile { hint: String },

    #[error("Services file not found: {}", path.display())]
    ServicesFileNotFound { path: PathBuf },

    #[error("Services file parse error in {path}:\n  {source}")]
    ServicesParse {
        path: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Services file validation failed:\n{}", format_errors(.errors))]
    ServicesValidation { errors: Vec<ValidationError> },

    #[error("Unsupported services file format: '{0}'")]
    UnsupportedFormat(String),

    #[error("Invalid option --{option}: {message}")]
    InvalidOption {
        option: &'static str,
        message: String,
    },

    #[error("Invalid address: {0}")]
    AddressParse(#[from] std::net::AddrParseError),

    #[error("Invalid URI: {source}")]
    UriParse {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("HTTP request failed: {source}")]
    HttpRequest {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    #[error("Registry subscriber fell behind, {0} events dropped")]
    RegistryLagged(u64),

    #[error("{0}")]
    Io(#[from] std::io::Error),

    #[error("Health check failed with status {0}")]
    HealthCheckFailed(hyper::StatusCode),
}
