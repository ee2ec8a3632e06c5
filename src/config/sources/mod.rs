//! Services file parsing and change detection.
//!
//! Provides the generic [`ServicesFileReader`](file_source::ServicesFileReader),
//! per-format constructors (YAML, JSON, TOML) gated by feature flags, and
//! the [`parse_config_str`] helper used by `junction validate`.

pub mod file_source;

#[cfg(feature = "yaml")]
pub mod yaml;

#[cfg(feature = "json")]
pub mod json;

#[cfg(feature = "toml")]
pub mod toml_source;

use std::path::Path;

use sha2::{Digest, Sha256};

use crate::config::model::ServicesFile;
use crate::error::JunctionError;
use file_source::ServicesFileReader;

/// Parse a services file string based on file extension.
pub fn parse_config_str(
    ext: &str,
    content: &str,
    path_display: &str,
) -> Result<ServicesFile, JunctionError> {
    #[allow(unused_variables)]
    let parse_error = |e: Box<dyn std::error::Error + Send + Sync>| JunctionError::ServicesParse {
        path: path_display.to_string(),
        source: e,
    };

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => serde_yml::from_str(content).map_err(|e| parse_error(Box::new(e))),

        #[cfg(feature = "json")]
        "json" => serde_json::from_str(content).map_err(|e| parse_error(Box::new(e))),

        #[cfg(feature = "toml")]
        "toml" => toml::from_str(content).map_err(|e| parse_error(Box::new(e))),

        other => Err(JunctionError::UnsupportedFormat(other.to_string())),
    }
}

/// Pick a reader for `path` from its extension.
pub fn reader_for(path: &Path) -> Result<ServicesFileReader, JunctionError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");

    match ext {
        #[cfg(feature = "yaml")]
        "yaml" | "yml" => Ok(yaml::new(path.to_path_buf())),

        #[cfg(feature = "json")]
        "json" => Ok(json::new(path.to_path_buf())),

        #[cfg(feature = "toml")]
        "toml" => Ok(toml_source::new(path.to_path_buf())),

        other => Err(JunctionError::UnsupportedFormat(other.to_string())),
    }
}

/// Compute a lowercase hex-encoded SHA-256 digest.
#[must_use]
pub fn sha256_hex(data: &[u8]) -> String {
    format!("{:x}", Sha256::digest(data))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sha256_is_stable() {
        assert_eq!(
            sha256_hex(b"junction"),
            sha256_hex(b"junction"),
        );
        assert_ne!(sha256_hex(b"a"), sha256_hex(b"b"));
        assert_eq!(sha256_hex(b"").len(), 64);
    }

    #[test]
    fn unknown_extension_rejected() {
        let err = parse_config_str("ini", "", "services.ini").unwrap_err();
        assert!(matches!(err, JunctionError::UnsupportedFormat(ref f) if f == "ini"));
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn parses_yaml() {
        let content = "services:\n  - name: client\n    address: client\n    port: 5173\n    rules:\n      - host: localhost\n";
        let file = parse_config_str("yaml", content, "junction.yaml").unwrap();
        assert_eq!(file.services.len(), 1);
        assert_eq!(file.services[0].rules[0].path_prefix, "");
    }

    #[cfg(feature = "yaml")]
    #[test]
    fn unknown_fields_rejected() {
        let content = "services:\n  - name: a\n    address: a\n    port: 1\n    weight: 3\n";
        assert!(matches!(
            parse_config_str("yaml", content, "junction.yaml"),
            Err(JunctionError::ServicesParse { .. })
        ));
    }
}
