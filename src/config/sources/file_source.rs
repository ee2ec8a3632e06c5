//! Generic async services file reader with SHA256 change detection.
//!
//! [`ServicesFileReader`] handles any file format by accepting a
//! deserialization function at construction time. It reads the file
//! asynchronously via Tokio, validates the result, and computes a SHA256
//! hash for version tracking.

use std::path::{Path, PathBuf};

use super::sha256_hex;
use crate::config::model::ServicesFile;
use crate::config::validation::validate;
use crate::config::ConfigVersion;
use crate::error::JunctionError;

type Deserialize = fn(&str) -> Result<ServicesFile, Box<dyn std::error::Error + Send + Sync>>;

#[derive(Clone)]
pub struct ServicesFileReader {
    path: PathBuf,
    format: &'static str,
    deserialize: Deserialize,
}

impl std::fmt::Debug for ServicesFileReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServicesFileReader")
            .field("path", &self.path)
            .field("format", &self.format)
            .finish_non_exhaustive()
    }
}

impl ServicesFileReader {
    #[must_use]
    pub fn new(path: PathBuf, format: &'static str, deserialize: Deserialize) -> Self {
        Self {
            path,
            format,
            deserialize,
        }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[must_use]
    pub const fn format(&self) -> &'static str {
        self.format
    }

    async fn read_content(&self) -> Result<String, JunctionError> {
        tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                JunctionError::ServicesFileNotFound {
                    path: self.path.clone(),
                }
            } else {
                JunctionError::Io(e)
            }
        })
    }

    pub async fn load(&self) -> Result<(ServicesFile, ConfigVersion), JunctionError> {
        let content = self.read_content().await?;

        let file = (self.deserialize)(&content).map_err(|e| JunctionError::ServicesParse {
            path: self.path.display().to_string(),
            source: e,
        })?;

        if let Err(errors) = validate(&file) {
            return Err(JunctionError::ServicesValidation { errors });
        }

        let hash = sha256_hex(content.as_bytes());
        Ok((file, ConfigVersion::Hash(hash)))
    }

    /// Version of the file as it is on disk now, valid or not.
    pub async fn current_version(&self) -> Result<ConfigVersion, JunctionError> {
        let content = self.read_content().await?;
        Ok(ConfigVersion::Hash(sha256_hex(content.as_bytes())))
    }
}
