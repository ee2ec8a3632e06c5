//! TOML services file reader.

use std::path::PathBuf;

use super::file_source::ServicesFileReader;
use crate::config::model::ServicesFile;

#[must_use]
pub fn new(path: PathBuf) -> ServicesFileReader {
    ServicesFileReader::new(path, "toml", |content| {
        toml::from_str::<ServicesFile>(content)
            .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)
    })
}
