//! Mount entries for the isolation document

use prograreno_core::{ContainError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A single entry of the document's `mounts` array
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mount {
    pub destination: String,
    #[serde(rename = "type", default)]
    pub kind: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub options: Vec<String>,
}

impl Mount {
    /// Recursive read-only bind of a host directory
    pub fn bind_readonly(source: impl AsRef<Path>, destination: &str) -> Self {
        Self {
            destination: destination.to_string(),
            kind: "none".to_string(),
            source: source.as_ref().display().to_string(),
            options: vec!["rbind".to_string(), "ro".to_string()],
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.source.is_empty() {
            return Err(ContainError::InvalidConfig(
                "Mount source cannot be empty".to_string(),
            ));
        }
        if !Path::new(&self.source).is_absolute() {
            return Err(ContainError::InvalidConfig(format!(
                "Mount source must be absolute: {}",
                self.source
            )));
        }
        if !self.destination.starts_with('/') {
            return Err(ContainError::InvalidConfig(format!(
                "Mount destination must be absolute: {}",
                self.destination
            )));
        }
        Ok(())
    }
}
