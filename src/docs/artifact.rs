//! Documentation source artifact.
//!
//! The artifact ships next to the executable as `<crate-name>.docs.toml`:
//!
//! ```toml
//! title = "Orders API"
//! description = "Order management"
//!
//! [[operations]]
//! method = "get"
//! path = "/api/v1/info"
//! summary = "Service information"
//! tag = "service"
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::docs::DocumentationError;

/// Parsed documentation artifact.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DocumentationArtifact {
    pub title: Option<String>,
    pub description: Option<String>,
    #[serde(default)]
    pub operations: Vec<OperationDoc>,
}

/// Documentation for one route.
#[derive(Debug, Clone, Deserialize)]
pub struct OperationDoc {
    pub method: String,
    pub path: String,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub tag: Option<String>,
}

impl DocumentationArtifact {
    pub fn parse(path: &Path, content: &str) -> Result<Self, DocumentationError> {
        toml::from_str(content).map_err(|source| DocumentationError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn read(path: &Path) -> Result<Self, DocumentationError> {
        let content = fs::read_to_string(path).map_err(|source| DocumentationError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(path, &content)
    }
}

/// Default artifact location: `<exe dir>/<crate-name>.docs.toml`.
pub fn default_artifact_path() -> PathBuf {
    let file_name = format!("{}.docs.toml", env!("CARGO_PKG_NAME"));
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&file_name)))
        .unwrap_or_else(|| PathBuf::from(file_name))
}
