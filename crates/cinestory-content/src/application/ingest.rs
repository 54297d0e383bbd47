//! Ingestion of authored story sources into `StoryGraph`s.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use cinestory_core::error::DomainError;
use sha2::{Digest, Sha256};

use crate::domain::graph::StoryGraph;
use crate::domain::raw::RawStory;

/// Serialization format of an authored story source.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoryFormat {
    /// The authoring service's JSON export.
    Json,
    /// Hand-written YAML with the same field names.
    Yaml,
}

impl StoryFormat {
    /// Infers the format from a file extension.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(|ext| ext.parse().ok())
    }
}

impl FromStr for StoryFormat {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "yaml" | "yml" => Ok(Self::Yaml),
            other => Err(DomainError::Validation(format!(
                "unsupported story format: {other}"
            ))),
        }
    }
}

impl fmt::Display for StoryFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Json => f.write_str("json"),
            Self::Yaml => f.write_str("yaml"),
        }
    }
}

/// Hex-encoded SHA-256 of an authored source.
#[must_use]
pub fn version_hash(source: &str) -> String {
    format!("{:x}", Sha256::digest(source.as_bytes()))
}

/// Parses an authored story and normalises it into a `StoryGraph`.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the source does not parse in the
/// given format or contains non-numeric scene/chapter ids.
pub fn ingest_story(source: &str, format: StoryFormat) -> Result<StoryGraph, DomainError> {
    let raw: RawStory = match format {
        StoryFormat::Json => serde_json::from_str(source)
            .map_err(|e| DomainError::Validation(format!("story is not valid JSON: {e}")))?,
        StoryFormat::Yaml => serde_yaml::from_str(source)
            .map_err(|e| DomainError::Validation(format!("story is not valid YAML: {e}")))?,
    };

    let hash = version_hash(source);
    let graph = raw.compile(hash)?;
    tracing::debug!(
        title = %graph.title,
        scenes = graph.scenes.len(),
        chapters = graph.chapters.len(),
        version_hash = %graph.version_hash,
        "ingested story"
    );
    Ok(graph)
}
