//! The content-service boundary the engine loads story graphs through.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use cinestory_core::error::DomainError;

use super::ingest::{StoryFormat, ingest_story};
use crate::domain::graph::StoryGraph;

/// Source of read-only story graphs, fetched once per session.
#[async_trait]
pub trait StoryGraphSource: Send + Sync {
    /// Loads the story identified by `story_id`.
    async fn load_story(&self, story_id: &str) -> Result<StoryGraph, DomainError>;
}

/// Loads stories from files under a root directory. The story id is the
/// file name relative to the root.
#[derive(Debug, Clone)]
pub struct FileStorySource {
    root: PathBuf,
    format: Option<StoryFormat>,
}

impl FileStorySource {
    /// Creates a source rooted at `root`, inferring each file's format from
    /// its extension.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            format: None,
        }
    }

    /// Forces a format regardless of file extension.
    #[must_use]
    pub fn with_format(mut self, format: StoryFormat) -> Self {
        self.format = Some(format);
        self
    }

    fn resolve(&self, story_id: &str) -> Result<PathBuf, DomainError> {
        let relative = Path::new(story_id);
        if relative.is_absolute()
            || relative
                .components()
                .any(|part| matches!(part, std::path::Component::ParentDir))
        {
            return Err(DomainError::Validation(format!(
                "story id must be a path inside the story root: {story_id}"
            )));
        }
        Ok(self.root.join(relative))
    }
}

#[async_trait]
impl StoryGraphSource for FileStorySource {
    async fn load_story(&self, story_id: &str) -> Result<StoryGraph, DomainError> {
        let path = self.resolve(story_id)?;
        let format = self
            .format
            .or_else(|| StoryFormat::from_path(&path))
            .unwrap_or(StoryFormat::Json);

        let source = tokio::fs::read_to_string(&path).await.map_err(|e| {
            DomainError::Infrastructure(format!("failed to read {}: {e}", path.display()))
        })?;

        tracing::info!(path = %path.display(), %format, "loading story");
        ingest_story(&source, format)
    }
}
