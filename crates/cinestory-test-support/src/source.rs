//! In-memory story sources for session tests.

use async_trait::async_trait;
use cinestory_content::application::source::StoryGraphSource;
use cinestory_content::domain::graph::StoryGraph;
use cinestory_core::error::DomainError;

/// A story source that returns a clone of a fixed graph for every id.
#[derive(Debug, Clone)]
pub struct StaticStorySource(pub StoryGraph);

#[async_trait]
impl StoryGraphSource for StaticStorySource {
    async fn load_story(&self, _story_id: &str) -> Result<StoryGraph, DomainError> {
        Ok(self.0.clone())
    }
}

/// A story source that always fails with an infrastructure error.
#[derive(Debug, Clone)]
pub struct FailingStorySource(pub String);

#[async_trait]
impl StoryGraphSource for FailingStorySource {
    async fn load_story(&self, _story_id: &str) -> Result<StoryGraph, DomainError> {
        Err(DomainError::Infrastructure(self.0.clone()))
    }
}
