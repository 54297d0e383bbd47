//! Environment configuration.

use std::path::{Path, PathBuf};

use cinestory_content::application::ingest::StoryFormat;

use crate::error::AppError;

/// Settings read from the environment at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerConfig {
    /// Story file to play.
    pub story_path: PathBuf,
    /// Forced source format; inferred from the extension when absent.
    pub format: Option<StoryFormat>,
    /// Seed for reproducible auto-selection.
    pub rng_seed: Option<u64>,
}

impl PlayerConfig {
    /// Reads `STORY_PATH`, `STORY_FORMAT` and `RNG_SEED`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `STORY_PATH` is unset or a value does not
    /// parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `STORY_PATH` is unset or a value does not
    /// parse.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let story_path = lookup("STORY_PATH")
            .filter(|path| !path.trim().is_empty())
            .map(PathBuf::from)
            .ok_or_else(|| AppError::Config("STORY_PATH environment variable must be set".into()))?;
        let format = lookup("STORY_FORMAT")
            .map(|value| {
                value
                    .parse::<StoryFormat>()
                    .map_err(|e| AppError::Config(format!("STORY_FORMAT: {e}")))
            })
            .transpose()?;
        let rng_seed = lookup("RNG_SEED")
            .map(|value| {
                value
                    .trim()
                    .parse::<u64>()
                    .map_err(|e| AppError::Config(format!("RNG_SEED must be a valid u64: {e}")))
            })
            .transpose()?;
        Ok(Self {
            story_path,
            format,
            rng_seed,
        })
    }

    /// Directory the story is loaded from.
    #[must_use]
    pub fn story_root(&self) -> &Path {
        self.story_path
            .parent()
            .filter(|parent| !parent.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    /// Story id relative to [`Self::story_root`].
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the path has no file name.
    pub fn story_id(&self) -> Result<String, AppError> {
        self.story_path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_owned)
            .ok_or_else(|| {
                AppError::Config(format!(
                    "STORY_PATH does not name a file: {}",
                    self.story_path.display()
                ))
            })
    }
}
