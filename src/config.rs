//! Pipeline configuration.
//!
//! Every knob has a code default; [`PipelineConfig::from_env`] overrides them
//! from `TRIPSMITH_*` environment variables (a `.env` file is honored via
//! `dotenvy`). Configuration is plain data handed to the pipeline at
//! construction time; nothing reads the environment after startup.

use std::path::PathBuf;

use url::Url;

use crate::splitter::SplitterConfig;
use crate::types::PipelineError;

/// Default remote source for travel-service listings.
pub const DEFAULT_SOURCE_URL: &str = "https://desire4travels-1.onrender.com/services";

/// Default location of the persisted index artifact.
pub const DEFAULT_INDEX_PATH: &str = "./listing_index.sqlite";

/// Settings for one ingestion run.
#[derive(Clone, Debug)]
pub struct PipelineConfig {
    /// URL returning a JSON array of listing objects.
    pub source_url: Url,
    /// Where the index artifact is written. Rebuilds overwrite it in place.
    pub index_path: PathBuf,
    /// Optional directory for caching the raw listings body between runs.
    pub cache_dir: Option<PathBuf>,
    /// Chunking parameters.
    pub splitter: SplitterConfig,
    /// User agent sent with the listings request.
    pub user_agent: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            source_url: Url::parse(DEFAULT_SOURCE_URL).expect("default source URL is valid"),
            index_path: PathBuf::from(DEFAULT_INDEX_PATH),
            cache_dir: None,
            splitter: SplitterConfig::default(),
            user_agent: format!("tripsmith-ingest/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl PipelineConfig {
    /// Builds a configuration from `TRIPSMITH_*` environment variables,
    /// falling back to the defaults above for anything unset.
    ///
    /// Recognized variables: `TRIPSMITH_SOURCE_URL`, `TRIPSMITH_INDEX_PATH`,
    /// `TRIPSMITH_CACHE_DIR`, `TRIPSMITH_CHUNK_SIZE`,
    /// `TRIPSMITH_CHUNK_OVERLAP`.
    pub fn from_env() -> Result<Self, PipelineError> {
        dotenvy::dotenv().ok();
        let mut config = Self::default();

        if let Ok(raw) = std::env::var("TRIPSMITH_SOURCE_URL") {
            config.source_url = Url::parse(&raw).map_err(|err| {
                PipelineError::InvalidArgument(format!("TRIPSMITH_SOURCE_URL: {err}"))
            })?;
        }
        if let Ok(raw) = std::env::var("TRIPSMITH_INDEX_PATH") {
            config.index_path = PathBuf::from(raw);
        }
        if let Ok(raw) = std::env::var("TRIPSMITH_CACHE_DIR") {
            config.cache_dir = Some(PathBuf::from(raw));
        }
        if let Ok(raw) = std::env::var("TRIPSMITH_CHUNK_SIZE") {
            config.splitter.max_chars = raw.parse().map_err(|err| {
                PipelineError::InvalidArgument(format!("TRIPSMITH_CHUNK_SIZE: {err}"))
            })?;
        }
        if let Ok(raw) = std::env::var("TRIPSMITH_CHUNK_OVERLAP") {
            config.splitter.overlap = raw.parse().map_err(|err| {
                PipelineError::InvalidArgument(format!("TRIPSMITH_CHUNK_OVERLAP: {err}"))
            })?;
        }

        Ok(config)
    }

    #[must_use]
    pub fn with_source_url(mut self, url: Url) -> Self {
        self.source_url = url;
        self
    }

    #[must_use]
    pub fn with_index_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.index_path = path.into();
        self
    }

    #[must_use]
    pub fn with_cache_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.cache_dir = Some(dir.into());
        self
    }

    #[must_use]
    pub fn with_splitter(mut self, splitter: SplitterConfig) -> Self {
        self.splitter = splitter;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documented_values() {
        let config = PipelineConfig::default();
        assert_eq!(config.source_url.as_str(), DEFAULT_SOURCE_URL);
        assert_eq!(config.index_path, PathBuf::from(DEFAULT_INDEX_PATH));
        assert!(config.cache_dir.is_none());
        assert_eq!(config.splitter.max_chars, 1000);
        assert_eq!(config.splitter.overlap, 200);
    }

    #[test]
    fn builders_replace_fields() {
        let config = PipelineConfig::default()
            .with_index_path("/tmp/idx.sqlite")
            .with_cache_dir("/tmp/cache");
        assert_eq!(config.index_path, PathBuf::from("/tmp/idx.sqlite"));
        assert_eq!(config.cache_dir, Some(PathBuf::from("/tmp/cache")));
    }
}
