//! Configuration
//!
//! Layered configuration: built-in defaults, an optional file, then
//! `BLOCKFS__`-prefixed environment variables.

pub mod loader;

use crate::error::ApiError;
use crate::logging::LoggingConfig;
use serde::{Deserialize, Serialize};

pub use loader::ConfigLoader;

/// Default number of retrieval workers, which is also the capacity of the
/// idle-worker queue
pub const DEFAULT_RETRIEVAL_WORKERS: usize = 100;

fn default_workers() -> usize {
    DEFAULT_RETRIEVAL_WORKERS
}

/// Block retrieval settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Number of workers fetching blocks concurrently
    #[serde(default = "default_workers")]
    pub workers: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
        }
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BlockfsConfig {
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl BlockfsConfig {
    pub fn validate(&self) -> Result<(), ApiError> {
        if self.retrieval.workers == 0 {
            return Err(ApiError::ConfigError(
                "retrieval.workers must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
