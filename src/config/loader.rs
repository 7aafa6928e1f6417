//! ConfigLoader: composes sources and deserializes to BlockfsConfig.

use super::{BlockfsConfig, DEFAULT_RETRIEVAL_WORKERS};
use crate::error::ApiError;
use ::config::builder::DefaultState;
use ::config::{Config, ConfigBuilder, ConfigError, Environment, File};
use std::path::Path;
use tracing::debug;

/// Configuration loader.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration from defaults and the environment.
    pub fn load() -> Result<BlockfsConfig, ApiError> {
        Self::build(builder_with_defaults()?)
    }

    /// Load configuration from a specific file with environment overlay.
    /// Precedence: defaults (lowest) -> file -> environment (highest).
    pub fn load_from_file(path: &Path) -> Result<BlockfsConfig, ApiError> {
        debug!(path = %path.display(), "Loading configuration file");
        let builder = builder_with_defaults()?.add_source(File::from(path).required(true));
        Self::build(builder)
    }

    fn build(builder: ConfigBuilder<DefaultState>) -> Result<BlockfsConfig, ApiError> {
        let config: BlockfsConfig = add_environment(builder).build()?.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}

fn builder_with_defaults() -> Result<ConfigBuilder<DefaultState>, ConfigError> {
    Config::builder().set_default("retrieval.workers", DEFAULT_RETRIEVAL_WORKERS as i64)
}

/// BLOCKFS_ prefix with __ as separator for nested keys, e.g.
/// `BLOCKFS__RETRIEVAL__WORKERS=16`.
fn add_environment(builder: ConfigBuilder<DefaultState>) -> ConfigBuilder<DefaultState> {
    builder.add_source(
        Environment::with_prefix("BLOCKFS")
            .separator("__")
            .try_parsing(true),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::fs;

    #[test]
    #[serial]
    fn test_load_from_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockfs.toml");
        fs::write(
            &path,
            "[retrieval]\nworkers = 8\n\n[logging]\nlevel = \"debug\"\nformat = \"json\"\n",
        )
        .unwrap();

        let config = ConfigLoader::load_from_file(&path).unwrap();
        assert_eq!(config.retrieval.workers, 8);
        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.format, "json");
        assert_eq!(config.logging.output, "stderr");
    }

    #[test]
    #[serial]
    fn test_load_from_file_rejects_zero_workers() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockfs.toml");
        fs::write(&path, "[retrieval]\nworkers = 0\n").unwrap();

        let err = ConfigLoader::load_from_file(&path).unwrap_err();
        assert!(matches!(err, ApiError::ConfigError(_)));
    }

    #[test]
    #[serial]
    fn test_missing_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("absent.toml");
        assert!(ConfigLoader::load_from_file(&path).is_err());
    }

    #[test]
    #[serial]
    fn test_environment_overrides_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("blockfs.toml");
        fs::write(&path, "[retrieval]\nworkers = 8\n").unwrap();

        std::env::set_var("BLOCKFS__RETRIEVAL__WORKERS", "16");
        let result = ConfigLoader::load_from_file(&path);
        std::env::remove_var("BLOCKFS__RETRIEVAL__WORKERS");
        assert_eq!(result.unwrap().retrieval.workers, 16);
    }

    #[test]
    #[serial]
    fn test_load_without_file_uses_defaults() {
        let config = ConfigLoader::load().unwrap();
        assert_eq!(config.retrieval.workers, DEFAULT_RETRIEVAL_WORKERS);
    }
}
