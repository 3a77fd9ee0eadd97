//! Engine configuration
//!
//! One JSON file configures the index engine. All fields are optional;
//! defaults suit a medium deployment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

/// Result type for configuration loading
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading and validation errors
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file could not be read
    #[error("failed to read config {path}: {source}")]
    Read {
        /// Path of the config file
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The file is not valid JSON for this schema
    #[error("invalid config JSON: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field value is out of range
    #[error("invalid config value: {0}")]
    Invalid(String),
}

/// Index engine configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct IndexConfig {
    /// Per-key entry limit: a key matching at least this many records
    /// stops being tracked precisely. 0 disables the limit.
    #[serde(default = "default_entry_limit")]
    pub entry_limit: usize,

    /// Byte budget for the bulk builder's in-memory change buffer.
    #[serde(default = "default_buffer_bytes")]
    pub buffer_bytes: usize,

    /// Directory the bulk builder writes its run files into.
    #[serde(default = "default_scratch_dir")]
    pub scratch_dir: PathBuf,
}

fn default_entry_limit() -> usize {
    4000
}

fn default_buffer_bytes() -> usize {
    8 * 1024 * 1024
}

fn default_scratch_dir() -> PathBuf {
    PathBuf::from("./scratch")
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            entry_limit: default_entry_limit(),
            buffer_bytes: default_buffer_bytes(),
            scratch_dir: default_scratch_dir(),
        }
    }
}

impl IndexConfig {
    /// Loads and validates configuration from a JSON file.
    pub fn load(path: &Path) -> ConfigResult<Self> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: IndexConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Checks field values for sanity.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.buffer_bytes < 4096 {
            return Err(ConfigError::Invalid(format!(
                "buffer_bytes must be at least 4096, got {}",
                self.buffer_bytes
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = IndexConfig::default();
        assert_eq!(config.entry_limit, 4000);
        assert_eq!(config.buffer_bytes, 8 * 1024 * 1024);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "entry_limit": 100 }"#).unwrap();

        let config = IndexConfig::load(&path).unwrap();
        assert_eq!(config.entry_limit, 100);
        assert_eq!(config.buffer_bytes, 8 * 1024 * 1024);
    }

    #[test]
    fn test_load_rejects_small_buffer() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, r#"{ "buffer_bytes": 16 }"#).unwrap();

        assert!(matches!(
            IndexConfig::load(&path),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("engine.json");
        std::fs::write(&path, "{ not json").unwrap();

        assert!(matches!(
            IndexConfig::load(&path),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_load_missing_file() {
        let path = Path::new("/definitely/not/here.json");
        assert!(matches!(
            IndexConfig::load(path),
            Err(ConfigError::Read { .. })
        ));
    }
}
