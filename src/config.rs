//! YAML configuration for batch runs.
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//!
//! index:
//!   backend: "redb"
//!   path: "lookup.redb"
//!   load_batch_size: 50000
//!
//! pipeline:
//!   worker_count: 4
//!   batch_size: 1000
//!   buffer_size: 100
//!   preserve_order: false
//!
//! cache:
//!   policy: "lru"
//!   capacity: 100000
//! ```
//!
//! Every section, and every field inside a section, is optional.

use std::fs;
use std::path::Path;

use index::{BackendConfig, IndexConfig, DEFAULT_LOAD_BATCH_SIZE};
use matcher::CachePolicy;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::PipelineConfig;

/// Errors that can occur when loading YAML configuration files
#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    #[error("failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("unsupported config version: {0}")]
    UnsupportedVersion(String),
}

/// Top-level configuration for a batch run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefmatchConfig {
    #[serde(default = "default_version")]
    pub version: String,

    #[serde(default)]
    pub index: IndexYamlConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,

    #[serde(default)]
    pub cache: CachePolicy,
}

impl RefmatchConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: RefmatchConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => {}
            v => return Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }
        self.index.validate()?;
        self.pipeline
            .validate()
            .map_err(|e| ConfigLoadError::Validation(e.to_string()))?;
        if let CachePolicy::Lru { capacity: 0 } = self.cache {
            return Err(ConfigLoadError::Validation(
                "cache.capacity must be >= 1".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for RefmatchConfig {
    fn default() -> Self {
        Self {
            version: default_version(),
            index: IndexYamlConfig::default(),
            pipeline: PipelineConfig::default(),
            cache: CachePolicy::default(),
        }
    }
}

/// Storage backend choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    #[default]
    Redb,
    InMemory,
}

/// Index section.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexYamlConfig {
    #[serde(default)]
    pub backend: BackendKind,

    /// Database file for the redb backend.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_load_batch_size")]
    pub load_batch_size: usize,
}

impl IndexYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.load_batch_size == 0 {
            return Err(ConfigLoadError::Validation(
                "index.load_batch_size must be >= 1".to_string(),
            ));
        }
        if self.backend == BackendKind::Redb && self.path.trim().is_empty() {
            return Err(ConfigLoadError::Validation(
                "index.path is required for the redb backend".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_index_config(&self) -> IndexConfig {
        let backend = match self.backend {
            BackendKind::Redb => BackendConfig::redb(self.path.clone()),
            BackendKind::InMemory => BackendConfig::in_memory(),
        };
        IndexConfig::new()
            .with_backend(backend)
            .with_load_batch_size(self.load_batch_size)
    }
}

impl Default for IndexYamlConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            path: default_db_path(),
            load_batch_size: default_load_batch_size(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}
fn default_db_path() -> String {
    "lookup.redb".to_string()
}
fn default_load_batch_size() -> usize {
    DEFAULT_LOAD_BATCH_SIZE
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    #[test]
    fn test_load_valid_yaml() {
        let yaml = r#"
version: "1.0"
index:
  backend: "in_memory"
pipeline:
  worker_count: 8
  preserve_order: true
cache:
  policy: "lru"
  capacity: 500
"#;

        let config = RefmatchConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.index.backend, BackendKind::InMemory);
        assert_eq!(config.pipeline.worker_count, 8);
        assert_eq!(config.pipeline.batch_size, 1000);
        assert_eq!(config.pipeline.buffer_size, 100);
        assert!(config.pipeline.preserve_order);
        assert_eq!(config.cache, CachePolicy::Lru { capacity: 500 });
    }

    #[test]
    fn test_load_from_file() {
        let yaml = "version: \"1\"\n";
        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = RefmatchConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.index, IndexYamlConfig::default());
        assert_eq!(config.cache, CachePolicy::Unbounded);
    }

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = RefmatchConfig::from_yaml("{}").unwrap();
        assert_eq!(config, RefmatchConfig::default());
        assert_eq!(config.index.path, "lookup.redb");
        assert_eq!(config.index.load_batch_size, 50_000);
    }

    #[test]
    fn test_unsupported_version() {
        let err = RefmatchConfig::from_yaml("version: \"2.0\"\n").unwrap_err();
        assert!(matches!(err, ConfigLoadError::UnsupportedVersion(v) if v == "2.0"));
    }

    #[test]
    fn test_pipeline_validation() {
        let yaml = r#"
pipeline:
  batch_size: 0
"#;
        let err = RefmatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("batch_size must be >= 1"));
    }

    #[test]
    fn test_zero_capacity_lru_rejected() {
        let yaml = r#"
cache:
  policy: "lru"
  capacity: 0
"#;
        let err = RefmatchConfig::from_yaml(yaml).unwrap_err();
        assert!(err.to_string().contains("cache.capacity"));
    }

    #[test]
    fn test_index_config_conversion() {
        let section = IndexYamlConfig {
            backend: BackendKind::Redb,
            path: "/tmp/ref.redb".into(),
            load_batch_size: 10,
        };
        let cfg = section.to_index_config();
        assert_eq!(cfg.backend, BackendConfig::redb("/tmp/ref.redb"));
        assert_eq!(cfg.load_batch_size, 10);
    }
}
