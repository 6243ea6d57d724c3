//! YAML configuration for the tender deduplication pipeline.
//!
//! Every tunable that is not an endpoint or a secret lives in one YAML file:
//! validator rules, the source-to-table map used to populate the dedup cache,
//! routing options and polling cadence. Queue URLs and the database connection
//! string come from the environment instead (see the `worker` crate).
//!
//! ## Example YAML Configuration
//!
//! ```yaml
//! version: "1.0"
//! name: "production"
//!
//! validator:
//!   closing_date_field: closingDate
//!   fallback_offset_secs: 7200
//!
//! cache:
//!   tender_number_column: TenderNumber
//!   sources:
//!     - { source: SARS, table: SarsTender }
//!     - { source: eTenders, table: eTender }
//!
//! router:
//!   annotate_duplicates: false
//!
//! poll:
//!   max_messages: 10
//!   wait_time_secs: 2
//!   visibility_timeout_secs: 300
//!   safety_margin_secs: 30
//!   poll_delay_ms: 100
//! ```

use std::collections::HashSet;
use std::fs;
use std::path::Path;

use cache::{default_source_tables, validate_identifier, SourceTable, DEFAULT_TENDER_NUMBER_COLUMN};
use router::{RouterConfig, MAX_BATCH_SIZE};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use validate::{Validator, ValidatorConfig};

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

/// Top-level YAML configuration for the pipeline
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct PipelineConfig {
    /// Configuration format version
    pub version: String,

    /// Optional configuration name/description
    #[serde(default)]
    pub name: Option<String>,

    /// Closing-date validation rules
    #[serde(default)]
    pub validator: ValidatorConfig,

    /// Dedup cache population
    #[serde(default)]
    pub cache: CacheYamlConfig,

    /// Routing options
    #[serde(default)]
    pub router: RouterConfig,

    /// Source queue polling
    #[serde(default)]
    pub poll: PollYamlConfig,
}

impl PipelineConfig {
    /// Load a YAML configuration file from the given path
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigLoadError> {
        let path = path.as_ref();
        tracing::debug!(path = %path.display(), "loading pipeline config");
        let content = fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse YAML configuration from a string
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigLoadError> {
        let config: PipelineConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigLoadError> {
        match self.version.as_str() {
            "1.0" | "1" => Ok(()),
            v => Err(ConfigLoadError::UnsupportedVersion(v.to_string())),
        }?;

        self.validator
            .validate()
            .map_err(|err| ConfigLoadError::Validation(format!("validator: {err}")))?;
        self.cache.validate()?;
        self.router
            .validate()
            .map_err(|err| ConfigLoadError::Validation(format!("router: {err}")))?;
        self.poll.validate()?;
        Ok(())
    }

    /// Builds the validator described by this configuration.
    pub fn build_validator(&self) -> Result<Validator, ConfigLoadError> {
        Validator::new(self.validator.clone())
            .map_err(|err| ConfigLoadError::Validation(format!("validator: {err}")))
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            version: "1.0".to_string(),
            name: None,
            validator: ValidatorConfig::default(),
            cache: CacheYamlConfig::default(),
            router: RouterConfig::default(),
            poll: PollYamlConfig::default(),
        }
    }
}

/// Dedup cache YAML configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheYamlConfig {
    /// Known sources and the tables holding their tenders
    #[serde(default = "default_source_tables")]
    pub sources: Vec<SourceTable>,

    /// Column holding the tender number in every source table
    #[serde(default = "default_tender_number_column")]
    pub tender_number_column: String,
}

impl CacheYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        validate_identifier(&self.tender_number_column)
            .map_err(|err| ConfigLoadError::Validation(format!("cache.tender_number_column: {err}")))?;

        let mut seen = HashSet::new();
        for entry in &self.sources {
            if entry.source.trim().is_empty() {
                return Err(ConfigLoadError::Validation(
                    "cache.sources: source name must not be empty".to_string(),
                ));
            }
            validate_identifier(&entry.table)
                .map_err(|err| ConfigLoadError::Validation(format!("cache.sources: {err}")))?;
            if !seen.insert(entry.source.trim().to_lowercase()) {
                return Err(ConfigLoadError::Validation(format!(
                    "cache.sources: source '{}' is listed more than once",
                    entry.source
                )));
            }
        }
        Ok(())
    }
}

impl Default for CacheYamlConfig {
    fn default() -> Self {
        Self {
            sources: default_source_tables(),
            tender_number_column: default_tender_number_column(),
        }
    }
}

/// Polling YAML configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PollYamlConfig {
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Long-poll wait per receive call
    #[serde(default = "default_wait_time_secs")]
    pub wait_time_secs: u64,

    #[serde(default = "default_visibility_timeout_secs")]
    pub visibility_timeout_secs: u64,

    /// Polling stops once the remaining budget is at or below this margin
    #[serde(default = "default_safety_margin_secs")]
    pub safety_margin_secs: u64,

    /// Pause between non-empty polls
    #[serde(default = "default_poll_delay_ms")]
    pub poll_delay_ms: u64,
}

impl PollYamlConfig {
    fn validate(&self) -> Result<(), ConfigLoadError> {
        if self.max_messages == 0 || self.max_messages > MAX_BATCH_SIZE {
            return Err(ConfigLoadError::Validation(format!(
                "poll.max_messages must be between 1 and {MAX_BATCH_SIZE}"
            )));
        }
        if self.wait_time_secs > 20 {
            return Err(ConfigLoadError::Validation(
                "poll.wait_time_secs must be <= 20".to_string(),
            ));
        }
        if self.visibility_timeout_secs > 43_200 {
            return Err(ConfigLoadError::Validation(
                "poll.visibility_timeout_secs must be <= 43200".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for PollYamlConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            wait_time_secs: default_wait_time_secs(),
            visibility_timeout_secs: default_visibility_timeout_secs(),
            safety_margin_secs: default_safety_margin_secs(),
            poll_delay_ms: default_poll_delay_ms(),
        }
    }
}

fn default_tender_number_column() -> String {
    DEFAULT_TENDER_NUMBER_COLUMN.to_string()
}

fn default_max_messages() -> usize {
    MAX_BATCH_SIZE
}

fn default_wait_time_secs() -> u64 {
    2
}

fn default_visibility_timeout_secs() -> u64 {
    300
}

fn default_safety_margin_secs() -> u64 {
    30
}

fn default_poll_delay_ms() -> u64 {
    100
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
name: "test config"
validator:
  fallback_offset_secs: 3600
router:
  annotate_duplicates: true
"#;

        let config = PipelineConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.version, "1.0");
        assert_eq!(config.name, Some("test config".to_string()));
        assert_eq!(config.validator.fallback_offset_secs, 3600);
        assert_eq!(config.validator.closing_date_field, "closingDate");
        assert!(config.router.annotate_duplicates);
        assert_eq!(config.cache.sources.len(), 5);
        assert_eq!(config.poll, PollYamlConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let yaml = r#"
version: "1"
cache:
  sources:
    - source: SARS
      table: SarsTender
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(yaml.as_bytes()).unwrap();

        let config = PipelineConfig::from_file(temp_file.path()).unwrap();
        assert_eq!(config.cache.sources, vec![SourceTable::new("SARS", "SarsTender")]);
        assert_eq!(config.cache.tender_number_column, "TenderNumber");
    }

    #[test]
    fn test_default_config() {
        let config = PipelineConfig::default();
        assert_eq!(config.version, "1.0");
        assert!(config.name.is_none());
        assert!(config.validate().is_ok());
        assert!(config.build_validator().is_ok());
    }

    #[test]
    fn test_unsupported_version() {
        let result = PipelineConfig::from_yaml("version: \"2.0\"\n");
        assert!(matches!(result, Err(ConfigLoadError::UnsupportedVersion(v)) if v == "2.0"));
    }

    #[test]
    fn test_table_identifier_validation() {
        let yaml = r#"
version: "1.0"
cache:
  sources:
    - source: SARS
      table: "SarsTender; DROP TABLE x"
"#;

        let result = PipelineConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("cache.sources"));
    }

    #[test]
    fn test_duplicate_source_rejected() {
        let yaml = r#"
version: "1.0"
cache:
  sources:
    - { source: SARS, table: SarsTender }
    - { source: sars, table: OtherTender }
"#;

        let result = PipelineConfig::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("more than once"));
    }

    #[test]
    fn test_poll_validation() {
        let yaml = r#"
version: "1.0"
poll:
  max_messages: 11
"#;

        let result = PipelineConfig::from_yaml(yaml);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("max_messages"));
    }

    #[test]
    fn test_validator_validation() {
        let yaml = r#"
version: "1.0"
validator:
  fallback_offset_secs: 100000
"#;

        let result = PipelineConfig::from_yaml(yaml);
        assert!(result.unwrap_err().to_string().contains("validator"));
    }
}
