//! Settings Models
//!
//! Service configuration stored in config.json.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::models::analysis::Industry;
use crate::utils::error::AppResult;
use crate::utils::paths;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// Service configuration stored in config.json
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// SQLite database file; defaults to ~/.ml-analysis/analysis.db
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    /// Directory for staged upload payloads; defaults to ~/.ml-analysis/staging
    #[serde(default)]
    pub staging_dir: Option<PathBuf>,
    /// Root that stored dataset paths are resolved against
    #[serde(default)]
    pub storage_root: Option<PathBuf>,
    /// Default log filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Seed for the fallback capability; `None` draws fresh randomness per run
    #[serde(default)]
    pub fallback_seed: Option<u64>,
    /// Watchdog for a single analysis; `None` disables it
    #[serde(default)]
    pub execution_timeout_secs: Option<u64>,
    /// Industry used when a request does not name one
    #[serde(default = "default_industry")]
    pub default_industry: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_industry() -> String {
    Industry::Retail.as_str().to_string()
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            database_path: None,
            staging_dir: None,
            storage_root: None,
            log_level: default_log_level(),
            fallback_seed: None,
            execution_timeout_secs: None,
            default_industry: default_industry(),
        }
    }
}

/// Partial configuration update
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ConfigUpdate {
    pub database_path: Option<PathBuf>,
    pub staging_dir: Option<PathBuf>,
    pub storage_root: Option<PathBuf>,
    pub log_level: Option<String>,
    pub fallback_seed: Option<u64>,
    pub execution_timeout_secs: Option<u64>,
    pub default_industry: Option<String>,
}

impl ServiceConfig {
    /// Apply a partial update to the configuration
    pub fn apply_update(&mut self, update: ConfigUpdate) {
        if let Some(path) = update.database_path {
            self.database_path = Some(path);
        }
        if let Some(dir) = update.staging_dir {
            self.staging_dir = Some(dir);
        }
        if let Some(root) = update.storage_root {
            self.storage_root = Some(root);
        }
        if let Some(level) = update.log_level {
            self.log_level = level;
        }
        if let Some(seed) = update.fallback_seed {
            self.fallback_seed = Some(seed);
        }
        if let Some(secs) = update.execution_timeout_secs {
            self.execution_timeout_secs = Some(secs);
        }
        if let Some(industry) = update.default_industry {
            self.default_industry = industry;
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if !LOG_LEVELS.contains(&self.log_level.as_str()) {
            return Err(format!(
                "Invalid log_level: {}. Must be one of {}",
                self.log_level,
                LOG_LEVELS.join(", ")
            ));
        }

        if Industry::parse(&self.default_industry).is_none() {
            return Err(format!("Unknown default_industry: {}", self.default_industry));
        }

        if self.execution_timeout_secs == Some(0) {
            return Err("execution_timeout_secs must be at least 1 second".to_string());
        }

        Ok(())
    }

    /// Database path, falling back to the default location
    pub fn resolved_database_path(&self) -> AppResult<PathBuf> {
        match &self.database_path {
            Some(path) => Ok(path.clone()),
            None => paths::database_path(),
        }
    }

    /// Staging directory, falling back to the default location
    pub fn resolved_staging_dir(&self) -> AppResult<PathBuf> {
        match &self.staging_dir {
            Some(dir) => Ok(dir.clone()),
            None => paths::staging_dir(),
        }
    }

    /// Storage root, falling back to the default location
    pub fn resolved_storage_root(&self) -> AppResult<PathBuf> {
        match &self.storage_root {
            Some(root) => Ok(root.clone()),
            None => paths::storage_root(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ServiceConfig::default();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.default_industry, "retail");
        assert!(config.execution_timeout_secs.is_none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_apply_update() {
        let mut config = ServiceConfig::default();
        let update = ConfigUpdate {
            log_level: Some("debug".to_string()),
            fallback_seed: Some(42),
            ..Default::default()
        };
        config.apply_update(update);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.fallback_seed, Some(42));
        assert_eq!(config.default_industry, "retail");
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let mut config = ServiceConfig {
            log_level: "loud".to_string(),
            ..Default::default()
        };
        assert!(config.validate().is_err());

        config.log_level = "warn".to_string();
        config.default_industry = "mining".to_string();
        assert!(config.validate().is_err());

        config.default_industry = "salud".to_string();
        config.execution_timeout_secs = Some(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_missing_fields_use_defaults() {
        let config: ServiceConfig = serde_json::from_str(r#"{"fallback_seed": 9}"#).unwrap();
        assert_eq!(config.fallback_seed, Some(9));
        assert_eq!(config.log_level, "info");
        assert!(config.database_path.is_none());
    }

    #[test]
    fn test_resolved_paths_prefer_overrides() {
        let config = ServiceConfig {
            staging_dir: Some(PathBuf::from("/tmp/staging")),
            ..Default::default()
        };
        assert_eq!(config.resolved_staging_dir().unwrap(), PathBuf::from("/tmp/staging"));
    }
}
