//! Configuration loading for bulk update runs
//!
//! Configuration is read from YAML with `${VAR:-default}` environment
//! substitution, then a couple of switches can be overridden directly
//! from the environment.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;

use crate::error::{Result, SheetError};

/// Environment variable overriding [`ImportConfig::apply_deletes`]
pub const APPLY_DELETES_ENV: &str = "SHEETSYNC_APPLY_DELETES";

/// Environment variable overriding [`ImportConfig::create_missing_containers`]
pub const CREATE_CONTAINERS_ENV: &str = "SHEETSYNC_CREATE_MISSING_CONTAINERS";

/// Complete bulk update configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BulkUpdateConfig {
    /// Export settings
    pub export: ExportConfig,
    /// Import settings
    pub import: ImportConfig,
}

/// Export settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportConfig {
    /// Records loaded per store round trip
    pub batch_size: usize,
    /// Lower bound on slots per repeating subrecord family
    pub min_subrecords: usize,
    /// Blank slots appended past the observed maximum
    pub extra_subrecords: usize,
    /// Lower bound on slots per note type
    pub min_notes: usize,
    /// Leading columns frozen in the workbook
    pub freeze_columns: u16,
}

impl Default for ExportConfig {
    fn default() -> Self {
        Self {
            batch_size: 200,
            min_subrecords: 0,
            extra_subrecords: 3,
            min_notes: 2,
            freeze_columns: 3,
        }
    }
}

/// Import settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImportConfig {
    /// Allow blank sheet values to delete existing subrecords and notes
    pub apply_deletes: bool,
    /// Create top containers that do not resolve instead of reporting them
    pub create_missing_containers: bool,
    /// Rows merged per store round trip
    pub batch_size: usize,
    /// Sheet read from the workbook
    pub sheet_name: String,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            apply_deletes: false,
            create_missing_containers: false,
            batch_size: 128,
            sheet_name: "Updates".to_string(),
        }
    }
}

impl BulkUpdateConfig {
    /// Load from a YAML file, substitute environment variables, apply
    /// environment overrides and validate
    ///
    /// # Errors
    ///
    /// Returns `SheetError::IoError` if the file cannot be read and
    /// `SheetError::ConfigError` if it cannot be parsed or is invalid
    pub fn from_file(path: &Path) -> Result<Self> {
        let mut config: Self = load_config(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Apply `SHEETSYNC_*` environment overrides
    pub fn apply_env_overrides(&mut self) {
        if let Some(flag) = env_flag(APPLY_DELETES_ENV) {
            self.import.apply_deletes = flag;
        }
        if let Some(flag) = env_flag(CREATE_CONTAINERS_ENV) {
            self.import.create_missing_containers = flag;
        }
    }

    /// Check value ranges
    ///
    /// # Errors
    ///
    /// Returns `SheetError::ConfigError` naming the first invalid value
    pub fn validate(&self) -> Result<()> {
        if self.export.batch_size == 0 {
            return Err(SheetError::config("export.batch_size must be greater than 0"));
        }
        if self.import.batch_size == 0 {
            return Err(SheetError::config("import.batch_size must be greater than 0"));
        }
        if self.import.sheet_name.trim().is_empty() {
            return Err(SheetError::config("import.sheet_name must not be empty"));
        }
        if self.import.sheet_name.chars().count() > 31 {
            return Err(SheetError::config(
                "import.sheet_name must be at most 31 characters",
            ));
        }
        Ok(())
    }
}

/// Load configuration from a `YAML` file with environment variable substitution
///
/// # Errors
///
/// Returns `SheetError::IoError` if the file cannot be read
/// Returns `SheetError::ConfigError` if the YAML cannot be parsed
pub fn load_config<T: for<'de> Deserialize<'de>>(path: &Path) -> Result<T> {
    let contents = std::fs::read_to_string(path)?;
    let substituted = substitute_env_vars(&contents);
    serde_yaml::from_str(&substituted)
        .map_err(|e| SheetError::config(format!("Failed to parse YAML config: {e}")))
}

static ENV_VAR_PATTERN: Lazy<Option<Regex>> =
    Lazy::new(|| Regex::new(r"\$\{([^}:]+)(?::(-)?([^}]*))?\}").ok());

/// Substitute environment variables in the format ${VAR:-default}
fn substitute_env_vars(content: &str) -> String {
    let Some(re) = ENV_VAR_PATTERN.as_ref() else {
        return content.to_string();
    };

    re.replace_all(content, |caps: &Captures| {
        let var_name = &caps[1];
        let default_value = caps.get(3).map_or("", |m| m.as_str());
        env::var(var_name).unwrap_or_else(|_| default_value.to_string())
    })
    .to_string()
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        other => {
            tracing::warn!("Ignoring {name}={other}: expected a boolean");
            None
        }
    }
}
