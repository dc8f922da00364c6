//! BlackBox configuration management

use crate::error::{Error, Result};
use crate::policy::Policy;
use crate::privacy::{PatternCatalog, PatternRule};
use crate::storage::StorageKind;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Environment variable overriding `storage.database_url`
pub const DATABASE_URL_ENV: &str = "BLACKBOX_DATABASE_URL";

/// Main BlackBox configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BlackBoxConfig {
    /// Execution policy
    pub policy: Policy,

    /// Redaction configuration
    pub privacy: PrivacyConfig,

    /// Outcome storage configuration
    pub storage: StorageConfig,

    /// Attestation configuration
    pub attestation: AttestationConfig,
}

impl BlackBoxConfig {
    /// Load a configuration file. Missing sections fall back to defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Apply overrides from the process environment
    pub fn apply_env(&mut self) {
        self.apply_env_from(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary variable lookup
    pub fn apply_env_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(url) = lookup(DATABASE_URL_ENV).filter(|v| !v.trim().is_empty()) {
            self.storage.database_url = url;
        }
    }

    /// Validate the policy, custom patterns and storage settings
    pub fn validate(&self) -> Result<()> {
        self.policy.validate()?;
        self.privacy.catalog()?;
        if self.storage.backend == StorageKind::Sqlite && self.storage.database_url.trim().is_empty()
        {
            return Err(Error::Config(
                "storage.database_url is required for the sqlite backend".to_string(),
            ));
        }
        if self.attestation.code_version.trim().is_empty() {
            return Err(Error::Config(
                "attestation.code_version must not be empty".to_string(),
            ));
        }
        Ok(())
    }
}

/// Redaction configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PrivacyConfig {
    /// Redact results, traces and inputs before they leave the wrapper
    pub redaction_enabled: bool,

    /// Patterns appended to (or replacing, by name) the built-in catalog
    pub custom_patterns: Vec<PatternRule>,
}

impl Default for PrivacyConfig {
    fn default() -> Self {
        Self {
            redaction_enabled: true,
            custom_patterns: Vec::new(),
        }
    }
}

impl PrivacyConfig {
    /// Built-in catalog extended with the custom patterns
    pub fn catalog(&self) -> Result<PatternCatalog> {
        PatternCatalog::with_custom(self.custom_patterns.clone())
    }
}

/// Storage configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Backend used for outcomes
    pub backend: StorageKind,

    /// SQLite database URL (used by the sqlite backend)
    pub database_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageKind::default(),
            database_url: default_database_url(),
        }
    }
}

/// Attestation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AttestationConfig {
    /// Version string bound into every attestation
    pub code_version: String,
}

impl Default for AttestationConfig {
    fn default() -> Self {
        Self {
            code_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// Directory holding BlackBox state (`~/.blackbox`)
pub fn default_data_dir() -> PathBuf {
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".blackbox")
}

fn default_database_url() -> String {
    format!(
        "sqlite://{}",
        default_data_dir().join("outcomes.db").display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_config() {
        let config = BlackBoxConfig::default();
        assert!(config.policy.black_box);
        assert!(config.privacy.redaction_enabled);
        assert_eq!(config.storage.backend, StorageKind::Memory);
        assert!(config.storage.database_url.starts_with("sqlite://"));
        assert!(config.storage.database_url.ends_with("outcomes.db"));
        assert_eq!(config.attestation.code_version, env!("CARGO_PKG_VERSION"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_parse_full_toml() {
        let toml = r#"
[policy]
black_box = true
keep_hashes = true
max_cost_cents = 25.0
request_timeout_seconds = 10
break_glass_request_ids = ["incident-42"]

[privacy]
redaction_enabled = true

[[privacy.custom_patterns]]
name = "employee_id"
pattern = "EMP-\\d{6}"
replacement = "[EMPLOYEE_ID]"

[storage]
backend = "sqlite"
database_url = "sqlite::memory:"

[attestation]
code_version = "2.1.0"
"#;
        let config: BlackBoxConfig = toml::from_str(toml).unwrap();
        assert!(config.policy.keep_hashes);
        assert_eq!(config.policy.max_cost_cents, Some(25.0));
        assert!(config.policy.is_break_glass("incident-42"));
        assert_eq!(config.privacy.custom_patterns.len(), 1);
        assert_eq!(config.storage.backend, StorageKind::Sqlite);
        assert_eq!(config.attestation.code_version, "2.1.0");
        assert!(config.validate().is_ok());

        let catalog = config.privacy.catalog().unwrap();
        assert!(catalog.get("employee_id").is_some());
        assert!(catalog.get("email").is_some());
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: BlackBoxConfig = toml::from_str("[policy]\nkeep_hashes = true\n").unwrap();
        assert!(config.policy.keep_hashes);
        assert!(config.policy.black_box);
        assert!(config.privacy.redaction_enabled);
        assert_eq!(config.storage, StorageConfig::default());
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage]\nbackend = \"sqlite\"").unwrap();
        let config = BlackBoxConfig::from_file(file.path()).unwrap();
        assert_eq!(config.storage.backend, StorageKind::Sqlite);
    }

    #[test]
    fn test_from_file_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[storage\nbackend =").unwrap();
        let err = BlackBoxConfig::from_file(file.path()).unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_from_file_missing() {
        let err = BlackBoxConfig::from_file("/nonexistent/blackbox.toml").unwrap_err();
        assert!(matches!(err, Error::Io(_)));
    }

    #[test]
    fn test_env_override() {
        let mut config = BlackBoxConfig::default();
        config.apply_env_from(|key| {
            (key == DATABASE_URL_ENV).then(|| "sqlite:///tmp/override.db".to_string())
        });
        assert_eq!(config.storage.database_url, "sqlite:///tmp/override.db");

        let before = config.storage.database_url.clone();
        config.apply_env_from(|_| Some("  ".to_string()));
        assert_eq!(config.storage.database_url, before);
    }

    #[test]
    fn test_validate_rejects_bad_settings() {
        let mut config = BlackBoxConfig::default();
        config.policy.request_timeout_seconds = 0;
        assert!(config.validate().is_err());

        let mut config = BlackBoxConfig::default();
        config.privacy.custom_patterns = vec![PatternRule::new("broken", "(", "[X]")];
        assert!(matches!(
            config.validate(),
            Err(Error::PatternCompile { .. })
        ));

        let mut config = BlackBoxConfig::default();
        config.storage.backend = StorageKind::Sqlite;
        config.storage.database_url = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_serialize_round_trip() {
        let config = BlackBoxConfig::default();
        let toml = toml::to_string_pretty(&config).unwrap();
        let back: BlackBoxConfig = toml::from_str(&toml).unwrap();
        assert_eq!(back, config);
    }
}
