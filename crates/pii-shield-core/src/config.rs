//! Configuration management for pii-shield

use crate::detection::PiiCategory;
use crate::error::{PiiError, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

pub const SECRET_ENV_VAR: &str = "PII_SHIELD_HMAC_SECRET";
pub const DATABASE_PATH_ENV_VAR: &str = "PII_SHIELD_DATABASE_PATH";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub detection: DetectionConfig,
    pub tokenizer: TokenizerConfig,
    pub mapping: MappingConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Category precedence. Earlier categories claim a span first.
    pub order: Vec<PiiCategory>,
    /// Per-category regex overrides of the built-in patterns.
    #[serde(default)]
    pub patterns: BTreeMap<PiiCategory, String>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TokenizerConfig {
    pub mode: TokenMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenMode {
    /// HMAC-SHA256 fingerprints; requires `secret`.
    Keyed,
    /// Unkeyed rolling hash. Not a security control.
    Demo,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub backend: StoreBackend,
    pub database_path: PathBuf,
    pub retention_days: Option<u32>,
    #[serde(default)]
    pub on_store_failure: StoreFailurePolicy,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Sqlite,
    /// Volatile; the owner must call `clear()` at the end of its scope.
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreFailurePolicy {
    /// Fail the whole anonymize call.
    #[default]
    Abort,
    /// Leave the value untouched in the output and keep going.
    Skip,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub bind: String,
    pub store_timeout_ms: u64,
}

impl fmt::Debug for TokenizerConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenizerConfig")
            .field("mode", &self.mode)
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            detection: DetectionConfig::default(),
            tokenizer: TokenizerConfig {
                mode: TokenMode::Keyed,
                secret: None,
            },
            mapping: MappingConfig {
                backend: StoreBackend::Sqlite,
                database_path: PathBuf::from("mappings.db"),
                retention_days: None,
                on_store_failure: StoreFailurePolicy::Abort,
            },
            server: ServerConfig {
                bind: "127.0.0.1:8787".to_string(),
                store_timeout_ms: 5000,
            },
        }
    }
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            order: PiiCategory::DEFAULT_ORDER.to_vec(),
            patterns: BTreeMap::new(),
        }
    }
}

impl Config {
    /// Offline configuration: unkeyed tokens and an in-process store.
    pub fn demo() -> Self {
        let mut config = Self::default();
        config.tokenizer.mode = TokenMode::Demo;
        config.mapping.backend = StoreBackend::Memory;
        config
    }

    pub fn get_app_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "pii-shield", "pii-shield").ok_or_else(|| {
            PiiError::Configuration("failed to determine application directories".to_string())
        })
    }

    pub fn resolve_paths(&mut self) -> Result<()> {
        if self.mapping.backend != StoreBackend::Sqlite
            || self.mapping.database_path == Path::new(":memory:")
        {
            return Ok(());
        }

        if self.mapping.database_path.is_relative() {
            let project_dirs = Self::get_app_dirs()?;
            let data_dir = project_dirs.data_dir();
            std::fs::create_dir_all(data_dir).map_err(|e| {
                PiiError::Configuration(format!("cannot create {}: {}", data_dir.display(), e))
            })?;
            self.mapping.database_path = data_dir.join(&self.mapping.database_path);
        }

        Ok(())
    }

    /// Environment variables take precedence over the file for the secret
    /// and the database location.
    pub fn apply_env(&mut self) {
        if let Ok(secret) = std::env::var(SECRET_ENV_VAR) {
            if !secret.is_empty() {
                self.tokenizer.secret = Some(secret);
            }
        }
        if let Ok(path) = std::env::var(DATABASE_PATH_ENV_VAR) {
            if !path.is_empty() {
                self.mapping.database_path = PathBuf::from(path);
            }
        }
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PiiError::Configuration(format!("cannot read {}: {}", path.display(), e))
        })?;
        let mut config: Self = toml::from_str(&contents).map_err(|e| {
            PiiError::Configuration(format!("invalid config {}: {}", path.display(), e))
        })?;
        config.resolve_paths()?;
        Ok(config)
    }

    pub fn get_default_config_path() -> Result<PathBuf> {
        let project_dirs = Self::get_app_dirs()?;
        let config_dir = project_dirs.config_dir();
        std::fs::create_dir_all(config_dir).map_err(|e| {
            PiiError::Configuration(format!("cannot create {}: {}", config_dir.display(), e))
        })?;
        Ok(config_dir.join("pii-shield.toml"))
    }

    pub fn to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PiiError::Configuration(format!("cannot serialize config: {}", e)))?;
        std::fs::write(path, contents).map_err(|e| {
            PiiError::Configuration(format!("cannot write {}: {}", path.display(), e))
        })?;
        Ok(())
    }

    /// Structural checks only. A missing signing key is reported when the
    /// token codec is built, not here.
    pub fn validate(&self) -> Result<()> {
        for (category, pattern) in &self.detection.patterns {
            regex::Regex::new(pattern).map_err(|e| {
                PiiError::Configuration(format!("invalid regex pattern for {}: {}", category, e))
            })?;
        }

        let mut seen = HashSet::new();
        for category in &self.detection.order {
            if !seen.insert(*category) {
                return Err(PiiError::Configuration(format!(
                    "detection.order lists {} more than once",
                    category
                )));
            }
        }
        if let Some(missing) = PiiCategory::ALL.iter().find(|c| !seen.contains(*c)) {
            return Err(PiiError::Configuration(format!(
                "detection.order is missing {}",
                missing
            )));
        }

        if self.server.store_timeout_ms == 0 {
            return Err(PiiError::Configuration(
                "server.store_timeout_ms must be greater than zero".to_string(),
            ));
        }

        if self.mapping.backend == StoreBackend::Sqlite {
            if let Some(parent) = self.mapping.database_path.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    std::fs::create_dir_all(parent).map_err(|e| {
                        PiiError::Configuration(format!("cannot create {}: {}", parent.display(), e))
                    })?;
                }
            }
        }

        Ok(())
    }
}
