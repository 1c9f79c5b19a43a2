//! Configuration loading and default path resolution
//!
//! Every setting follows the same priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! The binary's argument parser handles 1 and 2 and hands the result over as
//! [`ConfigOverrides`]; this module merges them with the TOML file and the
//! compiled defaults. A missing TOML file is not an error.

use crate::db::models::IdentityPolicy;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Share references point here unless configured otherwise
pub const DEFAULT_BASE_URL: &str = "https://karwan.streamlit.app";

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5730";

pub const DEFAULT_DOCUMENT_TITLE: &str = "Karwan-e-Tijarat Member Profile";

const APP_DIR: &str = "karwan";
const DATABASE_FILE: &str = "karwan_tijarat.db";

/// Logging section of the TOML file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

/// Contents of `config.toml`; every key is optional
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TomlConfig {
    pub database: Option<PathBuf>,
    pub base_url: Option<String>,
    pub admin_password: Option<String>,
    pub identity_policy: Option<IdentityPolicy>,
    pub bind: Option<String>,
    pub document_title: Option<String>,
    pub logging: LoggingConfig,
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub database: Option<PathBuf>,
    pub base_url: Option<String>,
    pub admin_password: Option<String>,
    pub identity_policy: Option<IdentityPolicy>,
    pub bind: Option<String>,
    pub document_title: Option<String>,
    pub log_level: Option<String>,
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub database: PathBuf,
    pub base_url: String,
    pub identity_policy: IdentityPolicy,
    pub bind: String,
    pub document_title: String,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        Self {
            database: default_database_path(),
            base_url: DEFAULT_BASE_URL.to_string(),
            identity_policy: IdentityPolicy::default(),
            bind: DEFAULT_BIND_ADDRESS.to_string(),
            document_title: DEFAULT_DOCUMENT_TITLE.to_string(),
            log_level: LoggingConfig::default().level,
        }
    }
}

/// Fully resolved directory configuration
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    pub database_path: PathBuf,
    pub base_url: String,
    /// Admin gate credential; `None` disables the export routes
    pub admin_password: Option<String>,
    pub identity_policy: IdentityPolicy,
    pub bind_address: String,
    pub document_title: String,
    pub log_level: String,
}

impl DirectoryConfig {
    /// Merge overrides, file and defaults, then validate the result
    pub fn resolve(overrides: ConfigOverrides, file: Option<TomlConfig>) -> Result<Self> {
        let defaults = CompiledDefaults::for_current_platform();
        let file = file.unwrap_or_default();

        let config = Self {
            database_path: overrides
                .database
                .or(file.database)
                .unwrap_or(defaults.database),
            base_url: overrides
                .base_url
                .or(file.base_url)
                .unwrap_or(defaults.base_url)
                .trim()
                .to_string(),
            admin_password: overrides
                .admin_password
                .or(file.admin_password)
                .filter(|p| !p.is_empty()),
            identity_policy: overrides
                .identity_policy
                .or(file.identity_policy)
                .unwrap_or(defaults.identity_policy),
            bind_address: overrides.bind.or(file.bind).unwrap_or(defaults.bind),
            document_title: overrides
                .document_title
                .or(file.document_title)
                .unwrap_or(defaults.document_title),
            log_level: overrides.log_level.unwrap_or(file.logging.level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.base_url.is_empty() {
            return Err(Error::Config("base_url must not be empty".to_string()));
        }
        if self.base_url.contains('?') || self.base_url.contains('#') {
            return Err(Error::Config(format!(
                "base_url must not carry a query or fragment: {}",
                self.base_url
            )));
        }
        if self.bind_address.trim().is_empty() {
            return Err(Error::Config("bind address must not be empty".to_string()));
        }
        if self.database_path.as_os_str().is_empty() {
            return Err(Error::Config("database path must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Default location of `config.toml` for the platform
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join(APP_DIR).join("config.toml"))
}

/// Get OS-dependent default database path
pub fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("./karwan_data"))
        .join(DATABASE_FILE)
}

/// Load the TOML config file at `path`
///
/// A missing file logs a warning and yields `Ok(None)`; a file that exists
/// but does not parse is a [`Error::Config`].
pub fn load_toml_config(path: &Path) -> Result<Option<TomlConfig>> {
    if !path.exists() {
        warn!(
            "Config file not found at {} - using defaults",
            path.display()
        );
        return Ok(None);
    }

    let content = std::fs::read_to_string(path)?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?;

    info!("Loaded config file: {}", path.display());
    Ok(Some(config))
}
