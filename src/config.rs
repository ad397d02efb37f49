//! TOML-backed runtime configuration.
//!
//! Config is read from `$XDG_CONFIG_HOME/bookmeta/config.toml` (falling back
//! to `$HOME/.config/bookmeta/config.toml`) or from an explicit path. Every
//! section has defaults, so an absent file yields a usable configuration with
//! only the free providers enabled. Secrets can be supplied through
//! `BOOKMETA_*` environment variables instead of the file.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::links::{AffiliateTags, Region};

/// Errors raised while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file exists but could not be read.
    #[error("cannot read config file {path}: {source}\n  Suggestion: Check file permissions")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for this schema.
    #[error(
        "invalid config file {path}: {message}\n  Suggestion: Compare the file against `bookmeta config show`"
    )]
    Parse { path: PathBuf, message: String },

    /// A value is outside its accepted range.
    #[error(
        "invalid config value for `{field}`: {value}. Expected range: {expected}\n  Suggestion: Fix the value in your config file"
    )]
    OutOfRange {
        field: &'static str,
        value: String,
        expected: &'static str,
    },
}

/// Application configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub cache: CacheConfig,
    pub google_books: GoogleBooksConfig,
    pub open_library: OpenLibraryConfig,
    pub amazon: AmazonConfig,
}

/// Catalog database settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Database file; defaults to `bookmeta.db` next to the config file.
    pub path: Option<PathBuf>,
    pub max_connections: u32,
    pub busy_timeout_ms: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: None,
            max_connections: crate::db::DEFAULT_MAX_CONNECTIONS,
            busy_timeout_ms: crate::db::DEFAULT_BUSY_TIMEOUT_MS,
        }
    }
}

/// Search result cache settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub search_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            search_ttl_secs: 3600,
        }
    }
}

/// Google Books provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleBooksConfig {
    pub enabled: bool,
    /// Optional API key; the volumes API also answers unauthenticated requests.
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
}

impl Default for GoogleBooksConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_key: None,
            base_url: "https://www.googleapis.com/books/v1".to_string(),
            timeout_secs: 10,
        }
    }
}

/// Open Library provider settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OpenLibraryConfig {
    pub enabled: bool,
    pub base_url: String,
    pub covers_base_url: String,
    pub timeout_secs: u64,
}

impl Default for OpenLibraryConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: "https://openlibrary.org".to_string(),
            covers_base_url: "https://covers.openlibrary.org".to_string(),
            timeout_secs: 15,
        }
    }
}

/// Amazon settings shared by the Amazon providers and link generation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmazonConfig {
    pub default_region: Region,
    pub affiliate_tags: AffiliateTags,
    pub creators: AmazonCreatorsConfig,
    pub legacy: AmazonLegacyConfig,
}

/// Amazon Creators API settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmazonCreatorsConfig {
    pub enabled: bool,
    pub credential_id: Option<String>,
    pub credential_secret: Option<String>,
    /// Credential version sent with the token request.
    pub version: String,
    pub token_url: String,
    /// Overrides the per-region API endpoint (used for testing).
    pub base_url: Option<String>,
    pub timeout_secs: u64,
    pub inter_page_delay_ms: u64,
    pub rate_limit_window_secs: u64,
}

impl Default for AmazonCreatorsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            credential_id: None,
            credential_secret: None,
            version: "2.1".to_string(),
            token_url: "https://creatorsapi.auth.us-east-1.amazoncognito.com/oauth2/token"
                .to_string(),
            base_url: None,
            timeout_secs: 10,
            inter_page_delay_ms: 1000,
            rate_limit_window_secs: 300,
        }
    }
}

impl AmazonCreatorsConfig {
    /// True when both halves of the credential pair are present.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.trim().is_empty());
        present(&self.credential_id) && present(&self.credential_secret)
    }
}

/// Product Advertising API 5 placeholder settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AmazonLegacyConfig {
    /// Accepted for compatibility; the legacy provider always reports disabled.
    pub enabled: bool,
}

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Resolved config path, if a base directory is known.
    pub path: Option<PathBuf>,
    pub config: AppConfig,
    /// Whether the config was read from disk.
    pub loaded_from_file: bool,
}

impl AppConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed documents.
    pub fn from_toml_str(raw: &str, origin: &Path) -> Result<Self, ConfigError> {
        toml::from_str(raw).map_err(|error| ConfigError::Parse {
            path: origin.to_path_buf(),
            message: error.to_string(),
        })
    }

    /// Loads config from `explicit` or the default location, then applies
    /// environment overrides and validates.
    ///
    /// A missing file at the default location yields defaults; a missing
    /// explicit file is an error.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed or validated.
    pub fn load(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
        let path = explicit
            .map(Path::to_path_buf)
            .or_else(resolve_default_config_path);

        let (mut config, loaded_from_file) = match path.as_deref() {
            Some(path) if explicit.is_some() || path.exists() => {
                let raw = fs::read_to_string(path).map_err(|source| ConfigError::Read {
                    path: path.to_path_buf(),
                    source,
                })?;
                (Self::from_toml_str(&raw, path)?, true)
            }
            _ => (Self::default(), false),
        };
        debug!(path = ?path, loaded_from_file, "configuration resolved");

        config.apply_env_overrides(|name| env::var(name).ok());
        config.validate()?;
        Ok(LoadedConfig {
            path,
            config,
            loaded_from_file,
        })
    }

    /// Applies `BOOKMETA_*` overrides using `lookup` to read variables.
    pub fn apply_env_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let lookup = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(key) = lookup("BOOKMETA_GOOGLE_BOOKS_KEY") {
            self.google_books.api_key = Some(key);
        }
        if let Some(id) = lookup("BOOKMETA_AMAZON_CREDENTIAL_ID") {
            self.amazon.creators.credential_id = Some(id);
        }
        if let Some(secret) = lookup("BOOKMETA_AMAZON_CREDENTIAL_SECRET") {
            self.amazon.creators.credential_secret = Some(secret);
        }
        for region in Region::ALL {
            if let Some(tag) = lookup(&format!("BOOKMETA_AFFILIATE_TAG_{}", region.code())) {
                self.amazon.affiliate_tags.set(region, tag);
            }
        }
    }

    /// Validates numeric ranges.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::OutOfRange`] for the first offending value.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(1..=20).contains(&self.database.max_connections) {
            return Err(out_of_range(
                "database.max_connections",
                self.database.max_connections,
                "1..=20",
            ));
        }
        if self.database.busy_timeout_ms > 120_000 {
            return Err(out_of_range(
                "database.busy_timeout_ms",
                self.database.busy_timeout_ms,
                "0..=120000",
            ));
        }
        if self.cache.search_ttl_secs == 0 {
            return Err(out_of_range("cache.search_ttl_secs", 0, "1.."));
        }
        validate_timeout("google_books.timeout_secs", self.google_books.timeout_secs)?;
        validate_timeout("open_library.timeout_secs", self.open_library.timeout_secs)?;
        validate_timeout(
            "amazon.creators.timeout_secs",
            self.amazon.creators.timeout_secs,
        )?;
        if self.amazon.creators.inter_page_delay_ms > 10_000 {
            return Err(out_of_range(
                "amazon.creators.inter_page_delay_ms",
                self.amazon.creators.inter_page_delay_ms,
                "0..=10000",
            ));
        }
        Ok(())
    }

    /// Database path: configured value, else `bookmeta.db` beside the config file.
    #[must_use]
    pub fn database_path(&self, config_path: Option<&Path>) -> PathBuf {
        if let Some(path) = &self.database.path {
            return path.clone();
        }
        config_path
            .and_then(Path::parent)
            .map_or_else(|| PathBuf::from("bookmeta.db"), |dir| dir.join("bookmeta.db"))
    }

    /// Renders the config as TOML with secrets masked.
    #[must_use]
    pub fn to_redacted_toml(&self) -> String {
        let mut redacted = self.clone();
        let mask = |value: &mut Option<String>| {
            if value.is_some() {
                *value = Some("********".to_string());
            }
        };
        mask(&mut redacted.google_books.api_key);
        mask(&mut redacted.amazon.creators.credential_id);
        mask(&mut redacted.amazon.creators.credential_secret);
        toml::to_string_pretty(&redacted).unwrap_or_default()
    }
}

fn validate_timeout(field: &'static str, value: u64) -> Result<(), ConfigError> {
    if (1..=60).contains(&value) {
        Ok(())
    } else {
        Err(out_of_range(field, value, "1..=60"))
    }
}

fn out_of_range(field: &'static str, value: impl ToString, expected: &'static str) -> ConfigError {
    ConfigError::OutOfRange {
        field,
        value: value.to_string(),
        expected,
    }
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/bookmeta/config.toml`
/// 2. `$HOME/.config/bookmeta/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("bookmeta")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("bookmeta")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}
