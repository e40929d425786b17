//! Configuration loading and root folder resolution

use crate::{Error, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable overriding the root folder
pub const ROOT_FOLDER_ENV: &str = "FOLIO_ROOT_FOLDER";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "folio.db";

/// Bucket directory name inside the root folder
pub const BUCKETS_DIR: &str = "buckets";

/// Default public URL prefix for bucket objects
pub const DEFAULT_PUBLIC_BASE_URL: &str = "http://localhost:8080/storage/v1/object/public";

/// Contents of `config.toml`
///
/// Every field is optional; a missing or unreadable file yields the defaults.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    /// Root folder holding the database and buckets
    pub root_folder: Option<PathBuf>,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// `[storage]` section
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Prefix prepended to `{bucket}/{object}` when building public URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            public_base_url: default_public_base_url(),
        }
    }
}

fn default_public_base_url() -> String {
    DEFAULT_PUBLIC_BASE_URL.to_string()
}

/// `[logging]` section
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

impl TomlConfig {
    /// Parse a config file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse config text.
    pub fn parse(content: &str) -> Result<Self> {
        toml::from_str(content)
            .map_err(|e| Error::Config(format!("Invalid config.toml: {}", e)))
    }

    /// Load the platform config file, falling back to defaults when it is
    /// missing or malformed. A broken config never prevents startup.
    pub fn load_or_default() -> Self {
        let Some(path) = default_config_path() else {
            return Self::default();
        };
        if !path.exists() {
            debug!(path = %path.display(), "No config file, using defaults");
            return Self::default();
        }
        match Self::load(&path) {
            Ok(config) => config,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Ignoring unreadable config file");
                Self::default()
            }
        }
    }
}

/// Root folder resolution priority:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. TOML config file
/// 4. OS-dependent default (fallback)
pub fn resolve_root_folder(cli_arg: Option<&Path>, toml: &TomlConfig) -> PathBuf {
    if let Some(path) = cli_arg {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var(ROOT_FOLDER_ENV) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }

    if let Some(path) = &toml.root_folder {
        return path.clone();
    }

    default_root_folder()
}

/// Platform config file location: `<config dir>/folio/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("folio").join("config.toml"))
}

/// OS-dependent default root folder path
pub fn default_root_folder() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("folio"))
        .unwrap_or_else(|| PathBuf::from("./folio_data"))
}

/// Resolved filesystem layout under the root folder
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolioPaths {
    pub root: PathBuf,
    pub database: PathBuf,
    pub buckets: PathBuf,
}

impl FolioPaths {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        Self {
            database: root.join(DATABASE_FILE),
            buckets: root.join(BUCKETS_DIR),
            root,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_config() {
        let config = TomlConfig::parse(
            r#"
            root_folder = "/srv/folio"

            [storage]
            public_base_url = "https://cdn.example.com/public"

            [logging]
            level = "debug"
            "#,
        )
        .unwrap();

        assert_eq!(config.root_folder, Some(PathBuf::from("/srv/folio")));
        assert_eq!(config.storage.public_base_url, "https://cdn.example.com/public");
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_parse_empty_config_uses_defaults() {
        let config = TomlConfig::parse("").unwrap();
        assert!(config.root_folder.is_none());
        assert_eq!(config.storage.public_base_url, DEFAULT_PUBLIC_BASE_URL);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_parse_invalid_config() {
        let result = TomlConfig::parse("root_folder = [");
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_paths_layout() {
        let paths = FolioPaths::new("/data/folio");
        assert_eq!(paths.database, PathBuf::from("/data/folio/folio.db"));
        assert_eq!(paths.buckets, PathBuf::from("/data/folio/buckets"));
    }
}
