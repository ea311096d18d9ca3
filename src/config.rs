//! Configuration types for the folio service.
//!
//! One TOML file holds every section. Each section deserialises with
//! defaults, so a file only needs the keys an operator wants to change:
//!
//! ```toml
//! [server]
//! port = 9000
//!
//! [metadata.merge]
//! strategy = "first_wins"
//!
//! [providers.google_books]
//! enabled = false
//! ```

use std::path::{Path, PathBuf};

use folio_metadata::MetadataConfig;
use serde::{Deserialize, Serialize};

use crate::error::{FolioError, Result};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Aggregation core settings (scoring, merge, pool, fetch).
    pub metadata: MetadataConfig,
    /// HTTP server settings.
    pub server: ServerConfig,
    /// Concrete provider settings.
    pub providers: ProvidersConfig,
    /// Log filter settings.
    pub logging: LoggingConfig,
}

/// HTTP server settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on. `0` lets the OS pick one.
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_owned(),
            port: 8750,
        }
    }
}

/// Settings for every built-in provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvidersConfig {
    pub open_library: HttpProviderConfig,
    pub google_books: HttpProviderConfig,
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            open_library: HttpProviderConfig::with_base_url("https://openlibrary.org"),
            google_books: HttpProviderConfig::with_base_url("https://www.googleapis.com/books/v1"),
        }
    }
}

/// Settings shared by HTTP-backed providers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpProviderConfig {
    /// Whether the provider takes part in default searches.
    pub enabled: bool,
    /// API root, without a trailing slash.
    pub base_url: String,
    /// Per-request timeout.
    pub timeout_seconds: u64,
    /// `User-Agent` header sent with every request.
    pub user_agent: String,
}

impl HttpProviderConfig {
    /// Default settings pointed at `base_url`.
    pub fn with_base_url(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            ..Self::default()
        }
    }
}

impl Default for HttpProviderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: String::new(),
            timeout_seconds: 10,
            user_agent: format!("folio/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

/// Logging settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `tracing-subscriber` filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: "folio=info,folio_metadata=info".to_owned(),
        }
    }
}

impl FolioConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| FolioError::Config(e.to_string()))
    }

    /// Load `path` if it exists, otherwise fall back to defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::from_file(path)
        } else {
            tracing::debug!(path = %path.display(), "config file not found; using defaults");
            Ok(Self::default())
        }
    }

    /// Save configuration to a TOML file, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written or the config cannot be serialized.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| FolioError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Returns the default config file path: `~/.config/folio/config.toml`.
    pub fn default_config_path() -> PathBuf {
        if let Some(config) = std::env::var_os("XDG_CONFIG_HOME") {
            PathBuf::from(config).join("folio").join("config.toml")
        } else if let Some(home) = std::env::var_os("HOME") {
            PathBuf::from(home)
                .join(".config")
                .join("folio")
                .join("config.toml")
        } else {
            PathBuf::from("/tmp/folio-config/config.toml")
        }
    }

    /// Validates every section.
    ///
    /// # Errors
    ///
    /// Returns [`FolioError::Config`] describing the first invalid field.
    pub fn validate(&self) -> Result<()> {
        self.metadata
            .validate()
            .map_err(|e| FolioError::Config(e.to_string()))?;
        if self.server.host.trim().is_empty() {
            return Err(FolioError::Config("server.host must not be empty".into()));
        }
        for (name, provider) in [
            ("open_library", &self.providers.open_library),
            ("google_books", &self.providers.google_books),
        ] {
            if provider.timeout_seconds == 0 {
                return Err(FolioError::Config(format!(
                    "providers.{name}.timeout_seconds must be greater than 0"
                )));
            }
            if provider.enabled && provider.base_url.trim().is_empty() {
                return Err(FolioError::Config(format!(
                    "providers.{name}.base_url must not be empty"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

    use super::*;
    use folio_metadata::MergeStrategy;

    #[test]
    fn default_config_is_valid() {
        let config = FolioConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.server.port, 8750);
        assert_eq!(config.server.host, "127.0.0.1");
        assert!(config.providers.open_library.enabled);
        assert_eq!(config.logging.filter, "folio=info,folio_metadata=info");
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let config: FolioConfig = toml::from_str(
            r#"
            [server]
            port = 9000

            [metadata.merge]
            strategy = "first_wins"

            [providers.google_books]
            enabled = false
            "#,
        )
        .unwrap();
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "127.0.0.1");
        assert_eq!(config.metadata.merge.strategy, MergeStrategy::FirstWins);
        assert!((config.metadata.merge.score_threshold_ratio - 0.8).abs() < f64::EPSILON);
        assert!(!config.providers.google_books.enabled);
        assert_eq!(config.providers.google_books.timeout_seconds, 10);
        assert!(config.providers.open_library.enabled);
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = FolioConfig::default();
        config.server.port = 0;
        config.metadata.fetch.timeout_seconds = Some(15);
        config.metadata.scoring = config.metadata.scoring.with_provider_weight("openlibrary", 0.9);
        config.save_to_file(&path).unwrap();

        let loaded = FolioConfig::from_file(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn from_file_nonexistent_returns_error() {
        let result = FolioConfig::from_file(Path::new("/nonexistent/path/config.toml"));
        assert!(matches!(result, Err(FolioError::Io(_))));
    }

    #[test]
    fn from_file_invalid_toml_returns_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.toml");
        std::fs::write(&path, "this is not valid toml {{{").unwrap();
        let result = FolioConfig::from_file(&path);
        assert!(matches!(result, Err(FolioError::Config(_))));
    }

    #[test]
    fn load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = FolioConfig::load_or_default(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config, FolioConfig::default());
    }

    #[test]
    fn default_config_path_ends_with_config_toml() {
        let path = FolioConfig::default_config_path();
        let path_str = path.to_string_lossy();
        assert!(path_str.ends_with("config.toml"));
        assert!(path_str.contains("folio"));
    }

    #[test]
    fn invalid_metadata_section_rejected() {
        let mut config = FolioConfig::default();
        config.metadata.orchestrator.max_workers = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_workers"));
    }

    #[test]
    fn zero_provider_timeout_rejected() {
        let mut config = FolioConfig::default();
        config.providers.open_library.timeout_seconds = 0;
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("open_library"));
    }

    #[test]
    fn disabled_provider_may_omit_base_url() {
        let mut config = FolioConfig::default();
        config.providers.google_books.enabled = false;
        config.providers.google_books.base_url.clear();
        assert!(config.validate().is_ok());
    }
}
