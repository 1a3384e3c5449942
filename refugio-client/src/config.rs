//! Configuration loading for the Refugio client.
//!
//! All sections are required unless explicitly marked optional. No defaults.

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    pub api_base_url: String,
    pub request_timeout_ms: u64,
    #[serde(default)]
    pub auth: AuthConfig,
    pub cache: CacheSettings,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthConfig {
    /// Static token for scripts; interactive apps plug in their own
    /// identity provider instead.
    pub bearer_token: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheSettings {
    pub stale_time_ms: u64,
    pub gc_time_ms: u64,
    pub gc_interval_ms: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LoggingConfig {
    pub filter: String,
    #[serde(default)]
    pub json: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing configuration file path (use --config or REFUGIO_CONFIG)")]
    MissingConfigPath,
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

impl ClientConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let path = config_path_from_args().or_else(config_path_from_env);
        let path = path.ok_or(ConfigError::MissingConfigPath)?;
        let config = Self::from_path(&path)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        let config: ClientConfig = toml::from_str(contents)?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must not be empty".to_string(),
            });
        }
        if !(base.starts_with("https://") || base.starts_with("http://")) {
            return Err(ConfigError::InvalidValue {
                field: "api_base_url",
                reason: "must be an http(s) URL".to_string(),
            });
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "request_timeout_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if let Some(token) = &self.auth.bearer_token {
            if token.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: "auth.bearer_token",
                    reason: "must not be empty when present".to_string(),
                });
            }
        }
        if self.cache.gc_interval_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "cache.gc_interval_ms",
                reason: "must be > 0".to_string(),
            });
        }
        if self.cache.gc_time_ms < self.cache.stale_time_ms {
            return Err(ConfigError::InvalidValue {
                field: "cache.gc_time_ms",
                reason: "must be >= stale_time_ms".to_string(),
            });
        }
        if self.logging.filter.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "logging.filter",
                reason: "must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl CacheSettings {
    pub fn stale_time(&self) -> Duration {
        Duration::from_millis(self.stale_time_ms)
    }

    pub fn gc_time(&self) -> Duration {
        Duration::from_millis(self.gc_time_ms)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_millis(self.gc_interval_ms)
    }
}

fn config_path_from_env() -> Option<PathBuf> {
    std::env::var("REFUGIO_CONFIG").ok().map(PathBuf::from)
}

fn config_path_from_args() -> Option<PathBuf> {
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        if arg == "--config" {
            return args.next().map(PathBuf::from);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
api_base_url = "https://api.refugio.test/api"
request_timeout_ms = 15000

[auth]
bearer_token = "static-token"

[cache]
stale_time_ms = 30000
gc_time_ms = 300000
gc_interval_ms = 60000

[logging]
filter = "refugio=debug"
"#;

    #[test]
    fn test_parse_sample() {
        let config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.validate().unwrap();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.cache.stale_time(), Duration::from_secs(30));
        assert!(!config.logging.json);
    }

    #[test]
    fn test_unknown_fields_rejected() {
        let contents = SAMPLE.replace("[auth]", "retries = 3\n\n[auth]");
        assert!(matches!(
            ClientConfig::from_toml(&contents),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_gc_time_must_cover_stale_time() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.cache.gc_time_ms = 1_000;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidValue { field: "cache.gc_time_ms", .. })
        ));
    }

    #[test]
    fn test_base_url_must_be_http() {
        let mut config = ClientConfig::from_toml(SAMPLE).unwrap();
        config.api_base_url = "ftp://refugio".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_path_reads_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("refugio.toml");
        std::fs::write(&path, SAMPLE).unwrap();

        let config = ClientConfig::from_path(&path).unwrap();
        assert_eq!(config.api_base_url, "https://api.refugio.test/api");
        assert_eq!(config.auth.bearer_token.as_deref(), Some("static-token"));
    }

    #[test]
    fn test_from_path_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        assert!(matches!(
            ClientConfig::from_path(&missing),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_missing_section_is_parse_error() {
        let contents = SAMPLE.replace("[logging]\nfilter = \"refugio=debug\"\n", "");
        assert!(ClientConfig::from_toml(&contents).is_err());
    }
}
