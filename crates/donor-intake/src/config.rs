//! Configuration management for donor-intake.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::path::PathBuf;
use std::time::Duration;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Error, Result};

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default configuration directory name.
const CONFIG_DIR_NAME: &str = "donor-intake";

/// Prefix of environment variables that override configuration.
const ENV_PREFIX: &str = "DONOR_INTAKE_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `DONOR_INTAKE_`, sections split on `__`)
/// 2. TOML config file at `~/.config/donor-intake/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Backend configuration.
    pub api: ApiConfig,
    /// Public site configuration.
    pub site: SiteConfig,
    /// Scanner configuration.
    pub scanner: ScannerConfig,
    /// Kiosk front-end configuration.
    pub kiosk: KioskConfig,
}

/// Backend-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    /// Base URL of the donor service; `/api/donor` is appended.
    pub base_url: String,
    /// Bearer token sent with every request.
    pub token: Option<String>,
    /// Per-request timeout in seconds.
    pub timeout_secs: u64,
}

/// Public site configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    /// Base URL used when generating QR payloads for donors.
    pub base_url: Option<String>,
}

/// Scanner-related configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Ignore a repeat of the same code within this many milliseconds.
    pub debounce_ms: u64,
    /// Longest decoded payload accepted, in bytes.
    pub max_payload_len: usize,
}

/// Kiosk front-end configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KioskConfig {
    /// Pre-filled donation location (the site the kiosk stands at).
    pub default_location: Option<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080".to_string(),
            token: None,
            timeout_secs: 15,
        }
    }
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            debounce_ms: 1_500,
            max_payload_len: 2_048,
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Configuration is loaded in this order (later sources override earlier):
    /// 1. Default values
    /// 2. TOML config file (if exists)
    /// 3. Environment variables (prefixed with `DONOR_INTAKE_`)
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(CONFIG_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        self.api_base_url()?;
        if let Some(site) = &self.site.base_url {
            parse_http_url(site)?;
        }

        if self.api.timeout_secs == 0 {
            return Err(Error::ConfigValidation {
                message: "api.timeout_secs must be greater than 0".to_string(),
            });
        }

        if self.scanner.max_payload_len == 0 {
            return Err(Error::ConfigValidation {
                message: "scanner.max_payload_len must be greater than 0".to_string(),
            });
        }

        Ok(())
    }

    /// The parsed backend base URL.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or not http(s).
    pub fn api_base_url(&self) -> Result<Url> {
        parse_http_url(&self.api.base_url)
    }

    /// The parsed site base URL, if configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is malformed or not http(s).
    pub fn site_base_url(&self) -> Result<Option<Url>> {
        self.site.base_url.as_deref().map(parse_http_url).transpose()
    }

    /// Get the request timeout as a Duration.
    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_secs)
    }

    /// Get the scan debounce window as a Duration.
    #[must_use]
    pub fn scan_debounce(&self) -> Duration {
        Duration::from_millis(self.scanner.debounce_ms)
    }
}

fn parse_http_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|source| Error::InvalidUrl {
        url: raw.to_string(),
        source,
    })?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::ConfigValidation {
            message: format!("'{raw}' must be an http or https URL"),
        });
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.api.base_url, "http://localhost:8080");
        assert!(config.api.token.is_none());
        assert_eq!(config.api.timeout_secs, 15);
        assert!(config.site.base_url.is_none());
        assert!(config.kiosk.default_location.is_none());
    }

    #[test]
    fn test_default_scanner_config() {
        let scanner = ScannerConfig::default();

        assert_eq!(scanner.debounce_ms, 1_500);
        assert_eq!(scanner.max_payload_len, 2_048);
    }

    #[test]
    fn test_validate_valid_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_zero_timeout() {
        let mut config = Config::default();
        config.api.timeout_secs = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("timeout_secs"));
    }

    #[test]
    fn test_validate_zero_payload_len() {
        let mut config = Config::default();
        config.scanner.max_payload_len = 0;

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("max_payload_len"));
    }

    #[test]
    fn test_validate_malformed_base_url() {
        let mut config = Config::default();
        config.api.base_url = "not a url".to_string();

        let result = config.validate();
        assert!(matches!(result, Err(Error::InvalidUrl { .. })));
    }

    #[test]
    fn test_validate_non_http_base_url() {
        let mut config = Config::default();
        config.api.base_url = "ftp://donors.example.org".to_string();

        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("http"));
    }

    #[test]
    fn test_validate_site_url() {
        let mut config = Config::default();
        config.site.base_url = Some("https://donate.example.org".to_string());
        assert!(config.validate().is_ok());
        assert_eq!(
            config.site_base_url().unwrap().unwrap().host_str(),
            Some("donate.example.org")
        );

        config.site.base_url = Some("mailto:x@example.org".to_string());
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_durations() {
        let config = Config::default();
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.scan_debounce(), Duration::from_millis(1_500));
    }

    #[test]
    fn test_default_config_path() {
        let path = Config::default_config_path();
        assert!(path.to_string_lossy().contains("donor-intake"));
        assert!(path.to_string_lossy().contains("config.toml"));
    }

    #[test]
    fn test_load_nonexistent_config() {
        // Loading from a nonexistent path should work (uses defaults)
        let result = Config::load_from(Some(PathBuf::from("/nonexistent/config.toml")));
        assert!(result.is_ok());
    }

    #[test]
    fn test_load_from_toml_file() {
        let path = std::env::temp_dir().join(format!(
            "donor_intake_config_test_{}.toml",
            std::process::id()
        ));
        std::fs::write(
            &path,
            "[api]\nbase_url = \"https://donors.example.org\"\ntimeout_secs = 5\n\n[kiosk]\ndefault_location = \"Hue Central Hospital\"\n",
        )
        .unwrap();

        let config = Config::load_from(Some(path.clone())).unwrap();
        assert_eq!(config.api.base_url, "https://donors.example.org");
        assert_eq!(config.api.timeout_secs, 5);
        assert_eq!(
            config.kiosk.default_location.as_deref(),
            Some("Hue Central Hospital")
        );

        let _ = std::fs::remove_file(&path);
    }

    #[test]
    fn test_api_config_serialize() {
        let api = ApiConfig::default();
        let json = serde_json::to_string(&api).unwrap();
        assert!(json.contains("base_url"));
        assert!(json.contains("timeout_secs"));
    }

    #[test]
    fn test_scanner_config_deserialize() {
        let json = r#"{"debounce_ms": 250}"#;
        let scanner: ScannerConfig = serde_json::from_str(json).unwrap();
        assert_eq!(scanner.debounce_ms, 250);
        assert_eq!(scanner.max_payload_len, 2_048);
    }
}
