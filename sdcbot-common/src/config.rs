//! Configuration loading
//!
//! Settings come from a TOML file with environment-variable overrides on
//! top, in priority order:
//! 1. Environment variables (highest)
//! 2. File named on the command line
//! 3. `sdcbot/sdcbot.toml` under the OS config directory
//! 4. Compiled defaults
//!
//! Credentials are expected through the environment on shared hosts and
//! through the file in local development.

use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::commons::COMMONS_API_URL;
use crate::error::{Error, Result};

/// Default SPARQL endpoint for external-id lookups.
pub const WIKIDATA_SPARQL_URL: &str = "https://query.wikidata.org/sparql";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BotConfig {
    #[serde(default)]
    pub commons: CommonsConfig,
    #[serde(default)]
    pub wikidata: WikidataConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub run: RunConfig,
    #[serde(default)]
    pub flickr: PlatformKey,
    #[serde(default)]
    pub youtube: PlatformKey,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CommonsConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default)]
    pub username: String,
    /// Bot password, from Special:BotPasswords.
    #[serde(default)]
    pub password: String,
    /// Contact address carried in the user agent.
    #[serde(default)]
    pub email: String,
}

impl Default for CommonsConfig {
    fn default() -> Self {
        CommonsConfig {
            api_url: default_api_url(),
            username: String::new(),
            password: String::new(),
            email: String::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct WikidataConfig {
    #[serde(default = "default_sparql_url")]
    pub sparql_url: String,
}

impl Default for WikidataConfig {
    fn default() -> Self {
        WikidataConfig {
            sparql_url: default_sparql_url(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_path")]
    pub path: PathBuf,
}

impl Default for CacheConfig {
    fn default() -> Self {
        CacheConfig {
            path: default_cache_path(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunConfig {
    /// Minimum seconds between record treatments.
    #[serde(default = "default_delay_seconds")]
    pub delay_seconds: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        RunConfig {
            delay_seconds: default_delay_seconds(),
        }
    }
}

/// API key for one platform.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlatformKey {
    #[serde(default)]
    pub api_key: String,
}

impl PlatformKey {
    pub fn require(&self, platform: &str) -> Result<&str> {
        if self.api_key.is_empty() {
            return Err(Error::Config(format!("{} API key is not set", platform)));
        }
        Ok(&self.api_key)
    }
}

fn default_api_url() -> String {
    COMMONS_API_URL.to_string()
}

fn default_sparql_url() -> String {
    WIKIDATA_SPARQL_URL.to_string()
}

fn default_cache_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("sdcbot").join("skip.db"))
        .unwrap_or_else(|| PathBuf::from("./sdcbot-skip.db"))
}

fn default_delay_seconds() -> u64 {
    10
}

impl BotConfig {
    /// Load configuration, `path` being an explicit file from the command
    /// line. A named file must exist; the default location may be absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => match Self::default_file() {
                Some(path) if path.exists() => Self::from_file(&path)?,
                _ => BotConfig::default(),
            },
        };

        config.apply_env();
        Ok(config)
    }

    fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {}", path.display(), e)))?;

        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("cannot parse {}: {}", path.display(), e)))
    }

    fn default_file() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join("sdcbot").join("sdcbot.toml"))
    }

    fn apply_env(&mut self) {
        if let Ok(value) = std::env::var("SDCBOT_USERNAME") {
            self.commons.username = value;
        }
        if let Ok(value) = std::env::var("SDCBOT_PASSWORD") {
            self.commons.password = value;
        }
        if let Ok(value) = std::env::var("SDCBOT_EMAIL") {
            self.commons.email = value;
        }
        if let Ok(value) = std::env::var("SDCBOT_CACHE_PATH") {
            self.cache.path = PathBuf::from(value);
        }
        if let Ok(value) = std::env::var("FLICKR_API_KEY") {
            self.flickr.api_key = value;
        }
        if let Ok(value) = std::env::var("YOUTUBE_API_KEY") {
            self.youtube.api_key = value;
        }
    }

    /// User agent identifying the operator, per the API etiquette rules.
    pub fn user_agent(&self) -> String {
        format!(
            "{} / Wikimedia Commons / {}",
            self.commons.username, self.commons.email
        )
    }

    /// Fail early when the account credentials are missing.
    pub fn require_credentials(&self) -> Result<()> {
        if self.commons.username.is_empty() {
            return Err(Error::Config(
                "username is not set (commons.username or SDCBOT_USERNAME)".to_string(),
            ));
        }
        if self.commons.password.is_empty() {
            return Err(Error::Config(
                "password is not set (commons.password or SDCBOT_PASSWORD)".to_string(),
            ));
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const ENV_KEYS: &[&str] = &[
        "SDCBOT_USERNAME",
        "SDCBOT_PASSWORD",
        "SDCBOT_EMAIL",
        "SDCBOT_CACHE_PATH",
        "FLICKR_API_KEY",
        "YOUTUBE_API_KEY",
    ];

    fn clear_env() {
        for key in ENV_KEYS {
            std::env::remove_var(key);
        }
    }

    #[test]
    #[serial_test::serial]
    fn test_defaults() {
        clear_env();
        let config = BotConfig::default();

        assert_eq!(config.commons.api_url, COMMONS_API_URL);
        assert_eq!(config.wikidata.sparql_url, WIKIDATA_SPARQL_URL);
        assert_eq!(config.run.delay_seconds, 10);
        assert!(config.commons.username.is_empty());
        assert!(config.require_credentials().is_err());
    }

    #[test]
    #[serial_test::serial]
    fn test_load_from_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdcbot.toml");
        std::fs::write(
            &path,
            r#"
            [commons]
            username = "ExampleBot"
            password = "hunter2"
            email = "bot@example.org"

            [run]
            delay_seconds = 3

            [flickr]
            api_key = "ff00"
            "#,
        )
        .unwrap();

        let config = BotConfig::load(Some(&path)).unwrap();
        assert_eq!(config.commons.username, "ExampleBot");
        assert_eq!(config.run.delay_seconds, 3);
        assert_eq!(config.flickr.require("Flickr").unwrap(), "ff00");
        assert!(config.youtube.require("YouTube").is_err());
        assert!(config.require_credentials().is_ok());
        assert_eq!(
            config.user_agent(),
            "ExampleBot / Wikimedia Commons / bot@example.org"
        );
    }

    #[test]
    #[serial_test::serial]
    fn test_env_overrides_file() {
        clear_env();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sdcbot.toml");
        std::fs::write(
            &path,
            r#"
            [commons]
            username = "FileBot"
            password = "from-file"
            "#,
        )
        .unwrap();

        std::env::set_var("SDCBOT_PASSWORD", "from-env");
        std::env::set_var("FLICKR_API_KEY", "abcd");

        let config = BotConfig::load(Some(&path)).unwrap();
        assert_eq!(config.commons.username, "FileBot");
        assert_eq!(config.commons.password, "from-env");
        assert_eq!(config.flickr.api_key, "abcd");

        clear_env();
    }

    #[test]
    #[serial_test::serial]
    fn test_missing_named_file_is_an_error() {
        clear_env();
        let result = BotConfig::load(Some(Path::new("/nonexistent/sdcbot.toml")));
        assert!(result.is_err());
    }
}
