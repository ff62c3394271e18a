use crate::constants;
use crate::error::{Result, ScraperError};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub scraper: ScraperConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScraperConfig {
    pub listing_url: String,
    pub base_url: String,
    pub source: String,
    pub timeout_seconds: u64,
    pub interval_hours: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            listing_url: constants::EVENTBRITE_LISTING_URL.to_string(),
            base_url: constants::EVENTBRITE_BASE_URL.to_string(),
            source: constants::EVENTBRITE_SOURCE.to_string(),
            timeout_seconds: constants::DEFAULT_TIMEOUT_SECONDS,
            interval_hours: constants::DEFAULT_INTERVAL_HOURS,
        }
    }
}

impl ScraperConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds.max(1))
    }

    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_hours.max(1) * 60 * 60)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: constants::DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub database_path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from(constants::DEFAULT_DATABASE_PATH),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    pub port: Option<u16>,
}

impl Config {
    /// Loads `path` if it exists, then applies environment overrides.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = fs::read_to_string(path).map_err(|e| {
                ScraperError::Config(format!(
                    "Failed to read config file '{}': {}",
                    path.display(),
                    e
                ))
            })?;
            Self::from_toml(&content)?
        } else {
            Config::default()
        };
        config.apply_env()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Ok(path) = std::env::var("SYDNEY_EVENTS_DB") {
            self.storage.database_path = PathBuf::from(path);
        }
        if let Ok(url) = std::env::var("SYDNEY_EVENTS_LISTING_URL") {
            self.scraper.listing_url = url;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| ScraperError::Config(format!("PORT is not a valid port: {port}")))?;
        }
        if let Ok(port) = std::env::var("SYDNEY_EVENTS_METRICS_PORT") {
            let port = port.parse().map_err(|_| {
                ScraperError::Config(format!(
                    "SYDNEY_EVENTS_METRICS_PORT is not a valid port: {port}"
                ))
            })?;
            self.metrics.port = Some(port);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = Config::from_toml("").unwrap();
        assert_eq!(config.scraper.source, "Eventbrite");
        assert_eq!(config.scraper.interval(), Duration::from_secs(6 * 60 * 60));
        assert_eq!(config.server.port, 5000);
        assert!(config.metrics.port.is_none());
    }

    #[test]
    fn partial_sections_keep_remaining_defaults() {
        let config = Config::from_toml(
            r#"
            [scraper]
            timeout_seconds = 5

            [storage]
            database_path = "/tmp/events.db"
            "#,
        )
        .unwrap();
        assert_eq!(config.scraper.timeout(), Duration::from_secs(5));
        assert_eq!(
            config.scraper.listing_url,
            "https://www.eventbrite.com.au/d/australia--sydney/events/"
        );
        assert_eq!(config.storage.database_path, PathBuf::from("/tmp/events.db"));
    }

    #[test]
    fn malformed_toml_is_an_error() {
        let err = Config::from_toml("[scraper\nport = ").unwrap_err();
        assert!(matches!(err, ScraperError::Toml(_)));
    }
}
