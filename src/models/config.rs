//! Application configuration structures.

use std::fs;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::utils::http::{dictionary_base_url, user_base_url};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// HTTP and crawling behavior settings
    #[serde(default)]
    pub crawler: CrawlerConfig,

    /// Remote endpoint templates
    #[serde(default)]
    pub endpoints: EndpointConfig,

    /// Languages that may appear in a track header
    #[serde(default = "defaults::languages")]
    pub languages: Vec<LanguageInfo>,

    /// Logging settings
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Ok(toml::from_str(&content)?)
    }

    /// Load configuration or return default if loading fails.
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        Self::load(&path).unwrap_or_else(|e| {
            log::warn!(
                "Config load failed from {:?}: {}. Using defaults.",
                path.as_ref(),
                e
            );
            Self::default()
        })
    }

    /// Display name of a configured language.
    pub fn language_name(&self, id: &str) -> Option<&str> {
        self.languages
            .iter()
            .find(|l| l.id == id)
            .map(|l| l.name.as_str())
    }

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        let crawler = &self.crawler;
        if crawler.user_agent.trim().is_empty() {
            return Err(AppError::validation("crawler.user_agent is empty"));
        }
        if crawler.timeout_secs == 0 {
            return Err(AppError::validation("crawler.timeout_secs must be > 0"));
        }
        if crawler.max_concurrent == 0 {
            return Err(AppError::validation("crawler.max_concurrent must be > 0"));
        }
        if crawler.initial_backoff_ms == 0 {
            return Err(AppError::validation(
                "crawler.initial_backoff_ms must be > 0",
            ));
        }
        if crawler.max_backoff_ms < crawler.initial_backoff_ms {
            return Err(AppError::validation(
                "crawler.max_backoff_ms must be >= crawler.initial_backoff_ms",
            ));
        }
        if crawler.failure_budget == 0 {
            return Err(AppError::validation("crawler.failure_budget must be > 0"));
        }
        if !self.endpoints.dictionary_url.contains("{lang}") {
            return Err(AppError::validation(
                "endpoints.dictionary_url must contain {lang}",
            ));
        }
        user_base_url(&self.endpoints.user_url)?;
        if self.languages.is_empty() {
            return Err(AppError::validation("No languages defined"));
        }
        for language in &self.languages {
            if language.id.len() != 2 || !language.id.chars().all(|c| c.is_ascii_lowercase()) {
                return Err(AppError::validation(format!(
                    "Language ID '{}' must be two lowercase ASCII letters",
                    language.id
                )));
            }
            dictionary_base_url(&self.endpoints.dictionary_url, &language.id)?;
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            crawler: CrawlerConfig::default(),
            endpoints: EndpointConfig::default(),
            languages: defaults::languages(),
            logging: LoggingConfig::default(),
        }
    }
}

/// HTTP client and crawling behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Maximum concurrent dictionary lookups per batch
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// First backoff delay after a rate-limit response
    #[serde(default = "defaults::initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Upper bound for the doubling backoff delay
    #[serde(default = "defaults::max_backoff")]
    pub max_backoff_ms: u64,

    /// Batches started closer together than this are paced
    #[serde(default = "defaults::pacing_interval")]
    pub pacing_interval_ms: u64,

    /// Failed lookups tolerated before the crawl is aborted
    #[serde(default = "defaults::failure_budget")]
    pub failure_budget: usize,

    /// How many related-word hops to follow from a lesson's own words
    #[serde(default)]
    pub max_expansion_depth: Option<u32>,
}

impl CrawlerConfig {
    pub fn initial_backoff(&self) -> Duration {
        Duration::from_millis(self.initial_backoff_ms)
    }

    pub fn max_backoff(&self) -> Duration {
        Duration::from_millis(self.max_backoff_ms)
    }

    pub fn pacing_interval(&self) -> Duration {
        Duration::from_millis(self.pacing_interval_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            max_concurrent: defaults::max_concurrent(),
            initial_backoff_ms: defaults::initial_backoff(),
            max_backoff_ms: defaults::max_backoff(),
            pacing_interval_ms: defaults::pacing_interval(),
            failure_budget: defaults::failure_budget(),
            max_expansion_depth: None,
        }
    }
}

/// Remote endpoint templates.
///
/// `{lang}` and `{username}` are substituted at request time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "defaults::dictionary_url")]
    pub dictionary_url: String,

    #[serde(default = "defaults::user_url")]
    pub user_url: String,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            dictionary_url: defaults::dictionary_url(),
            user_url: defaults::user_url(),
        }
    }
}

/// A language that can be scraped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LanguageInfo {
    /// Two-letter track ID (e.g. "fr")
    pub id: String,

    /// Display name written into track headers
    pub name: String,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "defaults::log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::log_level(),
        }
    }
}

mod defaults {
    use super::LanguageInfo;

    // Crawler defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; offlineowl/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn max_concurrent() -> usize {
        10
    }
    pub fn initial_backoff() -> u64 {
        400
    }
    pub fn max_backoff() -> u64 {
        60_000
    }
    pub fn pacing_interval() -> u64 {
        1_000
    }
    pub fn failure_budget() -> usize {
        20
    }

    // Endpoint defaults
    pub fn dictionary_url() -> String {
        "https://{lang}.duolingo.com/api/1/dictionary_page".into()
    }
    pub fn user_url() -> String {
        "https://www.duolingo.com/users/{username}".into()
    }

    // Language defaults
    pub fn languages() -> Vec<LanguageInfo> {
        [
            ("en", "English"),
            ("fr", "Français"),
            ("ja", "日本語"),
            ("ko", "한국어"),
        ]
        .into_iter()
        .map(|(id, name)| LanguageInfo {
            id: id.to_string(),
            name: name.to_string(),
        })
        .collect()
    }

    pub fn log_level() -> String {
        "info".into()
    }
}
