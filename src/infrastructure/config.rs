//! Configuration infrastructure
//!
//! Layered settings for one crawl pass:
//! 1. Built-in defaults (`defaults` and `monster` modules)
//! 2. Optional config file (JSON or TOML, picked by extension)
//! 3. `HARVESTER__SECTION__FIELD` environment overrides

#![allow(clippy::derivable_impls)]

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;
use url::Url;

use crate::domain::SearchQuery;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    Load {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },

    #[error("Failed to write config file {path:?}: {reason}")]
    Write { path: PathBuf, reason: String },
}

impl ConfigError {
    fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }
}

/// Complete harvester configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HarvesterConfig {
    pub search: SearchSettings,
    pub crawling: CrawlingSettings,
    pub selectors: SelectorSettings,
    pub database: DatabaseSettings,
    pub browser: BrowserSettings,
    pub logging: LoggingConfig,
}

/// What to search for and where
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchSettings {
    /// Search page the query parameters are appended to
    pub base_url: String,

    /// Job title query (`q`)
    pub title_query: String,

    /// Location filter (`where`)
    pub location: String,

    /// Recency window in days (`tm`)
    pub recency_window: u32,
}

/// How listing descriptions are obtained
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetailStrategy {
    /// Click the listing and read the detail panel on the same page
    Inline,
    /// Collect listing fields first, then open each detail URL
    Navigate,
}

/// Retry budgets and timing for the crawl state machines
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CrawlingSettings {
    /// Consecutive "load more" failures before pagination is exhausted
    pub max_load_more_failures: u32,

    /// Pause after each successful "load more" in milliseconds
    pub settle_delay_ms: u64,

    /// Attempts per listing element before extraction gives up
    pub extraction_max_tries: u32,

    /// Pause between extraction attempts in milliseconds
    pub extraction_backoff_ms: u64,

    /// Upper bound for every element wait in seconds
    pub wait_timeout_secs: u64,

    /// Inline (default) or navigate-per-listing detail fetch
    pub detail_strategy: DetailStrategy,
}

impl CrawlingSettings {
    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn extraction_backoff(&self) -> Duration {
        Duration::from_millis(self.extraction_backoff_ms)
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_secs(self.wait_timeout_secs)
    }
}

/// CSS selectors for the listing page
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorSettings {
    /// One result card (ads excluded)
    pub listing: String,
    /// Relative to a card
    pub company_name: String,
    /// Relative to a card
    pub location: String,
    /// Relative to a card; its text is the title and its href the detail URL
    pub title_link: String,
    /// Relative to a card
    pub posted_date: String,
    /// The "load more" control
    pub load_more: String,
    /// Detail panel / detail page content container
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    /// sqlx connection URL, e.g. `sqlite:/var/lib/harvester/jobs.db`
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserSettings {
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Poll interval used while waiting for elements
    pub poll_interval_ms: u64,
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted file logs
    pub json_format: bool,

    /// Enable console output
    pub console_output: bool,

    /// Enable file output
    pub file_output: bool,

    /// Directory for log files; defaults to `logs/` next to the executable
    pub log_directory: Option<PathBuf>,

    /// Log file name inside the log directory
    pub file_name: String,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for HarvesterConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            crawling: CrawlingSettings::default(),
            selectors: SelectorSettings::default(),
            database: DatabaseSettings::default(),
            browser: BrowserSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for SearchSettings {
    fn default() -> Self {
        Self {
            base_url: monster::SEARCH_BASE_URL.to_string(),
            title_query: String::new(),
            location: String::new(),
            recency_window: defaults::RECENCY_WINDOW,
        }
    }
}

impl Default for CrawlingSettings {
    fn default() -> Self {
        Self {
            max_load_more_failures: defaults::MAX_LOAD_MORE_FAILURES,
            settle_delay_ms: defaults::SETTLE_DELAY_MS,
            extraction_max_tries: defaults::EXTRACTION_MAX_TRIES,
            extraction_backoff_ms: defaults::EXTRACTION_BACKOFF_MS,
            wait_timeout_secs: defaults::WAIT_TIMEOUT_SECS,
            detail_strategy: DetailStrategy::Inline,
        }
    }
}

impl Default for SelectorSettings {
    fn default() -> Self {
        Self {
            listing: monster::LISTING.to_string(),
            company_name: monster::COMPANY_NAME.to_string(),
            location: monster::LOCATION.to_string(),
            title_link: monster::TITLE_LINK.to_string(),
            posted_date: monster::POSTED_DATE.to_string(),
            load_more: monster::LOAD_MORE.to_string(),
            description: monster::DESCRIPTION.to_string(),
        }
    }
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: defaults::DB_MAX_CONNECTIONS,
        }
    }
}

impl Default for BrowserSettings {
    fn default() -> Self {
        Self {
            headless: true,
            window_width: defaults::WINDOW_WIDTH,
            window_height: defaults::WINDOW_HEIGHT,
            poll_interval_ms: defaults::POLL_INTERVAL_MS,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        let mut module_filters = HashMap::new();
        module_filters.insert("sqlx".to_string(), "warn".to_string());
        module_filters.insert("chromiumoxide".to_string(), "warn".to_string());
        module_filters.insert("tungstenite".to_string(), "warn".to_string());

        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: false,
            console_output: true,
            file_output: true,
            log_directory: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters,
        }
    }
}

impl HarvesterConfig {
    /// Loads defaults, then `path` (if it exists), then environment overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        info!(?path, "Loaded harvester configuration");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if Url::parse(&self.search.base_url).is_err() {
            return Err(ConfigError::validation(format!(
                "search.base_url is not a valid URL: {}",
                self.search.base_url
            )));
        }
        if self.crawling.max_load_more_failures == 0 {
            return Err(ConfigError::validation(
                "crawling.max_load_more_failures must be greater than 0",
            ));
        }
        if self.crawling.extraction_max_tries == 0 {
            return Err(ConfigError::validation(
                "crawling.extraction_max_tries must be greater than 0",
            ));
        }
        if self.crawling.wait_timeout_secs == 0 {
            return Err(ConfigError::validation(
                "crawling.wait_timeout_secs must be greater than 0",
            ));
        }
        if self.database.max_connections == 0 {
            return Err(ConfigError::validation(
                "database.max_connections must be greater than 0",
            ));
        }

        let selectors = [
            ("listing", &self.selectors.listing),
            ("company_name", &self.selectors.company_name),
            ("location", &self.selectors.location),
            ("title_link", &self.selectors.title_link),
            ("posted_date", &self.selectors.posted_date),
            ("load_more", &self.selectors.load_more),
            ("description", &self.selectors.description),
        ];
        if let Some((name, _)) = selectors.iter().find(|(_, s)| s.trim().is_empty()) {
            return Err(ConfigError::validation(format!("selectors.{name} must not be empty")));
        }

        Ok(())
    }

    /// Writes this configuration as pretty JSON, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let write_error = |reason: String| ConfigError::Write {
            path: path.to_path_buf(),
            reason,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| write_error(e.to_string()))?;
        }
        let content = serde_json::to_string_pretty(self).map_err(|e| write_error(e.to_string()))?;
        std::fs::write(path, content).map_err(|e| write_error(e.to_string()))?;

        info!("Saved configuration to: {:?}", path);
        Ok(())
    }

    pub fn search_query(&self) -> SearchQuery {
        SearchQuery {
            title_query: self.search.title_query.clone(),
            location: self.search.location.clone(),
            recency_window: self.search.recency_window,
        }
    }
}

/// Application data directory (`~/.local/share/jobs-harvester` on Linux)
pub fn app_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(defaults::APP_DIR_NAME)
}

/// Default configuration file location
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(defaults::APP_DIR_NAME)
        .join("config.json")
}

fn default_database_url() -> String {
    format!("sqlite:{}", app_data_dir().join("jobs.db").display())
}

/// Listing source constants (CSS equivalents of the source's page structure)
pub mod monster {
    /// Search page; query parameters are appended to this
    pub const SEARCH_BASE_URL: &str = "https://www.monster.com/jobs/search/";

    /// Result cards inside the search results container, ads excluded
    pub const LISTING: &str = "#SearchResults > .card-content:not(.apas-ad)";

    pub const COMPANY_NAME: &str = ".company > .name";
    pub const LOCATION: &str = ".location > .name";
    pub const TITLE_LINK: &str = ".title > a";
    pub const POSTED_DATE: &str = ".meta.flex-col > time";

    pub const LOAD_MORE: &str = "#loadMoreJobs";
    pub const DESCRIPTION: &str = "#JobDescription";
}

/// Default crawling configuration values
pub mod defaults {
    pub const APP_DIR_NAME: &str = "jobs-harvester";
    pub const ENV_PREFIX: &str = "HARVESTER";

    /// Default `tm` search parameter (days)
    pub const RECENCY_WINDOW: u32 = 1;

    pub const MAX_LOAD_MORE_FAILURES: u32 = 3;
    pub const SETTLE_DELAY_MS: u64 = 0;
    pub const EXTRACTION_MAX_TRIES: u32 = 5;
    pub const EXTRACTION_BACKOFF_MS: u64 = 1000;
    pub const WAIT_TIMEOUT_SECS: u64 = 5;

    pub const DB_MAX_CONNECTIONS: u32 = 1;

    pub const WINDOW_WIDTH: u32 = 1280;
    pub const WINDOW_HEIGHT: u32 = 1024;
    pub const POLL_INTERVAL_MS: u64 = 100;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_FILE_NAME: &str = "harvester.log";
}
