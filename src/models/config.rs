//! Application configuration structures.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AppError, Result};

/// Root application configuration.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// HTTP client and probing behavior
    #[serde(default)]
    pub http: HttpConfig,

    /// Where the catalog lives and how to read it
    #[serde(default)]
    pub catalog: CatalogConfig,

    /// Monitored substances and persisted state
    #[serde(default)]
    pub monitor: MonitorConfig,

    /// Output feed channel metadata
    #[serde(default)]
    pub feed: FeedConfig,
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

    /// Validate configuration values for basic sanity.
    pub fn validate(&self) -> Result<()> {
        if self.http.user_agent.trim().is_empty() {
            return Err(AppError::validation("http.user_agent is empty"));
        }
        if self.http.timeout_secs == 0 {
            return Err(AppError::validation("http.timeout_secs must be > 0"));
        }
        if self.http.probe_timeout_secs == 0 {
            return Err(AppError::validation("http.probe_timeout_secs must be > 0"));
        }
        if self.http.max_concurrent == 0 {
            return Err(AppError::validation("http.max_concurrent must be > 0"));
        }
        if self.catalog.header_scan_rows == 0 {
            return Err(AppError::validation("catalog.header_scan_rows must be > 0"));
        }
        if self.catalog.feed_link_class.trim().is_empty() {
            return Err(AppError::validation("catalog.feed_link_class is empty"));
        }
        Url::parse(&self.catalog.base_url)
            .map_err(|e| AppError::validation(format!("catalog.base_url: {e}")))?;
        if self.monitor.substances.iter().all(|s| s.trim().is_empty()) {
            return Err(AppError::validation("No substances defined"));
        }
        if self.feed.max_items == 0 {
            return Err(AppError::validation("feed.max_items must be > 0"));
        }
        Url::parse(&self.feed.feed_url)
            .map_err(|e| AppError::validation(format!("feed.feed_url: {e}")))?;
        Ok(())
    }

    /// Monitored substances with surrounding whitespace and blanks removed.
    pub fn substances(&self) -> Vec<String> {
        self.monitor
            .substances
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

/// HTTP client and probing behavior settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// User-Agent header for HTTP requests
    #[serde(default = "defaults::user_agent")]
    pub user_agent: String,

    /// Per-request timeout in seconds
    #[serde(default = "defaults::timeout")]
    pub timeout_secs: u64,

    /// Upper bound for one whole probe (page + feed)
    #[serde(default = "defaults::probe_timeout")]
    pub probe_timeout_secs: u64,

    /// Maximum concurrent probes
    #[serde(default = "defaults::max_concurrent")]
    pub max_concurrent: usize,

    /// Delay after each completed probe in milliseconds
    #[serde(default)]
    pub request_delay_ms: u64,

    /// Skip TLS certificate verification
    #[serde(default)]
    pub accept_invalid_certs: bool,

    /// Extra attempts for the catalog download
    #[serde(default = "defaults::catalog_retries")]
    pub catalog_retries: u32,

    /// First backoff delay between catalog attempts; doubles each retry
    #[serde(default = "defaults::retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            user_agent: defaults::user_agent(),
            timeout_secs: defaults::timeout(),
            probe_timeout_secs: defaults::probe_timeout(),
            max_concurrent: defaults::max_concurrent(),
            request_delay_ms: 0,
            accept_invalid_certs: false,
            catalog_retries: defaults::catalog_retries(),
            retry_backoff_ms: defaults::retry_backoff(),
        }
    }
}

/// Catalog location and layout settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogConfig {
    /// Site origin; relative feed links are resolved against it
    #[serde(default = "defaults::base_url")]
    pub base_url: String,

    /// Path of the medicines report workbook on the site
    #[serde(default = "defaults::report_path")]
    pub report_path: String,

    /// How many leading rows may hold the header
    #[serde(default = "defaults::header_scan_rows")]
    pub header_scan_rows: usize,

    /// CSS class marking the RSS anchor on product pages
    #[serde(default = "defaults::feed_link_class")]
    pub feed_link_class: String,
}

impl CatalogConfig {
    /// Absolute URL of the catalog workbook.
    pub fn report_url(&self) -> Result<String> {
        let base = Url::parse(&self.base_url)?;
        Ok(base.join(&self.report_path)?.to_string())
    }
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            base_url: defaults::base_url(),
            report_path: defaults::report_path(),
            header_scan_rows: defaults::header_scan_rows(),
            feed_link_class: defaults::feed_link_class(),
        }
    }
}

/// Monitored substances and state location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    #[serde(default = "defaults::substances")]
    pub substances: Vec<String>,

    /// Product name → last seen signature
    #[serde(default = "defaults::state_file")]
    pub state_file: String,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            substances: defaults::substances(),
            state_file: defaults::state_file(),
        }
    }
}

/// Output feed settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedConfig {
    #[serde(default = "defaults::feed_title")]
    pub title: String,

    #[serde(default = "defaults::feed_link")]
    pub link: String,

    #[serde(default = "defaults::feed_description")]
    pub description: String,

    /// Absolute URL the generated feed is published at (atom:link rel=self)
    #[serde(default = "defaults::feed_url")]
    pub feed_url: String,

    #[serde(default = "defaults::max_items")]
    pub max_items: usize,

    /// File the feed is written to
    #[serde(default = "defaults::feed_output")]
    pub output: String,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            title: defaults::feed_title(),
            link: defaults::feed_link(),
            description: defaults::feed_description(),
            feed_url: defaults::feed_url(),
            max_items: defaults::max_items(),
            output: defaults::feed_output(),
        }
    }
}

mod defaults {
    // HTTP defaults
    pub fn user_agent() -> String {
        "Mozilla/5.0 (compatible; medwatch/0.1)".into()
    }
    pub fn timeout() -> u64 {
        30
    }
    pub fn probe_timeout() -> u64 {
        60
    }
    pub fn max_concurrent() -> usize {
        5
    }
    pub fn catalog_retries() -> u32 {
        2
    }
    pub fn retry_backoff() -> u64 {
        500
    }

    // Catalog defaults
    pub fn base_url() -> String {
        "https://www.ema.europa.eu".into()
    }
    pub fn report_path() -> String {
        "/en/documents/report/medicines-output-medicines-report_en.xlsx".into()
    }
    pub fn header_scan_rows() -> usize {
        10
    }
    pub fn feed_link_class() -> String {
        "ema-rss-button".into()
    }

    // Monitor defaults
    pub fn substances() -> Vec<String> {
        [
            "semaglutide",
            "liraglutide",
            "tirzepatide",
            "dapagliflozin",
            "sitagliptin",
            "apremilast",
        ]
        .into_iter()
        .map(String::from)
        .collect()
    }
    pub fn state_file() -> String {
        "ema_monitor_state.json".into()
    }

    // Feed defaults
    pub fn feed_title() -> String {
        "EMA Medicine Updates".into()
    }
    pub fn feed_link() -> String {
        "https://www.ema.europa.eu/en/medicines".into()
    }
    pub fn feed_description() -> String {
        "Monitored updates for specific medicines from the European Medicines Agency.".into()
    }
    pub fn feed_url() -> String {
        "http://localhost/ema_updates.xml".into()
    }
    pub fn max_items() -> usize {
        50
    }
    pub fn feed_output() -> String {
        "ema_updates.xml".into()
    }
}
