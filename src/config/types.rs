use serde::Deserialize;
use std::path::PathBuf;

/// Main configuration structure for the catalog crawler
///
/// Every section and field has a default, so an empty file (or no file at
/// all) yields a runnable configuration that CLI flags can override.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub crawl: CrawlConfig,
    pub cache: CacheConfig,
    pub output: OutputConfig,
}

/// Crawl behavior configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CrawlConfig {
    /// Store names to crawl, lowercase (e.g. ["steam", "psn"])
    pub stores: Vec<String>,

    /// Storefront region code
    pub country: String,

    /// Storefront locale
    pub locale: String,

    /// Token-bucket rate per destination domain
    #[serde(rename = "requests-per-second")]
    pub requests_per_second: f64,

    /// Per-request timeout in seconds
    #[serde(rename = "timeout-secs")]
    pub timeout_secs: u64,

    /// Retry bound for retryable statuses and transient network errors
    #[serde(rename = "max-retries")]
    pub max_retries: u32,

    /// Bound of the adapter-to-orchestrator record channel
    #[serde(rename = "channel-capacity")]
    pub channel_capacity: usize,

    /// User-Agent header sent with every request
    #[serde(rename = "user-agent")]
    pub user_agent: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            stores: Vec::new(),
            country: "US".to_string(),
            locale: "en-US".to_string(),
            requests_per_second: 4.0,
            timeout_secs: 30,
            max_retries: 5,
            channel_capacity: 64,
            user_agent: concat!("catalog-crawler/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

/// Resumable cache configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Path to the SQLite cache database
    pub path: PathBuf,

    /// Disable to crawl without any persisted state
    pub enabled: bool,

    /// Seed each store's buffer from the cache before fetching
    pub resume: bool,

    /// Commit the write transaction every this many records
    #[serde(rename = "commit-interval")]
    pub commit_interval: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./catalog-cache.db"),
            enabled: true,
            resume: true,
            commit_interval: 50,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory receiving one catalog subdirectory per store
    pub dir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("./out"),
        }
    }
}
