//! Catalog-Crawler: a multi-storefront game catalog crawler
//!
//! This crate implements the crawl engine for aggregating game-store catalogs:
//! a rate-limited retrying fetch layer, a uniform adapter contract for
//! store-specific data sources, a resumable write-through cache, and a
//! cross-source canonicalization/merge engine.

pub mod adapter;
pub mod cache;
pub mod config;
pub mod crawler;
pub mod fetch;
pub mod merge;
pub mod output;
pub mod record;
pub mod testing;

use thiserror::Error;

/// Main error type for catalog-crawler operations
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP error for {url}: {source}")]
    Http { url: String, source: reqwest::Error },

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Cache flush failed after {attempts} attempts: storage busy")]
    CacheContention { attempts: u32 },

    #[error("Payload serialization error: {0}")]
    Payload(#[from] serde_json::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("Adapter error for {store}: {message}")]
    Adapter { store: String, message: String },

    #[error("Record channel closed before the adapter finished")]
    ChannelClosed,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Result type alias for catalog-crawler operations
pub type Result<T> = std::result::Result<T, CatalogError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use adapter::{AdapterRegistry, Capabilities, RecordOutcome, RecordSink, StoreAdapter};
pub use cache::CatalogCache;
pub use config::Config;
pub use fetch::{DomainLimiter, FetchOptions, Fetcher};
pub use record::CatalogRecord;
