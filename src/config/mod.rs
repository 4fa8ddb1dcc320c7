//! Configuration module for the catalog crawler
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files. Every field has a default so the crawler is runnable from CLI
//! flags alone.

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{CacheConfig, Config, CrawlConfig, OutputConfig};

// Re-export parser and validation functions
pub use parser::load_config;
pub use validation::validate;
