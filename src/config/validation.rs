use crate::config::types::{CacheConfig, Config, CrawlConfig, OutputConfig};
use crate::ConfigError;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawl_config(&config.crawl)?;
    validate_cache_config(&config.cache)?;
    validate_output_config(&config.output)?;
    Ok(())
}

/// Validates crawl configuration
fn validate_crawl_config(config: &CrawlConfig) -> Result<(), ConfigError> {
    if !config.requests_per_second.is_finite() || config.requests_per_second <= 0.0 {
        return Err(ConfigError::Validation(format!(
            "requests-per-second must be a positive number, got {}",
            config.requests_per_second
        )));
    }

    if config.timeout_secs < 1 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.channel_capacity < 1 {
        return Err(ConfigError::Validation(
            "channel-capacity must be >= 1".to_string(),
        ));
    }

    if config.country.is_empty() {
        return Err(ConfigError::Validation("country cannot be empty".to_string()));
    }

    if config.locale.is_empty() {
        return Err(ConfigError::Validation("locale cannot be empty".to_string()));
    }

    if config.user_agent.is_empty() {
        return Err(ConfigError::Validation(
            "user-agent cannot be empty".to_string(),
        ));
    }

    for store in &config.stores {
        validate_store_name(store)?;
    }

    Ok(())
}

/// Validates a store name: non-empty, lowercase alphanumeric + hyphens
fn validate_store_name(store: &str) -> Result<(), ConfigError> {
    if store.is_empty() {
        return Err(ConfigError::Validation(
            "store name cannot be empty".to_string(),
        ));
    }

    if !store
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "store name must be lowercase alphanumeric with hyphens, got '{}'",
            store
        )));
    }

    Ok(())
}

/// Validates cache configuration
fn validate_cache_config(config: &CacheConfig) -> Result<(), ConfigError> {
    if config.commit_interval < 1 {
        return Err(ConfigError::Validation(
            "commit-interval must be >= 1".to_string(),
        ));
    }

    if config.enabled && config.path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "cache path cannot be empty when the cache is enabled".to_string(),
        ));
    }

    Ok(())
}

/// Validates output configuration
fn validate_output_config(config: &OutputConfig) -> Result<(), ConfigError> {
    if config.dir.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "output dir cannot be empty".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_store_name() {
        assert!(validate_store_name("steam").is_ok());
        assert!(validate_store_name("psn-ps5").is_ok());

        assert!(validate_store_name("").is_err());
        assert!(validate_store_name("Steam").is_err());
        assert!(validate_store_name("psn ps5").is_err());
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let mut config = Config::default();
        config.crawl.requests_per_second = 0.0;
        assert!(validate(&config).is_err());

        config.crawl.requests_per_second = f64::NAN;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_commit_interval() {
        let mut config = Config::default();
        config.cache.commit_interval = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_zero_channel_capacity() {
        let mut config = Config::default();
        config.crawl.channel_capacity = 0;
        assert!(validate(&config).is_err());
    }

    #[test]
    fn test_rejects_empty_locale() {
        let mut config = Config::default();
        config.crawl.locale = String::new();
        assert!(validate(&config).is_err());
    }
}
