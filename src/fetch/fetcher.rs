//! HTTP fetcher with status- and network-level retry.

use crate::config::CrawlConfig;
use crate::fetch::DomainLimiter;
use crate::{CatalogError, Result};
use reqwest::{Client, Method, Response};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use url::Url;

/// HTTP statuses that are retried with backoff.
pub const RETRYABLE_STATUSES: [u16; 7] = [408, 425, 429, 500, 502, 503, 504];

/// Backoff never exceeds this, whatever the attempt count.
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Per-call fetch options.
#[derive(Debug, Default, Clone)]
pub struct FetchOptions {
    /// Extra request headers.
    pub headers: Vec<(String, String)>,

    /// Query string parameters.
    pub query: Vec<(String, String)>,

    /// JSON request body.
    pub body: Option<serde_json::Value>,

    /// Caller-supplied wait used instead of backoff when the server
    /// answers 429. Some stores document their own cool-down.
    pub retry_429_wait: Option<Duration>,
}

/// Builds an HTTP client with the crawler's default configuration.
///
/// Redirects are followed (store APIs bounce between regional hosts) and
/// compressed responses are accepted.
pub fn build_http_client(
    user_agent: &str,
    timeout: Duration,
) -> std::result::Result<Client, reqwest::Error> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(timeout)
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true)
        .build()
}

/// Rate-limited retrying fetcher, one per adapter.
///
/// A [`DomainLimiter`] is created lazily per destination host and shared by
/// every call to that host. The `fetched` counter increments once per
/// logical call (never per retry) and feeds the per-store run summary.
pub struct Fetcher {
    client: Client,
    limiters: Mutex<HashMap<String, Arc<DomainLimiter>>>,
    rps: f64,
    max_retries: u32,
    retry_429_wait: Option<Duration>,
    fetched: AtomicU64,
}

impl Fetcher {
    /// Creates a fetcher that owns its HTTP client.
    pub fn new(user_agent: &str, timeout: Duration, rps: f64) -> Result<Self> {
        let client = build_http_client(user_agent, timeout)?;
        Ok(Self::with_client(client, rps))
    }

    /// Creates a fetcher around an externally supplied client. The caller
    /// keeps ownership of the client's lifecycle.
    pub fn with_client(client: Client, rps: f64) -> Self {
        Self {
            client,
            limiters: Mutex::new(HashMap::new()),
            rps,
            max_retries: 5,
            retry_429_wait: None,
            fetched: AtomicU64::new(0),
        }
    }

    /// Creates a fetcher from the crawl configuration.
    pub fn from_config(config: &CrawlConfig) -> Result<Self> {
        let fetcher = Self::new(
            &config.user_agent,
            Duration::from_secs(config.timeout_secs),
            config.requests_per_second,
        )?;
        Ok(fetcher.with_max_retries(config.max_retries))
    }

    /// Sets the retry bound (default 5).
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    /// Sets a fetcher-wide 429 wait override.
    pub fn with_retry_429_wait(mut self, wait: Duration) -> Self {
        self.retry_429_wait = Some(wait);
        self
    }

    /// Number of logical fetch calls made so far.
    pub fn fetched(&self) -> u64 {
        self.fetched.load(Ordering::Relaxed)
    }

    fn limiter_for(&self, url: &Url) -> Arc<DomainLimiter> {
        let host = url.host_str().unwrap_or("").to_string();
        let mut limiters = self.limiters.lock().unwrap_or_else(|e| e.into_inner());
        Arc::clone(
            limiters
                .entry(host)
                .or_insert_with(|| Arc::new(DomainLimiter::new(self.rps))),
        )
    }

    /// Issues one logical request with rate limiting and retry.
    ///
    /// Retryable statuses (`RETRYABLE_STATUSES`) and transient network
    /// failures share one attempt counter and the same capped exponential
    /// backoff. A 429 honors the per-call or fetcher-wide override first,
    /// then a parseable `Retry-After` header. Non-retryable error statuses
    /// raise immediately. Exceeding `max_retries` surfaces the underlying
    /// HTTP error.
    pub async fn fetch(&self, method: Method, url: &str, options: &FetchOptions) -> Result<Response> {
        self.fetched.fetch_add(1, Ordering::Relaxed);

        let parsed = Url::parse(url)?;
        let limiter = self.limiter_for(&parsed);
        let mut attempt: u32 = 0;

        loop {
            limiter.acquire().await;

            let mut request = self.client.request(method.clone(), parsed.clone());
            for (name, value) in &options.headers {
                request = request.header(name, value);
            }
            if !options.query.is_empty() {
                request = request.query(&options.query);
            }
            if let Some(body) = &options.body {
                request = request.json(body);
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status().as_u16();
                    if RETRYABLE_STATUSES.contains(&status) {
                        attempt += 1;
                        if attempt > self.max_retries {
                            return response.error_for_status().map_err(|source| {
                                CatalogError::Http {
                                    url: url.to_string(),
                                    source,
                                }
                            });
                        }
                        let wait = self.retry_wait(status, attempt, &response, options);
                        tracing::debug!(
                            url,
                            status,
                            attempt,
                            wait_ms = wait.as_millis() as u64,
                            "retrying after retryable status"
                        );
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    return response
                        .error_for_status()
                        .map_err(|source| CatalogError::Http {
                            url: url.to_string(),
                            source,
                        });
                }
                Err(err) if is_transient(&err) => {
                    attempt += 1;
                    if attempt > self.max_retries {
                        return Err(CatalogError::Http {
                            url: url.to_string(),
                            source: err,
                        });
                    }
                    let wait = backoff(attempt, 0.2);
                    tracing::debug!(
                        url,
                        error = %err,
                        attempt,
                        wait_ms = wait.as_millis() as u64,
                        "retrying after transient network error"
                    );
                    tokio::time::sleep(wait).await;
                }
                Err(err) => {
                    return Err(CatalogError::Http {
                        url: url.to_string(),
                        source: err,
                    });
                }
            }
        }
    }

    /// GETs a URL and deserializes the JSON body.
    pub async fn get_json(&self, url: &str, options: &FetchOptions) -> Result<serde_json::Value> {
        let response = self.fetch(Method::GET, url, options).await?;
        response
            .json()
            .await
            .map_err(|source| CatalogError::Http {
                url: url.to_string(),
                source,
            })
    }

    /// GETs a URL and returns the body text.
    pub async fn get_text(&self, url: &str, options: &FetchOptions) -> Result<String> {
        let response = self.fetch(Method::GET, url, options).await?;
        response
            .text()
            .await
            .map_err(|source| CatalogError::Http {
                url: url.to_string(),
                source,
            })
    }

    fn retry_wait(
        &self,
        status: u16,
        attempt: u32,
        response: &Response,
        options: &FetchOptions,
    ) -> Duration {
        let override_wait = options.retry_429_wait.or(self.retry_429_wait);
        if status == 429 {
            if let Some(wait) = override_wait {
                return wait;
            }
        }
        if let Some(wait) = retry_after(response) {
            return wait;
        }
        backoff(attempt, 0.3)
    }
}

/// Capped exponential backoff: `min(8s, 0.5 * 2^(attempt-1) + jitter)`.
fn backoff(attempt: u32, jitter_span: f64) -> Duration {
    let exp = 0.5 * f64::powi(2.0, attempt.saturating_sub(1) as i32);
    let jitter = rand::random::<f64>() * jitter_span;
    Duration::from_secs_f64(exp + jitter).min(MAX_BACKOFF)
}

/// Parses a `Retry-After` header as whole or fractional seconds.
fn retry_after(response: &Response) -> Option<Duration> {
    let value = response.headers().get("Retry-After")?.to_str().ok()?;
    let secs: f64 = value.trim().parse().ok()?;
    if secs.is_finite() && secs >= 0.0 {
        Some(Duration::from_secs_f64(secs))
    } else {
        None
    }
}

/// Network-level failures worth retrying: timeouts, connection errors, and
/// mid-body/protocol resets. Builder and redirect-policy errors are not.
fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect() || err.is_body() || err.is_request()
}
