//! Rate-limited, retrying HTTP fetch layer.
//!
//! All adapter network I/O goes through [`Fetcher::fetch`], which acquires a
//! per-domain token-bucket permit, issues the request, and retries both
//! retryable HTTP statuses and transient network failures with capped
//! exponential backoff.

mod fetcher;
mod limiter;

pub use fetcher::{build_http_client, FetchOptions, Fetcher, RETRYABLE_STATUSES};
pub use limiter::DomainLimiter;
