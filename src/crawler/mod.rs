//! Crawl orchestration.
//!
//! [`run_store`] drives one adapter end-to-end: seed the buffer from the
//! cache, stream records through a bounded channel with write-through
//! upserts, write the catalog, reconcile the cache. [`run_crawl`] runs one
//! such task per requested store concurrently; a failing store terminates
//! only itself and the report says which stores failed.

mod runner;

pub use runner::{run_crawl, run_store, CrawlReport, RunOptions, StoreSummary};
