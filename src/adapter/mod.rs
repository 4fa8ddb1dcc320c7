//! The uniform contract every store-specific data source implements.
//!
//! An adapter enumerates one storefront's catalog and streams normalized
//! [`CatalogRecord`]s into a bounded channel via [`RecordSink`]. Malformed
//! listings are quarantined (logged, counted, skipped) without aborting the
//! stream. Adapters are constructed through the closed [`AdapterRegistry`];
//! there is no runtime discovery.

mod pagination;

pub use pagination::{Cursor, Page, Pager};

use crate::config::CrawlConfig;
use crate::fetch::Fetcher;
use crate::record::CatalogRecord;
use crate::{CatalogError, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// What an adapter can and cannot do, declared per adapter, fixed at
/// construction.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Capabilities {
    /// The source is paginated (the adapter drives a [`Pager`]).
    pub pagination: bool,
    /// The source needs a scripted browser. Such adapters cannot run here
    /// and are rejected at orchestration time.
    pub needs_headless: bool,
    /// Prices may be missing or approximate for some listings.
    pub returns_partial_price: bool,
    /// The stream includes DLC and add-on items, not just base games.
    pub yields_dlc: bool,
}

/// The result of parsing one raw listing.
#[derive(Debug)]
pub enum RecordOutcome {
    /// A well-formed record ready for the cache and catalog.
    Ok(CatalogRecord),
    /// A malformed listing. Carries the reason and the raw payload for
    /// diagnosis; the stream continues.
    Quarantined {
        reason: String,
        raw: serde_json::Value,
    },
}

/// Per-adapter run counters, shared between the sink and the orchestrator.
#[derive(Debug, Default)]
pub struct AdapterMetrics {
    parsed: AtomicU64,
    quarantined: AtomicU64,
}

impl AdapterMetrics {
    /// Records accepted into the stream so far.
    pub fn parsed(&self) -> u64 {
        self.parsed.load(Ordering::Relaxed)
    }

    /// Malformed listings skipped so far.
    pub fn quarantined(&self) -> u64 {
        self.quarantined.load(Ordering::Relaxed)
    }
}

/// The adapter's half of the record channel.
///
/// The channel is bounded, so a fast adapter suspends in [`RecordSink::record`]
/// until the orchestrator catches up. That suspension is also the stream's
/// cancellation point: when the consumer goes away the next send fails with
/// [`CatalogError::ChannelClosed`] and the adapter unwinds.
#[derive(Clone)]
pub struct RecordSink {
    tx: mpsc::Sender<CatalogRecord>,
    metrics: Arc<AdapterMetrics>,
}

impl RecordSink {
    pub fn new(tx: mpsc::Sender<CatalogRecord>, metrics: Arc<AdapterMetrics>) -> Self {
        Self { tx, metrics }
    }

    /// Sends one record downstream.
    ///
    /// A record with an empty title violates the stream invariant and is
    /// quarantined here rather than emitted.
    pub async fn record(&self, record: CatalogRecord) -> Result<()> {
        if record.name.trim().is_empty() {
            self.quarantine(
                "empty title",
                &serde_json::to_value(&record).unwrap_or_default(),
            );
            return Ok(());
        }
        self.tx
            .send(record)
            .await
            .map_err(|_| CatalogError::ChannelClosed)?;
        self.metrics.parsed.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Counts and logs one malformed listing. Never fatal.
    pub fn quarantine(&self, reason: &str, raw: &serde_json::Value) {
        self.metrics.quarantined.fetch_add(1, Ordering::Relaxed);
        tracing::warn!(reason, raw = %raw, "quarantined malformed listing");
    }

    /// Dispatches a parse outcome: forwards records, quarantines failures.
    pub async fn submit(&self, outcome: RecordOutcome) -> Result<()> {
        match outcome {
            RecordOutcome::Ok(record) => self.record(record).await,
            RecordOutcome::Quarantined { reason, raw } => {
                self.quarantine(&reason, &raw);
                Ok(())
            }
        }
    }
}

/// A store-specific data source.
///
/// `crawl` is one fresh enumeration of the source, start to finish. It is not
/// restartable mid-stream; resumption is the orchestrator's concern, though
/// an adapter may use the [`StoreAdapter::resume`] hint to reorder its own
/// work. Raw payload parsing is entirely the adapter's business and invisible
/// to the rest of the engine.
#[async_trait]
pub trait StoreAdapter: Send {
    /// Store identifier, lowercase (e.g. "steam").
    fn store(&self) -> &str;

    /// Declared capabilities.
    fn capabilities(&self) -> Capabilities;

    /// Enumerates the catalog, streaming every listing into `sink`.
    ///
    /// All network I/O goes through `fetcher`. Returning an error terminates
    /// this store's crawl; individual malformed listings must be quarantined
    /// through the sink instead.
    async fn crawl(&mut self, fetcher: &Fetcher, sink: &RecordSink) -> Result<()>;

    /// Optional hint with the previous run's records, delivered before
    /// `crawl`. Correctness must not depend on it.
    fn resume(&mut self, _prior: &[CatalogRecord]) {}

    /// Optional decomposition of a completed run into named sub-catalogs
    /// (e.g. split by platform). Default: none.
    fn child_catalogs(&self, _rows: &[CatalogRecord]) -> Vec<(String, Vec<CatalogRecord>)> {
        Vec::new()
    }
}

type AdapterFactory = Box<dyn Fn(&CrawlConfig) -> Box<dyn StoreAdapter> + Send + Sync>;

/// Closed registry of adapter constructors, keyed by store name.
///
/// The set of known stores is whatever was registered at startup; asking for
/// anything else yields `None` and the caller decides whether that is a warn
/// or an error.
#[derive(Default)]
pub struct AdapterRegistry {
    factories: HashMap<String, AdapterFactory>,
}

impl AdapterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a constructor for `store`, replacing any previous one.
    pub fn register<F>(&mut self, store: &str, factory: F)
    where
        F: Fn(&CrawlConfig) -> Box<dyn StoreAdapter> + Send + Sync + 'static,
    {
        self.factories.insert(store.to_string(), Box::new(factory));
    }

    /// Instantiates the adapter for `store`, or `None` if unknown.
    pub fn create(&self, store: &str, config: &CrawlConfig) -> Option<Box<dyn StoreAdapter>> {
        self.factories.get(store).map(|factory| factory(config))
    }

    pub fn contains(&self, store: &str) -> bool {
        self.factories.contains_key(store)
    }

    /// Registered store names, sorted.
    pub fn stores(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.factories.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}
