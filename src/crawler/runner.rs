use crate::adapter::{AdapterMetrics, AdapterRegistry, RecordSink, StoreAdapter};
use crate::cache::CatalogCache;
use crate::config::Config;
use crate::fetch::Fetcher;
use crate::output::write_catalog;
use crate::record::CatalogRecord;
use crate::{CatalogError, Result};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Per-store knobs the orchestrator needs, extracted from [`Config`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Directory receiving one catalog subdirectory per store.
    pub out_dir: PathBuf,

    /// Cache database path, `None` to crawl without persisted state.
    pub cache_path: Option<PathBuf>,

    /// Seed the buffer from the cache before the adapter runs.
    pub resume: bool,

    /// Cache commit batching.
    pub commit_interval: u32,

    /// Bound of the adapter-to-orchestrator record channel.
    pub channel_capacity: usize,
}

impl RunOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            out_dir: config.output.dir.clone(),
            cache_path: config.cache.enabled.then(|| config.cache.path.clone()),
            resume: config.cache.resume,
            commit_interval: config.cache.commit_interval,
            channel_capacity: config.crawl.channel_capacity,
        }
    }
}

/// Counters for one completed store crawl.
#[derive(Debug, Clone)]
pub struct StoreSummary {
    pub store: String,
    /// Records in the final buffer (cached seeds plus new emissions).
    pub records: usize,
    /// Logical HTTP calls made.
    pub fetched: u64,
    /// Records the adapter emitted.
    pub parsed: u64,
    /// Malformed listings skipped.
    pub quarantined: u64,
}

/// The outcome of a whole run: which stores completed, which failed.
#[derive(Debug, Default)]
pub struct CrawlReport {
    pub summaries: Vec<StoreSummary>,
    /// `(store, error)` per failed store task.
    pub failures: Vec<(String, String)>,
}

impl CrawlReport {
    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }
}

/// Drives one adapter end-to-end.
///
/// The cache is opened here and closed on every exit path; a crawl error
/// never loses already-buffered writes. Reconciliation runs only after the
/// adapter finished cleanly, so a partial pass cannot evict live entries.
pub async fn run_store(
    adapter: Box<dyn StoreAdapter>,
    fetcher: Fetcher,
    options: &RunOptions,
) -> Result<StoreSummary> {
    let store = adapter.store().to_string();

    if adapter.capabilities().needs_headless {
        return Err(CatalogError::Adapter {
            store,
            message: "adapter requires a scripted browser".to_string(),
        });
    }

    let mut cache = match &options.cache_path {
        Some(path) => Some(CatalogCache::open(path)?.with_commit_interval(options.commit_interval)),
        None => None,
    };

    let result = crawl_store(adapter, fetcher, cache.as_mut(), options).await;

    if let Some(cache) = cache {
        if let Err(close_err) = cache.close().await {
            if result.is_ok() {
                return Err(close_err);
            }
            tracing::warn!(store = %store, error = %close_err, "cache close failed");
        }
    }

    result
}

async fn crawl_store(
    mut adapter: Box<dyn StoreAdapter>,
    fetcher: Fetcher,
    mut cache: Option<&mut CatalogCache>,
    options: &RunOptions,
) -> Result<StoreSummary> {
    let store = adapter.store().to_string();
    tracing::info!(store = %store, "starting crawl");

    // Final buffer plus the dedup index mapping cache keys to buffer slots.
    // A later emission for a known key overwrites in place.
    let mut buf: Vec<CatalogRecord> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    if options.resume {
        if let Some(cache) = cache.as_deref_mut() {
            let cached = cache.load(&store)?;
            if !cached.is_empty() {
                tracing::info!(store = %store, records = cached.len(), "resuming from cache");
                for record in cached {
                    index.insert(record.cache_key(), buf.len());
                    buf.push(record);
                }
                adapter.resume(&buf);
            }
        }
    }

    let metrics = Arc::new(AdapterMetrics::default());
    let (tx, mut rx) = mpsc::channel(options.channel_capacity);
    let sink = RecordSink::new(tx, Arc::clone(&metrics));

    let fetcher = Arc::new(fetcher);
    let task_fetcher = Arc::clone(&fetcher);
    let handle = tokio::spawn(async move {
        let result = adapter.crawl(&task_fetcher, &sink).await;
        (adapter, result)
    });

    // Drain the channel fully before joining the adapter task. Joining
    // first would deadlock a producer blocked on a full channel.
    while let Some(record) = rx.recv().await {
        if let Some(cache) = cache.as_deref_mut() {
            cache.upsert(&record).await?;
        }
        let key = record.cache_key();
        match index.get(&key) {
            Some(&slot) => buf[slot] = record,
            None => {
                index.insert(key, buf.len());
                buf.push(record);
                if buf.len() % 100 == 0 {
                    tracing::debug!(store = %store, collected = buf.len(), "collecting records");
                }
            }
        }
    }

    let (adapter, crawl_result) = handle.await.map_err(|err| CatalogError::Adapter {
        store: store.clone(),
        message: format!("crawl task panicked: {err}"),
    })?;
    crawl_result?;

    tracing::info!(store = %store, records = buf.len(), "writing catalog");
    write_catalog(&options.out_dir, &store, &buf)?;
    for (child, rows) in adapter.child_catalogs(&buf) {
        if rows.is_empty() {
            continue;
        }
        tracing::info!(store = %store, child = %child, records = rows.len(), "writing child catalog");
        write_catalog(&options.out_dir, &child, &rows)?;
    }

    if let Some(cache) = cache.as_deref_mut() {
        let live: HashSet<String> = index.keys().cloned().collect();
        cache.reconcile(&store, &live).await?;
    }

    let summary = StoreSummary {
        store: store.clone(),
        records: buf.len(),
        fetched: fetcher.fetched(),
        parsed: metrics.parsed(),
        quarantined: metrics.quarantined(),
    };
    tracing::info!(
        store = %store,
        fetched = summary.fetched,
        parsed = summary.parsed,
        quarantined = summary.quarantined,
        "crawl complete"
    );
    Ok(summary)
}

/// Runs every requested store concurrently, one task per store.
///
/// Stores are isolated: a failed store terminates only its own task and is
/// reported in [`CrawlReport::failures`] while its siblings finish. Unknown
/// store names are warned about and skipped.
pub async fn run_crawl(registry: &AdapterRegistry, config: &Config) -> Result<CrawlReport> {
    let options = RunOptions::from_config(config);

    let mut tasks = Vec::new();
    for store in &config.crawl.stores {
        let Some(adapter) = registry.create(store, &config.crawl) else {
            tracing::warn!(store = %store, "no adapter registered for store, skipping");
            continue;
        };
        let fetcher = Fetcher::from_config(&config.crawl)?;
        let options = options.clone();
        let handle = tokio::spawn(async move { run_store(adapter, fetcher, &options).await });
        tasks.push((store.clone(), handle));
    }

    let joined = futures::future::join_all(
        tasks
            .into_iter()
            .map(|(store, handle)| async move { (store, handle.await) }),
    )
    .await;

    let mut report = CrawlReport::default();
    for (store, outcome) in joined {
        match outcome {
            Ok(Ok(summary)) => report.summaries.push(summary),
            Ok(Err(err)) => {
                tracing::error!(store = %store, error = %err, "store crawl failed");
                report.failures.push((store, err.to_string()));
            }
            Err(join_err) => {
                tracing::error!(store = %store, error = %join_err, "store task panicked");
                report.failures.push((store, format!("task panicked: {join_err}")));
            }
        }
    }
    Ok(report)
}
