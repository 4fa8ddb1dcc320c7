//! Catalog crawler main entry point
//!
//! This is the command-line interface for the multi-storefront catalog
//! crawler: crawl the configured stores into per-store catalog directories,
//! or merge previously written per-store catalogs into unified ones.

use catalog_crawler::adapter::AdapterRegistry;
use catalog_crawler::config::{load_config, validate, Config};
use catalog_crawler::crawler::run_crawl;
use catalog_crawler::merge::{load_pairs_file, merge_catalog};
use catalog_crawler::output::write_catalog;
use catalog_crawler::record::CatalogRecord;
use clap::{Parser, Subcommand};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

/// Crawl game-storefront catalogs into normalized per-store JSON catalogs,
/// with resumable caching and cross-store merging.
#[derive(Parser, Debug)]
#[command(name = "catalog-crawler")]
#[command(version)]
#[command(about = "A multi-storefront game catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file (optional; flags override it)
    #[arg(value_name = "CONFIG")]
    config: Option<PathBuf>,

    /// Comma-separated store names to crawl, overriding the config
    #[arg(long, value_delimiter = ',', value_name = "STORES")]
    stores: Option<Vec<String>>,

    /// Output directory for catalog files
    #[arg(long, value_name = "DIR")]
    out: Option<PathBuf>,

    /// Storefront region code
    #[arg(long, value_name = "CODE")]
    country: Option<String>,

    /// Storefront locale
    #[arg(long, value_name = "LOCALE")]
    locale: Option<String>,

    /// Path to the cache database
    #[arg(long = "cache-db", value_name = "PATH")]
    cache_db: Option<PathBuf>,

    /// Crawl without any persisted cache state
    #[arg(long = "no-cache")]
    no_cache: bool,

    /// Keep the cache but do not pre-seed buffers from it
    #[arg(long = "no-resume-cache")]
    no_resume_cache: bool,

    /// Commit cache writes every N records
    #[arg(long = "cache-commit-interval", value_name = "N")]
    cache_commit_interval: Option<u32>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge per-store catalog outputs into unified catalogs
    Merge {
        /// Directory containing per-store catalog directories
        #[arg(long, default_value = "./out", value_name = "DIR")]
        input: PathBuf,

        /// Destination directory (defaults to <input>/merged)
        #[arg(long, value_name = "DIR")]
        output: Option<PathBuf>,

        /// Comma-separated base store names to merge ("all" for every store)
        #[arg(
            long,
            default_value = "psn,xbox,nintendo,steam",
            value_delimiter = ',',
            value_name = "STORES"
        )]
        stores: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Setup logging based on verbosity
    setup_logging(cli.verbose, cli.quiet);

    if let Some(Command::Merge {
        input,
        output,
        stores,
    }) = &cli.command
    {
        return run_merge(input, output.as_deref(), stores);
    }

    let mut config = match &cli.config {
        Some(path) => {
            tracing::info!("Loading configuration from: {}", path.display());
            load_config(path)?
        }
        None => Config::default(),
    };
    apply_overrides(&mut config, &cli);
    validate(&config)?;

    if config.crawl.stores.is_empty() {
        anyhow::bail!("no stores requested; pass --stores or set [crawl] stores");
    }

    handle_crawl(config).await
}

/// Sets up the logging/tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        // Only show errors
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("catalog_crawler=info,warn"),
            1 => EnvFilter::new("catalog_crawler=debug,info"),
            2 => EnvFilter::new("catalog_crawler=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// CLI flags take precedence over the config file.
fn apply_overrides(config: &mut Config, cli: &Cli) {
    if let Some(stores) = &cli.stores {
        config.crawl.stores = stores
            .iter()
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
    }
    if let Some(out) = &cli.out {
        config.output.dir = out.clone();
    }
    if let Some(country) = &cli.country {
        config.crawl.country = country.clone();
    }
    if let Some(locale) = &cli.locale {
        config.crawl.locale = locale.clone();
    }
    if let Some(path) = &cli.cache_db {
        config.cache.path = path.clone();
    }
    if cli.no_cache {
        config.cache.enabled = false;
    }
    if cli.no_resume_cache {
        config.cache.resume = false;
    }
    if let Some(interval) = cli.cache_commit_interval {
        config.cache.commit_interval = interval;
    }
}

/// Store adapters available to this binary. Site-specific adapters are
/// integration points: embedders register them here by store name.
fn adapter_registry() -> AdapterRegistry {
    AdapterRegistry::new()
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config) -> anyhow::Result<()> {
    tracing::info!(
        "Crawling {} store(s) into {}",
        config.crawl.stores.len(),
        config.output.dir.display()
    );

    let registry = adapter_registry();
    let report = run_crawl(&registry, &config).await?;

    for summary in &report.summaries {
        tracing::info!(
            "[{}] {} records (fetched={} parsed={} quarantined={})",
            summary.store,
            summary.records,
            summary.fetched,
            summary.parsed,
            summary.quarantined
        );
    }

    if !report.all_succeeded() {
        for (store, error) in &report.failures {
            tracing::error!("[{}] failed: {}", store, error);
        }
        anyhow::bail!("{} store crawl(s) failed", report.failures.len());
    }

    tracing::info!("Crawl completed successfully");
    Ok(())
}

/// Handles the merge subcommand: fold per-store pairs files into one
/// unified catalog per base store.
fn run_merge(input: &Path, output: Option<&Path>, stores: &[String]) -> anyhow::Result<()> {
    let out_dir = output
        .map(Path::to_path_buf)
        .unwrap_or_else(|| input.join("merged"));
    std::fs::create_dir_all(&out_dir)?;

    let requested: HashSet<String> = stores
        .iter()
        .map(|s| s.trim().to_lowercase())
        .filter(|s| !s.is_empty())
        .collect();
    let include_all = requested.contains("all") || requested.contains("*");

    let mut store_dirs: Vec<String> = std::fs::read_dir(input)?
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.path().is_dir())
        .filter_map(|entry| entry.file_name().into_string().ok())
        .collect();
    store_dirs.sort();

    let mut groups: BTreeMap<String, Vec<CatalogRecord>> = BTreeMap::new();
    for store_dir in &store_dirs {
        let base = store_dir
            .split('-')
            .next()
            .unwrap_or(store_dir)
            .to_string();
        if !include_all && !requested.contains(&base) {
            tracing::debug!("Skipping {} (base {} not requested)", store_dir, base);
            continue;
        }
        let records = load_pairs_file(input, store_dir)?;
        if records.is_empty() {
            continue;
        }
        tracing::info!("Loaded {} records from {}", records.len(), store_dir);
        groups.entry(base).or_default().extend(records);
    }

    if groups.is_empty() {
        tracing::warn!("No catalogs matched input criteria");
        return Ok(());
    }

    for (base, records) in groups {
        let merged = merge_catalog(records);
        tracing::info!("Writing merged catalog for {} ({} titles)", base, merged.len());
        write_catalog(&out_dir, &base, &merged)?;
    }

    Ok(())
}
