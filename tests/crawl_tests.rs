//! Integration tests for the crawl engine
//!
//! These tests use wiremock to create mock storefront APIs and drive the
//! full cycle end-to-end: paginated fetch, write-through cache, catalog
//! files, resume, and cross-store merging.

use catalog_crawler::cache::CatalogCache;
use catalog_crawler::crawler::{run_store, RunOptions};
use catalog_crawler::fetch::Fetcher;
use catalog_crawler::merge::{load_pairs_file, merge_catalog};
use catalog_crawler::output::write_catalog;
use catalog_crawler::testing::{make_record, PagedJsonAdapter, ScriptedAdapter};
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;
use tempfile::TempDir;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_fetcher() -> Fetcher {
    Fetcher::new("catalog-crawler-test/0.1", Duration::from_secs(5), 100.0).unwrap()
}

fn test_options(dir: &TempDir) -> RunOptions {
    RunOptions {
        out_dir: dir.path().join("out"),
        cache_path: Some(dir.path().join("cache.db")),
        resume: true,
        commit_interval: 10,
        channel_capacity: 4,
    }
}

fn read_pairs(out_dir: &Path, store: &str) -> Vec<Value> {
    let text = std::fs::read_to_string(out_dir.join(store).join("!.json")).unwrap();
    serde_json::from_str(&text).unwrap()
}

fn item(id: &str, name: &str, price: &str) -> Value {
    json!({
        "id": id,
        "name": name,
        "price": price,
        "href": format!("https://store.example/item/{id}"),
        "platforms": ["PC"]
    })
}

/// Mounts a two-page catalog: 2 items at offset 0, 1 item at offset 2,
/// with a reported total of 3.
async fn mount_paged_catalog(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("offset", "0"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                item("1", "Alpha Quest", "$10.00"),
                item("2", "Beta Blast", "Free")
            ],
            "total": 3
        })))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .and(query_param("offset", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("3", "Gamma Run", "$4.99")],
            "total": 3
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_full_crawl_cycle() {
    let server = MockServer::start().await;
    mount_paged_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let options = test_options(&dir);

    let adapter = PagedJsonAdapter::new("teststore", &server.uri(), 2);
    let summary = run_store(Box::new(adapter), test_fetcher(), &options)
        .await
        .unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.parsed, 3);
    assert_eq!(summary.quarantined, 0);
    // Two pages, two logical fetches.
    assert_eq!(summary.fetched, 2);

    let pairs = read_pairs(&options.out_dir, "teststore");
    assert_eq!(pairs.len(), 3);
    assert_eq!(pairs[0][0], "Alpha Quest");
    assert_eq!(pairs[1][0], "Beta Blast");
    assert_eq!(pairs[2][0], "Gamma Run");

    // Every record was written through to the cache.
    let mut cache = CatalogCache::open(options.cache_path.as_ref().unwrap()).unwrap();
    assert_eq!(cache.load("teststore").unwrap().len(), 3);
}

#[tokio::test]
async fn test_resume_preseeds_before_fetching() {
    let server = MockServer::start().await;
    mount_paged_catalog(&server).await;

    let dir = TempDir::new().unwrap();
    let options = test_options(&dir);

    let first = PagedJsonAdapter::new("teststore", &server.uri(), 2);
    run_store(Box::new(first), test_fetcher(), &options)
        .await
        .unwrap();

    // Second run against a source that now reports an empty first page.
    // The buffer must come from the cache, seeded before the single probe
    // fetch, and reconcile must keep all resumed entries.
    server.reset().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"items": [], "total": 3})))
        .mount(&server)
        .await;

    let second = PagedJsonAdapter::new("teststore", &server.uri(), 2);
    let summary = run_store(Box::new(second), test_fetcher(), &options)
        .await
        .unwrap();

    assert_eq!(summary.records, 3);
    assert_eq!(summary.parsed, 0);
    assert_eq!(summary.fetched, 1);
    assert_eq!(read_pairs(&options.out_dir, "teststore").len(), 3);

    let mut cache = CatalogCache::open(options.cache_path.as_ref().unwrap()).unwrap();
    assert_eq!(cache.load("teststore").unwrap().len(), 3);
}

#[tokio::test]
async fn test_transient_errors_recovered_mid_crawl() {
    let server = MockServer::start().await;

    // The first two attempts fail with retryable statuses, then the page
    // loads. One short page ends the enumeration.
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(503).insert_header("Retry-After", "0"))
        .up_to_n_times(2)
        .expect(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [item("1", "Alpha Quest", "$10.00")]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let options = test_options(&dir);

    let adapter = PagedJsonAdapter::new("teststore", &server.uri(), 2);
    let summary = run_store(Box::new(adapter), test_fetcher(), &options)
        .await
        .unwrap();

    // Three attempts, one logical fetch.
    assert_eq!(summary.fetched, 1);
    assert_eq!(summary.records, 1);
}

#[tokio::test]
async fn test_malformed_listings_are_quarantined_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [
                {"id": "1", "price": "$10.00"},
                item("2", "Beta Blast", "Free")
            ],
            "total": 2
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let options = test_options(&dir);

    let adapter = PagedJsonAdapter::new("teststore", &server.uri(), 2);
    let summary = run_store(Box::new(adapter), test_fetcher(), &options)
        .await
        .unwrap();

    assert_eq!(summary.records, 1);
    assert_eq!(summary.quarantined, 1);
    let pairs = read_pairs(&options.out_dir, "teststore");
    assert_eq!(pairs[0][0], "Beta Blast");
}

#[tokio::test]
async fn test_crawl_then_merge_pipeline() {
    let dir = TempDir::new().unwrap();
    let options = RunOptions {
        out_dir: dir.path().join("out"),
        cache_path: None,
        resume: false,
        commit_interval: 50,
        channel_capacity: 4,
    };

    let mut steam_rec = make_record("steam", "s1", "Foo Bar", "$10.00");
    steam_rec.platforms = vec!["Windows".to_string()];
    let steam = ScriptedAdapter::with_records("steam", vec![steam_rec]);
    run_store(Box::new(steam), test_fetcher(), &options)
        .await
        .unwrap();

    let mut psn_rec = make_record("psn-ps5", "p1", "FOO BAR", "Free");
    psn_rec.platforms = vec!["PS5".to_string()];
    let psn = ScriptedAdapter::with_records("psn-ps5", vec![psn_rec]);
    run_store(Box::new(psn), test_fetcher(), &options)
        .await
        .unwrap();

    // Read both pairs files back and merge across stores, the way the
    // merge subcommand does.
    let mut records = load_pairs_file(&options.out_dir, "steam").unwrap();
    records.extend(load_pairs_file(&options.out_dir, "psn-ps5").unwrap());
    let merged = merge_catalog(records);
    assert_eq!(merged.len(), 1);
    assert_eq!(merged[0].name, "Foo Bar");
    assert_eq!(merged[0].price, "Free");
    assert_eq!(merged[0].platforms, vec!["Windows", "PS5"]);
    assert_eq!(merged[0].extra["sources"].as_array().unwrap().len(), 2);

    let merged_dir = dir.path().join("merged");
    write_catalog(&merged_dir, "psn", &merged).unwrap();
    let pairs = read_pairs(&merged_dir, "psn");
    assert_eq!(pairs.len(), 1);
    assert_eq!(pairs[0][0], "Foo Bar");
}
