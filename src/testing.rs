//! Test adapters for driving the crawl engine without a real storefront.
//!
//! [`ScriptedAdapter`] replays a fixed sequence of outcomes and is enough
//! for orchestrator-level tests. [`PagedJsonAdapter`] walks a paged JSON
//! endpoint through the real fetch and pagination layers, for end-to-end
//! tests against a mock HTTP server.

use crate::adapter::{Capabilities, Cursor, Page, Pager, RecordSink, StoreAdapter};
use crate::fetch::{FetchOptions, Fetcher};
use crate::record::CatalogRecord;
use crate::{CatalogError, Result};
use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Builds a minimal well-formed record.
pub fn make_record(store: &str, uuid: &str, name: &str, price: &str) -> CatalogRecord {
    CatalogRecord {
        store: store.to_string(),
        name: name.to_string(),
        price: price.to_string(),
        image: String::new(),
        href: format!("https://{store}.example/item/{uuid}"),
        uuid: Some(uuid.to_string()),
        platforms: vec![],
        rating: None,
        kind: Some("game".to_string()),
        extra: Map::new(),
    }
}

/// One step of a scripted crawl.
pub enum ScriptStep {
    /// Emit this record.
    Record(CatalogRecord),
    /// Quarantine a malformed listing with this reason.
    Quarantine(String),
    /// Abort the crawl with an adapter error.
    Fail(String),
}

/// Adapter that replays a fixed script of outcomes.
pub struct ScriptedAdapter {
    store: String,
    steps: Vec<ScriptStep>,
    split_children_by_platform: bool,
    /// Number of prior records the resume hint delivered, if it ran.
    pub resume_seen: Option<usize>,
}

impl ScriptedAdapter {
    pub fn new(store: &str, steps: Vec<ScriptStep>) -> Self {
        Self {
            store: store.to_string(),
            steps,
            split_children_by_platform: false,
            resume_seen: None,
        }
    }

    /// Emit every scripted record in order.
    pub fn with_records(store: &str, records: Vec<CatalogRecord>) -> Self {
        Self::new(store, records.into_iter().map(ScriptStep::Record).collect())
    }

    /// Decompose the finished catalog into one child per platform.
    pub fn with_platform_children(mut self) -> Self {
        self.split_children_by_platform = true;
        self
    }
}

#[async_trait]
impl StoreAdapter for ScriptedAdapter {
    fn store(&self) -> &str {
        &self.store
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::default()
    }

    async fn crawl(&mut self, _fetcher: &Fetcher, sink: &RecordSink) -> Result<()> {
        for step in self.steps.drain(..) {
            match step {
                ScriptStep::Record(record) => sink.record(record).await?,
                ScriptStep::Quarantine(reason) => {
                    sink.quarantine(&reason, &serde_json::json!({}));
                }
                ScriptStep::Fail(message) => {
                    return Err(CatalogError::Adapter {
                        store: self.store.clone(),
                        message,
                    });
                }
            }
        }
        Ok(())
    }

    fn resume(&mut self, prior: &[CatalogRecord]) {
        self.resume_seen = Some(prior.len());
    }

    fn child_catalogs(&self, rows: &[CatalogRecord]) -> Vec<(String, Vec<CatalogRecord>)> {
        if !self.split_children_by_platform {
            return Vec::new();
        }
        let mut children: BTreeMap<String, Vec<CatalogRecord>> = BTreeMap::new();
        for row in rows {
            for platform in &row.platforms {
                children
                    .entry(format!("{}-{}", self.store, platform.to_lowercase()))
                    .or_default()
                    .push(row.clone());
            }
        }
        children.into_iter().collect()
    }
}

/// Adapter that enumerates `GET {base_url}/items?offset=N&count=M` pages of
/// the shape `{"items": [...], "total": T}` through the real fetcher.
pub struct PagedJsonAdapter {
    store: String,
    base_url: String,
    page_size: usize,
}

impl PagedJsonAdapter {
    pub fn new(store: &str, base_url: &str, page_size: usize) -> Self {
        Self {
            store: store.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            page_size,
        }
    }

    fn parse_item(&self, item: &Value) -> Option<CatalogRecord> {
        let name = item["name"].as_str()?.trim();
        if name.is_empty() {
            return None;
        }
        Some(CatalogRecord {
            store: self.store.clone(),
            name: name.to_string(),
            price: item["price"].as_str().unwrap_or("Unavailable").to_string(),
            image: item["image"].as_str().unwrap_or_default().to_string(),
            href: item["href"]
                .as_str()
                .map(str::to_string)
                .unwrap_or_else(|| format!("{}/", self.base_url)),
            uuid: item["id"].as_str().map(str::to_string),
            platforms: item["platforms"]
                .as_array()
                .map(|plats| {
                    plats
                        .iter()
                        .filter_map(Value::as_str)
                        .map(str::to_string)
                        .collect()
                })
                .unwrap_or_default(),
            rating: item["rating"].as_str().map(str::to_string),
            kind: Some("game".to_string()),
            extra: Map::new(),
        })
    }
}

#[async_trait]
impl StoreAdapter for PagedJsonAdapter {
    fn store(&self) -> &str {
        &self.store
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities {
            pagination: true,
            ..Capabilities::default()
        }
    }

    async fn crawl(&mut self, fetcher: &Fetcher, sink: &RecordSink) -> Result<()> {
        let url = format!("{}/items", self.base_url);
        let mut pager = Pager::from_offset(0).with_page_size(self.page_size);

        while let Some(cursor) = pager.cursor() {
            let offset = cursor.offset().unwrap_or(0);
            let options = FetchOptions {
                query: vec![
                    ("offset".to_string(), offset.to_string()),
                    ("count".to_string(), self.page_size.to_string()),
                ],
                ..FetchOptions::default()
            };
            let body = fetcher.get_json(&url, &options).await?;

            let items = body["items"].as_array().cloned().unwrap_or_default();
            for item in &items {
                match self.parse_item(item) {
                    Some(record) => sink.record(record).await?,
                    None => sink.quarantine("listing without a usable name", item),
                }
            }

            pager.advance(Page {
                items: items.len(),
                next: Some(Cursor::Offset(offset + items.len() as u64)),
                total: body["total"].as_u64(),
            });
        }
        Ok(())
    }
}
