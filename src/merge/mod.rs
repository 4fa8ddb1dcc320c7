//! Cross-source canonicalization and merge engine.
//!
//! Records from every store are clustered by [`canonical_key`] and each
//! cluster is folded into one unified record with deterministic conflict
//! resolution. Provenance (which store contributed what, at which price)
//! lands in the merged record's `extra` bag.

pub mod normalize;

pub use normalize::{canonical_key, letter_bucket};

use crate::record::CatalogRecord;
use crate::Result;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::path::Path;

/// Image URLs containing any of these look like stand-in art and lose to a
/// real image from another source.
const PLACEHOLDER_TOKENS: [&str; 2] = ["placeholder", "generic"];

/// Partitions records by canonical title key.
pub fn group_records(records: Vec<CatalogRecord>) -> HashMap<String, Vec<CatalogRecord>> {
    let mut clusters: HashMap<String, Vec<CatalogRecord>> = HashMap::new();
    for record in records {
        clusters
            .entry(canonical_key(&record.name))
            .or_default()
            .push(record);
    }
    clusters
}

/// Folds one cluster into a single merged record. Returns `None` for an
/// empty cluster.
///
/// The cluster is folded in case-insensitive title order (stable, so equal
/// titles keep emission order) and every rule below resolves ties by that
/// order. The result is therefore input-order-independent except when two
/// sources contribute case-identical titles, where first-wins rules follow
/// emission order:
/// - `name`: the longest member title, stripped of platform/edition noise.
/// - `platforms`: union, case-insensitively deduped, first-seen casing.
/// - `rating`: the first label that normalizes into the closed vocabulary.
/// - `price`: the numerically lowest parseable price; `"Free"` is 0 and
///   `"Unavailable"` is skipped unless nothing parses at all.
/// - `image`: the first non-empty URL that is not placeholder art.
/// - `href`, `type`: first non-empty.
/// - `extra`: replaced with `sources`, `prices` and `uuids` provenance.
pub fn merge_cluster(mut records: Vec<CatalogRecord>) -> Option<CatalogRecord> {
    if records.is_empty() {
        return None;
    }
    records.sort_by_key(|r| r.name.to_lowercase());

    let mut base = records[0].clone();

    let longest = records.iter().fold(&records[0], |best, r| {
        if r.name.len() > best.name.len() {
            r
        } else {
            best
        }
    });
    base.name = normalize::strip_edition_noise(&longest.name);

    let mut platforms: Vec<String> = Vec::new();
    let mut seen_platforms: Vec<String> = Vec::new();
    let mut rating: Option<String> = None;
    let mut best_price: Option<(f64, String)> = None;
    let mut image: Option<String> = None;
    let mut href: Option<String> = None;
    let mut kind: Option<String> = None;
    let mut sources: Vec<Value> = Vec::new();
    let mut prices = Map::new();
    let mut uuids: Vec<String> = Vec::new();

    for record in &records {
        let source = record.source_store().to_string();
        sources.push(json!({
            "store": source,
            "href": record.href,
            "price": record.price,
            "platforms": record.platforms,
            "uuid": record.uuid,
        }));
        prices.insert(source, Value::String(record.price.clone()));

        if let Some(uuid) = &record.uuid {
            if !uuid.is_empty() && !uuids.contains(uuid) {
                uuids.push(uuid.clone());
            }
        }

        for plat in normalize::normalize_platforms(&record.platforms) {
            let key = plat.to_lowercase();
            if !seen_platforms.contains(&key) {
                seen_platforms.push(key);
                platforms.push(plat);
            }
        }

        if rating.is_none() {
            if let Some(raw) = &record.rating {
                rating = normalize::normalize_rating(raw).map(str::to_string);
            }
        }

        if let Some(value) = normalize::parse_price(&record.price) {
            let better = match &best_price {
                None => true,
                Some((best, _)) => value < *best,
            };
            if better {
                best_price = Some((value, record.price.clone()));
            }
        }

        if image.is_none() && !record.image.is_empty() && !looks_like_placeholder(&record.image) {
            image = Some(record.image.clone());
        }
        if href.is_none() && !record.href.is_empty() {
            href = Some(record.href.clone());
        }
        if kind.is_none() {
            kind = record.kind.clone().filter(|k| !k.is_empty());
        }
    }

    base.platforms = platforms;
    base.rating = rating;
    if let Some((_, price)) = best_price {
        base.price = price;
    }
    if let Some(image) = image {
        base.image = image;
    }
    if let Some(href) = href {
        base.href = href;
    }
    if kind.is_some() {
        base.kind = kind;
    }
    if base.uuid.as_deref().map_or(true, str::is_empty) {
        base.uuid = uuids.first().cloned();
    }

    let mut extra = Map::new();
    extra.insert("sources".to_string(), Value::Array(sources));
    extra.insert("prices".to_string(), Value::Object(prices));
    if !uuids.is_empty() {
        extra.insert(
            "uuids".to_string(),
            Value::Array(uuids.into_iter().map(Value::String).collect()),
        );
    }
    base.extra = extra;

    Some(base)
}

/// Merges every cluster and returns the unified catalog sorted
/// case-insensitively by name.
pub fn merge_catalog(records: Vec<CatalogRecord>) -> Vec<CatalogRecord> {
    let mut merged: Vec<CatalogRecord> = group_records(records)
        .into_values()
        .filter_map(merge_cluster)
        .collect();
    merged.sort_by_key(|r| r.name.to_lowercase());
    merged
}

/// Reads a store directory's `!.json` pairs file back into records.
///
/// Each entry is a `[name, item]` 2-array; malformed entries are skipped
/// with a warning. Records are tagged with the directory as their
/// `source_store` and the directory's base name (up to the first `-`) as
/// their store, so `psn-ps5` loads as store `psn`.
pub fn load_pairs_file(root: &Path, store_dir: &str) -> Result<Vec<CatalogRecord>> {
    let path = root.join(store_dir).join("!.json");
    if !path.exists() {
        tracing::debug!(store_dir, "no pairs file, skipping");
        return Ok(Vec::new());
    }

    let text = std::fs::read_to_string(&path)?;
    let entries: Vec<Value> = serde_json::from_str(&text)?;
    let base_store = store_dir.split('-').next().unwrap_or(store_dir);

    let mut records = Vec::new();
    for entry in entries {
        let pair = match entry.as_array() {
            Some(pair) if pair.len() == 2 => pair,
            _ => {
                tracing::warn!(store_dir, "skipping malformed pairs entry");
                continue;
            }
        };
        let name = &pair[0];
        let mut object = match pair[1].as_object() {
            Some(object) => object.clone(),
            None => {
                tracing::warn!(store_dir, "skipping pairs entry with non-object payload");
                continue;
            }
        };
        object.entry("name".to_string()).or_insert_with(|| name.clone());
        object.insert("store".to_string(), Value::String(base_store.to_string()));

        match serde_json::from_value::<CatalogRecord>(Value::Object(object)) {
            Ok(mut record) => {
                record
                    .extra
                    .entry("source_store".to_string())
                    .or_insert_with(|| Value::String(store_dir.to_string()));
                records.push(record);
            }
            Err(err) => {
                tracing::warn!(store_dir, name = %name, error = %err, "unable to coerce pairs entry");
            }
        }
    }
    Ok(records)
}

fn looks_like_placeholder(image: &str) -> bool {
    let low = image.to_lowercase();
    PLACEHOLDER_TOKENS.iter().any(|tok| low.contains(tok))
}
