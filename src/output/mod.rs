//! Catalog file writer.
//!
//! A store's catalog is a directory of per-letter JSON arrays (`a.json` ..
//! `z.json`, `_.json` for everything else), a `$.json` metadata file with
//! `{size, date}`, and a `!.json` pairs file of `[name, item]` 2-arrays.
//! The pairs file is the interchange format other tools read and write, so
//! its global case-insensitive ordering is part of the contract.

use crate::merge::letter_bucket;
use crate::record::{CatalogItem, CatalogRecord};
use crate::Result;
use chrono::Utc;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

#[derive(Serialize)]
struct CatalogMetadata {
    size: usize,
    date: String,
}

/// Writes one store's catalog under `out_dir/store/`.
pub fn write_catalog(out_dir: &Path, store: &str, rows: &[CatalogRecord]) -> Result<()> {
    let base = out_dir.join(store);
    fs::create_dir_all(&base)?;

    let mut buckets: BTreeMap<char, Vec<CatalogItem>> = BTreeMap::new();
    let mut pairs: Vec<(String, CatalogItem)> = Vec::new();

    for rec in rows {
        let item = CatalogItem::from(rec);
        buckets
            .entry(letter_bucket(&rec.name))
            .or_default()
            .push(item.clone());
        pairs.push((rec.name.clone(), item));
    }

    for items in buckets.values_mut() {
        items.sort_by_key(|i| i.name.to_lowercase());
    }
    pairs.sort_by_key(|(name, _)| name.to_lowercase());

    for (bucket, items) in &buckets {
        let path = base.join(format!("{bucket}.json"));
        fs::write(path, serde_json::to_string_pretty(items)?)?;
    }

    let metadata = CatalogMetadata {
        size: pairs.len(),
        date: Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string(),
    };
    fs::write(base.join("$.json"), serde_json::to_string_pretty(&metadata)?)?;
    fs::write(base.join("!.json"), serde_json::to_string_pretty(&pairs)?)?;

    tracing::debug!(store, records = rows.len(), "wrote catalog files");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Map, Value};
    use tempfile::TempDir;

    fn record(name: &str) -> CatalogRecord {
        CatalogRecord {
            store: "steam".to_string(),
            name: name.to_string(),
            price: "Free".to_string(),
            image: String::new(),
            href: "https://steam.example/item".to_string(),
            uuid: None,
            platforms: vec![],
            rating: None,
            kind: Some("game".to_string()),
            extra: Map::new(),
        }
    }

    fn read_json(path: &Path) -> Value {
        serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap()
    }

    #[test]
    fn test_write_catalog_buckets_and_sorts() {
        let dir = TempDir::new().unwrap();
        let rows = vec![
            record("zebra run"),
            record("Alpha Quest"),
            record("apex Trial"),
            record("7 Wonders"),
        ];
        write_catalog(dir.path(), "steam", &rows).unwrap();

        let base = dir.path().join("steam");

        let a = read_json(&base.join("a.json"));
        let a_names: Vec<&str> = a
            .as_array()
            .unwrap()
            .iter()
            .map(|i| i["name"].as_str().unwrap())
            .collect();
        assert_eq!(a_names, vec!["Alpha Quest", "apex Trial"]);

        assert_eq!(read_json(&base.join("z.json"))[0]["name"], "zebra run");
        assert_eq!(read_json(&base.join("_.json"))[0]["name"], "7 Wonders");
        assert!(!base.join("b.json").exists());
    }

    #[test]
    fn test_write_catalog_metadata_and_pairs() {
        let dir = TempDir::new().unwrap();
        let rows = vec![record("Beta"), record("alpha")];
        write_catalog(dir.path(), "steam", &rows).unwrap();

        let base = dir.path().join("steam");

        let meta = read_json(&base.join("$.json"));
        assert_eq!(meta["size"], 2);
        let date = meta["date"].as_str().unwrap();
        assert!(date.ends_with('Z'));
        assert!(date.contains('T'));

        let pairs = read_json(&base.join("!.json"));
        let pairs = pairs.as_array().unwrap();
        assert_eq!(pairs.len(), 2);
        // Globally sorted case-insensitively, each entry a [name, item] pair.
        assert_eq!(pairs[0][0], "alpha");
        assert_eq!(pairs[1][0], "Beta");
        assert_eq!(pairs[1][1]["type"], "game");
        assert_eq!(pairs[1][1]["price"], "Free");
    }

    #[test]
    fn test_write_catalog_empty_store() {
        let dir = TempDir::new().unwrap();
        write_catalog(dir.path(), "steam", &[]).unwrap();

        let base = dir.path().join("steam");
        assert_eq!(read_json(&base.join("$.json"))["size"], 0);
        assert_eq!(read_json(&base.join("!.json")), serde_json::json!([]));
    }
}
