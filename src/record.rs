//! The normalized catalog record shared by every storefront adapter.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// A single storefront listing after normalization.
///
/// Adapters produce these; the cache persists them as JSON payloads and the
/// merge engine folds clusters of them into unified records. The `name`
/// invariant is enforced at the adapter boundary: a record with an empty
/// title must be quarantined, never emitted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogRecord {
    /// Source store identifier (e.g. "steam").
    pub store: String,

    /// Display title. Non-empty for any record that exists.
    pub name: String,

    /// Display price: a currency-formatted amount, "Free", or "Unavailable".
    pub price: String,

    /// Cover/header image URL. May be empty when the store has none.
    #[serde(default)]
    pub image: String,

    /// Store page URL. Always resolvable; adapters fall back to the store
    /// root when no item page is known.
    pub href: String,

    /// Store-native identifier. Primary dedupe key when present.
    #[serde(default)]
    pub uuid: Option<String>,

    /// Canonical platform names, case-insensitively unique, first-seen
    /// casing and insertion order preserved.
    #[serde(default)]
    pub platforms: Vec<String>,

    /// Normalized content-rating tier, or absent.
    #[serde(default)]
    pub rating: Option<String>,

    /// Item kind (e.g. "game"). The merge engine may fill this in.
    #[serde(default, rename = "type")]
    pub kind: Option<String>,

    /// Open provenance bag. Raw adapters leave this empty except for an
    /// optional `source_store` tag; the merge engine populates `sources`,
    /// `prices` and `uuids`.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl CatalogRecord {
    /// The key used to deduplicate and version this record within one
    /// store's cache: the store-native uuid when present, else the href.
    pub fn cache_key(&self) -> String {
        match &self.uuid {
            Some(uuid) if !uuid.is_empty() => uuid.clone(),
            _ => self.href.clone(),
        }
    }

    /// The provenance store name: the `source_store` tag when a loader set
    /// one (e.g. "psn-ps5"), else the base store.
    pub fn source_store(&self) -> &str {
        self.extra
            .get("source_store")
            .and_then(Value::as_str)
            .unwrap_or(&self.store)
    }
}

/// The record shape written into catalog files: a [`CatalogRecord`] minus
/// its `store` and `extra` fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogItem {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    pub price: String,
    pub image: String,
    pub href: String,
    pub uuid: Option<String>,
    pub platforms: Vec<String>,
    pub rating: Option<String>,
}

impl From<&CatalogRecord> for CatalogItem {
    fn from(rec: &CatalogRecord) -> Self {
        Self {
            name: rec.name.clone(),
            kind: rec.kind.clone(),
            price: rec.price.clone(),
            image: rec.image.clone(),
            href: rec.href.clone(),
            uuid: rec.uuid.clone(),
            platforms: rec.platforms.clone(),
            rating: rec.rating.clone(),
        }
    }
}
