//! Database schema definitions for the crawl cache.

use rusqlite::Connection;

/// SQL schema for the cache database
pub const SCHEMA_SQL: &str = r#"
-- Last durably written snapshot of every record, one row per (store, key)
CREATE TABLE IF NOT EXISTS cached_records (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    store TEXT NOT NULL,
    cache_key TEXT NOT NULL,
    payload TEXT NOT NULL,
    updated_at TEXT NOT NULL,
    UNIQUE(store, cache_key)
);

CREATE INDEX IF NOT EXISTS idx_cached_records_store ON cached_records(store);
"#;

/// Initializes the schema on the given connection
pub fn initialize_schema(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)
}
