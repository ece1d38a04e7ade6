//! SQLite-based document cache.
//!
//! Stores generated metadata documents (and saved semantic models) so that
//! repeated runs over unchanged tables and requests skip sampling and LLM
//! calls. The cache is stored in `~/.tablescribe/cache.db`.
//!
//! # Design
//!
//! - Key-value store with JSON values, indexed by table
//! - No TTL - entries persist until cleared or overwritten
//! - Versioned - auto-clears on version mismatch
//!
//! # Key Format
//!
//! ```text
//! {conn_hash}:doc:{db.schema.table}:{request_hash}  -> MetadataDocument
//! model:{model_name}                                -> SemanticModel
//! ```

mod hash;
pub use hash::{fingerprint, RequestFingerprint, FINGERPRINT_LEN};

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use tracing::debug;

use crate::document::MetadataDocument;
use crate::metadata::TableHandle;

/// Current cache schema version. Bump this when the cache format changes.
const CACHE_VERSION: i32 = 1;

/// Errors that can occur during cache operations.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Failed to determine cache directory")]
    NoCacheDir,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type CacheResult<T> = Result<T, CacheError>;

/// One cached entry, without its value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    /// Qualified table name; empty for non-document entries.
    pub table: String,
    pub created_at: i64,
    pub size_bytes: usize,
}

/// Cache statistics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of entries in the cache.
    pub entry_count: usize,
    /// Number of distinct tables with cached documents.
    pub table_count: usize,
    /// Total size of all values in bytes.
    pub total_size_bytes: usize,
}

/// SQLite-based document cache.
pub struct DocumentCache {
    conn: Connection,
}

fn now() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs() as i64)
        .unwrap_or(0)
}

impl DocumentCache {
    /// Open or create the cache database at the default location.
    pub fn open() -> CacheResult<Self> {
        Self::open_at(&Self::cache_path()?)
    }

    /// Open or create the cache database at `path`.
    ///
    /// If the cache version doesn't match, it's automatically cleared.
    pub fn open_at(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path)?;
        let cache = Self { conn };
        cache.init()?;
        debug!(path = %path.display(), "Document cache opened");
        Ok(cache)
    }

    /// Open an in-memory cache (for testing).
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        let cache = Self { conn };
        cache.init()?;
        Ok(cache)
    }

    /// Get the path to the cache database.
    pub fn cache_path() -> CacheResult<PathBuf> {
        let base = dirs::home_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(base.join(".tablescribe").join("cache.db"))
    }

    /// Initialize the cache schema and check version.
    fn init(&self) -> CacheResult<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS cache (
                key TEXT PRIMARY KEY,
                table_name TEXT NOT NULL DEFAULT '',
                value TEXT NOT NULL,
                created_at INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS cache_table ON cache (table_name);

            CREATE TABLE IF NOT EXISTS meta (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );
            ",
        )?;

        let stored_version: Option<i32> = self
            .conn
            .query_row("SELECT value FROM meta WHERE key = 'version'", [], |row| {
                let s: String = row.get(0)?;
                Ok(s.parse().unwrap_or(0))
            })
            .optional()?;

        match stored_version {
            Some(v) if v == CACHE_VERSION => {}
            Some(v) => {
                debug!(stored = v, current = CACHE_VERSION, "Cache version changed; clearing");
                self.clear_all()?;
                self.set_version()?;
            }
            None => self.set_version()?,
        }

        Ok(())
    }

    fn set_version(&self) -> CacheResult<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO meta (key, value) VALUES ('version', ?)",
            params![CACHE_VERSION.to_string()],
        )?;
        Ok(())
    }

    /// Get a value from the cache.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        let json: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM cache WHERE key = ?",
                params![key],
                |row| row.get(0),
            )
            .optional()?;

        match json {
            Some(s) => Ok(Some(serde_json::from_str(&s)?)),
            None => Ok(None),
        }
    }

    /// Set a value in the cache.
    pub fn set<T: Serialize>(&self, key: &str, value: &T) -> CacheResult<()> {
        self.set_for_table(key, "", value)
    }

    fn set_for_table<T: Serialize>(&self, key: &str, table: &str, value: &T) -> CacheResult<()> {
        let json = serde_json::to_string(value)?;
        self.conn.execute(
            "INSERT OR REPLACE INTO cache (key, table_name, value, created_at) VALUES (?, ?, ?, ?)",
            params![key, table, json, now()],
        )?;
        Ok(())
    }

    /// Cached document for `key`, if any.
    pub fn get_document(&self, key: &str) -> CacheResult<Option<MetadataDocument>> {
        self.get(key)
    }

    /// Store a document. Partial documents are not cached.
    pub fn put_document(&self, key: &str, document: &MetadataDocument) -> CacheResult<bool> {
        if document.processing_stats.partial {
            debug!(table = %document.table, "Not caching partial document");
            return Ok(false);
        }
        self.set_for_table(key, &document.table.qualified_name(), document)?;
        Ok(true)
    }

    /// Delete a value from the cache.
    pub fn delete(&self, key: &str) -> CacheResult<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM cache WHERE key = ?", params![key])?;
        Ok(rows > 0)
    }

    /// Delete all entries matching a key prefix.
    pub fn delete_prefix(&self, prefix: &str) -> CacheResult<usize> {
        let pattern = format!("{}%", prefix);
        let rows = self
            .conn
            .execute("DELETE FROM cache WHERE key LIKE ?", params![pattern])?;
        Ok(rows)
    }

    /// Delete every cached document of one table.
    pub fn clear_table(&self, table: &TableHandle) -> CacheResult<usize> {
        let rows = self.conn.execute(
            "DELETE FROM cache WHERE table_name = ?",
            params![table.qualified_name()],
        )?;
        Ok(rows)
    }

    /// Clear all cache entries (but keep metadata).
    pub fn clear_all(&self) -> CacheResult<()> {
        self.conn.execute("DELETE FROM cache", [])?;
        Ok(())
    }

    /// List entries, newest first.
    pub fn entries(&self) -> CacheResult<Vec<CacheEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, table_name, created_at, LENGTH(value) FROM cache ORDER BY created_at DESC, key",
        )?;
        let entries = stmt
            .query_map([], |row| {
                Ok(CacheEntry {
                    key: row.get(0)?,
                    table: row.get(1)?,
                    created_at: row.get(2)?,
                    size_bytes: row.get::<_, i64>(3)? as usize,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheResult<CacheStats> {
        let (entry_count, table_count, total_size): (i64, i64, i64) = self.conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT NULLIF(table_name, '')), COALESCE(SUM(LENGTH(value)), 0) FROM cache",
            [],
            |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?;

        Ok(CacheStats {
            entry_count: entry_count as usize,
            table_count: table_count as usize,
            total_size_bytes: total_size as usize,
        })
    }
}

/// Helper for generating cache keys.
pub struct CacheKey;

impl CacheKey {
    /// Fingerprint a connection without storing its (possibly secret) string.
    pub fn hash_connection(driver: &str, conn_str: &str) -> CacheResult<String> {
        Ok(fingerprint(&(driver, conn_str))?)
    }

    /// Key for a document generated for `table` under `request`.
    pub fn document(
        conn_hash: &str,
        table: &TableHandle,
        request: &RequestFingerprint<'_>,
    ) -> CacheResult<String> {
        Ok(format!(
            "{}:doc:{}:{}",
            conn_hash,
            table.qualified_name(),
            request.digest()?
        ))
    }

    /// Key for a saved semantic model.
    pub fn semantic_model(name: &str) -> String {
        format!("model:{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::{InclusionConfig, MetadataAssembler, RunInfo};
    use crate::metadata::ColumnDescriptor;
    use crate::pipeline::MetadataRequest;
    use crate::profiling::ProfileOutcome;
    use crate::sampling::SamplingBudget;

    fn document(table: &TableHandle) -> MetadataDocument {
        let outcome =
            ProfileOutcome::schema_only(&[ColumnDescriptor::new("id", "INT64")], vec![]);
        MetadataAssembler::assemble(
            table,
            &outcome,
            &[],
            &InclusionConfig::none(),
            RunInfo::default(),
        )
    }

    #[test]
    fn test_cache_open_in_memory() {
        let cache = DocumentCache::open_in_memory().unwrap();
        let stats = cache.stats().unwrap();
        assert_eq!(stats.entry_count, 0);
    }

    #[test]
    fn test_cache_get_set() {
        let cache = DocumentCache::open_in_memory().unwrap();

        cache.set("test:key", &vec!["a", "b", "c"]).unwrap();

        let value: Option<Vec<String>> = cache.get("test:key").unwrap();
        assert_eq!(
            value,
            Some(vec!["a".to_string(), "b".to_string(), "c".to_string()])
        );

        let missing: Option<String> = cache.get("nonexistent").unwrap();
        assert!(missing.is_none());
    }

    #[test]
    fn test_document_roundtrip_and_clear_table() {
        let cache = DocumentCache::open_in_memory().unwrap();
        let orders = TableHandle::new("", "shop", "orders");
        let users = TableHandle::new("", "shop", "users");
        let conn = CacheKey::hash_connection("duckdb", "./shop.db").unwrap();
        let (request, budget) = (MetadataRequest::default(), SamplingBudget::default());
        let fp = RequestFingerprint {
            request: &request,
            budget: &budget,
            model: "gpt-4o",
        };

        let key = CacheKey::document(&conn, &orders, &fp).unwrap();
        assert!(cache.put_document(&key, &document(&orders)).unwrap());
        let users_key = CacheKey::document(&conn, &users, &fp).unwrap();
        cache.put_document(&users_key, &document(&users)).unwrap();

        let restored = cache.get_document(&key).unwrap().unwrap();
        assert_eq!(restored, document(&orders));
        assert_eq!(cache.stats().unwrap().table_count, 2);

        assert_eq!(cache.clear_table(&orders).unwrap(), 1);
        assert!(cache.get_document(&key).unwrap().is_none());
        assert!(cache.get_document(&users_key).unwrap().is_some());
    }

    #[test]
    fn test_partial_documents_are_not_cached() {
        let cache = DocumentCache::open_in_memory().unwrap();
        let table = TableHandle::new("", "shop", "orders");
        let mut doc = document(&table);
        doc.processing_stats.partial = true;

        assert!(!cache.put_document("k", &doc).unwrap());
        assert!(cache.get_document("k").unwrap().is_none());
    }

    #[test]
    fn test_cache_key_helpers() {
        let conn = CacheKey::hash_connection("duckdb", "./test.db").unwrap();
        assert_eq!(conn.len(), FINGERPRINT_LEN);
        assert_ne!(conn, CacheKey::hash_connection("duckdb", "./other.db").unwrap());
        assert_ne!(conn, CacheKey::hash_connection("postgres", "./test.db").unwrap());

        let table = TableHandle::new("db", "main", "orders");
        let request = MetadataRequest::default();
        let budget = SamplingBudget::default();
        let narrower = MetadataRequest {
            max_partitions: Some(1),
            ..Default::default()
        };
        let a = CacheKey::document(
            &conn,
            &table,
            &RequestFingerprint { request: &request, budget: &budget, model: "gpt-4o" },
        )
        .unwrap();
        let b = CacheKey::document(
            &conn,
            &table,
            &RequestFingerprint { request: &narrower, budget: &budget, model: "gpt-4o" },
        )
        .unwrap();
        assert!(a.starts_with(&format!("{}:doc:db.main.orders:", conn)));
        assert_ne!(a, b);

        assert_eq!(CacheKey::semantic_model("shop"), "model:shop");
    }

    #[test]
    fn test_cache_delete_prefix() {
        let cache = DocumentCache::open_in_memory().unwrap();

        cache.set("conn1:doc:a", &"t1").unwrap();
        cache.set("conn1:doc:b", &"t2").unwrap();
        cache.set("conn2:doc:a", &"t3").unwrap();

        assert_eq!(cache.delete_prefix("conn1:").unwrap(), 2);
        assert!(cache.get::<String>("conn2:doc:a").unwrap().is_some());
        assert_eq!(cache.entries().unwrap().len(), 1);
    }
}
