//! Two-tier advisory cache: an in-process LRU hot tier in front of a
//! persistent SQLite table.
//!
//! The cache is never load-bearing. Every backend failure is logged and
//! reduced to a miss on reads or `false` on writes, so callers fall back
//! to the upstream fetch.

use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;
use log::{debug, error, info};
use lru::LruCache;
use rusqlite::Connection;
use serde_json::Value;

/// TTL for hourly and current-conditions payloads.
pub const TTL_HOURLY_SECS: u64 = 3600;
/// TTL for daily payloads, which move slower.
pub const TTL_DAILY_SECS: u64 = 10_800;
/// TTL for the municipality mesh.
pub const TTL_MESH_SECS: u64 = 604_800;

pub const BATCH_GET_CHUNK: usize = 100;
pub const BATCH_SET_CHUNK: usize = 25;

const HOT_TIER_CAPACITY: usize = 512;

/// Persistent key-value store with TTL.
///
/// Item layout mirrors the cache table contract: `city_id` primary key,
/// `data` as compact JSON text, `ttl` in epoch seconds, `created_at` ISO.
/// Expired rows are treated as absent on read and overwritten on write.
pub struct CacheStore {
    enabled: bool,
    conn: Option<Mutex<Connection>>,
    hot: Mutex<LruCache<String, (Value, i64)>>,
}

impl std::fmt::Debug for CacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheStore")
            .field("enabled", &self.enabled)
            .finish_non_exhaustive()
    }
}

impl CacheStore {
    /// Open (or create) the backing database. Errors disable the cache
    /// rather than failing the process.
    #[must_use]
    pub fn open(path: &Path, enabled: bool) -> Self {
        if !enabled {
            return Self::disabled();
        }

        let conn = match Connection::open(path) {
            Ok(conn) => match init_schema(&conn) {
                Ok(()) => Some(Mutex::new(conn)),
                Err(err) => {
                    error!("cache schema init failed, disabling cache: {err}");
                    None
                }
            },
            Err(err) => {
                error!("cache open failed at {path:?}, disabling cache: {err}");
                None
            }
        };

        if conn.is_some() {
            info!("cache store ready at {path:?}");
        }

        Self {
            enabled: conn.is_some(),
            conn,
            hot: Mutex::new(LruCache::new(
                NonZeroUsize::new(HOT_TIER_CAPACITY).expect("nonzero capacity"),
            )),
        }
    }

    /// A cache that answers every read with a miss and every write with
    /// `false`.
    #[must_use]
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            conn: None,
            hot: Mutex::new(LruCache::new(
                NonZeroUsize::new(HOT_TIER_CAPACITY).expect("nonzero capacity"),
            )),
        }
    }

    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Eventual-consistency read; expired entries count as misses.
    pub async fn get(&self, key: &str) -> Option<Value> {
        if !self.enabled {
            return None;
        }
        let now = Utc::now().timestamp();

        if let Ok(mut hot) = self.hot.lock() {
            if let Some((value, ttl)) = hot.get(key).cloned() {
                if ttl > now {
                    debug!("cache hit (memory): {key}");
                    return Some(value);
                }
                hot.pop(key);
            }
        }

        let row = {
            let conn = self.conn.as_ref()?.lock().ok()?;
            read_row(&conn, key)
        };

        match row {
            Ok(Some((data, ttl))) => {
                if ttl <= now {
                    debug!("cache expired: {key}");
                    return None;
                }
                match serde_json::from_str::<Value>(&data) {
                    Ok(value) => {
                        debug!("cache hit: {key}");
                        if let Ok(mut hot) = self.hot.lock() {
                            hot.put(key.to_string(), (value.clone(), ttl));
                        }
                        Some(value)
                    }
                    Err(err) => {
                        error!("cache entry for {key} is not valid JSON: {err}");
                        None
                    }
                }
            }
            Ok(None) => {
                debug!("cache miss: {key}");
                None
            }
            Err(err) => {
                error!("cache get failed for {key}: {err}");
                None
            }
        }
    }

    /// At-most-once write; overwrites any previous value for the key.
    pub async fn set(&self, key: &str, value: &Value, ttl_seconds: u64) -> bool {
        if !self.enabled {
            return false;
        }
        let ttl = Utc::now().timestamp() + ttl_seconds as i64;
        let data = value.to_string();

        let result = {
            let Some(conn) = self.conn.as_ref() else {
                return false;
            };
            let Ok(conn) = conn.lock() else {
                return false;
            };
            write_row(&conn, key, &data, ttl)
        };

        match result {
            Ok(()) => {
                if let Ok(mut hot) = self.hot.lock() {
                    hot.put(key.to_string(), (value.clone(), ttl));
                }
                debug!("cache set: {key} ({} bytes, ttl {ttl_seconds}s)", data.len());
                true
            }
            Err(err) => {
                error!("cache set failed for {key}: {err}");
                false
            }
        }
    }

    /// Idempotent delete.
    pub async fn delete(&self, key: &str) -> bool {
        if !self.enabled {
            return false;
        }
        if let Ok(mut hot) = self.hot.lock() {
            hot.pop(key);
        }

        let result = {
            let Some(conn) = self.conn.as_ref() else {
                return false;
            };
            let Ok(conn) = conn.lock() else {
                return false;
            };
            conn.execute("DELETE FROM cache WHERE city_id = ?1", [key])
        };

        match result {
            Ok(_) => true,
            Err(err) => {
                error!("cache delete failed for {key}: {err}");
                false
            }
        }
    }

    /// Batched read, chunked to [`BATCH_GET_CHUNK`] keys per round.
    /// Returns only hits; partial results are allowed.
    pub async fn batch_get(&self, keys: &[String]) -> HashMap<String, Value> {
        let mut results = HashMap::new();
        if !self.enabled || keys.is_empty() {
            return results;
        }
        let now = Utc::now().timestamp();

        for chunk in keys.chunks(BATCH_GET_CHUNK) {
            let rows = {
                let Some(conn) = self.conn.as_ref() else {
                    break;
                };
                let Ok(conn) = conn.lock() else {
                    break;
                };
                read_rows(&conn, chunk)
            };

            match rows {
                Ok(rows) => {
                    for (key, data, ttl) in rows {
                        if ttl <= now {
                            continue;
                        }
                        match serde_json::from_str::<Value>(&data) {
                            Ok(value) => {
                                results.insert(key, value);
                            }
                            Err(err) => error!("cache entry for {key} is not valid JSON: {err}"),
                        }
                    }
                }
                Err(err) => {
                    error!("cache batch get failed: {err}");
                }
            }
        }

        info!(
            "cache batch get: {} requested, {} found",
            keys.len(),
            results.len()
        );
        results
    }

    /// Batched write, chunked to [`BATCH_SET_CHUNK`] items per round.
    /// Every input key is reported; unprocessed items come back `false`.
    pub async fn batch_set(
        &self,
        items: &HashMap<String, Value>,
        ttl_seconds: u64,
    ) -> HashMap<String, bool> {
        let mut outcome: HashMap<String, bool> =
            items.keys().map(|key| (key.clone(), false)).collect();
        if !self.enabled || items.is_empty() {
            return outcome;
        }
        let ttl = Utc::now().timestamp() + ttl_seconds as i64;
        let entries: Vec<(&String, &Value)> = items.iter().collect();

        for chunk in entries.chunks(BATCH_SET_CHUNK) {
            let written = {
                let Some(conn) = self.conn.as_ref() else {
                    break;
                };
                let Ok(mut conn) = conn.lock() else {
                    break;
                };
                write_rows(&mut conn, chunk, ttl)
            };

            match written {
                Ok(()) => {
                    for (key, value) in chunk {
                        outcome.insert((*key).clone(), true);
                        if let Ok(mut hot) = self.hot.lock() {
                            hot.put((*key).clone(), ((*value).clone(), ttl));
                        }
                    }
                }
                Err(err) => {
                    error!("cache batch set chunk failed: {err}");
                }
            }
        }

        outcome
    }
}

fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS cache (
            city_id TEXT NOT NULL PRIMARY KEY,
            data TEXT NOT NULL,
            ttl INTEGER NOT NULL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;
    Ok(())
}

fn read_row(conn: &Connection, key: &str) -> rusqlite::Result<Option<(String, i64)>> {
    let mut statement = conn.prepare("SELECT data, ttl FROM cache WHERE city_id = ?1")?;
    let mut rows = statement.query([key])?;
    match rows.next()? {
        Some(row) => Ok(Some((row.get(0)?, row.get(1)?))),
        None => Ok(None),
    }
}

fn read_rows(conn: &Connection, keys: &[String]) -> rusqlite::Result<Vec<(String, String, i64)>> {
    let placeholders = vec!["?"; keys.len()].join(",");
    let sql =
        format!("SELECT city_id, data, ttl FROM cache WHERE city_id IN ({placeholders})");
    let mut statement = conn.prepare(&sql)?;
    let rows = statement.query_map(rusqlite::params_from_iter(keys), |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?))
    })?;
    rows.collect()
}

fn write_row(conn: &Connection, key: &str, data: &str, ttl: i64) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO cache (city_id, data, ttl, created_at)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![key, data, ttl, Utc::now().to_rfc3339()],
    )?;
    Ok(())
}

fn write_rows(
    conn: &mut Connection,
    chunk: &[(&String, &Value)],
    ttl: i64,
) -> rusqlite::Result<()> {
    let tx = conn.transaction()?;
    for (key, value) in chunk {
        tx.execute(
            "INSERT OR REPLACE INTO cache (city_id, data, ttl, created_at)
             VALUES (?1, ?2, ?3, ?4)",
            rusqlite::params![key, value.to_string(), ttl, Utc::now().to_rfc3339()],
        )?;
    }
    tx.commit()
}
