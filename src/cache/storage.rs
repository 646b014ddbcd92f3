//! Partition store implementations: in-memory and SQLite.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use tokio::sync::RwLock;

use super::traits::{CacheEntry, CacheStorage};
use crate::error::StorageError;
use crate::request::{RequestKey, Response, ResponseKind};

/// In-memory partition store.
///
/// Mirrors the browser's cache storage semantics closely enough to drive the
/// whole worker under test: partitions are ordered by creation, lookups walk
/// them in that order, writes overwrite by request identity.
#[derive(Default)]
pub struct MemoryStore {
  partitions: RwLock<Vec<MemoryPartition>>,
}

struct MemoryPartition {
  name: String,
  entries: HashMap<RequestKey, CacheEntry>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

#[async_trait]
impl CacheStorage for MemoryStore {
  async fn open(&self, partition: &str) -> Result<(), StorageError> {
    let mut partitions = self.partitions.write().await;
    if !partitions.iter().any(|p| p.name == partition) {
      partitions.push(MemoryPartition {
        name: partition.to_string(),
        entries: HashMap::new(),
      });
    }
    Ok(())
  }

  async fn put(
    &self,
    partition: &str,
    key: &RequestKey,
    response: &Response,
  ) -> Result<(), StorageError> {
    let mut partitions = self.partitions.write().await;
    let idx = match partitions.iter().position(|p| p.name == partition) {
      Some(idx) => idx,
      None => {
        partitions.push(MemoryPartition {
          name: partition.to_string(),
          entries: HashMap::new(),
        });
        partitions.len() - 1
      }
    };

    partitions[idx].entries.insert(
      key.clone(),
      CacheEntry {
        response: response.clone(),
        stored_at: Utc::now(),
      },
    );
    Ok(())
  }

  async fn get(
    &self,
    partition: &str,
    key: &RequestKey,
  ) -> Result<Option<CacheEntry>, StorageError> {
    let partitions = self.partitions.read().await;
    Ok(
      partitions
        .iter()
        .find(|p| p.name == partition)
        .and_then(|p| p.entries.get(key))
        .cloned(),
    )
  }

  async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheEntry>, StorageError> {
    let partitions = self.partitions.read().await;
    Ok(
      partitions
        .iter()
        .find_map(|p| p.entries.get(key))
        .cloned(),
    )
  }

  async fn partitions(&self) -> Result<Vec<String>, StorageError> {
    let partitions = self.partitions.read().await;
    Ok(partitions.iter().map(|p| p.name.clone()).collect())
  }

  async fn delete_partition(&self, partition: &str) -> Result<bool, StorageError> {
    let mut partitions = self.partitions.write().await;
    let before = partitions.len();
    partitions.retain(|p| p.name != partition);
    Ok(partitions.len() != before)
  }
}

/// SQLite-backed partition store.
///
/// Stands in for the browser-managed cache storage when the worker runs
/// outside a browser: snapshots survive restarts and partition deletion
/// cascades to entries.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location under the platform data
  /// directory.
  pub fn open() -> Result<Self, StorageError> {
    let path = Self::default_path()?;

    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }

    Self::from_connection(Connection::open(&path)?)
  }

  /// Open the store at an explicit path.
  pub fn open_at(path: &std::path::Path) -> Result<Self, StorageError> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    Self::from_connection(Connection::open(path)?)
  }

  /// Open a transient in-memory store.
  pub fn open_in_memory() -> Result<Self, StorageError> {
    Self::from_connection(Connection::open_in_memory()?)
  }

  fn from_connection(conn: Connection) -> Result<Self, StorageError> {
    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;
    Ok(store)
  }

  fn default_path() -> Result<std::path::PathBuf, StorageError> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or(StorageError::NoDataDir)?;

    Ok(data_dir.join("museum-cache").join("cache.db"))
  }

  fn run_migrations(&self) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
    conn.execute_batch(CACHE_SCHEMA)?;
    Ok(())
  }
}

/// Schema for the partition and entry tables.
const CACHE_SCHEMA: &str = r#"
PRAGMA foreign_keys = ON;

-- Partition registry; rowid preserves creation order for match_any
CREATE TABLE IF NOT EXISTS partitions (
    name TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots, keyed by partition and hashed request identity
CREATE TABLE IF NOT EXISTS entries (
    partition TEXT NOT NULL,
    request_hash TEXT NOT NULL,
    method TEXT NOT NULL,
    url TEXT NOT NULL,
    status INTEGER NOT NULL,
    kind TEXT NOT NULL,
    headers BLOB NOT NULL,
    body BLOB NOT NULL,
    stored_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (partition, request_hash),
    FOREIGN KEY (partition) REFERENCES partitions(name) ON DELETE CASCADE
);

CREATE INDEX IF NOT EXISTS idx_entries_hash ON entries(request_hash);
"#;

fn kind_as_str(kind: ResponseKind) -> &'static str {
  match kind {
    ResponseKind::Basic => "basic",
    ResponseKind::Cors => "cors",
    ResponseKind::Opaque => "opaque",
  }
}

fn kind_from_str(s: &str) -> ResponseKind {
  match s {
    "cors" => ResponseKind::Cors,
    "opaque" => ResponseKind::Opaque,
    _ => ResponseKind::Basic,
  }
}

fn row_to_entry(
  status: i64,
  kind: String,
  headers: Vec<u8>,
  body: Vec<u8>,
  stored_at: String,
) -> Result<CacheEntry, StorageError> {
  let response = Response {
    status: status as u16,
    headers: serde_json::from_slice(&headers)?,
    body: Bytes::from(body),
    kind: kind_from_str(&kind),
  };
  Ok(CacheEntry {
    response,
    stored_at: parse_datetime(&stored_at)?,
  })
}

#[async_trait]
impl CacheStorage for SqliteStore {
  async fn open(&self, partition: &str) -> Result<(), StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
    conn.execute(
      "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
      params![partition],
    )?;
    Ok(())
  }

  async fn put(
    &self,
    partition: &str,
    key: &RequestKey,
    response: &Response,
  ) -> Result<(), StorageError> {
    let headers = serde_json::to_vec(&response.headers)?;
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    conn.execute(
      "INSERT OR IGNORE INTO partitions (name) VALUES (?)",
      params![partition],
    )?;
    conn.execute(
      "INSERT OR REPLACE INTO entries
         (partition, request_hash, method, url, status, kind, headers, body, stored_at)
       VALUES (?, ?, ?, ?, ?, ?, ?, ?, datetime('now'))",
      params![
        partition,
        key.cache_hash(),
        key.method,
        key.url,
        response.status,
        kind_as_str(response.kind),
        headers,
        response.body.as_ref(),
      ],
    )?;
    Ok(())
  }

  async fn get(
    &self,
    partition: &str,
    key: &RequestKey,
  ) -> Result<Option<CacheEntry>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    let mut stmt = conn.prepare(
      "SELECT status, kind, headers, body, stored_at FROM entries
       WHERE partition = ? AND request_hash = ?",
    )?;

    let row: Option<(i64, String, Vec<u8>, Vec<u8>, String)> = stmt
      .query_row(params![partition, key.cache_hash()], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
        ))
      })
      .ok();

    match row {
      Some((status, kind, headers, body, stored_at)) => {
        Ok(Some(row_to_entry(status, kind, headers, body, stored_at)?))
      }
      None => Ok(None),
    }
  }

  async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheEntry>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    let mut stmt = conn.prepare(
      "SELECT e.status, e.kind, e.headers, e.body, e.stored_at
       FROM entries e
       INNER JOIN partitions p ON p.name = e.partition
       WHERE e.request_hash = ?
       ORDER BY p.rowid
       LIMIT 1",
    )?;

    let row: Option<(i64, String, Vec<u8>, Vec<u8>, String)> = stmt
      .query_row(params![key.cache_hash()], |row| {
        Ok((
          row.get(0)?,
          row.get(1)?,
          row.get(2)?,
          row.get(3)?,
          row.get(4)?,
        ))
      })
      .ok();

    match row {
      Some((status, kind, headers, body, stored_at)) => {
        Ok(Some(row_to_entry(status, kind, headers, body, stored_at)?))
      }
      None => Ok(None),
    }
  }

  async fn partitions(&self) -> Result<Vec<String>, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;

    let mut stmt = conn.prepare("SELECT name FROM partitions ORDER BY rowid")?;
    let names = stmt
      .query_map([], |row| row.get(0))?
      .collect::<Result<Vec<String>, _>>()?;

    Ok(names)
  }

  async fn delete_partition(&self, partition: &str) -> Result<bool, StorageError> {
    let conn = self.conn.lock().map_err(|_| StorageError::LockPoisoned)?;
    let deleted = conn.execute("DELETE FROM partitions WHERE name = ?", params![partition])?;
    Ok(deleted > 0)
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>, StorageError> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| StorageError::Timestamp {
      value: s.to_string(),
      source: e,
    })
}
