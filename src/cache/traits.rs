//! Core traits and types for the partition store.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::StorageError;
use crate::request::{RequestKey, Response};

/// The three cache partitions the worker maintains.
///
/// Each maps to a versioned name in the configuration; rotating a version
/// suffix logically invalidates the old partition without touching its
/// entries, and activation deletes partitions outside the current set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
  /// App shell, populated all-or-nothing at install.
  Static,
  /// Runtime-fetched navigation documents and image write-backs.
  Dynamic,
  /// Build artifacts and eagerly precached asset paths.
  Asset,
}

/// A stored response snapshot.
#[derive(Debug, Clone)]
pub struct CacheEntry {
  pub response: Response,
  /// When the snapshot was captured.
  pub stored_at: DateTime<Utc>,
}

/// Named, versioned containers of request-keyed response snapshots.
///
/// Writes are keyed by immutable request identity and overwrites are
/// idempotent, so implementations need no locking beyond their own interior
/// mutability; two concurrent writers for the same key leave an equally
/// valid entry behind (last write wins).
#[async_trait]
pub trait CacheStorage: Send + Sync {
  /// Open a partition, creating it empty if it does not exist.
  async fn open(&self, partition: &str) -> Result<(), StorageError>;

  /// Store a response snapshot, overwriting any entry for the same key.
  /// Creates the partition on first write.
  async fn put(
    &self,
    partition: &str,
    key: &RequestKey,
    response: &Response,
  ) -> Result<(), StorageError>;

  /// Look up a key in a single partition.
  async fn get(
    &self,
    partition: &str,
    key: &RequestKey,
  ) -> Result<Option<CacheEntry>, StorageError>;

  /// Look up a key across all partitions, in partition creation order.
  async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheEntry>, StorageError>;

  /// List all partition names on the origin, in creation order.
  async fn partitions(&self) -> Result<Vec<String>, StorageError>;

  /// Delete a partition and every entry it holds. Returns whether the
  /// partition existed.
  async fn delete_partition(&self, partition: &str) -> Result<bool, StorageError>;
}
