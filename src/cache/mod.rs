//! Cache partitions and the stores that hold them.
//!
//! This module provides the storage side of the worker:
//! - Named, versioned partitions of request-keyed response snapshots
//! - Cross-partition lookup in partition creation order
//! - An in-memory store for tests and a SQLite store for persistence

mod storage;
mod traits;

pub use storage::{MemoryStore, SqliteStore};
pub use traits::{CacheEntry, CacheStorage, Partition};
