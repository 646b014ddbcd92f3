//! Offline cache manager for the museum gallery PWA.
//!
//! This crate implements the caching core that sits between the gallery and
//! the network: it precaches the app shell at install, sweeps stale cache
//! partitions at activation, and decides per intercepted request whether to
//! serve from cache, hit the network, or degrade to a fallback (offline
//! document, placeholder image, or a retryable 408).
//!
//! The policy is host-independent: cache storage, network access and client
//! control are injected capabilities, so the whole decision tree runs under
//! test against fakes.
//!
//! ```no_run
//! use museum_cache::{CacheConfig, CacheWorker, HttpNetwork, NoClients, SqliteStore};
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = CacheConfig::load(None)?;
//! let worker = CacheWorker::new(
//!   config,
//!   SqliteStore::open()?,
//!   HttpNetwork::new()?,
//!   NoClients,
//! );
//!
//! worker.install().await?;
//! worker.activate().await?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod error;
pub mod net;
pub mod request;
pub mod worker;

pub use cache::{CacheEntry, CacheStorage, MemoryStore, Partition, SqliteStore};
pub use config::{CacheConfig, PartitionNames};
pub use error::{CacheError, ConfigError, NetworkError, StorageError};
pub use net::{HttpNetwork, Network};
pub use request::{Request, RequestDestination, RequestKey, RequestMode, Response, ResponseKind};
pub use worker::{CacheWorker, Clients, NoClients, ServeSource, Served, WorkerState};
