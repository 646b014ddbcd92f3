//! The offline cache worker: lifecycle state machine and fetch policy.
//!
//! [`CacheWorker`] owns the whole caching policy. The platform it runs on is
//! injected as capabilities: a [`CacheStorage`](crate::cache::CacheStorage)
//! for partitions, a [`Network`](crate::net::Network) for fetches and a
//! [`Clients`] handle for taking control of open pages. That keeps every
//! lifecycle phase and every fetch decision exercisable under test without a
//! browser runtime.

mod fetch;
mod lifecycle;

pub use fetch::{ServeSource, Served};

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cache::CacheStorage;
use crate::config::CacheConfig;
use crate::error::CacheError;
use crate::net::Network;

/// Lifecycle states of a worker instance.
///
/// A deployed version moves `Unregistered → Installing → Installed →
/// Activating → Active`; it never transitions itself out of `Active`, only a
/// replacement instance marks it `Redundant`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
  Unregistered,
  Installing,
  /// Installed and waiting for promotion.
  Installed,
  Activating,
  Active,
  /// Replaced by a newer instance, or failed to install.
  Redundant,
}

/// Control over the open page instances on the origin.
#[async_trait]
pub trait Clients: Send + Sync {
  /// Take over all open pages so they are governed by this worker without
  /// requiring a reload.
  async fn claim(&self);
}

/// Clients handle for hosts with no pages to govern.
pub struct NoClients;

#[async_trait]
impl Clients for NoClients {
  async fn claim(&self) {}
}

/// The offline cache manager.
pub struct CacheWorker<S, N, C = NoClients> {
  config: CacheConfig,
  store: S,
  net: N,
  clients: C,
  state: Mutex<WorkerState>,
  skip_waiting: AtomicBool,
}

impl<S, N, C> CacheWorker<S, N, C>
where
  S: CacheStorage,
  N: Network,
  C: Clients,
{
  pub fn new(config: CacheConfig, store: S, net: N, clients: C) -> Self {
    Self {
      config,
      store,
      net,
      clients,
      state: Mutex::new(WorkerState::Unregistered),
      skip_waiting: AtomicBool::new(false),
    }
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  pub fn store(&self) -> &S {
    &self.store
  }

  pub fn network(&self) -> &N {
    &self.net
  }

  pub fn state(&self) -> WorkerState {
    *self.lock_state()
  }

  /// Whether install asked to take control without waiting for old
  /// instances to release their clients.
  pub fn skip_waiting_requested(&self) -> bool {
    self.skip_waiting.load(Ordering::SeqCst)
  }

  /// Mark this instance as replaced. Valid from any state.
  pub fn retire(&self) {
    *self.lock_state() = WorkerState::Redundant;
  }

  fn lock_state(&self) -> std::sync::MutexGuard<'_, WorkerState> {
    self.state.lock().unwrap_or_else(|e| e.into_inner())
  }

  fn transition(&self, to: WorkerState) -> Result<(), CacheError> {
    use WorkerState::*;

    let mut state = self.lock_state();
    let allowed = matches!(
      (*state, to),
      (Unregistered, Installing)
        | (Installing, Installed)
        | (Installed, Activating)
        | (Activating, Active)
        | (_, Redundant)
    );

    if !allowed {
      return Err(CacheError::InvalidTransition { from: *state, to });
    }

    *state = to;
    Ok(())
  }
}
