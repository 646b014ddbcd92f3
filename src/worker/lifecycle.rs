//! Install and activate phases.

use futures::future::try_join_all;
use tracing::{info, warn};

use super::{CacheWorker, Clients, WorkerState};
use crate::cache::{CacheStorage, Partition};
use crate::error::CacheError;
use crate::net::Network;
use crate::request::Request;

impl<S, N, C> CacheWorker<S, N, C>
where
  S: CacheStorage,
  N: Network,
  C: Clients,
{
  /// Run the install phase.
  ///
  /// Precaches the app shell into the static partition and the eagerly
  /// cacheable asset paths into the asset partition. The shell batch is
  /// all-or-nothing: any fetch, validation or write failure aborts the
  /// install and leaves no partial partition behind for later cache-first
  /// lookups to hit. Wildcard asset patterns are configuration only at this
  /// stage; they get populated reactively on first access.
  ///
  /// Also records the preference to take control immediately instead of
  /// waiting for old instances to release their clients, trading a possible
  /// old-page/new-worker mismatch for faster update rollout.
  pub async fn install(&self) -> Result<(), CacheError> {
    self.transition(WorkerState::Installing)?;
    self
      .skip_waiting
      .store(true, std::sync::atomic::Ordering::SeqCst);

    let result = self.run_install_batches().await;
    if let Err(e) = result {
      warn!(error = %e, "install failed");
      self.retire();
      return Err(e);
    }

    self.transition(WorkerState::Installed)
  }

  async fn run_install_batches(&self) -> Result<(), CacheError> {
    let names = &self.config().partitions;

    info!(partition = %names.name(Partition::Static), "caching static app shell");
    let shell: Vec<&str> = self.config().app_shell.iter().map(String::as_str).collect();
    self.precache(names.name(Partition::Static), &shell).await?;

    info!(partition = %names.name(Partition::Asset), "caching app assets");
    let eager = self.config().eager_assets();
    self.precache(names.name(Partition::Asset), &eager).await
  }

  /// Populate one partition all-or-nothing: fetch every path, validate
  /// every response, then write. A partially written partition is wiped
  /// before the error is reported, so a missing resource keeps missing
  /// instead of being shadowed by an incomplete install.
  async fn precache(&self, partition: &str, paths: &[&str]) -> Result<(), CacheError> {
    self.store().open(partition).await?;

    let mut requests = Vec::with_capacity(paths.len());
    for path in paths {
      let url = self
        .config()
        .resolve(path)
        .map_err(|e| CacheError::InstallAborted {
          url: (*path).to_string(),
          reason: e.to_string(),
        })?;
      requests.push(Request::get(url));
    }

    let fetches = requests.iter().map(|request| async move {
      let response =
        self
          .network()
          .fetch(request)
          .await
          .map_err(|e| CacheError::InstallAborted {
            url: request.url.to_string(),
            reason: e.to_string(),
          })?;

      if !response.is_cacheable() {
        return Err(CacheError::InstallAborted {
          url: request.url.to_string(),
          reason: format!("response not cacheable (status {})", response.status),
        });
      }

      Ok((request, response))
    });

    let responses = match try_join_all(fetches).await {
      Ok(responses) => responses,
      Err(e) => {
        self.wipe(partition).await;
        return Err(e);
      }
    };

    for (request, response) in &responses {
      if let Err(e) = self.store().put(partition, &request.key(), response).await {
        self.wipe(partition).await;
        return Err(e.into());
      }
    }

    Ok(())
  }

  async fn wipe(&self, partition: &str) {
    if let Err(e) = self.store().delete_partition(partition).await {
      warn!(partition = %partition, error = %e, "failed to wipe partition after aborted install");
    }
  }

  /// Run the activate phase.
  ///
  /// Ensures the three current partitions exist, deletes every partition
  /// whose name is outside the current whitelist, then claims all open
  /// pages so this worker governs them without a reload.
  pub async fn activate(&self) -> Result<(), CacheError> {
    self.transition(WorkerState::Activating)?;

    let whitelist = self.config().partitions.whitelist();
    for name in whitelist {
      self.store().open(name).await?;
    }

    for name in self.store().partitions().await? {
      if !whitelist.contains(&name.as_str()) {
        info!(partition = %name, "deleting old cache partition");
        self.store().delete_partition(&name).await?;
      }
    }

    self.clients.claim().await;
    self.transition(WorkerState::Active)?;
    info!("worker activated and controlling clients");
    Ok(())
  }
}
