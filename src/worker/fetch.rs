//! Fetch interception.
//!
//! One ordered decision tree: navigation, then images, then everything else.
//! The central contract is that an intercepted request always resolves to a
//! response, never to an error; failures degrade to the offline document, a
//! placeholder image, or a retryable 408.

use tracing::{debug, warn};

use super::{CacheWorker, Clients, WorkerState};
use crate::cache::{CacheEntry, CacheStorage, Partition};
use crate::net::Network;
use crate::request::{Request, RequestDestination, RequestKey, Response};

/// Which branch of the policy produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServeSource {
  /// Live network response.
  Network,
  /// Stored snapshot from a cache partition.
  Cache,
  /// The offline fallback document (cached copy, or a synthesized notice
  /// when the fallback itself was never cached).
  OfflineFallback,
  /// Synthesized placeholder image.
  ImagePlaceholder,
  /// Terminal "not available offline" notice for non-image subresources
  /// requested as images.
  Unavailable,
  /// Terminal, retryable network failure for generic subresources.
  NetworkError,
}

/// A response plus the branch that produced it.
#[derive(Debug, Clone)]
pub struct Served {
  pub response: Response,
  pub source: ServeSource,
}

impl Served {
  fn from(source: ServeSource, response: Response) -> Self {
    Self { response, source }
  }
}

enum RequestClass {
  Navigation,
  Image,
  Generic,
}

fn classify(request: &Request) -> RequestClass {
  if request.is_navigation() {
    RequestClass::Navigation
  } else if request.destination == RequestDestination::Image {
    RequestClass::Image
  } else {
    RequestClass::Generic
  }
}

impl<S, N, C> CacheWorker<S, N, C>
where
  S: CacheStorage,
  N: Network,
  C: Clients,
{
  /// Intercept one request.
  ///
  /// Returns `None` when the request is not intercepted at all: cross-origin
  /// requests pass through untouched, and a worker that is not active yet
  /// does not govern any page. Otherwise the result is always `Some`; every
  /// policy branch terminates in a response.
  pub async fn handle_fetch(&self, request: &Request) -> Option<Served> {
    if self.state() != WorkerState::Active {
      return None;
    }
    if !request.is_same_origin(&self.config().origin) {
      return None;
    }

    let served = match classify(request) {
      RequestClass::Navigation => self.serve_navigation(request).await,
      RequestClass::Image => self.serve_image(request).await,
      RequestClass::Generic => self.serve_generic(request).await,
    };
    Some(served)
  }

  /// Navigation: network-first, falling back to any cached copy, then to
  /// the offline document. Always yields a renderable document.
  async fn serve_navigation(&self, request: &Request) -> Served {
    match self.network().fetch(request).await {
      Ok(response) => {
        if response.status == 200 {
          self.write_back(Partition::Dynamic, request, &response).await;
        }
        Served::from(ServeSource::Network, response)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "navigation fetch failed, serving from cache");
        if let Some(entry) = self.lookup(&request.key()).await {
          return Served::from(ServeSource::Cache, entry.response);
        }
        self.serve_offline_fallback().await
      }
    }
  }

  /// Images: cache-first. A hit is served with no network round trip and no
  /// freshness check; a validated miss is written back; total failure gets a
  /// placeholder instead of an error.
  async fn serve_image(&self, request: &Request) -> Served {
    if let Some(entry) = self.lookup(&request.key()).await {
      return Served::from(ServeSource::Cache, entry.response);
    }

    match self.network().fetch(request).await {
      Ok(response) => {
        if response.is_cacheable() {
          self.write_back(Partition::Dynamic, request, &response).await;
        }
        Served::from(ServeSource::Network, response)
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "network request failed");
        if self.config().is_image_url(&request.url) {
          Served::from(ServeSource::ImagePlaceholder, placeholder_image())
        } else {
          Served::from(
            ServeSource::Unavailable,
            Response::text(200, "Resource not available offline"),
          )
        }
      }
    }
  }

  /// Everything else: cache-first with selective write-back. Only responses
  /// under the assets path or with a script/style extension are stored, so
  /// miscellaneous JSON and API responses do not pollute the cache.
  async fn serve_generic(&self, request: &Request) -> Served {
    if let Some(entry) = self.lookup(&request.key()).await {
      return Served::from(ServeSource::Cache, entry.response);
    }

    match self.network().fetch(request).await {
      Ok(response) => {
        if response.is_cacheable() && self.config().is_asset_url(&request.url) {
          self.write_back(Partition::Asset, request, &response).await;
        }
        Served::from(ServeSource::Network, response)
      }
      Err(e) => {
        warn!(url = %request.url, error = %e, "network request failed");
        Served::from(
          ServeSource::NetworkError,
          Response::text(408, "Network error occurred"),
        )
      }
    }
  }

  async fn serve_offline_fallback(&self) -> Served {
    if let Ok(url) = self.config().resolve(&self.config().offline_fallback) {
      let key = RequestKey::get(url.as_str());
      if let Some(entry) = self.lookup(&key).await {
        return Served::from(ServeSource::OfflineFallback, entry.response);
      }
    }

    // The fallback document itself was never cached; a navigation still
    // must resolve to a renderable document.
    Served::from(ServeSource::OfflineFallback, offline_notice())
  }

  /// Cross-partition lookup. Storage failures degrade to a miss; the cache
  /// is an optimization, not a correctness-critical store.
  async fn lookup(&self, key: &RequestKey) -> Option<CacheEntry> {
    match self.store().match_any(key).await {
      Ok(entry) => entry,
      Err(e) => {
        warn!(key = %key, error = %e, "cache lookup failed");
        None
      }
    }
  }

  /// Best-effort write-back of a response snapshot. A failed write is
  /// logged and dropped; the response has already been handed to the page.
  async fn write_back(&self, partition: Partition, request: &Request, response: &Response) {
    let name = self.config().partitions.name(partition);
    if let Err(e) = self.store().put(name, &request.key(), response).await {
      warn!(partition = %name, url = %request.url, error = %e, "cache write-back dropped");
    }
  }
}

/// Placeholder served when an image can be reached neither from cache nor
/// from network. Carries the gallery's primary-language caption.
fn placeholder_image() -> Response {
  Response::ok(
    "image/svg+xml",
    concat!(
      "<svg width=\"400\" height=\"300\" xmlns=\"http://www.w3.org/2000/svg\">",
      "<rect width=\"400\" height=\"300\" fill=\"#FBDB93\" />",
      "<text x=\"50%\" y=\"50%\" font-family=\"Arial\" font-size=\"24\" ",
      "fill=\"#641B2E\" text-anchor=\"middle\">الصورة غير متوفرة</text>",
      "</svg>"
    )
    .as_bytes()
    .to_vec(),
  )
}

/// Minimal offline notice for the corner where the fallback document was
/// never cached.
fn offline_notice() -> Response {
  Response::ok(
    "text/html",
    concat!(
      "<!DOCTYPE html><html lang=\"ar\" dir=\"rtl\"><head>",
      "<meta charset=\"utf-8\"><title>غير متصل</title></head>",
      "<body><p>أنت غير متصل بالإنترنت حالياً.</p></body></html>"
    )
    .as_bytes()
    .to_vec(),
  )
}

#[cfg(test)]
mod tests {
  use super::super::NoClients;
  use super::*;
  use crate::cache::MemoryStore;
  use crate::config::CacheConfig;
  use crate::error::StorageError;
  use crate::net::testing::FakeNetwork;
  use crate::request::ResponseKind;
  use async_trait::async_trait;
  use url::Url;

  fn shell_config() -> CacheConfig {
    CacheConfig {
      app_shell: vec!["/".to_string(), "/offline.html".to_string()],
      ..CacheConfig::default()
    }
  }

  fn url(s: &str) -> Url {
    Url::parse(s).unwrap()
  }

  async fn active_worker(
    config: CacheConfig,
  ) -> CacheWorker<MemoryStore, FakeNetwork, NoClients> {
    let net = FakeNetwork::new();
    for path in &config.app_shell {
      net.route(
        &format!("http://localhost:5173{}", path),
        Response::ok("text/html", format!("<html>{}</html>", path).into_bytes()),
      );
    }
    let w = CacheWorker::new(config, MemoryStore::new(), net, NoClients);
    w.install().await.unwrap();
    w.activate().await.unwrap();
    w
  }

  #[tokio::test]
  async fn test_navigation_success_is_served_live_and_cached() {
    let w = active_worker(shell_config()).await;
    w.network().route(
      "http://localhost:5173/index.html",
      Response::ok("text/html", "<html>gallery</html>".as_bytes().to_vec()),
    );

    let request = Request::navigate(url("http://localhost:5173/index.html"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Network);
    assert_eq!(served.response.body.as_ref(), b"<html>gallery</html>");

    let entry = w
      .store()
      .get("museum-dynamic-v2", &request.key())
      .await
      .unwrap()
      .expect("navigation response should be written to the dynamic partition");
    assert_eq!(entry.response.body, served.response.body);
  }

  #[tokio::test]
  async fn test_navigation_non_200_is_served_but_not_cached() {
    let w = active_worker(shell_config()).await;
    w.network().route(
      "http://localhost:5173/missing",
      Response::text(404, "not found"),
    );

    let request = Request::navigate(url("http://localhost:5173/missing"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Network);
    assert_eq!(served.response.status, 404);
    assert!(w.store().match_any(&request.key()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_navigation_offline_serves_cached_copy() {
    let w = active_worker(shell_config()).await;
    let request = Request::navigate(url("http://localhost:5173/index.html"));
    w.network().route(
      "http://localhost:5173/index.html",
      Response::ok("text/html", "<html>cached nav</html>".as_bytes().to_vec()),
    );
    // Warm the dynamic partition, then lose the network
    w.handle_fetch(&request).await.unwrap();
    w.network().set_offline(true);

    let served = w.handle_fetch(&request).await.unwrap();
    assert_eq!(served.source, ServeSource::Cache);
    assert_eq!(served.response.body.as_ref(), b"<html>cached nav</html>");
  }

  #[tokio::test]
  async fn test_navigation_offline_without_cache_serves_fallback_document() {
    let w = active_worker(shell_config()).await;
    w.network().set_offline(true);

    let request = Request::navigate(url("http://localhost:5173/gallery/amphora"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::OfflineFallback);
    // Body equals the precached /offline.html content
    assert_eq!(served.response.body.as_ref(), b"<html>/offline.html</html>");
  }

  #[tokio::test]
  async fn test_navigation_offline_without_fallback_synthesizes_notice() {
    let config = CacheConfig {
      app_shell: vec!["/".to_string()],
      ..CacheConfig::default()
    };
    let w = active_worker(config).await;
    w.network().set_offline(true);

    let request = Request::navigate(url("http://localhost:5173/gallery"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::OfflineFallback);
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.content_type(), Some("text/html"));
  }

  #[tokio::test]
  async fn test_image_cache_hit_skips_network() {
    let w = active_worker(shell_config()).await;
    let request = Request::image(url("http://localhost:5173/images/coin.png"));
    w.store()
      .put(
        "museum-dynamic-v2",
        &request.key(),
        &Response::ok("image/png", vec![1, 2, 3]),
      )
      .await
      .unwrap();

    let before = w.network().attempts();
    let first = w.handle_fetch(&request).await.unwrap();
    let second = w.handle_fetch(&request).await.unwrap();

    assert_eq!(first.source, ServeSource::Cache);
    // Byte-identical on repeated lookups, no network attempt observable
    assert_eq!(first.response, second.response);
    assert_eq!(w.network().attempts(), before);
  }

  #[tokio::test]
  async fn test_image_miss_is_fetched_and_cached() {
    let w = active_worker(shell_config()).await;
    w.network().route(
      "http://localhost:5173/images/amphora.jpeg",
      Response::ok("image/jpeg", vec![0xff, 0xd8]),
    );

    let request = Request::image(url("http://localhost:5173/images/amphora.jpeg"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Network);
    assert!(w
      .store()
      .get("museum-dynamic-v2", &request.key())
      .await
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_image_non_basic_response_is_not_cached() {
    let w = active_worker(shell_config()).await;
    w.network().route(
      "http://localhost:5173/images/remote.png",
      Response {
        kind: ResponseKind::Cors,
        ..Response::ok("image/png", vec![1])
      },
    );

    let request = Request::image(url("http://localhost:5173/images/remote.png"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Network);
    assert!(w.store().match_any(&request.key()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_image_total_failure_synthesizes_placeholder() {
    let w = active_worker(shell_config()).await;
    w.network().set_offline(true);

    let request = Request::image(url("http://localhost:5173/images/foo.png"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::ImagePlaceholder);
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.content_type(), Some("image/svg+xml"));
    let body = String::from_utf8(served.response.body.to_vec()).unwrap();
    assert!(body.contains("<svg"));
    assert!(body.contains("الصورة غير متوفرة"));
  }

  #[tokio::test]
  async fn test_image_destination_without_image_extension_gets_notice() {
    let w = active_worker(shell_config()).await;
    w.network().set_offline(true);

    let request = Request::image(url("http://localhost:5173/api/thumbnail"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Unavailable);
    assert_eq!(served.response.status, 200);
    assert_eq!(served.response.content_type(), Some("text/plain"));
    assert_eq!(served.response.body.as_ref(), b"Resource not available offline");
  }

  #[tokio::test]
  async fn test_generic_cache_hit_with_network_unreachable() {
    let w = active_worker(shell_config()).await;
    let request = Request::get(url("http://localhost:5173/assets/app.js"));
    w.store()
      .put(
        "museum-cache-v2",
        &request.key(),
        &Response::ok("text/javascript", "export {}".as_bytes().to_vec()),
      )
      .await
      .unwrap();
    w.network().set_offline(true);

    let before = w.network().attempts();
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Cache);
    assert_eq!(served.response.body.as_ref(), b"export {}");
    assert_eq!(w.network().attempts(), before);
  }

  #[tokio::test]
  async fn test_generic_asset_miss_is_written_back() {
    let w = active_worker(shell_config()).await;
    w.network().route(
      "http://localhost:5173/assets/vendor.css",
      Response::ok("text/css", "body{}".as_bytes().to_vec()),
    );

    let request = Request::get(url("http://localhost:5173/assets/vendor.css"));
    w.handle_fetch(&request).await.unwrap();

    assert!(w
      .store()
      .get("museum-cache-v2", &request.key())
      .await
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_generic_api_response_is_not_written_back() {
    let w = active_worker(shell_config()).await;
    w.network().route(
      "http://localhost:5173/api/artifacts.json",
      Response::ok("application/json", "[]".as_bytes().to_vec()),
    );

    let request = Request::get(url("http://localhost:5173/api/artifacts.json"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Network);
    assert!(w.store().match_any(&request.key()).await.unwrap().is_none());
  }

  #[tokio::test]
  async fn test_generic_total_failure_yields_408() {
    let w = active_worker(shell_config()).await;
    w.network().set_offline(true);

    let request = Request::get(url("http://localhost:5173/api/artifacts.json"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::NetworkError);
    assert_eq!(served.response.status, 408);
    assert_eq!(served.response.content_type(), Some("text/plain"));
    assert_eq!(served.response.body.as_ref(), b"Network error occurred");
  }

  #[tokio::test]
  async fn test_cross_origin_requests_pass_through() {
    let w = active_worker(shell_config()).await;
    let before = w.network().attempts();

    let request = Request::get(url("https://cdn.example/lib.js"));
    assert!(w.handle_fetch(&request).await.is_none());
    assert_eq!(w.network().attempts(), before);
  }

  #[tokio::test]
  async fn test_inactive_worker_does_not_intercept() {
    let w = CacheWorker::new(
      shell_config(),
      MemoryStore::new(),
      FakeNetwork::new(),
      NoClients,
    );
    let request = Request::navigate(url("http://localhost:5173/"));
    assert!(w.handle_fetch(&request).await.is_none());
  }

  /// Storage that accepts opens but refuses every write.
  #[derive(Default)]
  struct ReadOnlyStore {
    inner: MemoryStore,
  }

  #[async_trait]
  impl CacheStorage for ReadOnlyStore {
    async fn open(&self, partition: &str) -> Result<(), StorageError> {
      self.inner.open(partition).await
    }

    async fn put(
      &self,
      _partition: &str,
      _key: &RequestKey,
      _response: &Response,
    ) -> Result<(), StorageError> {
      Err(StorageError::LockPoisoned)
    }

    async fn get(
      &self,
      partition: &str,
      key: &RequestKey,
    ) -> Result<Option<CacheEntry>, StorageError> {
      self.inner.get(partition, key).await
    }

    async fn match_any(&self, key: &RequestKey) -> Result<Option<CacheEntry>, StorageError> {
      self.inner.match_any(key).await
    }

    async fn partitions(&self) -> Result<Vec<String>, StorageError> {
      self.inner.partitions().await
    }

    async fn delete_partition(&self, partition: &str) -> Result<bool, StorageError> {
      self.inner.delete_partition(partition).await
    }
  }

  #[tokio::test]
  async fn test_write_back_failure_does_not_block_response() {
    // An empty shell means install performs no writes, so the worker can
    // reach the active state on a store that refuses every put.
    let config = CacheConfig {
      app_shell: Vec::new(),
      ..CacheConfig::default()
    };
    let net = FakeNetwork::new();
    net.route(
      "http://localhost:5173/index.html",
      Response::ok("text/html", "<html>live</html>".as_bytes().to_vec()),
    );
    let w = CacheWorker::new(config, ReadOnlyStore::default(), net, NoClients);
    w.install().await.unwrap();
    w.activate().await.unwrap();

    let request = Request::navigate(url("http://localhost:5173/index.html"));
    let served = w.handle_fetch(&request).await.unwrap();

    assert_eq!(served.source, ServeSource::Network);
    assert_eq!(served.response.body.as_ref(), b"<html>live</html>");
  }
}
