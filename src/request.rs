//! Request and response value model for the fetch interception layer.
//!
//! These mirror the shape of requests and responses as the worker sees them:
//! a request carries its mode (navigation vs. subresource) and destination,
//! a response carries its origin class alongside status, headers and body.
//! Bodies are `Bytes` so snapshotting a response for write-back is a cheap
//! clone rather than a copy.

use std::collections::BTreeMap;

use bytes::Bytes;
use sha2::{Digest, Sha256};
use url::Url;

/// How a request was initiated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
  /// Top-level document load (the browser navigating to a page).
  Navigate,
  /// Any subresource request (scripts, styles, images, data).
  NoCors,
  Cors,
  SameOrigin,
}

/// What kind of resource a request is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestDestination {
  Document,
  Image,
  Script,
  Style,
  /// Data fetches, manifests, fonts and everything else.
  Other,
}

/// A request as presented to the worker.
#[derive(Debug, Clone)]
pub struct Request {
  pub method: String,
  pub url: Url,
  pub mode: RequestMode,
  pub destination: RequestDestination,
}

impl Request {
  /// A plain GET subresource request.
  pub fn get(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
      mode: RequestMode::NoCors,
      destination: RequestDestination::Other,
    }
  }

  /// A top-level navigation request for an HTML document.
  pub fn navigate(url: Url) -> Self {
    Self {
      method: "GET".to_string(),
      url,
      mode: RequestMode::Navigate,
      destination: RequestDestination::Document,
    }
  }

  /// A GET request with an image destination.
  pub fn image(url: Url) -> Self {
    Self {
      destination: RequestDestination::Image,
      ..Self::get(url)
    }
  }

  pub fn is_navigation(&self) -> bool {
    self.mode == RequestMode::Navigate
  }

  /// Whether this request targets the given origin.
  pub fn is_same_origin(&self, origin: &Url) -> bool {
    self.url.origin() == origin.origin()
  }

  /// The identity under which this request is cached.
  pub fn key(&self) -> RequestKey {
    RequestKey {
      method: self.method.clone(),
      url: self.url.to_string(),
    }
  }
}

/// Cache identity of a request: method plus full URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestKey {
  pub method: String,
  pub url: String,
}

impl RequestKey {
  pub fn get(url: &str) -> Self {
    Self {
      method: "GET".to_string(),
      url: url.to_string(),
    }
  }

  /// SHA256 hash for stable, fixed-length storage keys.
  pub fn cache_hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.method.as_bytes());
    hasher.update(b":");
    hasher.update(self.url.as_bytes());
    hex::encode(hasher.finalize())
  }
}

impl std::fmt::Display for RequestKey {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(f, "{} {}", self.method, self.url)
  }
}

/// Origin class of a response, as reported by the fetch layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseKind {
  /// Same-origin, non-redirected. The only kind eligible for caching.
  Basic,
  /// Cross-origin response obtained with CORS.
  Cors,
  /// Cross-origin response with no readable body or status.
  Opaque,
}

/// A response snapshot: status, headers and body.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Bytes,
  pub kind: ResponseKind,
}

impl Response {
  /// A 200 basic response with the given content type and body.
  pub fn ok(content_type: &str, body: impl Into<Bytes>) -> Self {
    let mut headers = BTreeMap::new();
    headers.insert("content-type".to_string(), content_type.to_string());
    Self {
      status: 200,
      headers,
      body: body.into(),
      kind: ResponseKind::Basic,
    }
  }

  /// A plain-text response with an explicit status code.
  pub fn text(status: u16, body: &str) -> Self {
    Self {
      status,
      ..Self::ok("text/plain", body.as_bytes().to_vec())
    }
  }

  pub fn content_type(&self) -> Option<&str> {
    self.headers.get("content-type").map(String::as_str)
  }

  /// Whether this response may be persisted to a cache partition.
  ///
  /// Only basic (same-origin, non-opaque) responses with HTTP status 200
  /// are stored; redirects to third-party CDNs, opaque responses and error
  /// responses pass through uncached.
  pub fn is_cacheable(&self) -> bool {
    self.status == 200 && self.kind == ResponseKind::Basic
  }
}
