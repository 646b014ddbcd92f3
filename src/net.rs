//! Network capability behind the worker.
//!
//! The worker never talks to the network directly; it goes through the
//! [`Network`] trait so the whole fetch policy can run against a fake under
//! test. [`HttpNetwork`] is the production implementation.

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::NetworkError;
use crate::request::{Request, Response, ResponseKind};

/// A single network fetch attempt. No retries, no backoff; the worker makes
/// exactly one attempt per intercepted request.
#[async_trait]
pub trait Network: Send + Sync {
  async fn fetch(&self, request: &Request) -> Result<Response, NetworkError>;
}

/// HTTP client implementation over reqwest.
pub struct HttpNetwork {
  client: reqwest::Client,
}

impl HttpNetwork {
  pub fn new() -> Result<Self, NetworkError> {
    let client = reqwest::Client::builder().build()?;
    Ok(Self { client })
  }
}

#[async_trait]
impl Network for HttpNetwork {
  async fn fetch(&self, request: &Request) -> Result<Response, NetworkError> {
    let method =
      reqwest::Method::from_bytes(request.method.as_bytes()).unwrap_or(reqwest::Method::GET);

    let resp = self
      .client
      .request(method, request.url.clone())
      .send()
      .await?;

    // A response that ended up on another origin (redirect to a CDN, for
    // example) is not basic and must never be cached.
    let kind = if resp.url().origin() == request.url.origin() {
      ResponseKind::Basic
    } else {
      ResponseKind::Cors
    };

    let status = resp.status().as_u16();
    let mut headers = BTreeMap::new();
    for (name, value) in resp.headers() {
      if let Ok(value) = value.to_str() {
        headers.insert(name.as_str().to_lowercase(), value.to_string());
      }
    }

    let body = resp.bytes().await?;

    Ok(Response {
      status,
      headers,
      body,
      kind,
    })
  }
}
