//! Worker configuration.
//!
//! Partition names, the app-shell manifest, asset globs and the offline
//! fallback path live here as one immutable value, constructed once and
//! threaded into the worker. Defaults reproduce the deployed museum
//! configuration; a YAML file can override any field.

use serde::Deserialize;
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use url::Url;

use crate::cache::Partition;
use crate::error::ConfigError;

/// Versioned partition names.
///
/// Bumping a version suffix is the only supported way to invalidate a
/// partition: activation deletes every partition whose name is no longer
/// listed here.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct PartitionNames {
  /// App shell: root document, offline fallback, manifest, icons.
  #[serde(default = "default_static_name")]
  pub static_shell: String,
  /// Runtime-fetched navigation documents and image write-backs.
  #[serde(default = "default_dynamic_name")]
  pub dynamic: String,
  /// Build artifacts: scripts, styles, precached asset paths.
  #[serde(default = "default_asset_name")]
  pub asset: String,
}

fn default_static_name() -> String {
  "museum-static-v2".to_string()
}

fn default_dynamic_name() -> String {
  "museum-dynamic-v2".to_string()
}

fn default_asset_name() -> String {
  "museum-cache-v2".to_string()
}

impl Default for PartitionNames {
  fn default() -> Self {
    Self {
      static_shell: default_static_name(),
      dynamic: default_dynamic_name(),
      asset: default_asset_name(),
    }
  }
}

impl PartitionNames {
  /// The names that survive activation cleanup.
  pub fn whitelist(&self) -> [&str; 3] {
    [&self.static_shell, &self.dynamic, &self.asset]
  }

  pub fn name(&self, partition: Partition) -> &str {
    match partition {
      Partition::Static => &self.static_shell,
      Partition::Dynamic => &self.dynamic,
      Partition::Asset => &self.asset,
    }
  }
}

/// Immutable cache policy configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
  /// The web origin this worker is attached to. Requests to any other
  /// origin are not intercepted.
  #[serde(default = "default_origin")]
  pub origin: Url,

  #[serde(default)]
  pub partitions: PartitionNames,

  /// App-shell paths precached at install. All of them must be fetchable
  /// at install time or the whole install fails.
  #[serde(default = "default_app_shell")]
  pub app_shell: Vec<String>,

  /// Additional asset paths to cache opportunistically. Wildcard patterns
  /// are accepted but excluded from the eager install batch; they are only
  /// populated reactively on first access.
  #[serde(default = "default_asset_patterns")]
  pub asset_patterns: Vec<String>,

  /// Exact URLs injected by the build (the precache manifest), appended to
  /// the eager asset batch.
  #[serde(default)]
  pub precache_manifest: Vec<String>,

  /// Document served for navigation requests that fail with no cached copy.
  #[serde(default = "default_offline_fallback")]
  pub offline_fallback: String,

  /// Extensions that get the synthesized placeholder image when both cache
  /// and network fail.
  #[serde(default = "default_image_extensions")]
  pub image_extensions: BTreeSet<String>,

  /// Path prefix under which generic responses are written back to the
  /// asset partition.
  #[serde(default = "default_assets_prefix")]
  pub assets_prefix: String,
}

fn default_origin() -> Url {
  Url::parse("http://localhost:5173").expect("static origin")
}

fn default_app_shell() -> Vec<String> {
  [
    "/",
    "/index.html",
    "/offline.html",
    "/manifest.json",
    "/favicon.ico",
    "/logo.svg",
    "/logo192.png",
    "/logo512.png",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

fn default_asset_patterns() -> Vec<String> {
  [
    "/assets/index-*.js",
    "/assets/index-*.css",
    "/images/*.jpeg",
  ]
  .iter()
  .map(|s| s.to_string())
  .collect()
}

fn default_offline_fallback() -> String {
  "/offline.html".to_string()
}

fn default_image_extensions() -> BTreeSet<String> {
  ["jpeg", "jpg", "png", "gif", "svg"]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_assets_prefix() -> String {
  "/assets/".to_string()
}

impl Default for CacheConfig {
  fn default() -> Self {
    Self {
      origin: default_origin(),
      partitions: PartitionNames::default(),
      app_shell: default_app_shell(),
      asset_patterns: default_asset_patterns(),
      precache_manifest: Vec::new(),
      offline_fallback: default_offline_fallback(),
      image_extensions: default_image_extensions(),
      assets_prefix: default_assets_prefix(),
    }
  }
}

impl CacheConfig {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./museum-cache.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/museum-cache/config.yaml
  pub fn load(explicit_path: Option<&Path>) -> Result<Self, ConfigError> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(ConfigError::NotFound(p.to_path_buf()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      // No file is fine: the built-in deployment defaults apply.
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("museum-cache.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("museum-cache").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self, ConfigError> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| ConfigError::Read(path.to_path_buf(), e))?;

    let config: CacheConfig = serde_yaml::from_str(&contents)
      .map_err(|e| ConfigError::Parse(path.to_path_buf(), e))?;

    Ok(config)
  }

  /// Resolve a same-origin path against the worker's origin.
  pub fn resolve(&self, path: &str) -> Result<Url, url::ParseError> {
    self.origin.join(path)
  }

  /// Paths fetched eagerly at install into the asset partition: every
  /// non-wildcard asset pattern plus the build precache manifest.
  pub fn eager_assets(&self) -> Vec<&str> {
    self
      .asset_patterns
      .iter()
      .filter(|p| !p.contains('*'))
      .chain(self.precache_manifest.iter())
      .map(String::as_str)
      .collect()
  }

  /// Whether a URL looks like an image by extension.
  pub fn is_image_url(&self, url: &Url) -> bool {
    let path = url.path().to_lowercase();
    match path.rsplit_once('.') {
      Some((_, ext)) => self.image_extensions.contains(ext),
      None => false,
    }
  }

  /// Whether a valid generic response for this URL should be written back
  /// to the asset partition.
  pub fn is_asset_url(&self, url: &Url) -> bool {
    let path = url.path();
    path.starts_with(self.assets_prefix.as_str())
      || path.ends_with(".js")
      || path.ends_with(".css")
  }
}
