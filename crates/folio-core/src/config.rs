//! Worker configuration
//!
//! Partition names and the static asset manifest are passed to the worker
//! as one explicit value, so several configurations can coexist (in tests,
//! or across a version bump).

use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::error::CoreError;

/// Longest accepted eviction interval (one year)
pub const MAX_EVICTION_INTERVAL_HOURS: u64 = 24 * 365;

/// Configuration for a worker instance
///
/// Changing `static_assets` requires bumping the partition names, since
/// cached static assets are only invalidated by a new partition version.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Versioned name of the static (app shell) partition
    #[serde(default = "default_static_cache")]
    pub static_cache: String,
    /// Versioned name of the dynamic (runtime) partition
    #[serde(default = "default_dynamic_cache")]
    pub dynamic_cache: String,
    /// Base URL that relative manifest entries resolve against when cached
    #[serde(default)]
    pub scope: Option<String>,
    /// Ordered manifest of URLs that must be cached at install time
    #[serde(default = "default_static_assets")]
    pub static_assets: Vec<String>,
    /// Trusted CDN hosts whose assets are treated as static
    #[serde(default = "default_cdn_hosts")]
    pub cdn_hosts: Vec<String>,
    /// Path suffixes of static code files
    #[serde(default = "default_static_extensions")]
    pub static_extensions: Vec<String>,
    /// Path suffixes of document packages
    #[serde(default = "default_document_extensions")]
    pub document_extensions: Vec<String>,
    /// URL schemes that are never intercepted
    #[serde(default = "default_bypass_schemes")]
    pub bypass_schemes: Vec<String>,
    /// Hosts (or host:port) of developer tooling that are never intercepted
    #[serde(default = "default_bypass_hosts")]
    pub bypass_hosts: Vec<String>,
    /// Maximum number of entries kept in the dynamic partition
    #[serde(default = "default_max_dynamic_entries")]
    pub max_dynamic_entries: usize,
    /// Hours between eviction sweeps
    #[serde(default = "default_eviction_interval_hours")]
    pub eviction_interval_hours: u64,
}

impl WorkerConfig {
    /// Check the configuration for values the worker cannot run with
    pub fn validate(&self) -> Result<(), CoreError> {
        folio_storage::validate_partition_name(&self.static_cache)
            .map_err(|e| CoreError::InvalidConfig(format!("static_cache: {}", e)))?;
        folio_storage::validate_partition_name(&self.dynamic_cache)
            .map_err(|e| CoreError::InvalidConfig(format!("dynamic_cache: {}", e)))?;

        if self.static_cache == self.dynamic_cache {
            return Err(CoreError::InvalidConfig(format!(
                "static and dynamic partitions must differ (both are {})",
                self.static_cache
            )));
        }

        if self.max_dynamic_entries == 0 {
            return Err(CoreError::InvalidConfig(
                "max_dynamic_entries must be at least 1".to_string(),
            ));
        }

        if self.eviction_interval_hours == 0 {
            return Err(CoreError::InvalidConfig(
                "eviction_interval_hours must be at least 1".to_string(),
            ));
        }
        if self.eviction_interval_hours > MAX_EVICTION_INTERVAL_HOURS {
            return Err(CoreError::InvalidConfig(format!(
                "eviction_interval_hours must be at most {}",
                MAX_EVICTION_INTERVAL_HOURS
            )));
        }

        if let Some(scope) = &self.scope {
            Url::parse(scope)
                .map_err(|e| CoreError::InvalidConfig(format!("scope {}: {}", scope, e)))?;
        }

        if let Some(ext) = self
            .static_extensions
            .iter()
            .chain(&self.document_extensions)
            .find(|ext| !ext.starts_with('.'))
        {
            return Err(CoreError::InvalidConfig(format!(
                "extension must start with '.': {}",
                ext
            )));
        }

        Ok(())
    }

    /// Partition names that survive activation
    pub fn current_partitions(&self) -> [&str; 2] {
        [&self.static_cache, &self.dynamic_cache]
    }

    /// Absolute URL a manifest entry is fetched and cached under
    ///
    /// Without a scope, or when the entry cannot be joined, the entry is
    /// used as written.
    pub fn asset_url(&self, asset: &str) -> String {
        self.scope
            .as_deref()
            .and_then(|scope| Url::parse(scope).ok())
            .and_then(|base| base.join(asset).ok())
            .map(String::from)
            .unwrap_or_else(|| asset.to_string())
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_hours.saturating_mul(3600))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            static_cache: default_static_cache(),
            dynamic_cache: default_dynamic_cache(),
            scope: None,
            static_assets: default_static_assets(),
            cdn_hosts: default_cdn_hosts(),
            static_extensions: default_static_extensions(),
            document_extensions: default_document_extensions(),
            bypass_schemes: default_bypass_schemes(),
            bypass_hosts: default_bypass_hosts(),
            max_dynamic_entries: default_max_dynamic_entries(),
            eviction_interval_hours: default_eviction_interval_hours(),
        }
    }
}

fn strings(values: &[&str]) -> Vec<String> {
    values.iter().map(|s| s.to_string()).collect()
}

fn default_static_cache() -> String {
    "folio-static-v1".to_string()
}

fn default_dynamic_cache() -> String {
    "folio-dynamic-v1".to_string()
}

fn default_static_assets() -> Vec<String> {
    strings(&[
        "./",
        "./index.html",
        "./manifest.json",
        "https://cdnjs.cloudflare.com/ajax/libs/jszip/3.10.1/jszip.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/epub.js/0.3.93/epub.min.js",
        "https://cdnjs.cloudflare.com/ajax/libs/localforage/1.10.0/localforage.min.js",
    ])
}

fn default_cdn_hosts() -> Vec<String> {
    strings(&["cdnjs.cloudflare.com"])
}

fn default_static_extensions() -> Vec<String> {
    strings(&[".js", ".css", ".json"])
}

fn default_document_extensions() -> Vec<String> {
    strings(&[".epub"])
}

fn default_bypass_schemes() -> Vec<String> {
    strings(&[
        "chrome-extension",
        "moz-extension",
        "safari-extension",
        "devtools",
        "about",
        "data",
        "blob",
    ])
}

fn default_bypass_hosts() -> Vec<String> {
    strings(&["localhost:35729"])
}

fn default_max_dynamic_entries() -> usize {
    100
}

fn default_eviction_interval_hours() -> u64 {
    24
}
