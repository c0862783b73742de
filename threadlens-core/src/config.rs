use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, StructuredError};

/// Top-level Threadlens configuration, matching `threadlens.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ThreadlensConfig {
    #[serde(default)]
    pub cache: CacheSection,
    #[serde(default)]
    pub query: QuerySection,
    #[serde(default)]
    pub load: LoadSection,
    #[serde(default)]
    pub recovery: RecoverySection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheSection {
    /// Maximum number of cached query results.
    pub capacity: usize,
    /// Time-to-live for a cached result, in seconds.
    pub ttl_secs: u64,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self {
            capacity: 50,
            ttl_secs: 300,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuerySection {
    pub default_page_size: u32,
    /// Prefer the FTS index for text search when available.
    pub use_fts: bool,
}

impl Default for QuerySection {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            use_fts: true,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadSection {
    /// Rows per bulk-load transaction. One transaction per batch, so a
    /// mid-batch failure only rolls back that batch.
    pub batch_size: usize,
}

impl Default for LoadSection {
    fn default() -> Self {
        Self { batch_size: 500 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecoverySection {
    pub max_retries: u32,
    pub retry_delay_ms: u64,
}

impl Default for RecoverySection {
    fn default() -> Self {
        Self {
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

impl ThreadlensConfig {
    /// Load configuration from a TOML file.
    pub fn load_from(path: &Path) -> crate::error::Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            StructuredError::new(ErrorKind::Loading, format!("failed to load config: {e}"))
        })?;
        toml::from_str(&text).map_err(|e| {
            StructuredError::new(ErrorKind::Loading, format!("invalid config: {e}"))
        })
    }

    pub fn to_toml(&self) -> String {
        toml::to_string_pretty(self).unwrap_or_default()
    }
}
