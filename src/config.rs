//! Configuration for the indexer.
//!
//! Layered: default values, then a TOML configuration file, then
//! environment variable overrides.
//!
//! # Environment Variables
//!
//! Variables are prefixed with `GMINDEX_` and use double underscores to
//! separate nested levels:
//! - `GMINDEX_INDEXING__PARALLEL_THREADS=8` sets `indexing.parallel_threads`
//! - `GMINDEX_CACHE__ENABLED=false` sets `cache.enabled`

use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;

/// Number of source-analysis workers the build may run. The configured
/// value is clamped to this range at use.
pub const MIN_PARALLELISM: usize = 1;
pub const MAX_PARALLELISM: usize = 16;

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    /// Version of the configuration schema
    #[serde(default = "default_version")]
    pub version: u32,

    /// Indexing configuration
    #[serde(default)]
    pub indexing: IndexingConfig,

    /// Cache configuration
    #[serde(default)]
    pub cache: CacheConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct IndexingConfig {
    /// Number of parallel source-analysis workers. 0 means "derive from
    /// available CPUs". Clamped to [1, 16] at use.
    #[serde(default = "default_parallel_threads")]
    pub parallel_threads: usize,

    /// Path to the built-in identifier data file (one name per line).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub builtins_path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CacheConfig {
    /// Whether the on-disk index cache is consulted and written.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Maximum serialized payload size the store will write.
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: u64,

    /// Explicit cache file path; defaults to
    /// `<projectRoot>/.tool-cache/project-index-cache.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LoggingConfig {
    /// Default log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub default: String,

    /// Per-module level overrides
    #[serde(default)]
    pub modules: HashMap<String, String>,
}

// Default value functions
fn default_version() -> u32 {
    1
}
fn default_parallel_threads() -> usize {
    4
}
fn default_true() -> bool {
    true
}
fn default_max_payload_bytes() -> u64 {
    32 * 1024 * 1024
}
fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            version: default_version(),
            indexing: IndexingConfig::default(),
            cache: CacheConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for IndexingConfig {
    fn default() -> Self {
        Self {
            parallel_threads: default_parallel_threads(),
            builtins_path: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_true(),
            max_payload_bytes: default_max_payload_bytes(),
            path: None,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            default: default_log_level(),
            modules: HashMap::new(),
        }
    }
}

impl Settings {
    /// Load settings from defaults, an optional `gmindex.toml`, and
    /// `GMINDEX_*` environment overrides.
    pub fn load() -> Result<Self, figment::Error> {
        Self::figment("gmindex.toml".as_ref()).extract()
    }

    /// Load settings with an explicit configuration file path.
    pub fn load_from(path: &std::path::Path) -> Result<Self, figment::Error> {
        Self::figment(path).extract()
    }

    fn figment(config_file: &std::path::Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(config_file))
            .merge(Env::prefixed("GMINDEX_").split("__"))
    }

    /// Worker count the build pipeline will actually use.
    pub fn effective_parallelism(&self) -> usize {
        let requested = if self.indexing.parallel_threads == 0 {
            num_cpus::get()
        } else {
            self.indexing.parallel_threads
        };
        requested.clamp(MIN_PARALLELISM, MAX_PARALLELISM)
    }
}
