//! Importer configuration
//!
//! Built once at startup from defaults, the `TSDB_IMPORT_*` environment variables
//! and command-line flags, then validated and handed to the pipeline by value.

use crate::error::{ImportError, Result};
use std::num::NonZeroUsize;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tsdb_common::CommonError;
use url::Url;

// ============================================================================
// Defaults
// ============================================================================

/// OpenTSDB HTTP put interface
pub const DEFAULT_ENDPOINT: &str = "http://localhost:4242/api/put?details";

pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(1);

/// Lines per delivered payload
pub const DEFAULT_BATCH_SIZE: usize = 100;

pub const DEFAULT_WORKERS: usize = 1;

pub const DEFAULT_EXTENSION: &str = "gz";

/// Capacity of both the work queue and the completion queue
pub const DEFAULT_QUEUE_CAPACITY: usize = 10_000;

/// Largest fragment a single read hands to the line reframer
pub const DEFAULT_FRAGMENT_SIZE: usize = 4096;

/// Static configuration for one importer instance
#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Ingestion endpoint receiving the JSON array payloads
    pub endpoint: Url,

    /// Time between two scans of `watch_dir`
    pub scan_interval: Duration,

    pub batch_size: NonZeroUsize,

    pub workers: NonZeroUsize,

    /// Directory scanned for metric files (non-recursive)
    pub watch_dir: PathBuf,

    /// File extension, without the dot, selecting metric files
    pub extension: String,

    pub queue_capacity: usize,

    pub fragment_size: usize,
}

impl ImportConfig {
    pub fn builder() -> ImportConfigBuilder {
        ImportConfigBuilder::default()
    }

    pub fn validate(&self) -> Result<()> {
        if !matches!(self.endpoint.scheme(), "http" | "https") {
            return Err(ImportError::config(format!(
                "endpoint must be an http(s) URL, got {}",
                self.endpoint
            )));
        }
        if self.scan_interval.is_zero() {
            return Err(ImportError::config("scan interval must be greater than 0"));
        }
        if self.extension.is_empty() || self.extension.contains(['.', '/']) {
            return Err(ImportError::config(format!(
                "invalid file extension {:?}",
                self.extension
            )));
        }
        if self.queue_capacity == 0 {
            return Err(ImportError::config("queue capacity must be greater than 0"));
        }
        if self.fragment_size == 0 {
            return Err(ImportError::config("fragment size must be greater than 0"));
        }
        Ok(())
    }
}

/// Builder for [`ImportConfig`]; `build` parses the endpoint and validates
#[derive(Debug, Clone)]
pub struct ImportConfigBuilder {
    endpoint: String,
    scan_interval: Duration,
    batch_size: usize,
    workers: usize,
    watch_dir: PathBuf,
    extension: String,
    queue_capacity: usize,
    fragment_size: usize,
}

impl Default for ImportConfigBuilder {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            scan_interval: DEFAULT_SCAN_INTERVAL,
            batch_size: DEFAULT_BATCH_SIZE,
            workers: DEFAULT_WORKERS,
            watch_dir: PathBuf::from("."),
            extension: DEFAULT_EXTENSION.to_string(),
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            fragment_size: DEFAULT_FRAGMENT_SIZE,
        }
    }
}

impl ImportConfigBuilder {
    /// Apply the `TSDB_IMPORT_*` environment variables
    ///
    /// - `TSDB_IMPORT_ENDPOINT`
    /// - `TSDB_IMPORT_SCAN_INTERVAL_MS`
    /// - `TSDB_IMPORT_BATCH_SIZE`
    /// - `TSDB_IMPORT_WORKERS`
    /// - `TSDB_IMPORT_WATCH_DIR`
    /// - `TSDB_IMPORT_EXTENSION`
    /// - `TSDB_IMPORT_QUEUE_CAPACITY`
    pub fn merge_env(mut self) -> Result<Self> {
        if let Ok(endpoint) = std::env::var("TSDB_IMPORT_ENDPOINT") {
            self.endpoint = endpoint;
        }
        if let Some(ms) = env_parse::<u64>("TSDB_IMPORT_SCAN_INTERVAL_MS")? {
            self.scan_interval = Duration::from_millis(ms);
        }
        if let Some(size) = env_parse("TSDB_IMPORT_BATCH_SIZE")? {
            self.batch_size = size;
        }
        if let Some(workers) = env_parse("TSDB_IMPORT_WORKERS")? {
            self.workers = workers;
        }
        if let Ok(dir) = std::env::var("TSDB_IMPORT_WATCH_DIR") {
            self.watch_dir = PathBuf::from(dir);
        }
        if let Ok(ext) = std::env::var("TSDB_IMPORT_EXTENSION") {
            self.extension = ext;
        }
        if let Some(capacity) = env_parse("TSDB_IMPORT_QUEUE_CAPACITY")? {
            self.queue_capacity = capacity;
        }
        Ok(self)
    }

    pub fn endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    pub fn scan_interval(mut self, interval: Duration) -> Self {
        self.scan_interval = interval;
        self
    }

    pub fn batch_size(mut self, size: usize) -> Self {
        self.batch_size = size;
        self
    }

    pub fn workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }

    pub fn watch_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.watch_dir = dir.into();
        self
    }

    pub fn extension(mut self, ext: impl Into<String>) -> Self {
        self.extension = ext.into();
        self
    }

    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    pub fn fragment_size(mut self, size: usize) -> Self {
        self.fragment_size = size;
        self
    }

    pub fn build(self) -> Result<ImportConfig> {
        let endpoint = Url::parse(self.endpoint.trim()).map_err(|e| {
            ImportError::config(format!("invalid endpoint URL {:?}: {}", self.endpoint, e))
        })?;
        let batch_size = NonZeroUsize::new(self.batch_size)
            .ok_or_else(|| ImportError::config("batch size must be greater than 0"))?;
        let workers = NonZeroUsize::new(self.workers)
            .ok_or_else(|| ImportError::config("worker count must be greater than 0"))?;

        let config = ImportConfig {
            endpoint,
            scan_interval: self.scan_interval,
            batch_size,
            workers,
            watch_dir: self.watch_dir,
            extension: self.extension.trim_start_matches('.').to_string(),
            queue_capacity: self.queue_capacity,
            fragment_size: self.fragment_size,
        };
        config.validate()?;
        Ok(config)
    }
}

fn env_parse<T: FromStr>(key: &str) -> Result<Option<T>> {
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| CommonError::invalid_value(key, raw).into()),
        Err(_) => Ok(None),
    }
}
