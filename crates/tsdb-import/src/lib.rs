//! tsdb-import library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Drains gzip-compressed, newline-delimited JSON metric files from a folder into a
//! time-series ingestion endpoint such as OpenTSDB's `/api/put`.
//!
//! - [`coordinator`]: periodic folder scan and pending-set bookkeeping
//! - [`worker`]: per-file decompress → reframe → batch → deliver
//! - [`reframe`]: rebuilds logical lines from fragmented reads
//! - [`batch`]: renders fixed-size JSON array payloads
//! - [`client`]: HTTP delivery
//! - [`shutdown`]: cooperative cancellation and task joining
//!
//! # Example
//!
//! ```no_run
//! use tsdb_import::{ImportConfig, Importer};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = ImportConfig::builder()
//!         .endpoint("http://tsdb.internal:4242/api/put?details")
//!         .watch_dir("/var/spool/metrics")
//!         .workers(4)
//!         .build()?;
//!
//!     let running = Importer::new(config)?.start();
//!     tsdb_import::shutdown::wait_for_signal().await;
//!     running.shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod batch;
pub mod client;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod importer;
pub mod reframe;
pub mod shutdown;
pub mod worker;

pub use config::ImportConfig;
pub use error::{ImportError, Result};
pub use importer::{Importer, RunningImporter};
