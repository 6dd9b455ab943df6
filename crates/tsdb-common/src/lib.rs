//! Shared plumbing for the tsdb-import workspace.
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! - **Logging**: `tracing` subscriber setup driven by [`logging::LogConfig`]
//! - **Errors**: the [`CommonError`] type used by shared helpers
//!
//! # Example
//!
//! ```no_run
//! use tsdb_common::logging::{init_logging, LogConfig};
//!
//! fn main() -> anyhow::Result<()> {
//!     let _guard = init_logging(&LogConfig::from_env()?)?;
//!     tracing::info!("ready");
//!     Ok(())
//! }
//! ```

pub mod error;
pub mod logging;

pub use error::{CommonError, Result};
