//! tsdb-import - drains metric files into a time-series database

use anyhow::Result;
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;
use tracing::info;
use tsdb_common::logging::{init_logging, LogConfig, LogLevel};
use tsdb_import::{shutdown::wait_for_signal, ImportConfig, Importer};

#[derive(Parser, Debug)]
#[command(name = "tsdb-import")]
#[command(author, version, about = "Import gzip-compressed JSON metric files into a TSDB")]
struct Cli {
    /// Ingestion endpoint URL
    #[arg(short, long)]
    endpoint: Option<String>,

    /// Directory scanned for metric files
    #[arg(short = 'd', long)]
    watch_dir: Option<PathBuf>,

    /// Milliseconds between folder scans
    #[arg(short = 'i', long)]
    scan_interval_ms: Option<u64>,

    /// Lines per delivered batch
    #[arg(short, long)]
    batch_size: Option<usize>,

    /// Number of file import workers
    #[arg(short, long)]
    workers: Option<usize>,

    /// Extension of metric files
    #[arg(long)]
    extension: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    fn import_config(&self) -> Result<ImportConfig> {
        let mut builder = ImportConfig::builder().merge_env()?;

        if let Some(ref endpoint) = self.endpoint {
            builder = builder.endpoint(endpoint.clone());
        }
        if let Some(ref dir) = self.watch_dir {
            builder = builder.watch_dir(dir.clone());
        }
        if let Some(ms) = self.scan_interval_ms {
            builder = builder.scan_interval(Duration::from_millis(ms));
        }
        if let Some(size) = self.batch_size {
            builder = builder.batch_size(size);
        }
        if let Some(workers) = self.workers {
            builder = builder.workers(workers);
        }
        if let Some(ref ext) = self.extension {
            builder = builder.extension(ext.clone());
        }

        Ok(builder.build()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // LOG_* environment variables take precedence
    let log_config = LogConfig::builder()
        .level(log_level)
        .include_thread_ids(cli.verbose)
        .log_file_prefix("tsdb-import")
        .filter_directives("hyper=warn,reqwest=warn")
        .build()
        .merge_env()?;
    let _log_guard = init_logging(&log_config)?;

    let config = cli.import_config()?;
    let running = Importer::new(config)?.start();

    wait_for_signal().await;
    running.shutdown().await;

    info!("tsdb-import shut down");
    Ok(())
}
