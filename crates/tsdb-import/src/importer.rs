//! Pipeline assembly
//!
//! [`Importer::start`] creates the two queues, spawns one coordinator and
//! `config.workers` workers, and returns a [`RunningImporter`] that owns their
//! handles until [`RunningImporter::shutdown`].

use crate::client::IngestClient;
use crate::config::ImportConfig;
use crate::coordinator::Coordinator;
use crate::error::Result;
use crate::shutdown::ShutdownController;
use crate::worker::Worker;
use std::path::PathBuf;
use tokio::sync::mpsc;
use tracing::{info, info_span, Instrument};

pub struct Importer {
    config: ImportConfig,
    client: IngestClient,
}

impl Importer {
    pub fn new(config: ImportConfig) -> Result<Self> {
        config.validate()?;
        let client = IngestClient::new(config.endpoint.clone())?;
        Ok(Self { config, client })
    }

    /// Spawn the coordinator and worker pool on the current runtime
    pub fn start(self) -> RunningImporter {
        let capacity = self.config.queue_capacity;
        let (todo_tx, todo_rx) = async_channel::bounded::<PathBuf>(capacity);
        let (done_tx, done_rx) = mpsc::channel::<PathBuf>(capacity);
        let mut shutdown = ShutdownController::new();

        let coordinator = Coordinator::new(&self.config, todo_tx, done_rx, shutdown.token());
        shutdown.register(
            "coordinator",
            tokio::spawn(coordinator.run().instrument(info_span!("coordinator"))),
        );

        for id in 0..self.config.workers.get() {
            let worker = Worker::new(
                id,
                &self.config,
                self.client.clone(),
                todo_rx.clone(),
                done_tx.clone(),
                shutdown.token(),
            );
            shutdown.register(
                format!("worker-{}", id),
                tokio::spawn(worker.run().instrument(info_span!("worker", id))),
            );
        }

        info!(
            endpoint = %self.config.endpoint,
            dir = %self.config.watch_dir.display(),
            workers = self.config.workers.get(),
            batch_size = self.config.batch_size.get(),
            "importer started"
        );

        RunningImporter { shutdown }
    }
}

/// Handles of a started importer
pub struct RunningImporter {
    shutdown: ShutdownController,
}

impl RunningImporter {
    /// Number of background tasks, coordinator included
    pub fn task_count(&self) -> usize {
        self.shutdown.task_count()
    }

    /// Stop scanning, let in-flight files finish, and wait for every task
    pub async fn shutdown(self) {
        self.shutdown.shutdown().await;
        info!("importer stopped");
    }
}
