//! Cooperative shutdown
//!
//! Background tasks share one [`CancellationToken`]. [`ShutdownController::shutdown`]
//! cancels it and then joins every registered task, so the process only exits after
//! the coordinator and each worker have left their loops.

use tokio::signal;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

#[derive(Debug, Default)]
pub struct ShutdownController {
    token: CancellationToken,
    tasks: Vec<(String, JoinHandle<()>)>,
}

impl ShutdownController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token to hand to a task that should stop on shutdown
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn register(&mut self, name: impl Into<String>, handle: JoinHandle<()>) {
        self.tasks.push((name.into(), handle));
    }

    pub fn task_count(&self) -> usize {
        self.tasks.len()
    }

    /// Signal every task and wait for all of them to exit
    pub async fn shutdown(self) {
        info!(tasks = self.tasks.len(), "stopping background tasks");
        self.token.cancel();

        for (name, handle) in self.tasks {
            match handle.await {
                Ok(()) => debug!(task = %name, "task exited"),
                Err(e) => error!(task = %name, error = %e, "task did not exit cleanly"),
            }
        }
    }
}

/// Resolves on Ctrl+C or, on Unix, SIGTERM
pub async fn wait_for_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            },
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, starting graceful shutdown");
        },
        _ = terminate => {
            info!("Received terminate signal, starting graceful shutdown");
        },
    }
}
