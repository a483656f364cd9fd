//! Graceful shutdown coordination.
//!
//! A shared controller closed once, observed by every long-lived task.
//! Signal handlers (SIGINT/SIGTERM) feed into it.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::info;

/// Shutdown signal fan-out.
#[derive(Debug, Clone)]
pub struct ShutdownController {
    initiated: Arc<AtomicBool>,
    tx: broadcast::Sender<()>,
}

impl Default for ShutdownController {
    fn default() -> Self {
        Self::new()
    }
}

impl ShutdownController {
    /// Creates a controller in the running state.
    #[must_use]
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            initiated: Arc::new(AtomicBool::new(false)),
            tx,
        }
    }

    /// Initiates shutdown; idempotent.
    pub fn initiate(&self) {
        if self
            .initiated
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!("shutdown initiated");
            let _ = self.tx.send(());
        }
    }

    /// Returns true once shutdown has been initiated.
    #[must_use]
    pub fn is_initiated(&self) -> bool {
        self.initiated.load(Ordering::SeqCst)
    }

    /// Subscribes to the shutdown signal.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Completes when shutdown is initiated.
    pub async fn wait(&self) {
        if self.is_initiated() {
            return;
        }
        let mut rx = self.tx.subscribe();
        let _ = rx.recv().await;
    }
}

/// Installs SIGINT/SIGTERM handlers that initiate shutdown.
pub async fn setup_signal_handlers(controller: ShutdownController) {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigint = signal(SignalKind::interrupt()).expect("SIGINT handler");
        let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler");

        tokio::select! {
            _ = sigint.recv() => info!("received SIGINT"),
            _ = sigterm.recv() => info!("received SIGTERM"),
        }
        controller.initiate();
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await.expect("Ctrl+C handler");
        info!("received Ctrl+C");
        controller.initiate();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_initiate_is_idempotent() {
        let controller = ShutdownController::new();
        assert!(!controller.is_initiated());

        controller.initiate();
        controller.initiate();
        assert!(controller.is_initiated());
    }

    #[tokio::test]
    async fn test_wait_observes_signal() {
        let controller = ShutdownController::new();
        let waiter = {
            let controller = controller.clone();
            tokio::spawn(async move { controller.wait().await })
        };

        tokio::time::sleep(Duration::from_millis(10)).await;
        controller.initiate();

        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .expect("wait must complete")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_after_initiation_returns_immediately() {
        let controller = ShutdownController::new();
        controller.initiate();
        controller.wait().await;
    }
}
