//! Shutdown coordination for the poller daemon.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

/// Coordinator for graceful shutdown.
///
/// Every scheduler, the battery monitor, and the admin server subscribe to
/// the same broadcast channel.
#[derive(Clone)]
pub struct Shutdown {
    tx: broadcast::Sender<()>,
    triggered: Arc<AtomicBool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(1);
        Self {
            tx,
            triggered: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.tx.subscribe()
    }

    /// Trigger the shutdown signal. Later calls are no-ops.
    pub fn trigger(&self) {
        if !self.triggered.swap(true, Ordering::SeqCst) {
            tracing::info!(subscribers = self.tx.receiver_count(), "Shutdown triggered");
            let _ = self.tx.send(());
        }
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }

    /// Number of tasks still listening.
    pub fn receiver_count(&self) -> usize {
        self.tx.receiver_count()
    }

    /// Resolves once `trigger` has been called.
    pub async fn wait(&self) {
        let mut rx = self.subscribe();
        if self.is_triggered() {
            return;
        }
        let _ = rx.recv().await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}

/// Wait for tasks to finish, giving up after `deadline`.
///
/// Returns `false` if the deadline expired first.
pub async fn join_with_deadline(handles: Vec<JoinHandle<()>>, deadline: Duration) -> bool {
    let join_all = async {
        for handle in handles {
            if let Err(e) = handle.await {
                tracing::warn!(error = %e, "Task ended abnormally during shutdown");
            }
        }
    };
    match tokio::time::timeout(deadline, join_all).await {
        Ok(()) => true,
        Err(_) => {
            tracing::warn!(deadline_secs = deadline.as_secs(), "Shutdown deadline expired");
            false
        }
    }
}
