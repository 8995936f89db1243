//! Stop triggers for interactive commands

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::signal;
use tokio::sync::Notify;
use tracing::debug;

/// Ctrl+C listener shared by recording and watching
pub struct ShutdownSignal {
    shutdown: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self {
            shutdown: Arc::new(AtomicBool::new(false)),
            notify: Arc::new(Notify::new()),
        }
    }

    /// Check if shutdown was requested
    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }

    /// Request shutdown as if Ctrl+C was pressed
    pub fn trigger(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.notify.notify_one();
    }

    /// Setup signal handler
    pub fn setup(&self) {
        let shutdown = Arc::clone(&self.shutdown);
        let notify = Arc::clone(&self.notify);

        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                debug!("Received Ctrl+C");
                shutdown.store(true, Ordering::SeqCst);
                notify.notify_one();
            }
        });
    }

    /// Wait until shutdown is requested
    pub async fn wait(&self) {
        if self.is_shutdown() {
            return;
        }
        self.notify.notified().await;
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}

/// Resolve when a line is entered on stdin.
///
/// Never resolves if stdin is closed or unreadable, so a non-interactive
/// caller falls back to the other stop triggers.
pub async fn enter_pressed() {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    match lines.next_line().await {
        Ok(Some(_)) => {}
        Ok(None) | Err(_) => std::future::pending::<()>().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn shutdown_signal_default_is_false() {
        let signal = ShutdownSignal::new();
        assert!(!signal.is_shutdown());
    }

    #[tokio::test]
    async fn trigger_wakes_waiter() {
        let signal = Arc::new(ShutdownSignal::new());
        let waiter = {
            let signal = Arc::clone(&signal);
            tokio::spawn(async move { signal.wait().await })
        };

        signal.trigger();
        tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(signal.is_shutdown());
    }

    #[tokio::test]
    async fn wait_after_trigger_returns_immediately() {
        let signal = ShutdownSignal::new();
        signal.trigger();
        tokio::time::timeout(Duration::from_millis(100), signal.wait())
            .await
            .unwrap();
    }
}
