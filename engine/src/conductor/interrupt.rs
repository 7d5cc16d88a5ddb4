//! User interruption (Ctrl-C) for the running workflow.

use std::sync::Arc;
use tokio::sync::watch;

/// Shared interrupt flag.
///
/// [`InterruptHandle::trigger`] wakes every pending
/// [`InterruptHandle::cancelled`]; the session resets the flag before each
/// request.
#[derive(Clone)]
pub struct InterruptHandle {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Default for InterruptHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl InterruptHandle {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn reset(&self) {
        self.tx.send_replace(false);
    }

    pub fn is_triggered(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the flag is set
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // The sender lives as long as any handle does
                std::future::pending::<()>().await;
            }
        }
    }

    /// Trigger on every Ctrl-C until the returned task is aborted
    pub fn listen_for_ctrl_c(&self) -> tokio::task::JoinHandle<()> {
        let handle = self.clone();
        tokio::spawn(async move {
            while tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received");
                handle.trigger();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_trigger_wakes_waiters() {
        let handle = InterruptHandle::new();
        let waiter = handle.clone();
        let task = tokio::spawn(async move { waiter.cancelled().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        handle.trigger();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .unwrap()
            .unwrap();
        assert!(handle.is_triggered());
    }

    #[tokio::test]
    async fn test_reset_clears_flag() {
        let handle = InterruptHandle::new();
        handle.trigger();
        handle.cancelled().await;
        handle.reset();
        assert!(!handle.is_triggered());

        let pending = tokio::time::timeout(Duration::from_millis(20), handle.cancelled()).await;
        assert!(pending.is_err());
    }
}
