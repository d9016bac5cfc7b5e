use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::sleep;

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Counts termination signals. Cheap to clone; every clone sees the same count.
#[derive(Debug, Clone, Default)]
pub struct Shutdown {
    signals: Arc<AtomicUsize>,
}

impl Shutdown {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one signal and returns how many were seen before it.
    pub fn trigger(&self) -> usize {
        self.signals.fetch_add(1, Ordering::SeqCst)
    }

    pub fn is_requested(&self) -> bool {
        self.signals.load(Ordering::Relaxed) > 0
    }

    /// Resolves once a signal has been recorded.
    pub async fn requested(&self) {
        while !self.is_requested() {
            sleep(POLL_INTERVAL).await;
        }
    }

    /// Installs the process SIGINT/SIGTERM handler. The second signal exits
    /// immediately with status 130.
    pub fn install_signal_handler(&self) -> Result<(), ctrlc::Error> {
        let shutdown = self.clone();
        ctrlc::set_handler(move || {
            if shutdown.trigger() == 0 {
                eprintln!("\nShutdown signal received, finishing the current run. Press Ctrl+C again to force exit...");
            } else {
                eprintln!("\nForce exiting...");
                std::process::exit(130);
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_clones_share_state() {
        let shutdown = Shutdown::new();
        let observer = shutdown.clone();
        assert!(!observer.is_requested());

        assert_eq!(shutdown.trigger(), 0);
        assert!(observer.is_requested());
        assert_eq!(shutdown.trigger(), 1);
    }

    #[tokio::test]
    async fn test_requested_resolves_after_trigger() {
        let shutdown = Shutdown::new();
        let trigger = shutdown.clone();
        tokio::spawn(async move {
            sleep(Duration::from_millis(150)).await;
            trigger.trigger();
        });

        tokio::time::timeout(Duration::from_secs(2), shutdown.requested())
            .await
            .expect("shutdown should be observed");
    }
}
