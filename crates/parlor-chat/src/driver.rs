//! Real-time driver for the orchestrator's virtual clock.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::{Instant, MissedTickBehavior};

use crate::orchestrator::ChatOrchestrator;

/// Background loop feeding elapsed wall time into [`ChatOrchestrator::advance`].
pub struct ClockDriver {
    orchestrator: Arc<ChatOrchestrator>,
    resolution: Duration,
    shutdown: Arc<Notify>,
}

impl ClockDriver {
    /// Create a driver that wakes every `resolution` (at least 1 ms).
    pub fn new(orchestrator: Arc<ChatOrchestrator>, resolution: Duration) -> Self {
        Self {
            orchestrator,
            resolution: resolution.max(Duration::from_millis(1)),
            shutdown: Arc::new(Notify::new()),
        }
    }

    /// Run until [`ClockDriver::shutdown`] is called.
    pub async fn run(&self) {
        let mut ticker = tokio::time::interval(self.resolution);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut last = Instant::now();
        tracing::debug!(resolution_ms = self.resolution.as_millis() as u64, "Clock driver started");

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let now = Instant::now();
                    let elapsed = now.duration_since(last);
                    last = now;
                    if let Err(e) = self.orchestrator.advance(elapsed) {
                        tracing::error!(error = %e, "Clock driver stopped");
                        return;
                    }
                }
                _ = self.shutdown.notified() => {
                    tracing::debug!("Clock driver shutting down");
                    return;
                }
            }
        }
    }

    /// Signal the driver loop to stop.
    pub fn shutdown(&self) {
        self.shutdown.notify_one();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlor_core::config::ChatConfig;
    use parlor_core::types::{MessageStatus, Sender};

    #[tokio::test]
    async fn test_driver_shutdown() {
        let orch = Arc::new(ChatOrchestrator::new(ChatConfig::default()));
        let driver = ClockDriver::new(orch, Duration::from_millis(50));

        driver.shutdown();

        tokio::time::timeout(Duration::from_secs(2), driver.run())
            .await
            .expect("Driver should shut down within timeout");
    }

    #[tokio::test(start_paused = true)]
    async fn test_driver_advances_virtual_clock() {
        let orch = Arc::new(ChatOrchestrator::new(ChatConfig::default()));
        let driver = Arc::new(ClockDriver::new(Arc::clone(&orch), Duration::from_millis(50)));

        orch.send_message("tomato leaves", vec![]).unwrap();
        let handle = tokio::spawn({
            let driver = Arc::clone(&driver);
            async move { driver.run().await }
        });

        tokio::time::sleep(Duration::from_secs(3)).await;
        driver.shutdown();
        handle.await.unwrap();

        let messages = orch.messages().unwrap();
        let reply = messages.last().unwrap();
        assert_eq!(reply.sender, Sender::Ai);
        assert_eq!(reply.status, MessageStatus::Delivered);
        assert!(orch.now().unwrap() >= Duration::from_secs(2));
    }

    #[test]
    fn test_zero_resolution_is_clamped() {
        let orch = Arc::new(ChatOrchestrator::new(ChatConfig::default()));
        let driver = ClockDriver::new(orch, Duration::ZERO);
        assert_eq!(driver.resolution, Duration::from_millis(1));
    }
}
