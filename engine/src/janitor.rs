use common::Cancellation;
use common::model::config::RetentionConfig;
use errors::Result;
use log::{error, info};
use queue::NotificationQueue;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Periodically trims notification log entries older than the retention window.
pub struct RetentionJanitor {
    queue: Arc<NotificationQueue>,
    retention: Duration,
    interval: Duration,
}

impl RetentionJanitor {
    /// `None` when retention is disabled (`log_retention_hours = 0`).
    pub fn from_config(queue: Arc<NotificationQueue>, config: &RetentionConfig) -> Option<Self> {
        if config.log_retention_hours == 0 {
            return None;
        }
        Some(Self {
            queue,
            retention: Duration::from_secs(config.log_retention_hours.saturating_mul(3600)),
            interval: Duration::from_secs(config.sweep_interval_secs.max(1)),
        })
    }

    pub async fn sweep_once(&self) -> Result<u64> {
        let removed = self.queue.sweep(self.retention).await?;
        if removed > 0 {
            info!("Retention sweep removed {removed} notification entries");
        }
        Ok(removed)
    }

    pub fn spawn(self, shutdown: Cancellation) -> JoinHandle<()> {
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        info!("Retention janitor received shutdown signal, exiting loop");
                        break;
                    }
                    _ = ticker.tick() => {
                        if let Err(e) = self.sweep_once().await {
                            error!("Retention sweep failed: {e}");
                        }
                    }
                }
            }
        })
    }
}
