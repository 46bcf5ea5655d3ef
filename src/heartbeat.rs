use std::sync::Arc;

use anyhow::{Context, Result};
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::info;

use crate::monitor::Monitor;

/// Periodically logs the monitor's counters so a quiet bot can be told
/// apart from a dead one.
pub struct Heartbeat {
    scheduler: JobScheduler,
    monitor: Arc<Monitor>,
}

impl Heartbeat {
    /// Schedule the heartbeat on a six-field cron expression
    /// (`sec min hour day month weekday`). Nothing runs until [`start`].
    ///
    /// [`start`]: Heartbeat::start
    pub async fn new(monitor: Arc<Monitor>, cron_expr: &str) -> Result<Self> {
        let scheduler = JobScheduler::new()
            .await
            .context("Failed to create heartbeat scheduler")?;

        let job_monitor = monitor.clone();
        let job = Job::new_async(cron_expr, move |_uuid, _lock| {
            let monitor = job_monitor.clone();
            Box::pin(async move {
                info!("Heartbeat: bot is alive ({})", monitor.stats());
            })
        })
        .with_context(|| format!("Invalid heartbeat schedule '{}'", cron_expr))?;

        scheduler
            .add(job)
            .await
            .context("Failed to register heartbeat job")?;
        info!("Heartbeat scheduled with cron: {}", cron_expr);

        Ok(Self { scheduler, monitor })
    }

    pub async fn start(&self) -> Result<()> {
        self.scheduler
            .start()
            .await
            .context("Failed to start heartbeat")
    }

    /// Stop the schedule and log the final counters once.
    pub async fn stop(mut self) -> Result<()> {
        self.scheduler
            .shutdown()
            .await
            .context("Failed to stop heartbeat")?;
        info!("Final counters: {}", self.monitor.stats());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertDispatcher, AlertRecipient, AlertSink};
    use crate::config::DetectionConfig;
    use crate::detection::tests::FixedClassifier;
    use crate::detection::Detector;
    use async_trait::async_trait;

    struct NullSink;

    #[async_trait]
    impl AlertSink for NullSink {
        async fn send(&self, _recipient: &AlertRecipient, _text: &str) -> Result<()> {
            Ok(())
        }
    }

    fn monitor() -> Arc<Monitor> {
        let detector = Detector::new(
            &DetectionConfig::default(),
            FixedClassifier::new("NEGATIVE", 0.1),
            FixedClassifier::new("NEGATIVE", 0.1),
        )
        .unwrap();
        Arc::new(Monitor::new(
            detector,
            AlertDispatcher::new(Arc::new(NullSink), AlertRecipient::ChatId(1)),
        ))
    }

    #[tokio::test]
    async fn test_rejects_invalid_schedule() {
        let err = Heartbeat::new(monitor(), "every now and then")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("every now and then"));
    }

    #[tokio::test]
    async fn test_starts_and_stops_on_hourly_schedule() {
        let heartbeat = Heartbeat::new(monitor(), "0 0 * * * *").await.unwrap();
        heartbeat.start().await.unwrap();
        heartbeat.stop().await.unwrap();
    }
}
