use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::{debug, error, info, warn};

use crate::alert::AlertDispatcher;
use crate::detection::Detector;
use crate::platform::{MessageEvent, MessageHandler};

/// What happened to one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Skipped,
    Clean,
    Alerted,
}

#[derive(Debug, Default)]
pub struct MonitorStats {
    seen: AtomicU64,
    skipped: AtomicU64,
    analysed: AtomicU64,
    alerts: AtomicU64,
    failures: AtomicU64,
}

/// Point-in-time copy of [`MonitorStats`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StatsSnapshot {
    pub seen: u64,
    pub skipped: u64,
    pub analysed: u64,
    pub alerts: u64,
    pub failures: u64,
}

impl MonitorStats {
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            seen: self.seen.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
            analysed: self.analysed.load(Ordering::Relaxed),
            alerts: self.alerts.load(Ordering::Relaxed),
            failures: self.failures.load(Ordering::Relaxed),
        }
    }

    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }
}

impl fmt::Display for StatsSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "seen={} skipped={} analysed={} alerts={} failures={}",
            self.seen, self.skipped, self.analysed, self.alerts, self.failures
        )
    }
}

/// Scores each inbound message and reports the suspicious ones.
pub struct Monitor {
    detector: Detector,
    dispatcher: AlertDispatcher,
    stats: MonitorStats,
}

impl Monitor {
    pub fn new(detector: Detector, dispatcher: AlertDispatcher) -> Self {
        Self {
            detector,
            dispatcher,
            stats: MonitorStats::default(),
        }
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Check one message and send an alert if it is suspicious.
    pub async fn process(&self, event: &MessageEvent) -> Result<Outcome> {
        MonitorStats::bump(&self.stats.seen);

        let text = match event.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => {
                debug!(
                    "Non-text message received in {} by {}. Skipping analysis.",
                    event.chat_name, event.sender
                );
                MonitorStats::bump(&self.stats.skipped);
                return Ok(Outcome::Skipped);
            }
        };

        info!(
            "Processing message in {} from @{}: {}",
            event.chat_name, event.sender, text
        );

        let assessment = self
            .detector
            .assess(event)
            .await
            .context("Message analysis failed")?;

        let Some(signals) = assessment.signals() else {
            MonitorStats::bump(&self.stats.skipped);
            return Ok(Outcome::Skipped);
        };
        MonitorStats::bump(&self.stats.analysed);

        if !assessment.is_suspicious() {
            return Ok(Outcome::Clean);
        }

        warn!(
            "Suspicious message detected in {} by @{}",
            event.chat_name, event.sender
        );
        self.dispatcher.dispatch(event, signals).await?;
        MonitorStats::bump(&self.stats.alerts);
        Ok(Outcome::Alerted)
    }
}

#[async_trait]
impl MessageHandler for Monitor {
    async fn handle(&self, event: MessageEvent) {
        if let Err(e) = self.process(&event).await {
            MonitorStats::bump(&self.stats.failures);
            error!(
                "Failed to process message in {} (chat {}) from @{}: {:#}",
                event.chat_name, event.chat_id, event.sender, e
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alert::{AlertRecipient, AlertSink};
    use crate::config::DetectionConfig;
    use crate::detection::tests::{event, BrokenClassifier, FixedClassifier};
    use crate::oracle::TextClassifier;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        sent: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl AlertSink for RecordingSink {
        async fn send(&self, _recipient: &AlertRecipient, text: &str) -> Result<()> {
            if self.fail {
                anyhow::bail!("network unreachable");
            }
            self.sent.lock().await.push(text.to_string());
            Ok(())
        }
    }

    fn monitor(
        sentiment: Arc<dyn TextClassifier>,
        classifier: Arc<dyn TextClassifier>,
        sink: Arc<RecordingSink>,
    ) -> Monitor {
        let detector = Detector::new(&DetectionConfig::default(), sentiment, classifier).unwrap();
        Monitor::new(detector, AlertDispatcher::new(sink, AlertRecipient::ChatId(1)))
    }

    #[tokio::test]
    async fn test_suspicious_message_sends_one_alert() {
        let sink = Arc::new(RecordingSink::default());
        let m = monitor(
            FixedClassifier::new("NEGATIVE", 0.4),
            FixedClassifier::new("NEGATIVE", 0.4),
            sink.clone(),
        );

        let outcome = m
            .process(&event(Some("Guaranteed profit! Act now, send $500 today.")))
            .await
            .unwrap();

        assert_eq!(outcome, Outcome::Alerted);
        let sent = sink.sent.lock().await;
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("<b>Detected Keywords</b>: guaranteed profit"));
        assert!(sent[0].contains("<b>Urgency Indicators</b>: act now"));
        assert!(sent[0].contains("<b>Monetary Values</b>: $500"));
    }

    #[tokio::test]
    async fn test_every_suspicious_message_alerts_without_dedup() {
        let sink = Arc::new(RecordingSink::default());
        let m = monitor(
            FixedClassifier::new("NEGATIVE", 0.4),
            FixedClassifier::new("NEGATIVE", 0.4),
            sink.clone(),
        );
        let e = event(Some("urgent"));
        m.process(&e).await.unwrap();
        m.process(&e).await.unwrap();
        assert_eq!(sink.sent.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_clean_message_sends_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let m = monitor(
            FixedClassifier::new("POSITIVE", 0.9),
            FixedClassifier::new("POSITIVE", 0.8),
            sink.clone(),
        );

        let outcome = m.process(&event(Some("Nice weather today"))).await.unwrap();
        assert_eq!(outcome, Outcome::Clean);
        assert!(sink.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_non_text_message_touches_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let sentiment = FixedClassifier::new("POSITIVE", 0.99);
        let classifier = FixedClassifier::new("POSITIVE", 0.99);
        let m = monitor(sentiment.clone(), classifier.clone(), sink.clone());

        let outcome = m.process(&event(None)).await.unwrap();
        assert_eq!(outcome, Outcome::Skipped);
        assert_eq!(sentiment.calls(), 0);
        assert_eq!(classifier.calls(), 0);
        assert!(sink.sent.lock().await.is_empty());
        assert_eq!(m.stats().skipped, 1);
    }

    #[tokio::test]
    async fn test_oracle_failure_is_contained_and_counted() {
        let sink = Arc::new(RecordingSink::default());
        let m = monitor(
            Arc::new(BrokenClassifier),
            FixedClassifier::new("POSITIVE", 0.99),
            sink.clone(),
        );

        let err = m.process(&event(Some("$100"))).await.unwrap_err();
        assert!(format!("{:#}", err).contains("Message analysis failed"));

        m.handle(event(Some("$100"))).await;
        assert_eq!(m.stats().failures, 1);
        assert!(sink.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_dispatch_failure_is_contained_and_counted() {
        let sink = Arc::new(RecordingSink {
            fail: true,
            ..RecordingSink::default()
        });
        let m = monitor(
            FixedClassifier::new("NEGATIVE", 0.1),
            FixedClassifier::new("NEGATIVE", 0.1),
            sink,
        );

        m.handle(event(Some("phishing link inside"))).await;
        let stats = m.stats();
        assert_eq!(stats.failures, 1);
        assert_eq!(stats.alerts, 0);
        assert_eq!(stats.analysed, 1);
    }

    #[tokio::test]
    async fn test_stats_track_outcomes() {
        let sink = Arc::new(RecordingSink::default());
        let m = monitor(
            FixedClassifier::new("NEGATIVE", 0.1),
            FixedClassifier::new("NEGATIVE", 0.1),
            sink,
        );
        m.handle(event(Some("hello"))).await;
        m.handle(event(Some("only today!"))).await;
        m.handle(event(Some(""))).await;

        assert_eq!(
            m.stats(),
            StatsSnapshot {
                seen: 3,
                skipped: 1,
                analysed: 2,
                alerts: 1,
                failures: 0,
            }
        );
        assert_eq!(
            m.stats().to_string(),
            "seen=3 skipped=1 analysed=2 alerts=1 failures=0"
        );
    }
}
