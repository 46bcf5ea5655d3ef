pub mod keywords;

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use crate::config::DetectionConfig;
use crate::detection::keywords::{KeywordMatcher, MonetaryExtractor};
use crate::oracle::{Prediction, TextClassifier};
use crate::platform::MessageEvent;

/// Everything computed for one message. Never mutated after creation.
#[derive(Debug, Clone, PartialEq)]
pub struct SignalBundle {
    pub suspicious_keywords: Vec<String>,
    pub urgency_keywords: Vec<String>,
    pub monetary_values: Vec<String>,
    pub sentiment: Prediction,
    pub classification: Prediction,
}

/// Outcome of running the detector over one message event.
#[derive(Debug, Clone, PartialEq)]
pub enum Assessment {
    /// No text to analyse; no oracle was consulted.
    Skipped,
    Scored {
        suspicious: bool,
        signals: SignalBundle,
    },
}

impl Assessment {
    pub fn is_suspicious(&self) -> bool {
        matches!(self, Assessment::Scored { suspicious: true, .. })
    }

    pub fn signals(&self) -> Option<&SignalBundle> {
        match self {
            Assessment::Skipped => None,
            Assessment::Scored { signals, .. } => Some(signals),
        }
    }
}

/// The OR-rule deciding whether a bundle is suspicious.
#[derive(Debug, Clone)]
pub struct DecisionRule {
    scam_label: String,
    confidence_threshold: f64,
}

impl DecisionRule {
    pub fn new(scam_label: impl Into<String>, confidence_threshold: f64) -> Self {
        Self {
            scam_label: scam_label.into().to_lowercase(),
            confidence_threshold,
        }
    }

    /// Any single signal is enough. The confidence branch fires for any
    /// label, so a confident "POSITIVE" counts as well.
    pub fn is_suspicious(&self, signals: &SignalBundle) -> bool {
        !signals.suspicious_keywords.is_empty()
            || !signals.monetary_values.is_empty()
            || !signals.urgency_keywords.is_empty()
            || signals.classification.label.to_lowercase() == self.scam_label
            || signals.classification.score > self.confidence_threshold
    }
}

/// Scores messages. Built once at startup and shared read-only between
/// concurrent message handlers.
pub struct Detector {
    suspicious: KeywordMatcher,
    urgency: KeywordMatcher,
    money: MonetaryExtractor,
    rule: DecisionRule,
    sentiment: Arc<dyn TextClassifier>,
    classifier: Arc<dyn TextClassifier>,
}

impl Detector {
    pub fn new(
        config: &DetectionConfig,
        sentiment: Arc<dyn TextClassifier>,
        classifier: Arc<dyn TextClassifier>,
    ) -> Result<Self> {
        let suspicious = KeywordMatcher::new(config.suspicious_keywords.iter().cloned());
        let urgency = KeywordMatcher::new(config.urgency_keywords.iter().cloned());
        debug!(
            "Detector ready: {} suspicious keywords, {} urgency keywords, oracles {} / {}",
            suspicious.keywords().len(),
            urgency.keywords().len(),
            sentiment.name(),
            classifier.name()
        );
        Ok(Self {
            suspicious,
            urgency,
            money: MonetaryExtractor::new()?,
            rule: DecisionRule::new(config.scam_label.clone(), config.confidence_threshold),
            sentiment,
            classifier,
        })
    }

    /// Run every heuristic and both oracles, then apply the decision rule.
    /// Oracle failures propagate; there is no partial result.
    pub async fn assess(&self, event: &MessageEvent) -> Result<Assessment> {
        let text = match event.text.as_deref() {
            Some(text) if !text.is_empty() => text,
            _ => return Ok(Assessment::Skipped),
        };

        let suspicious_keywords = self.suspicious.find(text);
        let urgency_keywords = self.urgency.find(text);
        let monetary_values = self.money.extract(text);

        let (sentiment, classification) = tokio::try_join!(
            async {
                self.sentiment
                    .classify(text)
                    .await
                    .with_context(|| format!("{} oracle failed", self.sentiment.name()))
            },
            async {
                self.classifier
                    .classify(text)
                    .await
                    .with_context(|| format!("{} oracle failed", self.classifier.name()))
            }
        )?;

        debug!(
            "Analysis results: Sentiment={}, Classification={}",
            sentiment.label, classification.label
        );

        let signals = SignalBundle {
            suspicious_keywords,
            urgency_keywords,
            monetary_values,
            sentiment,
            classification,
        };
        Ok(Assessment::Scored {
            suspicious: self.rule.is_suspicious(&signals),
            signals,
        })
    }
}
