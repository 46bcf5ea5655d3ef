use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::utils::html;
use tracing::info;

use crate::detection::SignalBundle;
use crate::platform::MessageEvent;

/// Telegram rejects messages over 4096 characters; the quoted text is cut
/// well below that so the surrounding template always fits.
const MAX_QUOTED_CHARS: usize = 3000;

/// Where alerts go: a numeric chat id or a public `@username`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertRecipient {
    ChatId(i64),
    Username(String),
}

impl FromStr for AlertRecipient {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        if let Some(name) = s.strip_prefix('@') {
            let valid = !name.is_empty()
                && name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_');
            if !valid {
                anyhow::bail!("'{}' is not a valid @username", s);
            }
            return Ok(AlertRecipient::Username(s.to_string()));
        }
        let id = s
            .parse::<i64>()
            .with_context(|| format!("'{}' is neither a chat id nor an @username", s))?;
        Ok(AlertRecipient::ChatId(id))
    }
}

impl fmt::Display for AlertRecipient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AlertRecipient::ChatId(id) => write!(f, "{}", id),
            AlertRecipient::Username(name) => write!(f, "{}", name),
        }
    }
}

/// Outbound channel for rendered alerts.
#[async_trait]
pub trait AlertSink: Send + Sync {
    async fn send(&self, recipient: &AlertRecipient, text: &str) -> Result<()>;
}

/// Renders alerts and delivers each one to the configured recipient.
pub struct AlertDispatcher {
    sink: Arc<dyn AlertSink>,
    recipient: AlertRecipient,
}

impl AlertDispatcher {
    pub fn new(sink: Arc<dyn AlertSink>, recipient: AlertRecipient) -> Self {
        Self { sink, recipient }
    }

    /// Send exactly one alert for `event`. No retry on failure.
    pub async fn dispatch(&self, event: &MessageEvent, signals: &SignalBundle) -> Result<()> {
        let text = render_alert(event, signals);
        info!("Reporting suspicious message to developer: {}", self.recipient);
        self.sink
            .send(&self.recipient, &text)
            .await
            .with_context(|| format!("Failed to deliver alert to {}", self.recipient))
    }
}

/// Render the HTML alert body. Every user-controlled field is escaped.
pub fn render_alert(event: &MessageEvent, signals: &SignalBundle) -> String {
    let message = event.text.as_deref().unwrap_or_default();
    format!(
        "🚨 <b>Suspicious Activity Alert</b> 🚨\n\
         <b>Channel</b>: {}\n\
         <b>Sender</b>: @{}\n\
         <b>Message</b>: {}\n\
         <b>Detected Keywords</b>: {}\n\
         <b>Monetary Values</b>: {}\n\
         <b>Urgency Indicators</b>: {}\n\
         <b>Sentiment Analysis</b>: {} (Score: {:.2})\n\
         <b>AI Classification</b>: {} (Confidence: {:.2})",
        html::escape(&event.chat_name),
        html::escape(&event.sender),
        html::escape(&truncate_chars(message, MAX_QUOTED_CHARS)),
        join_or_none(&signals.suspicious_keywords),
        join_or_none(&signals.monetary_values),
        join_or_none(&signals.urgency_keywords),
        html::escape(&signals.sentiment.label),
        signals.sentiment.score,
        html::escape(&signals.classification.label),
        signals.classification.score,
    )
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "None".to_string()
    } else {
        html::escape(&items.join(", "))
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((cut, _)) => format!("{}…", &text[..cut]),
        None => text.to_string(),
    }
}
