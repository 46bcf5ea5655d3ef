pub mod telegram;

use async_trait::async_trait;

/// A message seen in any chat the bot belongs to.
#[derive(Debug, Clone)]
pub struct MessageEvent {
    /// Platform-specific chat/channel ID
    pub chat_id: i64,
    /// Human-readable chat name (title, username or id)
    pub chat_name: String,
    /// Sender username, or "Unknown"
    pub sender: String,
    /// Text or caption; `None` for stickers, bare media and service messages
    pub text: Option<String>,
}

/// Receives every inbound event. Implementations report their own failures;
/// nothing is returned to the transport.
#[async_trait]
pub trait MessageHandler: Send + Sync {
    async fn handle(&self, event: MessageEvent);
}
