use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use teloxide::payloads::SendMessageSetters;
use teloxide::prelude::*;
use teloxide::types::{Chat, ParseMode, Recipient};
use tracing::{debug, info, warn};

use crate::alert::{AlertRecipient, AlertSink};
use crate::config::TelegramConfig;
use crate::platform::{MessageEvent, MessageHandler};

/// Build the bot client and check the token against the Bot API.
pub async fn connect(config: &TelegramConfig) -> Result<Bot> {
    // The Bot API authenticates with the token alone; the application
    // credentials are validated at startup but not sent.
    debug!(
        "Application credentials present (id {}, hash {} chars)",
        config.api_id,
        config.api_hash.len()
    );

    let bot = Bot::new(&config.bot_token);
    let me = bot
        .get_me()
        .await
        .context("Failed to authenticate with the Telegram Bot API")?;
    info!(
        "Authenticated as @{}",
        me.user.username.as_deref().unwrap_or("unknown")
    );
    Ok(bot)
}

/// Run the Telegram dispatcher until shutdown, handing every group message
/// and channel post to `handler`.
pub async fn run(bot: Bot, handler: Arc<dyn MessageHandler>) -> Result<()> {
    info!("Starting Telegram platform...");

    let tree = dptree::entry()
        .branch(Update::filter_message().endpoint(handle_update))
        .branch(Update::filter_channel_post().endpoint(handle_update));

    Dispatcher::builder(bot, tree)
        .dependencies(dptree::deps![handler])
        .default_handler(|upd| async move {
            debug!("Unhandled update: {:?}", upd.id);
        })
        .error_handler(LoggingErrorHandler::with_custom_text("telegram"))
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    warn!("Telegram dispatcher stopped");
    Ok(())
}

async fn handle_update(msg: Message, handler: Arc<dyn MessageHandler>) -> ResponseResult<()> {
    let event = message_event(&msg);
    info!("New message in {} by @{}", event.chat_name, event.sender);

    // The dispatcher serializes updates per chat; a spawned task lets a slow
    // oracle call overlap with the next message from the same chat.
    tokio::spawn(async move {
        handler.handle(event).await;
    });
    Ok(())
}

fn message_event(msg: &Message) -> MessageEvent {
    MessageEvent {
        chat_id: msg.chat.id.0,
        chat_name: chat_display_name(&msg.chat),
        sender: sender_username(msg),
        text: msg.text().or_else(|| msg.caption()).map(str::to_string),
    }
}

fn chat_display_name(chat: &Chat) -> String {
    chat.title()
        .or_else(|| chat.username())
        .or_else(|| chat.first_name())
        .map(str::to_string)
        .unwrap_or_else(|| chat.id.to_string())
}

fn sender_username(msg: &Message) -> String {
    msg.from
        .as_ref()
        .and_then(|user| user.username.clone())
        .or_else(|| {
            msg.sender_chat
                .as_ref()
                .and_then(|chat| chat.username().map(str::to_string))
        })
        .unwrap_or_else(|| "Unknown".to_string())
}

/// Delivers alerts through the bot account. Usernames only resolve for
/// public channels and groups; private users need a numeric id.
pub struct TelegramAlertSink {
    bot: Bot,
}

impl TelegramAlertSink {
    pub fn new(bot: Bot) -> Self {
        Self { bot }
    }
}

#[async_trait]
impl AlertSink for TelegramAlertSink {
    async fn send(&self, recipient: &AlertRecipient, text: &str) -> Result<()> {
        self.bot
            .send_message(to_recipient(recipient), text)
            .parse_mode(ParseMode::Html)
            .await
            .context("Telegram rejected the alert message")?;
        Ok(())
    }
}

fn to_recipient(recipient: &AlertRecipient) -> Recipient {
    match recipient {
        AlertRecipient::ChatId(id) => Recipient::Id(ChatId(*id)),
        AlertRecipient::Username(name) => Recipient::ChannelUsername(name.clone()),
    }
}
