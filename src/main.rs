mod alert;
mod config;
mod detection;
mod heartbeat;
mod monitor;
mod oracle;
mod platform;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::alert::AlertDispatcher;
use crate::config::Config;
use crate::detection::Detector;
use crate::heartbeat::Heartbeat;
use crate::monitor::Monitor;
use crate::oracle::{InferenceClient, TextClassifier};
use crate::platform::telegram::{self, TelegramAlertSink};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,scamwatch=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("config.toml"));

    info!("Loading configuration from: {}", config_path.display());
    let config = match Config::load(&config_path) {
        Ok(config) => config,
        Err(e) => {
            error!("{:#}", e);
            return Err(e).with_context(|| {
                format!("Failed to load config from {}", config_path.display())
            });
        }
    };

    info!("Configuration loaded successfully");
    info!("  Alert recipient: {}", config.telegram.developer_id);
    info!(
        "  Keywords: {} suspicious, {} urgency",
        config.detection.suspicious_keywords.len(),
        config.detection.urgency_keywords.len()
    );
    info!(
        "  Classifier threshold: {} (scam label '{}')",
        config.detection.confidence_threshold, config.detection.scam_label
    );

    // Oracles are built once and shared by every message handler
    let sentiment: Arc<dyn TextClassifier> =
        Arc::new(InferenceClient::new("sentiment", &config.oracles.sentiment)?);
    let classifier: Arc<dyn TextClassifier> =
        Arc::new(InferenceClient::new("classifier", &config.oracles.classifier)?);
    let detector = Detector::new(&config.detection, sentiment, classifier)?;

    let bot = telegram::connect(&config.telegram).await?;
    let dispatcher = AlertDispatcher::new(
        Arc::new(TelegramAlertSink::new(bot.clone())),
        config.telegram.developer_id.clone(),
    );
    let monitor = Arc::new(Monitor::new(detector, dispatcher));

    let heartbeat = Heartbeat::new(monitor.clone(), &config.general.heartbeat_cron).await?;
    heartbeat.start().await?;

    info!("Bot is running...");
    telegram::run(bot, monitor).await?;

    heartbeat.stop().await?;
    Ok(())
}
