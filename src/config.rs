use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::Path;

use crate::alert::AlertRecipient;

/// Environment variables that must be present before the bot may connect.
pub const REQUIRED_ENV: [&str; 4] = ["API_ID", "API_HASH", "BOT_TOKEN", "DEVELOPER_ID"];

/// Fully resolved configuration, built once at startup and read-only afterwards.
#[derive(Debug, Clone)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub detection: DetectionConfig,
    pub oracles: OraclesConfig,
    pub general: GeneralConfig,
}

#[derive(Debug, Clone)]
pub struct TelegramConfig {
    pub api_id: i64,
    pub api_hash: String,
    pub bot_token: String,
    pub developer_id: AlertRecipient,
}

/// On-disk layout of `config.toml`. Every key is optional; the Telegram
/// credentials are normally supplied through the environment instead.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub telegram: TelegramFileConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub oracles: OraclesConfig,
    #[serde(default)]
    pub general: GeneralConfig,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct TelegramFileConfig {
    pub api_id: Option<String>,
    pub api_hash: Option<String>,
    pub bot_token: Option<String>,
    pub developer_id: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DetectionConfig {
    #[serde(default = "default_suspicious_keywords")]
    pub suspicious_keywords: Vec<String>,
    #[serde(default = "default_urgency_keywords")]
    pub urgency_keywords: Vec<String>,
    /// Classifier label that marks a message as a scam outright.
    #[serde(default = "default_scam_label")]
    pub scam_label: String,
    /// Classifier confidence strictly above this value is suspicious on its own.
    #[serde(default = "default_confidence_threshold")]
    pub confidence_threshold: f64,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            suspicious_keywords: default_suspicious_keywords(),
            urgency_keywords: default_urgency_keywords(),
            scam_label: default_scam_label(),
            confidence_threshold: default_confidence_threshold(),
        }
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct OraclesConfig {
    #[serde(default)]
    pub sentiment: OracleConfig,
    #[serde(default)]
    pub classifier: OracleConfig,
}

/// Connection settings for one text-classification endpoint.
#[derive(Debug, Deserialize, Clone)]
pub struct OracleConfig {
    #[serde(default = "default_oracle_base_url")]
    pub base_url: String,
    #[serde(default = "default_oracle_model")]
    pub model: String,
    #[serde(default)]
    pub api_key: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            base_url: default_oracle_base_url(),
            model: default_oracle_model(),
            api_key: String::new(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl OracleConfig {
    /// Full URL of the model endpoint.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), self.model)
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GeneralConfig {
    #[serde(default = "default_heartbeat_cron")]
    pub heartbeat_cron: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            heartbeat_cron: default_heartbeat_cron(),
        }
    }
}

fn default_suspicious_keywords() -> Vec<String> {
    [
        "ICO",
        "pump and dump",
        "get rich quick",
        "phishing",
        "double your money",
        "high returns",
        "guaranteed profit",
        "crypto mining",
        "investment opportunity",
        "binary options",
        "no risk",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

fn default_urgency_keywords() -> Vec<String> {
    ["act now", "limited time", "urgent", "only today"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_scam_label() -> String {
    "scam".to_string()
}

fn default_confidence_threshold() -> f64 {
    0.8
}

fn default_oracle_base_url() -> String {
    "https://router.huggingface.co/hf-inference/models".to_string()
}

fn default_oracle_model() -> String {
    "distilbert-base-uncased-finetuned-sst-2-english".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_heartbeat_cron() -> String {
    "0 0 * * * *".to_string()
}

impl Config {
    /// Load `path` (if it exists) and overlay the process environment.
    pub fn load(path: &Path) -> Result<Self> {
        let file = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            FileConfig::default()
        };

        Self::resolve(file, |key| std::env::var(key).ok())
    }

    /// Merge file settings with values from `lookup` (environment wins) and
    /// validate the result. Blank values count as missing.
    pub fn resolve<F>(file: FileConfig, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_blank = |v: String| -> Option<String> {
            let v = v.trim();
            (!v.is_empty()).then(|| v.to_string())
        };
        let pick = |key: &str, fallback: &Option<String>| -> Option<String> {
            lookup(key)
                .and_then(non_blank)
                .or_else(|| fallback.clone().and_then(non_blank))
        };

        let tg = &file.telegram;
        let api_id = pick("API_ID", &tg.api_id);
        let api_hash = pick("API_HASH", &tg.api_hash);
        let bot_token = pick("BOT_TOKEN", &tg.bot_token);
        let developer_id = pick("DEVELOPER_ID", &tg.developer_id);

        let missing: Vec<&str> = REQUIRED_ENV
            .iter()
            .zip([&api_id, &api_hash, &bot_token, &developer_id])
            .filter(|(_, value)| value.is_none())
            .map(|(name, _)| *name)
            .collect();
        if !missing.is_empty() {
            anyhow::bail!(
                "Missing one or more required environment variables: {}",
                missing.join(", ")
            );
        }

        // All four are Some past this point.
        let api_id = api_id.unwrap_or_default();
        let api_id: i64 = api_id
            .parse()
            .with_context(|| format!("API_ID must be an integer, got '{}'", api_id))?;
        let developer_id: AlertRecipient = developer_id
            .unwrap_or_default()
            .parse()
            .context("Invalid DEVELOPER_ID")?;

        let mut oracles = file.oracles;
        if let Some(token) = lookup("HF_API_TOKEN").filter(|t| !t.trim().is_empty()) {
            for oracle in [&mut oracles.sentiment, &mut oracles.classifier] {
                if oracle.api_key.is_empty() {
                    oracle.api_key = token.trim().to_string();
                }
            }
        }

        let config = Config {
            telegram: TelegramConfig {
                api_id,
                api_hash: api_hash.unwrap_or_default(),
                bot_token: bot_token.unwrap_or_default(),
                developer_id,
            },
            detection: file.detection,
            oracles,
            general: file.general,
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        let detection = &self.detection;
        if !(0.0..=1.0).contains(&detection.confidence_threshold) {
            anyhow::bail!(
                "detection.confidence_threshold must be within [0, 1], got {}",
                detection.confidence_threshold
            );
        }
        for (name, list) in [
            ("suspicious_keywords", &detection.suspicious_keywords),
            ("urgency_keywords", &detection.urgency_keywords),
        ] {
            if list.iter().any(|kw| kw.trim().is_empty()) {
                anyhow::bail!("detection.{} contains a blank keyword", name);
            }
        }
        for (name, oracle) in [
            ("sentiment", &self.oracles.sentiment),
            ("classifier", &self.oracles.classifier),
        ] {
            if oracle.model.trim().is_empty() {
                anyhow::bail!("oracles.{}.model must not be empty", name);
            }
            if oracle.timeout_secs == 0 {
                anyhow::bail!("oracles.{}.timeout_secs must be positive", name);
            }
        }
        Ok(())
    }
}
