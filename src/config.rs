//! Environment-driven configuration

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

use crate::affiliate::AffiliatePrograms;

pub const DEFAULT_SOURCE_URL: &str = "https://www.pelando.com.br/recentes";

/// Runtime configuration, read once at start-up.
#[derive(Debug, Clone)]
pub struct Config {
    /// Telegram bot token
    pub channel_token: Option<String>,
    /// Telegram chat or channel id
    pub channel_destination: Option<String>,
    pub interval_minutes: u64,
    pub max_offers_per_cycle: usize,
    pub affiliates: AffiliatePrograms,
    /// Where the sent-offers ledger is persisted
    pub sent_offers_path: PathBuf,
    /// Delay between consecutive channel messages
    pub send_delay: Duration,
    /// Timeout applied to every outbound HTTP call
    pub request_timeout: Duration,
    /// Maximum number of affiliate resolutions in flight
    pub resolve_concurrency: usize,
    pub source_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            channel_token: None,
            channel_destination: None,
            interval_minutes: 30,
            max_offers_per_cycle: 10,
            affiliates: AffiliatePrograms::default(),
            sent_offers_path: PathBuf::from("sent_offers.json"),
            send_delay: Duration::from_secs(3),
            request_timeout: Duration::from_secs(30),
            resolve_concurrency: 4,
            source_url: DEFAULT_SOURCE_URL.to_string(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    ///
    /// Blank values count as unset. Numeric values that fail to parse are an
    /// error naming the offending variable.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let config = Self {
            channel_token: get("TELEGRAM_BOT_TOKEN"),
            channel_destination: get("TELEGRAM_CHAT_ID"),
            interval_minutes: parse_or(get("INTERVAL_MINUTES"), "INTERVAL_MINUTES", defaults.interval_minutes)?,
            max_offers_per_cycle: parse_or(
                get("MAX_OFFERS_PER_CYCLE"),
                "MAX_OFFERS_PER_CYCLE",
                defaults.max_offers_per_cycle,
            )?,
            affiliates: AffiliatePrograms::new(
                get("AFFILIATE_ID_MERCADOLIVRE"),
                get("AFFILIATE_ID_AMAZON"),
                get("AFFILIATE_ID_ALIEXPRESS"),
            ),
            sent_offers_path: get("SENT_OFFERS_PATH").map_or(defaults.sent_offers_path, PathBuf::from),
            send_delay: Duration::from_secs(parse_or(
                get("SEND_DELAY_SECS"),
                "SEND_DELAY_SECS",
                defaults.send_delay.as_secs(),
            )?),
            request_timeout: Duration::from_secs(parse_or(
                get("REQUEST_TIMEOUT_SECS"),
                "REQUEST_TIMEOUT_SECS",
                defaults.request_timeout.as_secs(),
            )?),
            resolve_concurrency: parse_or(
                get("RESOLVE_CONCURRENCY"),
                "RESOLVE_CONCURRENCY",
                defaults.resolve_concurrency,
            )?
            .max(1),
            source_url: get("SOURCE_URL").unwrap_or(defaults.source_url),
        };

        if config.interval_minutes == 0 {
            anyhow::bail!("INTERVAL_MINUTES must be at least 1");
        }
        if config.interval_minutes.checked_mul(60).is_none() {
            anyhow::bail!("INTERVAL_MINUTES is too large: {}", config.interval_minutes);
        }

        Ok(config)
    }

    /// Time between scheduled cycles.
    pub fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_minutes.saturating_mul(60))
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match value {
        Some(raw) => raw
            .parse()
            .with_context(|| format!("invalid value for {key}: {raw:?}")),
        None => Ok(default),
    }
}
