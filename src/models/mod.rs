//! Data models for scraped offers and Telegram Bot API payloads

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const PRICE_PLACEHOLDER: &str = "Preço não informado";
pub const TEMPERATURE_PLACEHOLDER: &str = "0°";
pub const POSTED_AT_PLACEHOLDER: &str = "Tempo não informado";

/// Fields of a single deal card, as read from the listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawOffer {
    pub title: String,
    pub store: String,
    pub original_link: String,
    pub price: String,
    pub temperature: String,
    pub posted_at: String,
    pub image_url: Option<String>,
}

impl RawOffer {
    /// Coupon listings have no product page to tag.
    pub fn is_coupon(&self) -> bool {
        self.title.to_lowercase().contains("cupom")
    }
}

/// A deal ready to publish
#[derive(Debug, Clone)]
pub struct Offer {
    pub title: String,
    pub normalized_title: String,
    pub price: String,
    pub store: String,
    /// Popularity signal shown by the deals site, e.g. "312°"
    pub temperature: String,
    pub posted_at: String,
    pub original_link: String,
    /// Falls back to `original_link` when no product page was resolved
    pub affiliate_link: String,
    pub image_url: Option<String>,
    pub scraped_at: DateTime<Utc>,
}

impl Offer {
    pub fn fingerprint(&self) -> Fingerprint {
        Fingerprint::new(&self.title, &self.price)
    }
}

/// Deduplication key built from an offer's title and price.
///
/// Case-folded with whitespace runs collapsed, so the same deal resurfacing
/// with a new temperature or timestamp maps to the same key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn new(title: &str, price: &str) -> Self {
        let collapse = |s: &str| s.split_whitespace().collect::<Vec<_>>().join("_");
        Self(format!("{}_{}", collapse(title), collapse(price)).to_lowercase())
    }
}

/// Telegram `sendMessage` request body
#[derive(Debug, Serialize)]
pub struct TelegramMessage {
    pub chat_id: String,
    pub text: String,
    pub parse_mode: &'static str,
    pub disable_web_page_preview: bool,
}

/// Telegram `sendPhoto` request body
#[derive(Debug, Serialize)]
pub struct TelegramPhoto {
    pub chat_id: String,
    pub photo: String,
    pub caption: String,
    pub parse_mode: &'static str,
}

/// Envelope returned by every Telegram Bot API method
#[derive(Debug, Deserialize)]
pub struct TelegramResponse {
    pub ok: bool,
    #[serde(default)]
    pub description: Option<String>,
}
