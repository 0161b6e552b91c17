//! # Telegram Channel Integration
//!
//! This module delivers newly discovered offers to a Telegram channel through
//! the Bot API. Offers with an image are sent as a photo with an HTML caption;
//! the rest go out as plain HTML messages.
//!
//! ## Message Layout
//!
//! Each message includes:
//! - **Title**: the deal title in bold, prefixed with 🔥
//! - **Price**, **Store**, **Temperature** and **Posted** lines
//! - **Link**: an anchor to the affiliate-tagged product page
//! - **Hashtags**: `#oferta #promocao #<store>`
//!
//! ## Rate Limits
//!
//! Telegram allows roughly 20 messages per minute into a single group or
//! channel. Batches are therefore sent one message at a time with a fixed
//! delay in between (see [`Publisher::send_batch`]).
//!
//! ## Environment Configuration
//!
//! Set `TELEGRAM_BOT_TOKEN` and `TELEGRAM_CHAT_ID`. If either is missing,
//! delivery is disabled and every send is reported as failed.

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use tracing::{error, info, warn};

use crate::models::{Offer, TelegramMessage, TelegramPhoto, TelegramResponse};
use crate::traits::Publisher;

/// Telegram Bot API client bound to a single chat.
///
/// ## Fields
///
/// - `client`: Reusable HTTP client with a per-request timeout
/// - `api_base`: `https://api.telegram.org/bot<token>`, or `None` when unconfigured
/// - `chat_id`: Destination channel or group
pub struct TelegramPublisher {
    client: Client,
    api_base: Option<String>,
    chat_id: String,
}

impl TelegramPublisher {
    /// Creates a publisher for `chat_id` using the bot `token`.
    ///
    /// Missing credentials are not an error: the publisher is still usable
    /// but logs and reports a failure for every offer.
    pub fn new(token: Option<&str>, chat_id: Option<&str>, timeout: Duration) -> Result<Self> {
        let client = Client::builder().timeout(timeout).build()?;

        let (api_base, chat_id) = match (token, chat_id) {
            (Some(token), Some(chat_id)) => (
                Some(format!("https://api.telegram.org/bot{token}")),
                chat_id.to_string(),
            ),
            _ => {
                warn!("TELEGRAM_BOT_TOKEN or TELEGRAM_CHAT_ID not set - Telegram delivery will be disabled");
                (None, String::new())
            }
        };

        Ok(Self {
            client,
            api_base,
            chat_id,
        })
    }

    /// Renders an offer as a Telegram HTML message.
    ///
    /// ## Example
    ///
    /// ```text
    /// 🔥 <b>Fone Bluetooth XYZ</b>
    ///
    /// 💰 <b>Preço:</b> R$ 99,90
    /// 🏪 <b>Loja:</b> Mercado Livre
    /// 🌡️ <b>Temperatura:</b> 312°
    /// ⏰ <b>Postado:</b> há 5 min
    ///
    /// 🔗 <a href="https://...">Ver oferta completa</a>
    ///
    /// #oferta #promocao #mercadolivre
    /// ```
    pub fn format_offer_message(offer: &Offer) -> String {
        let store_tag: String = offer
            .store
            .to_lowercase()
            .chars()
            .filter(|c| c.is_alphanumeric())
            .collect();
        let hashtags = if store_tag.is_empty() {
            "#oferta #promocao".to_string()
        } else {
            format!("#oferta #promocao #{store_tag}")
        };

        format!(
            "🔥 <b>{title}</b>\n\n\
             💰 <b>Preço:</b> {price}\n\
             🏪 <b>Loja:</b> {store}\n\
             🌡️ <b>Temperatura:</b> {temperature}\n\
             ⏰ <b>Postado:</b> {posted_at}\n\n\
             🔗 <a href=\"{link}\">Ver oferta completa</a>\n\n\
             {hashtags}",
            title = escape_html(&offer.title),
            price = escape_html(&offer.price),
            store = escape_html(&offer.store),
            temperature = escape_html(&offer.temperature),
            posted_at = escape_html(&offer.posted_at),
            link = escape_html(&offer.affiliate_link),
        )
    }

    async fn call<T: serde::Serialize + Sync>(&self, api_base: &str, method: &str, body: &T) -> bool {
        let url = format!("{api_base}/{method}");

        let response = match self.client.post(&url).json(body).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Telegram {} request failed: {}", method, e);
                return false;
            }
        };

        let status = response.status();
        match response.json::<TelegramResponse>().await {
            Ok(reply) if status.is_success() && reply.ok => true,
            Ok(reply) => {
                error!(
                    "Telegram rejected {} ({}): {}",
                    method,
                    status,
                    reply.description.unwrap_or_default()
                );
                false
            }
            Err(e) => {
                error!("Unreadable Telegram {} response ({}): {}", method, status, e);
                false
            }
        }
    }
}

#[async_trait]
impl Publisher for TelegramPublisher {
    async fn send_offer(&self, offer: &Offer) -> bool {
        let Some(api_base) = &self.api_base else {
            warn!("Telegram disabled, not sending: {}", offer.title);
            return false;
        };

        let text = Self::format_offer_message(offer);
        let delivered = match &offer.image_url {
            Some(photo) => {
                let body = TelegramPhoto {
                    chat_id: self.chat_id.clone(),
                    photo: photo.clone(),
                    caption: text,
                    parse_mode: "HTML",
                };
                self.call(api_base, "sendPhoto", &body).await
            }
            None => {
                let body = TelegramMessage {
                    chat_id: self.chat_id.clone(),
                    text,
                    parse_mode: "HTML",
                    disable_web_page_preview: false,
                };
                self.call(api_base, "sendMessage", &body).await
            }
        };

        if delivered {
            info!("Telegram message sent for offer: {}", offer.title);
        }
        delivered
    }
}

fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}
