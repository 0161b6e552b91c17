//! Traits and interfaces for the deals source and the publishing channel

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tracing::info;

use crate::error::ExtractionError;
use crate::models::{Offer, RawOffer};

/// Configuration for a deals listing site
#[derive(Debug, Clone)]
pub struct SourceConfig {
    /// Display name for the website
    pub name: String,
    /// Base URL used to absolutize relative links
    pub base_url: String,
    /// Page listing the newest deals first
    pub listing_url: String,
    /// CSS selectors for extracting data
    pub selectors: SiteSelectors,
}

/// CSS selectors for the parts of a deal card
#[derive(Debug, Clone)]
pub struct SiteSelectors {
    /// Container selector for individual deal cards
    pub card: String,
    /// Title anchor within the card; its `href` is the deal link
    pub title: String,
    /// Store name within the card
    pub store: String,
    /// Price stamp within the card
    pub price: String,
    /// Temperature (popularity) within the card
    pub temperature: String,
    /// Relative or absolute posting time within the card
    pub timestamp: String,
    /// Deal image within the card
    pub image: String,
}

/// A website that lists deals
#[async_trait]
pub trait OfferSource: Send + Sync {
    /// Reads up to `max_cards` deal cards in page order.
    ///
    /// Fails only when the page itself cannot be fetched; a broken card is
    /// reported in its own slot so the rest can still be processed.
    async fn fetch_cards(&self, max_cards: usize) -> Result<Vec<Result<RawOffer, ExtractionError>>>;
}

/// A channel that receives formatted offers
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Delivers one offer. Returns whether the channel accepted it.
    async fn send_offer(&self, offer: &Offer) -> bool;

    /// Delivers offers one at a time with `delay` between consecutive sends.
    ///
    /// # Returns
    /// * `usize` - Number of offers the channel accepted
    async fn send_batch(&self, offers: &[Offer], delay: Duration) -> usize {
        let mut sent = 0;

        for (i, offer) in offers.iter().enumerate() {
            if i > 0 && !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            if self.send_offer(offer).await {
                sent += 1;
            }
        }

        info!("Sent {} of {} offers", sent, offers.len());
        sent
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::Mutex;
    use tokio::time::Instant;

    /// Records when each offer reached the channel and rejects listed titles
    #[derive(Default)]
    struct TimedPublisher {
        reject: Vec<&'static str>,
        sends: Mutex<Vec<Instant>>,
    }

    #[async_trait]
    impl Publisher for TimedPublisher {
        async fn send_offer(&self, offer: &Offer) -> bool {
            self.sends.lock().unwrap().push(Instant::now());
            !self.reject.contains(&offer.title.as_str())
        }
    }

    fn offer(title: &str) -> Offer {
        Offer {
            title: title.to_string(),
            normalized_title: title.to_string(),
            price: "R$ 10,00".to_string(),
            store: "Amazon".to_string(),
            temperature: "100°".to_string(),
            posted_at: "há 1 min".to_string(),
            original_link: "https://www.pelando.com.br/d/1".to_string(),
            affiliate_link: "https://www.pelando.com.br/d/1".to_string(),
            image_url: None,
            scraped_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn batch_waits_between_sends_only() {
        let publisher = TimedPublisher {
            reject: vec!["Mouse"],
            ..Default::default()
        };
        let offers = [offer("Teclado"), offer("Mouse"), offer("Monitor")];
        let delay = Duration::from_millis(50);

        let started = Instant::now();
        let sent = publisher.send_batch(&offers, delay).await;

        assert_eq!(sent, 2);
        let sends = publisher.sends.lock().unwrap();
        assert_eq!(sends.len(), 3);
        assert!(sends[0] - started < delay);
        for pair in sends.windows(2) {
            assert!(pair[1] - pair[0] >= delay);
        }
    }

    #[tokio::test]
    async fn zero_delay_sends_back_to_back() {
        let publisher = TimedPublisher::default();
        let offers = [offer("Teclado"), offer("Mouse")];

        assert_eq!(publisher.send_batch(&offers, Duration::ZERO).await, 2);
        assert_eq!(publisher.sends.lock().unwrap().len(), 2);
        assert_eq!(publisher.send_batch(&[], Duration::from_secs(60)).await, 0);
    }
}
