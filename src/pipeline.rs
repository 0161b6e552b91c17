//! Scraped deal cards in, publishable offers out

use std::sync::Arc;

use anyhow::Result;
use chrono::Utc;
use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::affiliate::AffiliateResolver;
use crate::models::{Offer, RawOffer};
use crate::normalizer::normalize_title;
use crate::traits::OfferSource;

#[derive(Clone)]
pub struct OfferPipeline {
    source: Arc<dyn OfferSource>,
    resolver: AffiliateResolver,
    concurrency: usize,
}

impl OfferPipeline {
    pub fn new(source: Arc<dyn OfferSource>, resolver: AffiliateResolver, concurrency: usize) -> Self {
        Self {
            source,
            resolver,
            concurrency: concurrency.max(1),
        }
    }

    /// Produces at most `max_offers` offers in source order.
    ///
    /// Broken cards and coupon listings are dropped. Affiliate links are
    /// resolved concurrently, bounded by the configured fan-out.
    pub async fn run(&self, max_offers: usize) -> Result<Vec<Offer>> {
        let cards = self.source.fetch_cards(max_offers).await?;

        let raw_offers: Vec<RawOffer> = cards
            .into_iter()
            .enumerate()
            .filter_map(|(i, card)| match card {
                Ok(raw) => Some(raw),
                Err(e) => {
                    warn!("Skipping deal card {}: {}", i, e);
                    None
                }
            })
            .filter(|raw| {
                if raw.is_coupon() {
                    info!("Ignoring coupon deal: '{}'", raw.title);
                    return false;
                }
                true
            })
            .collect();

        let offers: Vec<Offer> = stream::iter(raw_offers)
            .map(|raw| self.build_offer(raw))
            .buffered(self.concurrency)
            .collect()
            .await;

        info!("Pipeline produced {} offers", offers.len());
        Ok(offers)
    }

    async fn build_offer(&self, raw: RawOffer) -> Offer {
        let normalized_title = normalize_title(&raw.title);
        let resolved = self
            .resolver
            .resolve(&normalized_title, &raw.store, &raw.original_link)
            .await;
        let affiliate_link = if resolved.is_empty() {
            raw.original_link.clone()
        } else {
            resolved
        };

        Offer {
            title: raw.title,
            normalized_title,
            price: raw.price,
            store: raw.store,
            temperature: raw.temperature,
            posted_at: raw.posted_at,
            original_link: raw.original_link,
            affiliate_link,
            image_url: raw.image_url,
            scraped_at: Utc::now(),
        }
    }
}
