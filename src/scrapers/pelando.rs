//! Pelando.com.br specific scraper implementation

use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::info;

use crate::error::ExtractionError;
use crate::models::{POSTED_AT_PLACEHOLDER, PRICE_PLACEHOLDER, RawOffer, TEMPERATURE_PLACEHOLDER};
use crate::traits::{OfferSource, SiteSelectors, SourceConfig};

/// Scraper implementation for Pelando
pub struct PelandoScraper {
    client: Client,
    config: SourceConfig,
}

impl PelandoScraper {
    /// Create a new Pelando scraper reading `listing_url`
    pub fn new(listing_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36")
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            config: Self::default_config(listing_url),
        })
    }

    fn default_config(listing_url: &str) -> SourceConfig {
        SourceConfig {
            name: "Pelando".to_string(),
            base_url: "https://www.pelando.com.br".to_string(),
            listing_url: listing_url.to_string(),
            selectors: SiteSelectors {
                card: "._deal-card_1jdb6_25".to_string(),
                title: "._title_mszsg_31".to_string(),
                store: "._container_13qz9_31 a".to_string(),
                price: "._deal-card-stamp_15l5n_25".to_string(),
                temperature: "._deal-card-temperature_1o9of_29 span".to_string(),
                timestamp: "._timestamp_1s0as_25".to_string(),
                image: "._deal-card-image_1glvo_31".to_string(),
            },
        }
    }
}

#[async_trait]
impl OfferSource for PelandoScraper {
    async fn fetch_cards(&self, max_cards: usize) -> Result<Vec<Result<RawOffer, ExtractionError>>> {
        info!("Fetching deals from {}", self.config.name);

        let response = self.client.get(&self.config.listing_url).send().await?;

        if !response.status().is_success() {
            return Err(anyhow::anyhow!(
                "Failed to fetch {} listing: {}",
                self.config.name,
                response.status()
            ));
        }

        let html = response.text().await?;
        let cards = extract_cards(&self.config, &html, max_cards)?;

        info!("Read {} deal cards from {}", cards.len(), self.config.name);
        Ok(cards)
    }
}

struct CardSelectors {
    card: Selector,
    title: Selector,
    store: Selector,
    price: Selector,
    temperature: Selector,
    timestamp: Selector,
    image: Selector,
}

impl CardSelectors {
    fn parse(selectors: &SiteSelectors) -> Result<Self, ExtractionError> {
        let parse = |css: &str| {
            Selector::parse(css).map_err(|e| ExtractionError::Selector(format!("{css}: {e:?}")))
        };

        Ok(Self {
            card: parse(&selectors.card)?,
            title: parse(&selectors.title)?,
            store: parse(&selectors.store)?,
            price: parse(&selectors.price)?,
            temperature: parse(&selectors.temperature)?,
            timestamp: parse(&selectors.timestamp)?,
            image: parse(&selectors.image)?,
        })
    }
}

/// Reads deal cards from a listing page, in page order.
fn extract_cards(
    config: &SourceConfig,
    html: &str,
    max_cards: usize,
) -> Result<Vec<Result<RawOffer, ExtractionError>>, ExtractionError> {
    let selectors = CardSelectors::parse(&config.selectors)?;
    let document = Html::parse_document(html);

    let cards = document
        .select(&selectors.card)
        .take(max_cards)
        .map(|card| extract_card(config, &selectors, card))
        .collect();

    Ok(cards)
}

fn extract_card(
    config: &SourceConfig,
    selectors: &CardSelectors,
    card: ElementRef<'_>,
) -> Result<RawOffer, ExtractionError> {
    let title_el = card
        .select(&selectors.title)
        .next()
        .ok_or(ExtractionError::MissingField("title"))?;

    let title = inner_text(title_el);
    let original_link = title_el
        .value()
        .attr("href")
        .map(|href| absolutize(&config.base_url, href))
        .unwrap_or_default();

    let text_or = |selector: &Selector, placeholder: &str| {
        card.select(selector)
            .next()
            .map(inner_text)
            .filter(|text| !text.is_empty())
            .unwrap_or_else(|| placeholder.to_string())
    };

    let image_url = card
        .select(&selectors.image)
        .next()
        .and_then(|img| {
            // Lazy-loaded cards keep the real image in data-src
            img.value()
                .attr("data-src")
                .filter(|src| !src.is_empty())
                .or_else(|| img.value().attr("src"))
        })
        .filter(|src| !src.is_empty() && !src.starts_with("data:"))
        .map(|src| absolutize(&config.base_url, src));

    Ok(RawOffer {
        title,
        store: text_or(&selectors.store, ""),
        original_link,
        price: text_or(&selectors.price, PRICE_PLACEHOLDER),
        temperature: text_or(&selectors.temperature, TEMPERATURE_PLACEHOLDER),
        posted_at: text_or(&selectors.timestamp, POSTED_AT_PLACEHOLDER),
        image_url,
    })
}

fn inner_text(el: ElementRef<'_>) -> String {
    el.text().collect::<String>().trim().to_string()
}

fn absolutize(base_url: &str, href: &str) -> String {
    if href.starts_with("http") {
        href.to_string()
    } else if href.starts_with("//") {
        format!("https:{href}")
    } else {
        format!("{base_url}{href}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LISTING: &str = r#"
        <html><body>
          <div class="_deal-card_1jdb6_25">
            <a class="_title_mszsg_31" href="/d/fone-bluetooth-xyz-123">40% OFF Fone Bluetooth XYZ</a>
            <div class="_container_13qz9_31"><a href="/s/ml">Mercado Livre</a></div>
            <span class="_deal-card-stamp_15l5n_25"> R$ 99,90 </span>
            <div class="_deal-card-temperature_1o9of_29"><span>312°</span></div>
            <span class="_timestamp_1s0as_25">há 5 min</span>
            <img class="_deal-card-image_1glvo_31" src="//media.pelando.com.br/fone.jpg">
          </div>
          <div class="_deal-card_1jdb6_25">
            <a class="_title_mszsg_31" href="https://www.pelando.com.br/d/cupom-456">Cupom 10% em Eletrônicos</a>
          </div>
          <div class="_deal-card_1jdb6_25">
            <p>card without a title</p>
          </div>
          <div class="_deal-card_1jdb6_25">
            <a class="_title_mszsg_31" href="/d/four">Fourth card</a>
            <img class="_deal-card-image_1glvo_31" src="data:image/gif;base64,R0lGOD" data-src="/img/four.jpg">
          </div>
        </body></html>
    "#;

    fn config() -> SourceConfig {
        PelandoScraper::default_config("https://www.pelando.com.br/recentes")
    }

    #[test]
    fn reads_all_card_fields() {
        let cards = extract_cards(&config(), LISTING, 10).unwrap();
        let first = cards[0].as_ref().unwrap();

        assert_eq!(first.title, "40% OFF Fone Bluetooth XYZ");
        assert_eq!(first.store, "Mercado Livre");
        assert_eq!(first.original_link, "https://www.pelando.com.br/d/fone-bluetooth-xyz-123");
        assert_eq!(first.price, "R$ 99,90");
        assert_eq!(first.temperature, "312°");
        assert_eq!(first.posted_at, "há 5 min");
        assert_eq!(first.image_url.as_deref(), Some("https://media.pelando.com.br/fone.jpg"));
    }

    #[test]
    fn missing_fields_get_placeholders() {
        let cards = extract_cards(&config(), LISTING, 10).unwrap();
        let coupon = cards[1].as_ref().unwrap();

        assert_eq!(coupon.original_link, "https://www.pelando.com.br/d/cupom-456");
        assert_eq!(coupon.store, "");
        assert_eq!(coupon.price, PRICE_PLACEHOLDER);
        assert_eq!(coupon.temperature, TEMPERATURE_PLACEHOLDER);
        assert_eq!(coupon.posted_at, POSTED_AT_PLACEHOLDER);
        assert!(coupon.image_url.is_none());
    }

    #[test]
    fn broken_card_does_not_hide_the_rest() {
        let cards = extract_cards(&config(), LISTING, 10).unwrap();

        assert_eq!(cards.len(), 4);
        assert!(matches!(cards[2], Err(ExtractionError::MissingField("title"))));
        assert_eq!(cards[3].as_ref().unwrap().title, "Fourth card");
    }

    #[test]
    fn lazy_images_prefer_data_src() {
        let cards = extract_cards(&config(), LISTING, 10).unwrap();
        let lazy = cards[3].as_ref().unwrap();

        assert_eq!(lazy.image_url.as_deref(), Some("https://www.pelando.com.br/img/four.jpg"));
    }

    #[test]
    fn stops_at_max_cards() {
        let cards = extract_cards(&config(), LISTING, 2).unwrap();
        assert_eq!(cards.len(), 2);
    }
}
