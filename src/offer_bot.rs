use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::sync::Mutex;
use tracing::{error, info, warn};

use crate::affiliate::{AffiliateResolver, GoogleSearch, MercadoLivreCatalog};
use crate::config::Config;
use crate::ledger::SentOffersLedger;
use crate::pipeline::OfferPipeline;
use crate::scrapers::pelando::PelandoScraper;
use crate::telegram::TelegramPublisher;
use crate::traits::Publisher;

/// Outcome of one scrape-resolve-publish cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CycleReport {
    /// Offers the pipeline produced
    pub scraped: usize,
    /// Offers not seen in earlier cycles
    pub new: usize,
    /// Offers the channel accepted
    pub sent: usize,
}

#[derive(Clone)]
pub struct OfferBot {
    pipeline: OfferPipeline,
    publisher: Arc<dyn Publisher>,
    ledger: Arc<Mutex<SentOffersLedger>>,
    max_offers: usize,
    send_delay: Duration,
}

impl OfferBot {
    pub fn new(
        pipeline: OfferPipeline,
        publisher: Arc<dyn Publisher>,
        ledger: SentOffersLedger,
        max_offers: usize,
        send_delay: Duration,
    ) -> Self {
        Self {
            pipeline,
            publisher,
            ledger: Arc::new(Mutex::new(ledger)),
            max_offers,
            send_delay,
        }
    }

    /// Wires the production scraper, resolver and Telegram publisher.
    pub async fn from_config(config: &Config) -> Result<Self> {
        let source = PelandoScraper::new(&config.source_url, config.request_timeout)?;
        let resolver = AffiliateResolver::new(
            config.affiliates.clone(),
            Arc::new(MercadoLivreCatalog::new(config.request_timeout)?),
            Arc::new(GoogleSearch::new(config.request_timeout)?),
        );
        let pipeline = OfferPipeline::new(Arc::new(source), resolver, config.resolve_concurrency);
        let publisher = TelegramPublisher::new(
            config.channel_token.as_deref(),
            config.channel_destination.as_deref(),
            config.request_timeout,
        )?;
        let ledger = SentOffersLedger::load(&config.sent_offers_path).await;

        Ok(Self::new(
            pipeline,
            Arc::new(publisher),
            ledger,
            config.max_offers_per_cycle,
            config.send_delay,
        ))
    }

    /// Runs a cycle unless one is already in progress.
    pub async fn run_cycle(&self) -> Result<Option<CycleReport>> {
        let Ok(mut ledger) = self.ledger.try_lock() else {
            warn!("Previous cycle still running, skipping this tick");
            return Ok(None);
        };

        self.check_for_new_offers(&mut ledger).await.map(Some)
    }

    async fn check_for_new_offers(&self, ledger: &mut SentOffersLedger) -> Result<CycleReport> {
        info!("Checking for new offers");
        let offers = self.pipeline.run(self.max_offers).await?;

        let mut seen_this_cycle = HashSet::new();
        let new_offers: Vec<_> = offers
            .iter()
            .filter(|offer| {
                let fingerprint = offer.fingerprint();
                !ledger.contains(&fingerprint) && seen_this_cycle.insert(fingerprint)
            })
            .cloned()
            .collect();

        let mut report = CycleReport {
            scraped: offers.len(),
            new: new_offers.len(),
            sent: 0,
        };

        if new_offers.is_empty() {
            info!("No new offers found");
            return Ok(report);
        }

        for offer in &new_offers {
            info!("New offer found: {} - {}", offer.title, offer.price);
        }

        report.sent = self.publisher.send_batch(&new_offers, self.send_delay).await;

        // Failed sends are recorded too; there is no retry.
        for offer in &new_offers {
            ledger.add(offer.fingerprint());
        }
        if let Err(e) = ledger.save().await {
            error!("Failed to persist ledger {}: {:#}", ledger.path().display(), e);
        }

        info!(
            "Cycle done: {} scraped, {} new, {} sent ({} fingerprints on record)",
            report.scraped,
            report.new,
            report.sent,
            ledger.len()
        );
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Offer;
    use crate::pipeline::tests::{pipeline, raw};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct RecordingPublisher {
        sent: StdMutex<Vec<String>>,
        reject_titles: Vec<String>,
    }

    #[async_trait]
    impl Publisher for RecordingPublisher {
        async fn send_offer(&self, offer: &Offer) -> bool {
            self.sent.lock().unwrap().push(offer.title.clone());
            !self.reject_titles.contains(&offer.title)
        }
    }

    async fn bot(
        dir: &tempfile::TempDir,
        publisher: Arc<RecordingPublisher>,
        titles: &[(&str, &str)],
    ) -> OfferBot {
        let cards = titles
            .iter()
            .map(|(title, price)| Ok(raw(title, "Kabum", "https://pelando.com.br/d/1", price)))
            .collect();
        let ledger = SentOffersLedger::load(dir.path().join("sent_offers.json")).await;

        OfferBot::new(pipeline(cards, None), publisher, ledger, 10, Duration::ZERO)
    }

    #[tokio::test]
    async fn second_run_on_unchanged_source_sends_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let bot = bot(&dir, publisher.clone(), &[("Fone X", "R$ 50,00"), ("Air Fryer", "R$ 299,00")]).await;

        let first = bot.run_cycle().await.unwrap().unwrap();
        let second = bot.run_cycle().await.unwrap().unwrap();

        assert_eq!(first, CycleReport { scraped: 2, new: 2, sent: 2 });
        assert_eq!(second, CycleReport { scraped: 2, new: 0, sent: 0 });
        assert_eq!(publisher.sent.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn preloaded_fingerprint_is_not_resent_and_ledger_is_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sent_offers.json");
        let mut seeded = SentOffersLedger::load(&path).await;
        seeded.add(crate::models::Fingerprint::new("Fone X", "R$ 50,00"));
        seeded.save().await.unwrap();
        let before = tokio::fs::read(&path).await.unwrap();

        let publisher = Arc::new(RecordingPublisher::default());
        let bot = bot(&dir, publisher.clone(), &[("Fone X", "R$ 50,00")]).await;
        let report = bot.run_cycle().await.unwrap().unwrap();

        assert_eq!(report.new, 0);
        assert!(publisher.sent.lock().unwrap().is_empty());
        assert_eq!(tokio::fs::read(&path).await.unwrap(), before);
    }

    #[tokio::test]
    async fn failed_sends_are_not_retried() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher {
            reject_titles: vec!["Fone X".to_string()],
            ..Default::default()
        });
        let bot = bot(&dir, publisher.clone(), &[("Fone X", "R$ 50,00"), ("Air Fryer", "R$ 299,00")]).await;

        let first = bot.run_cycle().await.unwrap().unwrap();
        let second = bot.run_cycle().await.unwrap().unwrap();

        assert_eq!(first.sent, 1);
        assert_eq!(second.new, 0);
        assert_eq!(
            *publisher.sent.lock().unwrap(),
            vec!["Fone X".to_string(), "Air Fryer".to_string()]
        );
    }

    #[tokio::test]
    async fn duplicate_cards_in_one_cycle_are_sent_once() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let bot = bot(&dir, publisher.clone(), &[("Fone X", "R$ 50,00"), ("FONE  X", "r$ 50,00")]).await;

        let report = bot.run_cycle().await.unwrap().unwrap();

        assert_eq!(report, CycleReport { scraped: 2, new: 1, sent: 1 });
    }

    #[tokio::test]
    async fn overlapping_tick_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let publisher = Arc::new(RecordingPublisher::default());
        let bot = bot(&dir, publisher, &[("Fone X", "R$ 50,00")]).await;

        let _held = bot.ledger.lock().await;
        assert_eq!(bot.run_cycle().await.unwrap(), None);
    }
}
