use std::time::Duration;

use anyhow::Result;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

mod affiliate;
mod config;
mod error;
mod ledger;
mod models;
mod normalizer;
mod offer_bot;
mod pipeline;
mod scrapers;
mod telegram;
mod traits;

use config::Config;
use offer_bot::OfferBot;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    info!("Starting offer relay bot");

    let config = Config::from_env()?;
    let bot = OfferBot::from_config(&config).await?;

    // Run once immediately, then on the interval
    if let Err(e) = bot.run_cycle().await {
        error!("Error during initial check: {:#}", e);
    }

    let sched = JobScheduler::new().await?;
    let interval = config.interval();

    let job_bot = bot.clone();
    sched
        .add(Job::new_repeated_async(interval, move |_uuid, _l| {
            let bot = job_bot.clone();
            Box::pin(async move {
                if let Err(e) = bot.run_cycle().await {
                    error!("Error checking for offers: {:#}", e);
                }
            })
        })?)
        .await?;

    info!("Scheduler started - checking every {} minutes", config.interval_minutes);
    sched.start().await?;

    // Keep the program running
    loop {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}
