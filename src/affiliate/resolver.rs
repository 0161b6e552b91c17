use std::sync::Arc;

use tracing::{debug, info, warn};

use super::{AffiliatePrograms, ProductCatalog, Storefront, WebSearch, pick_product_link};
use crate::error::ResolveError;

/// One way of finding a product page for a deal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Ask the storefront's own search API
    CatalogApi,
    /// Search the web and scan the results for a product page
    WebSearch,
}

/// Turns a deal into an affiliate-tagged product link.
///
/// Each storefront has an ordered list of strategies. A strategy that errors
/// or finds nothing hands over to the next one; when all are exhausted the
/// deal's original link is returned untouched.
#[derive(Clone)]
pub struct AffiliateResolver {
    programs: AffiliatePrograms,
    catalog: Arc<dyn ProductCatalog>,
    search: Arc<dyn WebSearch>,
}

impl AffiliateResolver {
    pub fn new(
        programs: AffiliatePrograms,
        catalog: Arc<dyn ProductCatalog>,
        search: Arc<dyn WebSearch>,
    ) -> Self {
        Self {
            programs,
            catalog,
            search,
        }
    }

    /// Resolves the best link for a deal. Never fails.
    ///
    /// `title` should already be normalized; an empty title skips every
    /// network strategy.
    pub async fn resolve(&self, title: &str, store: &str, original_link: &str) -> String {
        let storefront = Storefront::classify(store);

        if title.is_empty() {
            debug!("Empty query for '{}', passing original link through", store);
            return original_link.to_string();
        }

        for &strategy in storefront.strategies() {
            match self.attempt(strategy, storefront, title, store).await {
                Ok(Some(candidate)) => {
                    info!("Resolved '{}' via {:?}: {}", title, strategy, candidate);
                    return self.programs.tag(&candidate, storefront);
                }
                Ok(None) => debug!("{:?} found nothing for '{}'", strategy, title),
                Err(e) => warn!("{:?} failed for '{}': {}", strategy, title, e),
            }
        }

        if storefront != Storefront::Unknown {
            warn!("No product link found for '{}', using original link", title);
        }
        original_link.to_string()
    }

    async fn attempt(
        &self,
        strategy: Strategy,
        storefront: Storefront,
        title: &str,
        store: &str,
    ) -> Result<Option<String>, ResolveError> {
        match strategy {
            Strategy::CatalogApi => self.catalog.top_product_url(title).await,
            Strategy::WebSearch => {
                let query = storefront.search_query(title, store);
                let links = self.search.result_links(&query).await?;
                Ok(pick_product_link(storefront, &links))
            }
        }
    }
}
