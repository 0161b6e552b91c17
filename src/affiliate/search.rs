//! Network lookups used to find a product page for a deal

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use scraper::{Html, Selector};
use serde::Deserialize;

use crate::error::ResolveError;

const BROWSER_USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0 Safari/537.36";

/// A storefront's own product search
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Canonical URL of the top hit for `query`, if there is one.
    async fn top_product_url(&self, query: &str) -> Result<Option<String>, ResolveError>;
}

/// A general web search engine
#[async_trait]
pub trait WebSearch: Send + Sync {
    /// Every link target on the result page for `query`, in page order.
    async fn result_links(&self, query: &str) -> Result<Vec<String>, ResolveError>;
}

#[derive(Debug, Deserialize)]
struct CatalogSearchResponse {
    #[serde(default)]
    results: Vec<CatalogHit>,
}

#[derive(Debug, Deserialize)]
struct CatalogHit {
    permalink: String,
}

/// Mercado Livre's public search API for the Brazilian site
#[derive(Clone)]
pub struct MercadoLivreCatalog {
    client: Client,
    base_url: String,
}

impl MercadoLivreCatalog {
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            base_url: "https://api.mercadolibre.com".to_string(),
        })
    }
}

#[async_trait]
impl ProductCatalog for MercadoLivreCatalog {
    async fn top_product_url(&self, query: &str) -> Result<Option<String>, ResolveError> {
        let url = format!(
            "{}/sites/MLB/search?q={}&limit=1",
            self.base_url,
            urlencoding::encode(query)
        );

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ResolveError::Status {
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        parse_catalog_response(&body)
    }
}

fn parse_catalog_response(body: &str) -> Result<Option<String>, ResolveError> {
    let parsed: CatalogSearchResponse =
        serde_json::from_str(body).map_err(|e| ResolveError::Decode(e.to_string()))?;

    Ok(parsed
        .results
        .into_iter()
        .next()
        .map(|hit| hit.permalink)
        .filter(|permalink| !permalink.is_empty()))
}

/// Google web search, read from the plain HTML result page
#[derive(Clone)]
pub struct GoogleSearch {
    client: Client,
    base_url: String,
}

impl GoogleSearch {
    pub fn new(timeout: Duration) -> Result<Self, ResolveError> {
        let client = Client::builder()
            .user_agent(BROWSER_USER_AGENT)
            .timeout(timeout)
            .build()?;

        Ok(Self {
            client,
            base_url: "https://www.google.com".to_string(),
        })
    }
}

#[async_trait]
impl WebSearch for GoogleSearch {
    async fn result_links(&self, query: &str) -> Result<Vec<String>, ResolveError> {
        let url = format!("{}/search?q={}", self.base_url, urlencoding::encode(query));

        let response = self.client.get(&url).send().await?;
        if !response.status().is_success() {
            return Err(ResolveError::Status {
                status: response.status().as_u16(),
            });
        }

        let html = response.text().await?;
        extract_links(&html)
    }
}

fn extract_links(html: &str) -> Result<Vec<String>, ResolveError> {
    let anchor = Selector::parse("a[href]").map_err(|e| ResolveError::Decode(format!("{e:?}")))?;
    let document = Html::parse_document(html);

    Ok(document
        .select(&anchor)
        .filter_map(|a| a.value().attr("href"))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_returns_first_permalink() {
        let body = r#"{"results":[{"id":"MLB1","permalink":"https://produto.mercadolivre.com.br/MLB-1-fone-_JM"},{"id":"MLB2","permalink":"https://x"}]}"#;

        assert_eq!(
            parse_catalog_response(body).unwrap().as_deref(),
            Some("https://produto.mercadolivre.com.br/MLB-1-fone-_JM")
        );
    }

    #[test]
    fn catalog_without_results_is_a_miss() {
        assert_eq!(parse_catalog_response(r#"{"results":[]}"#).unwrap(), None);
        assert_eq!(parse_catalog_response(r#"{"paging":{"total":0}}"#).unwrap(), None);
    }

    #[test]
    fn catalog_garbage_is_a_decode_error() {
        assert!(matches!(
            parse_catalog_response("<html>blocked</html>"),
            Err(ResolveError::Decode(_))
        ));
    }

    #[test]
    fn extracts_anchor_targets_in_order() {
        let html = r#"
            <html><body>
              <a href="/url?q=https://www.amazon.com.br/dp/B01&sa=U">first</a>
              <a>no target</a>
              <div><a href="https://www.amazon.com.br/dp/B02">second</a></div>
            </body></html>
        "#;

        assert_eq!(
            extract_links(html).unwrap(),
            vec![
                "/url?q=https://www.amazon.com.br/dp/B01&sa=U".to_string(),
                "https://www.amazon.com.br/dp/B02".to_string(),
            ]
        );
    }
}
