//! Storefront detection, product-link matching and affiliate tagging

mod resolver;
mod search;

pub use resolver::{AffiliateResolver, Strategy};
pub use search::{GoogleSearch, MercadoLivreCatalog, ProductCatalog, WebSearch};

#[cfg(test)]
pub(crate) use resolver::tests as fakes;

use tracing::debug;
use url::Url;

const ALIEXPRESS_REDIRECTOR: &str = "https://s.click.aliexpress.com/e";

/// The storefronts the bot knows how to tag
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Storefront {
    MercadoLivre,
    Amazon,
    AliExpress,
    Unknown,
}

impl Storefront {
    /// Classifies the store name shown on a deal card.
    pub fn classify(store: &str) -> Self {
        let store = store.to_lowercase();
        if store.contains("mercado livre") || store.contains("mercadolivre") {
            Self::MercadoLivre
        } else if store.contains("amazon") {
            Self::Amazon
        } else if store.contains("aliexpress") {
            Self::AliExpress
        } else {
            Self::Unknown
        }
    }

    /// Resolution strategies to try, in order.
    pub fn strategies(self) -> &'static [Strategy] {
        match self {
            Self::MercadoLivre => &[Strategy::CatalogApi, Strategy::WebSearch],
            Self::Amazon | Self::AliExpress => &[Strategy::WebSearch],
            Self::Unknown => &[],
        }
    }

    /// Registrable domains a product link's host must equal or sit under.
    fn domains(self) -> &'static [&'static str] {
        match self {
            Self::MercadoLivre => &["mercadolivre.com.br"],
            Self::Amazon => &["amazon.com.br", "amazon.com"],
            Self::AliExpress => &["aliexpress.com", "aliexpress.us"],
            Self::Unknown => &[],
        }
    }

    fn owns_host(self, host: &str) -> bool {
        self.domains().iter().any(|domain| {
            host == *domain
                || host
                    .strip_suffix(domain)
                    .is_some_and(|prefix| prefix.ends_with('.'))
        })
    }

    /// Web search query used to find the product page.
    pub fn search_query(self, title: &str, store: &str) -> String {
        match self {
            Self::MercadoLivre => format!("{title} site:mercadolivre.com.br"),
            Self::AliExpress => format!("{title} site:aliexpress.com"),
            Self::Amazon | Self::Unknown => format!("{title} {store}"),
        }
    }

    fn is_product_path(self, path: &str) -> bool {
        match self {
            Self::MercadoLivre => path.contains("/p/") || path.contains("MLB-"),
            Self::Amazon => path.contains("/dp/"),
            Self::AliExpress => path.contains("/item/"),
            Self::Unknown => false,
        }
    }
}

/// Affiliate identifiers per storefront. Loaded once, never mutated.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AffiliatePrograms {
    pub mercado_livre: Option<String>,
    pub amazon: Option<String>,
    pub aliexpress: Option<String>,
}

impl AffiliatePrograms {
    pub fn new(
        mercado_livre: Option<String>,
        amazon: Option<String>,
        aliexpress: Option<String>,
    ) -> Self {
        let non_empty = |id: Option<String>| id.filter(|id| !id.is_empty());
        Self {
            mercado_livre: non_empty(mercado_livre),
            amazon: non_empty(amazon),
            aliexpress: non_empty(aliexpress),
        }
    }

    fn id_for(&self, storefront: Storefront) -> Option<&str> {
        match storefront {
            Storefront::MercadoLivre => self.mercado_livre.as_deref(),
            Storefront::Amazon => self.amazon.as_deref(),
            Storefront::AliExpress => self.aliexpress.as_deref(),
            Storefront::Unknown => None,
        }
    }

    /// Adds the storefront's affiliate marker to `url`.
    ///
    /// Mercado Livre and Amazon get `afiliado` / `tag` merged into the query
    /// string, replacing any previous value and keeping other parameters.
    /// AliExpress links are wrapped in the affiliate redirector. Empty URLs,
    /// unconfigured ids and unparseable URLs come back unchanged.
    pub fn tag(&self, url: &str, storefront: Storefront) -> String {
        let Some(id) = self.id_for(storefront) else {
            return url.to_string();
        };
        if url.is_empty() {
            return String::new();
        }

        let tagged = match storefront {
            Storefront::MercadoLivre => merge_query_param(url, "afiliado", id),
            Storefront::Amazon => merge_query_param(url, "tag", id),
            Storefront::AliExpress => Ok(format!(
                "{ALIEXPRESS_REDIRECTOR}/{id}?product_url={}",
                urlencoding::encode(url)
            )),
            Storefront::Unknown => Ok(url.to_string()),
        };

        tagged.unwrap_or_else(|e| {
            debug!("Leaving unparseable link untagged ({}): {}", e, url);
            url.to_string()
        })
    }
}

fn merge_query_param(raw: &str, key: &str, value: &str) -> Result<String, url::ParseError> {
    let mut url = Url::parse(raw)?;
    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != key)
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(kept)
        .append_pair(key, value);

    Ok(url.into())
}

/// Unwraps search-engine redirect links of the form `/url?q=<target>&...`.
fn unwrap_redirect(href: &str) -> String {
    if let Some(start) = href.find("url?q=") {
        let target = &href[start + "url?q=".len()..];
        let target = target.split('&').next().unwrap_or(target);
        return urlencoding::decode(target).map_or_else(|_| target.to_string(), |s| s.into_owned());
    }
    href.to_string()
}

/// Drops `/ref=...` tracking segments and the query string from an Amazon link.
fn clean_amazon_link(url: &str) -> String {
    let base = url.split(['?', '#']).next().unwrap_or(url);
    match base.find("/ref=") {
        Some(idx) => base[..idx].to_string(),
        None => base.to_string(),
    }
}

/// Picks the first search result that points at a product page on `storefront`.
pub fn pick_product_link(storefront: Storefront, hrefs: &[String]) -> Option<String> {
    if storefront == Storefront::Unknown {
        return None;
    }

    hrefs.iter().find_map(|href| {
        let candidate = unwrap_redirect(href);
        let parsed = Url::parse(&candidate).ok()?;
        let host = parsed.host_str()?;

        if !storefront.owns_host(host) || !storefront.is_product_path(parsed.path()) {
            return None;
        }

        Some(match storefront {
            Storefront::Amazon => clean_amazon_link(&candidate),
            _ => candidate,
        })
    })
}
