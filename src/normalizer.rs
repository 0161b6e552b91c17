//! Turns a noisy deal title into a compact search query

/// Promotional words that never help a product lookup. Compared lowercase.
const STOPWORDS: &[&str] = &[
    "off", "desconto", "promoção", "promocao", "oferta", "cupom", "reais", "r$",
];

const MAX_TOKENS: usize = 10;

/// Normalizes a raw offer title.
///
/// Punctuation and symbols become spaces, stopwords and tokens of two
/// characters or fewer are dropped, and at most ten tokens are kept.
pub fn normalize_title(raw_title: &str) -> String {
    let cleaned: String = raw_title
        .chars()
        .map(|c| {
            if c.is_alphanumeric() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();

    cleaned
        .split_whitespace()
        .filter(|token| token.chars().count() > 2)
        .filter(|token| !STOPWORDS.contains(&token.to_lowercase().as_str()))
        .take(MAX_TOKENS)
        .collect::<Vec<_>>()
        .join(" ")
}
