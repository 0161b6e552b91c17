use thiserror::Error;

/// Failure of a single resolution strategy. Never surfaced past the resolver.
#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected status {status}")]
    Status { status: u16 },

    #[error("failed to decode response: {0}")]
    Decode(String),
}

/// Failure to read a single deal card from the listing page.
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("card is missing required field `{0}`")]
    MissingField(&'static str),

    #[error("invalid selector: {0}")]
    Selector(String),
}
