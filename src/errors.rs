use thiserror::Error;

/// Error taxonomy for the price-scan core (spec.md §7).
///
/// Per-product and per-shop failures never escape their task — only `Fatal`
/// and `Store` variants are allowed to propagate out of a cycle (§7
/// "Propagation policy").
#[derive(Error, Debug, Clone)]
pub enum ScanError {
    /// Transient or permanent extractor failure: network error, timeout,
    /// or a 403/429/5xx that exhausted retries (spec.md §4.4, §7).
    #[error("extractor error: {message}")]
    Extractor { message: String },

    /// A search navigator exhausted all phrases without a match.
    #[error("navigator error: {message}")]
    Navigator { message: String },

    /// Search-config resolution failed for a product (spec.md §4.6).
    #[error("resolver error: {message}")]
    Resolver { message: String },

    /// A store (repository) read or write failed.
    #[error("store error: {message}")]
    Store { message: String },

    /// Configuration is missing or malformed (spec.md §7 "Fatal").
    #[error("configuration error: {message}")]
    Config { message: String },

    /// Unrecoverable cycle failure: missing shop config, empty catalog,
    /// empty watchlist, or a preload failure (spec.md §6, §7).
    #[error("fatal error: {message}")]
    Fatal { message: String },
}

impl ScanError {
    pub fn extractor(message: impl Into<String>) -> Self {
        Self::Extractor { message: message.into() }
    }

    pub fn navigator(message: impl Into<String>) -> Self {
        Self::Navigator { message: message.into() }
    }

    pub fn resolver(message: impl Into<String>) -> Self {
        Self::Resolver { message: message.into() }
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store { message: message.into() }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    pub fn fatal(message: impl Into<String>) -> Self {
        Self::Fatal { message: message.into() }
    }
}

pub type ScanResult<T> = Result<T, ScanError>;
