//! Error types for profilepulse.
//!
//! Everything in the scraping path is recoverable: the orchestrator converts
//! these into fallback snapshots and the system keeps serving the manual
//! baseline. Only `BaselineError` is a hard failure, since there is no
//! further fallback beneath the baseline record.

use std::path::PathBuf;

use thiserror::Error;

/// Failures while retrieving a page through a relay.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Connection, DNS, or timeout failure.
    #[error("request to {url} failed: {reason}")]
    Request { url: String, reason: String },

    /// Non-2xx HTTP status.
    #[error("HTTP {status} from {url}")]
    Status { status: u16, url: String },

    /// A JSON-wrapping relay returned a body without the expected field.
    #[error("relay response missing field '{field}'")]
    RelayEnvelope { field: String },
}

/// Failures in the scrape pipeline above the transport layer.
#[derive(Debug, Error)]
pub enum ScrapeError {
    /// The domain's crawl-permission policy disallows retrieval.
    /// Never retried; the orchestrator falls back immediately.
    #[error("{domain} disallows automated retrieval")]
    ComplianceBlocked { domain: String },

    /// No extraction heuristic produced a usable value.
    /// Never retried, since the markup will not change within one fetch.
    #[error("extraction failed: {0}")]
    Extraction(String),
}

/// Failures in a cache backing store.
///
/// Durable-tier failures are logged and swallowed by the tiered cache; they
/// never fail the operation that triggered the write.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("cache store i/o failure: {0}")]
    Io(#[from] std::io::Error),

    #[error("cache entry could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failures loading the trusted manual baseline.
///
/// These surface as hard initialization errors to the caller.
#[derive(Debug, Error)]
pub enum BaselineError {
    #[error("baseline record not found at {path}: {source}")]
    NotFound {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("baseline record is malformed: {0}")]
    Malformed(#[from] serde_json::Error),
}
