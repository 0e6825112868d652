//! Error types for graylog-forwarder
//!
//! The taxonomy separates run-aborting failures (source connectivity,
//! scroll protocol violations) from per-document failures (unparseable
//! timestamps, rejected pushes), which callers log and skip.

use thiserror::Error;

/// Result type alias for graylog-forwarder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for graylog-forwarder
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "input")
        key: Option<String>,
    },

    /// Source query or scroll protocol error
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Push delivery error
    #[error("delivery error: {0}")]
    Delivery(#[from] DeliveryError),

    /// Document normalization error
    #[error("normalization error: {0}")]
    Normalize(#[from] NormalizeError),

    /// Other error
    #[error("{0}")]
    Other(String),
}

/// Errors from the source search engine (queries, scrolling, decoding)
///
/// Every variant here aborts the extraction: a failed or undecodable page
/// means the traversal can no longer make progress. Per-hit problems are
/// handled (logged and skipped) before they ever become a `SourceError`.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The search engine answered with a non-success status
    #[error("search request failed [{status}]: {reason}")]
    SearchFailed {
        /// HTTP status code returned by the source
        status: u16,
        /// Error reason extracted from the response body (or the raw body)
        reason: String,
    },

    /// A page with remaining hits carried no scroll cursor
    #[error("scroll response missing _scroll_id while hits remain")]
    MissingScrollId,

    /// The response body could not be decoded as a search response
    #[error("malformed search response: {0}")]
    MalformedResponse(String),

    /// The delivery queue was closed while extraction was still producing
    #[error("delivery queue closed before extraction finished")]
    QueueClosed,

    /// Network-level failure talking to the source
    #[error("search transport error: {0}")]
    Transport(#[from] reqwest::Error),
}

/// Errors from pushing a record to the log store
///
/// Application-level rejections and network-level failures are distinct
/// variants but surface as the same error kind to the caller; neither is
/// retried.
#[derive(Debug, Error)]
pub enum DeliveryError {
    /// The push endpoint answered with a status other than 200/204
    #[error("push endpoint returned status {status}: {body}")]
    Rejected {
        /// HTTP status code returned by the push endpoint
        status: u16,
        /// Response body, read best-effort for diagnosis
        body: String,
    },

    /// Network-level failure sending the push request
    #[error("push request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// Errors from normalizing a raw document
///
/// Only the timestamp is fatal to a record; every other field degrades
/// gracefully inside `normalize` itself.
#[derive(Debug, Error)]
pub enum NormalizeError {
    /// The document has no string `timestamp` field
    #[error("document missing or non-string 'timestamp' field")]
    MissingTimestamp,

    /// The timestamp string matched neither supported format
    #[error("timestamp '{value}' matched neither the custom format nor RFC 3339: {reason}")]
    InvalidTimestamp {
        /// The raw timestamp value from the document
        value: String,
        /// The parse error from the last attempted format
        reason: String,
    },
}
