//! Typed errors for the fetch and load boundaries.
//!
//! Extraction and normalization never fail; only I/O at the edges does.

use thiserror::Error;

/// Page retrieval failed; the page is skipped and the run continues
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    #[error("invalid URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Persisting a batch failed; nothing from the batch was written
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("database connection failed: {0}")]
    Connect(#[source] sqlx::Error),

    #[error("failed to ensure table {table}: {source}")]
    Schema {
        table: String,
        #[source]
        source: sqlx::Error,
    },

    #[error("insert of listing {id} failed, batch rolled back: {source}")]
    Insert {
        id: i64,
        #[source]
        source: sqlx::Error,
    },

    #[error("transaction failed: {0}")]
    Transaction(#[source] sqlx::Error),

    #[error("invalid table name: {0}")]
    InvalidTable(String),
}
