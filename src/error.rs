//! Failure taxonomy for a single arrivals fetch.
//!
//! Every stage of the pipeline has its own error type so callers that care
//! can tell a dead network from a bad envelope or a broken XML payload. The
//! facade collapses all of them into the "n/a" sentinel by default.

use std::time::Duration;

use reqwest::StatusCode;

/// Transport-level failures.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("request timed out after {0:?}")]
    Timeout(Duration),

    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("invalid endpoint URL '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
}

/// Failures while repairing or decoding the reply envelope.
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("reply too short to repair ({0} chars)")]
    TooShort(usize),

    #[error("envelope is not valid JSON after repair: {0}")]
    Json(#[from] serde_json::Error),

    #[error("envelope has no '{0}' field")]
    MissingField(&'static str),

    #[error("envelope field '{0}' is not a string")]
    FieldType(&'static str),

    #[error("upstream STATUS is '{0}', expected 'OK'")]
    NotOk(String),
}

/// Any failure that turns a fetch into the unavailable sentinel.
#[derive(Debug, thiserror::Error)]
pub enum Failure {
    #[error(transparent)]
    Network(#[from] FetchError),

    #[error(transparent)]
    Decode(#[from] DecodeError),

    #[error("malformed XML payload: {0}")]
    Xml(#[from] roxmltree::Error),
}

impl Failure {
    /// Short machine-friendly label, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Failure::Network(_) => "network",
            Failure::Decode(_) => "decode",
            Failure::Xml(_) => "xml",
        }
    }
}
