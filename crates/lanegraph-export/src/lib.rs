//! lanegraph-export: Pure result-document serializers (sans-IO)
//!
//! Converts pipeline results into the JSON result document and parses
//! such documents back into typed pipeline values.

pub mod document;

pub use document::{
    ParsedDocument, ResultDocument, from_document, from_json, to_document, to_json,
    to_json_pretty,
};

/// Errors from building or reading a result document.
#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    /// JSON (de)serialization failed or the document has the wrong shape.
    #[error("result document JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A map key is not a valid boundary or lane key.
    #[error("invalid key in result document: {0:?}")]
    InvalidKey(String),
}
