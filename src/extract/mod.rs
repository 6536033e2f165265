//! Prescription text extraction: normalization + line-item parsing.
//!
//! The document-to-text step itself is an external service; this module
//! owns the seam (`DocumentTextSource`) and everything after the raw text
//! arrives.

pub mod extractor;
pub mod normalize;

pub use extractor::extract_line_items;
pub use normalize::clean_raw_text;

use uuid::Uuid;

/// Errors from the upstream document text service.
#[derive(Debug, thiserror::Error)]
pub enum ExtractionError {
    #[error("Could not read document: {0}")]
    Failed(String),
}

/// External collaborator that turns a scanned document into raw text.
///
/// Trait-based so the fulfillment service stays testable with canned text.
pub trait DocumentTextSource {
    fn extract_text(&self, document_id: &Uuid) -> Result<String, ExtractionError>;
}
