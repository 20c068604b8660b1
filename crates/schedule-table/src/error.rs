use std::io;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ReconstructError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("CSV write error: {0}")]
    Csv(#[from] csv::Error),

    #[error("failed to load PDF: {0}")]
    PdfLoad(#[from] lopdf::Error),

    #[error("failed to extract text from page {page}: {message}")]
    PageDecode { page: u32, message: String },

    #[error("invalid column layout: {0}")]
    InvalidColumnLayout(String),

    #[error("no pages available after applying selection")]
    NoPagesSelected,
}

impl ReconstructError {
    /// Whether the document itself could not be read, as opposed to a
    /// configuration or output problem.
    #[must_use]
    pub fn is_extraction_failure(&self) -> bool {
        matches!(self, Self::Io(_) | Self::PdfLoad(_) | Self::PageDecode { .. })
    }
}
