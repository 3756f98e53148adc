//! Rendering layer
//!
//! Turns HTML into PDF bytes through the browser layer.

mod options;
mod service;

pub use options::{
    parse_length, sanitize_filename, timestamped_filename, MarginOptions, MarginsInches,
    Orientation, PaperSize, PdfRequest, RenderOptions, ResolvedMargins, ResolvedOptions,
    DEFAULT_TIMEOUT_MS, PDF_MIME_TYPE,
};
pub use service::{require_html, PdfService, RenderResult};
