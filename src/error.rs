//! Error types for PDF Render Server

use std::fmt;
use thiserror::Error;

/// Result type alias for PDF Render Server
pub type Result<T> = std::result::Result<T, Error>;

/// Step of the render pipeline a failure was escalated from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderStage {
    /// Opening a page and loading the HTML content
    PageSetup,
    /// Printing the loaded page to PDF
    Export,
}

impl fmt::Display for RenderStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RenderStage::PageSetup => f.write_str("page setup"),
            RenderStage::Export => f.write_str("PDF export"),
        }
    }
}

/// Error types for PDF Render Server
#[derive(Error, Debug)]
pub enum Error {
    /// Bad arguments from the caller
    #[error("Invalid input: {reason}")]
    InvalidInput { reason: String },

    /// Browser process could not be started
    #[error("Browser initialization failed: {reason}")]
    BrowserInitialization { reason: String },

    /// Rendering failed after the retry budget was spent
    #[error("Render failed during {stage} after {attempts} attempt(s): {source}")]
    RenderFailed {
        stage: RenderStage,
        attempts: u32,
        #[source]
        source: Box<Error>,
    },

    /// Page or browser level failure reported by the browser
    #[error("Page error: {reason}")]
    Page { reason: String },

    /// A browser operation exceeded its deadline
    #[error("{operation} timed out after {timeout_ms}ms")]
    Timeout { operation: String, timeout_ms: u64 },

    /// Cache key not found
    #[error("Cache key not found: {key}")]
    CacheKeyNotFound { key: String },

    /// Path access denied (outside allowed resource directories)
    #[error("Path access denied: {path}")]
    PathAccessDenied { path: String },

    /// HTML source file exceeds the configured limit
    #[error("HTML source too large: {size} bytes (max: {max_size} bytes)")]
    HtmlSourceTooLarge { size: u64, max_size: u64 },

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    pub fn page(reason: impl Into<String>) -> Self {
        Error::Page {
            reason: reason.into(),
        }
    }

    /// Whether a page-setup attempt that failed with this error may be retried.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::Page { .. } | Error::Timeout { .. })
    }

    /// Whether the failure means the cached browser handle is dead and must be
    /// replaced before the next attempt.
    pub fn indicates_disconnect(&self) -> bool {
        match self {
            Error::RenderFailed { source, .. } => source.indicates_disconnect(),
            Error::Page { reason } => {
                let reason = reason.to_ascii_lowercase();
                reason.contains("detached") || reason.contains("disconnected")
            }
            _ => false,
        }
    }

    /// Return a sanitized error message safe to send to clients.
    /// Internal details (paths, browser errors, sizes) are omitted.
    /// Full details should be logged via tracing before calling this.
    pub fn client_message(&self) -> String {
        match self {
            Error::InvalidInput { reason } => format!("Invalid input: {}", reason),
            Error::BrowserInitialization { .. } => "PDF renderer unavailable".to_string(),
            Error::RenderFailed { .. } => "PDF generation failed".to_string(),
            Error::Page { .. } => "PDF generation failed".to_string(),
            Error::Timeout { .. } => "PDF generation timed out".to_string(),
            Error::CacheKeyNotFound { .. } => "Cache key not found".to_string(),
            Error::PathAccessDenied { .. } => "Access denied".to_string(),
            Error::HtmlSourceTooLarge { max_size, .. } => {
                format!("HTML source exceeds maximum size of {} bytes", max_size)
            }
            Error::Io(_) => "I/O error".to_string(),
        }
    }
}
