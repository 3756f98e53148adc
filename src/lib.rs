//! PDF Render Server Library
//!
//! This crate renders HTML documents to PDF with headless Chromium and
//! exposes the renderer as MCP tools:
//! - `generate_pdf`: Render inline HTML or an HTML file to PDF
//! - `get_cached_pdf`: Fetch a previously rendered PDF by cache key
//! - `browser_status`: Report the shared browser process state

pub mod browser;
pub mod config;
pub mod error;
pub mod render;
pub mod retry;
pub mod server;
pub mod shutdown;
pub mod source;

pub use config::ServerConfig;
pub use error::{Error, Result};
pub use render::{PdfService, RenderOptions, RenderResult};
pub use server::{
    run_server, run_server_with_config, BrowserStatusResult, GeneratePdfParams,
    GeneratePdfResult, GetCachedPdfParams, GetCachedPdfResult, PdfRenderServer,
};
