//! Browser layer
//!
//! The render service only talks to the narrow traits defined here. The
//! Chromium adapter lives in [`chromium`]; tests use an in-crate fake.

use crate::error::Result;
use crate::render::PdfRequest;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;

pub mod chromium;
mod manager;

#[cfg(test)]
pub(crate) mod fake;

pub use chromium::{ChromiumLauncher, ExecutionMode, LaunchSettings};
pub use manager::{BrowserManager, BrowserStats, DEFAULT_INIT_WAIT};

/// Starts browser processes
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    /// Spawn a new browser process. Failures are reported as
    /// [`crate::Error::BrowserInitialization`].
    async fn launch(&self) -> Result<Arc<dyn BrowserProcess>>;
}

/// A running browser process
#[async_trait]
pub trait BrowserProcess: Send + Sync {
    /// False once the connection to the process is gone
    fn is_connected(&self) -> bool;

    /// Open a blank page (tab)
    async fn open_page(&self) -> Result<Box<dyn BrowserPage>>;

    /// Close the process
    async fn shutdown(&self) -> Result<()>;
}

/// A single page inside a browser process
#[async_trait]
pub trait BrowserPage: Send + Sync {
    /// Load `html` into the page and wait until it has settled.
    async fn load_content(&self, html: &str, timeout: Duration) -> Result<()>;

    /// Print the loaded page to PDF bytes.
    async fn render_to_bytes(&self, request: &PdfRequest, timeout: Duration) -> Result<Vec<u8>>;

    async fn close(&self) -> Result<()>;
}
