//! HTML to PDF render service

use super::options::{timestamped_filename, RenderOptions, ResolvedOptions, PDF_MIME_TYPE};
use crate::browser::{BrowserManager, BrowserPage, BrowserProcess};
use crate::error::{Error, RenderStage, Result};
use crate::retry::{retry_if, RetryPolicy};
use chrono::Local;
use serde::Serialize;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// A rendered PDF. Ownership of the bytes passes to the caller.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RenderResult {
    pub success: bool,
    pub filename: String,
    #[serde(skip)]
    pub buffer: Vec<u8>,
    pub size: usize,
    pub mime_type: &'static str,
}

/// Reject missing or empty HTML.
pub fn require_html(html: Option<&str>) -> Result<&str> {
    match html {
        Some(html) if !html.is_empty() => Ok(html),
        Some(_) => Err(Error::invalid_input("html must not be empty")),
        None => Err(Error::invalid_input("html is required")),
    }
}

/// Renders HTML through the shared browser process.
///
/// Page setup (open page, load content) is retried with linear backoff.
/// The export itself runs once per call. Every opened page is closed
/// exactly once, whatever the outcome.
pub struct PdfService {
    browsers: Arc<BrowserManager>,
    policy: RetryPolicy,
}

impl PdfService {
    pub fn new(browsers: Arc<BrowserManager>, policy: RetryPolicy) -> Self {
        Self { browsers, policy }
    }

    pub fn browsers(&self) -> &Arc<BrowserManager> {
        &self.browsers
    }

    pub async fn generate_pdf(&self, html: &str, options: &RenderOptions) -> Result<RenderResult> {
        let html = require_html(Some(html))?;
        let resolved = options.resolve()?;
        let request = resolved.pdf_request()?;
        let started = Instant::now();

        let last_attempt = AtomicU32::new(0);
        let setup = {
            let last_attempt = &last_attempt;
            let resolved = &resolved;
            retry_if(
                &self.policy,
                move |attempt| {
                    last_attempt.store(attempt, Ordering::SeqCst);
                    self.setup_page(html, resolved, attempt)
                },
                Error::is_retryable,
            )
            .await
        };
        let attempts = last_attempt.load(Ordering::SeqCst);

        let (browser, page) = setup.map_err(|e| {
            if e.is_retryable() {
                tracing::error!(attempts, error = %e, "Page setup failed, giving up");
                Error::RenderFailed {
                    stage: RenderStage::PageSetup,
                    attempts,
                    source: Box::new(e),
                }
            } else {
                e
            }
        })?;

        let exported = page.render_to_bytes(&request, resolved.timeout).await;
        Self::close_page(page.as_ref()).await;
        if matches!(&exported, Err(e) if e.indicates_disconnect()) {
            self.browsers.invalidate(&browser).await;
        }
        self.browsers.release(browser).await;

        let buffer = match exported {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => {
                return Err(Self::export_failed(Error::page("export produced no data")));
            }
            Err(e) => return Err(Self::export_failed(e)),
        };

        let filename = timestamped_filename(&resolved.base_name, &Local::now());
        let size = buffer.len();
        tracing::info!(
            filename = %filename,
            size,
            attempts,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "PDF generated"
        );

        Ok(RenderResult {
            success: true,
            filename,
            buffer,
            size,
            mime_type: PDF_MIME_TYPE,
        })
    }

    /// Close the shared browser process.
    pub async fn shutdown(&self) {
        self.browsers.shutdown().await;
    }

    async fn setup_page(
        &self,
        html: &str,
        options: &ResolvedOptions,
        attempt: u32,
    ) -> Result<(Arc<dyn BrowserProcess>, Box<dyn BrowserPage>)> {
        let browser = self.browsers.acquire().await?;

        let page = match browser.open_page().await {
            Ok(page) => page,
            Err(e) => return Err(self.attempt_failed(&browser, e, attempt).await),
        };

        match page.load_content(html, options.timeout).await {
            Ok(()) => Ok((browser, page)),
            Err(e) => {
                Self::close_page(page.as_ref()).await;
                Err(self.attempt_failed(&browser, e, attempt).await)
            }
        }
    }

    async fn attempt_failed(
        &self,
        browser: &Arc<dyn BrowserProcess>,
        error: Error,
        attempt: u32,
    ) -> Error {
        tracing::warn!(
            attempt,
            max_attempts = self.policy.max_attempts,
            error = %error,
            "Page setup attempt failed"
        );
        if error.indicates_disconnect() {
            self.browsers.invalidate(browser).await;
        }
        error
    }

    async fn close_page(page: &dyn BrowserPage) {
        if let Err(e) = page.close().await {
            tracing::warn!(error = %e, "Failed to close page");
        }
    }

    fn export_failed(source: Error) -> Error {
        tracing::error!(error = %source, "PDF export failed");
        Error::RenderFailed {
            stage: RenderStage::Export,
            attempts: 1,
            source: Box::new(source),
        }
    }
}
