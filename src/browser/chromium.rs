//! Chromium adapter built on chromiumoxide

use super::{BrowserLauncher, BrowserPage, BrowserProcess};
use crate::error::{Error, Result};
use crate::render::PdfRequest;
use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::page::PrintToPdfParams;
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::error::CdpError;
use chromiumoxide::Page;
use futures_util::StreamExt;
use std::fmt;
use std::future::Future;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

/// Well-known browser locations tried when no executable is configured
pub const DEFAULT_SEARCH_PATHS: &[&str] = &[
    "/usr/bin/chromium",
    "/usr/bin/chromium-browser",
    "/usr/bin/google-chrome-stable",
    "/usr/bin/google-chrome",
    "/opt/google/chrome/chrome",
    "/tmp/chromium",
    "/Applications/Google Chrome.app/Contents/MacOS/Google Chrome",
    "/Applications/Chromium.app/Contents/MacOS/Chromium",
];

const COMMON_ARGS: &[&str] = &["--disable-gpu", "--hide-scrollbars", "--mute-audio"];

// Process isolation flags for serverless/container hosts
const PRODUCTION_ARGS: &[&str] = &[
    "--no-sandbox",
    "--disable-setuid-sandbox",
    "--single-process",
    "--no-zygote",
    "--disable-dev-shm-usage",
    "--font-render-hinting=none",
];

/// Execution mode selecting the browser launch profile
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ExecutionMode {
    #[default]
    Development,
    Production,
}

impl fmt::Display for ExecutionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExecutionMode::Development => f.write_str("development"),
            ExecutionMode::Production => f.write_str("production"),
        }
    }
}

impl FromStr for ExecutionMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "development" | "dev" => Ok(ExecutionMode::Development),
            "production" | "prod" => Ok(ExecutionMode::Production),
            other => Err(format!("unknown execution mode: {}", other)),
        }
    }
}

/// How to start the browser process
#[derive(Debug, Clone)]
pub struct LaunchSettings {
    pub mode: ExecutionMode,
    /// Explicit browser binary; wins over the search paths
    pub executable: Option<PathBuf>,
    /// Fallback locations, first existing one is used
    pub search_paths: Vec<PathBuf>,
    /// Timeout for individual CDP requests
    pub request_timeout: Duration,
    pub viewport: (u32, u32),
}

impl Default for LaunchSettings {
    fn default() -> Self {
        Self {
            mode: ExecutionMode::default(),
            executable: None,
            search_paths: DEFAULT_SEARCH_PATHS.iter().map(PathBuf::from).collect(),
            request_timeout: Duration::from_secs(30),
            viewport: (1280, 1696),
        }
    }
}

impl LaunchSettings {
    /// Explicit executable, else the first search path that exists. `None`
    /// leaves detection to chromiumoxide.
    pub fn resolve_executable(&self) -> Option<PathBuf> {
        if let Some(path) = &self.executable {
            return Some(path.clone());
        }
        self.search_paths.iter().find(|p| p.is_file()).cloned()
    }

    pub fn args(&self) -> Vec<&'static str> {
        let mut args = COMMON_ARGS.to_vec();
        if self.mode == ExecutionMode::Production {
            args.extend_from_slice(PRODUCTION_ARGS);
        }
        args
    }
}

/// Launches headless Chromium processes
pub struct ChromiumLauncher {
    settings: LaunchSettings,
}

impl ChromiumLauncher {
    pub fn new(settings: LaunchSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl BrowserLauncher for ChromiumLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserProcess>> {
        let mut builder = BrowserConfig::builder()
            .request_timeout(self.settings.request_timeout)
            .window_size(self.settings.viewport.0, self.settings.viewport.1)
            .args(self.settings.args());

        if let Some(executable) = self.settings.resolve_executable() {
            tracing::debug!(executable = %executable.display(), "Using browser executable");
            builder = builder.chrome_executable(executable);
        }

        let config = builder
            .build()
            .map_err(|reason| Error::BrowserInitialization { reason })?;

        let (browser, mut handler) =
            Browser::launch(config)
                .await
                .map_err(|e| Error::BrowserInitialization {
                    reason: e.to_string(),
                })?;

        let connected = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&connected);
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!(error = %e, "Browser handler error");
                }
            }
            flag.store(false, Ordering::SeqCst);
            tracing::warn!("Browser connection closed");
        });

        tracing::info!(mode = %self.settings.mode, "Chromium launched");

        Ok(Arc::new(ChromiumProcess {
            browser: Mutex::new(browser),
            connected,
            handler_task,
            viewport: self.settings.viewport,
        }))
    }
}

struct ChromiumProcess {
    browser: Mutex<Browser>,
    connected: Arc<AtomicBool>,
    handler_task: JoinHandle<()>,
    viewport: (u32, u32),
}

#[async_trait]
impl BrowserProcess for ChromiumProcess {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn open_page(&self) -> Result<Box<dyn BrowserPage>> {
        if !self.is_connected() {
            return Err(Error::page("browser disconnected"));
        }
        let page = self
            .browser
            .lock()
            .await
            .new_page("about:blank")
            .await
            .map_err(cdp_error)?;

        Ok(Box::new(ChromiumPage {
            page,
            viewport: self.viewport,
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        let mut browser = self.browser.lock().await;
        let closed = browser.close().await.map(|_| ()).map_err(cdp_error);
        if let Err(e) = browser.wait().await {
            tracing::debug!(error = %e, "Waiting for browser exit failed");
        }
        self.connected.store(false, Ordering::SeqCst);
        self.handler_task.abort();
        closed
    }
}

impl Drop for ChromiumProcess {
    // Dropping `Browser` kills the child process; the handler task has
    // nothing left to drive after that.
    fn drop(&mut self) {
        self.handler_task.abort();
    }
}

struct ChromiumPage {
    page: Page,
    viewport: (u32, u32),
}

#[async_trait]
impl BrowserPage for ChromiumPage {
    async fn load_content(&self, html: &str, timeout: Duration) -> Result<()> {
        let (width, height) = self.viewport;
        with_timeout("content load", timeout, async {
            self.page
                .execute(SetDeviceMetricsOverrideParams::new(
                    width as i64,
                    height as i64,
                    1.0,
                    false,
                ))
                .await?;
            // set_content already waits for the load event
            self.page.set_content(html).await?;
            self.page.evaluate_expression(settle_params()).await?;
            Ok::<(), CdpError>(())
        })
        .await
    }

    async fn render_to_bytes(&self, request: &PdfRequest, timeout: Duration) -> Result<Vec<u8>> {
        let params = print_params(request);
        with_timeout("PDF export", timeout, self.page.pdf(params)).await
    }

    async fn close(&self) -> Result<()> {
        self.page.clone().close().await.map_err(cdp_error)
    }
}

/// Resolves once web fonts and images have finished loading.
const SETTLE_SCRIPT: &str = r#"(async () => {
    await document.fonts.ready;
    await Promise.all(Array.from(document.images)
        .filter(img => !img.complete)
        .map(img => new Promise(resolve => {
            img.addEventListener('load', resolve, { once: true });
            img.addEventListener('error', resolve, { once: true });
        })));
})()"#;

fn settle_params() -> EvaluateParams {
    let mut params = EvaluateParams::new(SETTLE_SCRIPT);
    params.await_promise = Some(true);
    params
}

fn print_params(request: &PdfRequest) -> PrintToPdfParams {
    PrintToPdfParams {
        landscape: Some(request.landscape),
        display_header_footer: Some(request.display_header_footer),
        print_background: Some(request.print_background),
        scale: Some(request.scale),
        paper_width: Some(request.paper_width),
        paper_height: Some(request.paper_height),
        margin_top: Some(request.margins.top),
        margin_bottom: Some(request.margins.bottom),
        margin_left: Some(request.margins.left),
        margin_right: Some(request.margins.right),
        header_template: request.header_template.clone(),
        footer_template: request.footer_template.clone(),
        ..Default::default()
    }
}

async fn with_timeout<T, F>(operation: &str, timeout: Duration, fut: F) -> Result<T>
where
    F: Future<Output = std::result::Result<T, CdpError>>,
{
    match tokio::time::timeout(timeout, fut).await {
        Ok(result) => result.map_err(cdp_error),
        Err(_) => Err(Error::Timeout {
            operation: operation.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        }),
    }
}

fn cdp_error(e: CdpError) -> Error {
    Error::page(e.to_string())
}
