//! Scriptable in-memory browser for tests

use super::{BrowserLauncher, BrowserPage, BrowserProcess};
use crate::error::{Error, Result};
use crate::render::PdfRequest;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub(crate) const FAKE_PDF: &[u8] = b"%PDF-1.7\n1 0 obj\n<<>>\nendobj\ntrailer\n<<>>\n%%EOF\n";

#[derive(Default)]
struct FakeState {
    launches: AtomicU32,
    shutdowns: AtomicU32,
    page_opens: AtomicU32,
    page_closes: AtomicU32,
    launch_failure: Mutex<Option<String>>,
    launch_delay: Mutex<Duration>,
    load_delay: Mutex<Duration>,
    load_failures: Mutex<VecDeque<Error>>,
    export_failure: Mutex<Option<String>>,
    empty_export: AtomicBool,
    close_fails: AtomicBool,
    loaded_html: Mutex<Vec<String>>,
    requests: Mutex<Vec<PdfRequest>>,
    processes: Mutex<Vec<Arc<FakeProcess>>>,
}

/// Launcher whose processes and pages follow a failure script and count
/// every call.
#[derive(Clone, Default)]
pub(crate) struct FakeLauncher {
    state: Arc<FakeState>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_launch(self, reason: &str) -> Self {
        *self.state.launch_failure.lock() = Some(reason.to_string());
        self
    }

    pub fn with_launch_delay(self, delay: Duration) -> Self {
        *self.state.launch_delay.lock() = delay;
        self
    }

    /// Fail the next content loads with these messages, in order
    pub fn fail_loads(self, messages: &[&str]) -> Self {
        self.state
            .load_failures
            .lock()
            .extend(messages.iter().map(|m| Error::page(*m)));
        self
    }

    /// Let the next `count` content loads time out
    pub fn time_out_loads(self, count: usize) -> Self {
        self.state
            .load_failures
            .lock()
            .extend((0..count).map(|_| Error::Timeout {
                operation: "content load".to_string(),
                timeout_ms: 30_000,
            }));
        self
    }

    /// Delay successful content loads. Exports fail once the owning
    /// process has been shut down.
    pub fn with_load_delay(self, delay: Duration) -> Self {
        *self.state.load_delay.lock() = delay;
        self
    }

    pub fn fail_export(self, reason: &str) -> Self {
        *self.state.export_failure.lock() = Some(reason.to_string());
        self
    }

    pub fn empty_export(self) -> Self {
        self.state.empty_export.store(true, Ordering::SeqCst);
        self
    }

    pub fn fail_closes(self) -> Self {
        self.state.close_fails.store(true, Ordering::SeqCst);
        self
    }

    pub fn disconnect_all(&self) {
        for process in self.state.processes.lock().iter() {
            process.connected.store(false, Ordering::SeqCst);
        }
    }

    pub fn launches(&self) -> u32 {
        self.state.launches.load(Ordering::SeqCst)
    }

    pub fn shutdowns(&self) -> u32 {
        self.state.shutdowns.load(Ordering::SeqCst)
    }

    pub fn page_opens(&self) -> u32 {
        self.state.page_opens.load(Ordering::SeqCst)
    }

    pub fn page_closes(&self) -> u32 {
        self.state.page_closes.load(Ordering::SeqCst)
    }

    pub fn loaded_html(&self) -> Vec<String> {
        self.state.loaded_html.lock().clone()
    }

    pub fn requests(&self) -> Vec<PdfRequest> {
        self.state.requests.lock().clone()
    }
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    async fn launch(&self) -> Result<Arc<dyn BrowserProcess>> {
        self.state.launches.fetch_add(1, Ordering::SeqCst);

        let delay = *self.state.launch_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        let failure = self.state.launch_failure.lock().clone();
        if let Some(reason) = failure {
            return Err(Error::BrowserInitialization { reason });
        }

        let process = Arc::new(FakeProcess {
            connected: Arc::new(AtomicBool::new(true)),
            state: Arc::clone(&self.state),
        });
        self.state.processes.lock().push(Arc::clone(&process));
        Ok(process)
    }
}

pub(crate) struct FakeProcess {
    connected: Arc<AtomicBool>,
    state: Arc<FakeState>,
}

#[async_trait]
impl BrowserProcess for FakeProcess {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn open_page(&self) -> Result<Box<dyn BrowserPage>> {
        if !self.is_connected() {
            return Err(Error::page("browser disconnected"));
        }
        self.state.page_opens.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            state: Arc::clone(&self.state),
            process_connected: Arc::clone(&self.connected),
        }))
    }

    async fn shutdown(&self) -> Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.state.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

struct FakePage {
    state: Arc<FakeState>,
    process_connected: Arc<AtomicBool>,
}

impl FakePage {
    fn ensure_alive(&self) -> Result<()> {
        if self.process_connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(Error::page("Target closed"))
        }
    }
}

#[async_trait]
impl BrowserPage for FakePage {
    async fn load_content(&self, html: &str, _timeout: Duration) -> Result<()> {
        let failure = self.state.load_failures.lock().pop_front();
        if let Some(error) = failure {
            return Err(error);
        }

        let delay = *self.state.load_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.state.loaded_html.lock().push(html.to_string());
        Ok(())
    }

    async fn render_to_bytes(&self, request: &PdfRequest, _timeout: Duration) -> Result<Vec<u8>> {
        self.ensure_alive()?;
        let failure = self.state.export_failure.lock().clone();
        if let Some(reason) = failure {
            return Err(Error::page(reason));
        }
        self.state.requests.lock().push(request.clone());
        if self.state.empty_export.load(Ordering::SeqCst) {
            return Ok(Vec::new());
        }
        Ok(FAKE_PDF.to_vec())
    }

    async fn close(&self) -> Result<()> {
        self.state.page_closes.fetch_add(1, Ordering::SeqCst);
        if self.state.close_fails.load(Ordering::SeqCst) {
            return Err(Error::page("page close failed"));
        }
        Ok(())
    }
}
