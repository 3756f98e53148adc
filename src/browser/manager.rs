//! Shared browser process lifecycle

use super::{BrowserLauncher, BrowserProcess};
use crate::error::{Error, Result};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

/// Upper bound on waiting for another caller's browser startup
pub const DEFAULT_INIT_WAIT: Duration = Duration::from_secs(10);

/// Snapshot of the manager state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BrowserStats {
    /// Whether a connected browser handle is cached
    pub connected: bool,
    /// Number of browser processes launched so far
    pub launches: u64,
}

/// Owns the single shared browser process handle.
///
/// At most one handle is cached at a time. Initialization happens while the
/// slot lock is held, so concurrent callers wait for the launch in progress
/// and converge on the same handle instead of starting a second process.
pub struct BrowserManager {
    launcher: Arc<dyn BrowserLauncher>,
    slot: Mutex<Option<Arc<dyn BrowserProcess>>>,
    init_wait: Duration,
    launches: AtomicU64,
}

impl BrowserManager {
    pub fn new(launcher: Arc<dyn BrowserLauncher>, init_wait: Duration) -> Self {
        Self {
            launcher,
            slot: Mutex::new(None),
            init_wait,
            launches: AtomicU64::new(0),
        }
    }

    /// Return the cached connected handle, launching a new process if there
    /// is none or the cached one has disconnected.
    pub async fn acquire(&self) -> Result<Arc<dyn BrowserProcess>> {
        let mut slot = tokio::time::timeout(self.init_wait, self.slot.lock())
            .await
            .map_err(|_| Error::BrowserInitialization {
                reason: format!(
                    "timed out after {}ms waiting for browser initialization",
                    self.init_wait.as_millis()
                ),
            })?;

        if let Some(handle) = slot.as_ref() {
            if handle.is_connected() {
                return Ok(Arc::clone(handle));
            }
            tracing::warn!("Cached browser disconnected, launching a new one");
            if let Some(stale) = slot.take() {
                Self::shutdown_in_background(stale);
            }
        }

        tracing::info!("Launching browser process");
        let handle = self.launcher.launch().await?;
        let launches = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::info!(launches, "Browser process ready");

        *slot = Some(Arc::clone(&handle));
        Ok(handle)
    }

    /// Forget `handle` so the next [`acquire`](Self::acquire) starts a fresh
    /// process. A different handle cached in the meantime is left alone.
    ///
    /// The process is not closed here: other callers may still be rendering
    /// on it. It goes away when the last of them drops its handle.
    pub async fn invalidate(&self, handle: &Arc<dyn BrowserProcess>) {
        let mut slot = self.slot.lock().await;
        let is_current = slot
            .as_ref()
            .map(|current| Arc::ptr_eq(current, handle))
            .unwrap_or(false);

        if is_current {
            tracing::warn!("Discarding browser handle after disconnect");
            slot.take();
        }
    }

    /// Hand back a handle after use. A handle whose process has gone away is
    /// discarded so the next caller does not pick it up.
    pub async fn release(&self, handle: Arc<dyn BrowserProcess>) {
        if !handle.is_connected() {
            self.invalidate(&handle).await;
        }
    }

    /// Close the cached browser process, if any.
    pub async fn shutdown(&self) {
        let handle = self.slot.lock().await.take();
        if let Some(handle) = handle {
            tracing::info!("Shutting down browser process");
            if let Err(e) = handle.shutdown().await {
                tracing::warn!(error = %e, "Browser shutdown failed");
            }
        }
    }

    pub async fn stats(&self) -> BrowserStats {
        let slot = self.slot.lock().await;
        BrowserStats {
            connected: slot.as_ref().map(|h| h.is_connected()).unwrap_or(false),
            launches: self.launches.load(Ordering::SeqCst),
        }
    }

    fn shutdown_in_background(stale: Arc<dyn BrowserProcess>) {
        tokio::spawn(async move {
            if let Err(e) = stale.shutdown().await {
                tracing::debug!(error = %e, "Stale browser shutdown failed");
            }
        });
    }
}
