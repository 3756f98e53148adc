//! Server configuration loaded from the environment

use crate::browser::{ExecutionMode, LaunchSettings, DEFAULT_INIT_WAIT};
use crate::retry::RetryPolicy;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

/// Resource and rendering configuration for the PDF Render Server
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Directories HTML input may be read from and PDFs written to.
    /// Empty means unrestricted.
    pub resource_dirs: Vec<String>,
    /// Browser launch profile
    pub launch: LaunchSettings,
    /// Page setup retry policy (default: 3 attempts, 1000ms linear backoff)
    pub retry: RetryPolicy,
    /// How long a caller waits for another caller's browser startup (default: 10s)
    pub init_wait: Duration,
    /// Maximum number of cached PDFs (default: 100)
    pub cache_max_entries: usize,
    /// Maximum total bytes of cached PDFs (default: 512MB)
    pub cache_max_bytes: usize,
    /// Maximum size of HTML files read from disk (default: 10MB)
    pub max_html_bytes: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            resource_dirs: Vec::new(),
            launch: LaunchSettings::default(),
            retry: RetryPolicy::default(),
            init_wait: DEFAULT_INIT_WAIT,
            cache_max_entries: 100,
            cache_max_bytes: 512 * 1024 * 1024, // 512MB
            max_html_bytes: 10 * 1024 * 1024,   // 10MB
        }
    }
}

impl ServerConfig {
    /// Load from process environment variables
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using `lookup` to read variables. Unset variables keep their
    /// defaults; invalid ones are logged and ignored.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(mode) = parse_var::<ExecutionMode>(&get, "PDF_RENDER_MODE") {
            config.launch.mode = mode;
        }
        if let Some(path) = get("PDF_BROWSER_EXECUTABLE").or_else(|| get("CHROME_PATH")) {
            config.launch.executable = Some(PathBuf::from(path));
        }
        if let Some(paths) = get("PDF_BROWSER_SEARCH_PATHS") {
            config.launch.search_paths = split_list(&paths).map(PathBuf::from).collect();
        }
        if let Some(attempts) = parse_var::<u32>(&get, "PDF_RENDER_MAX_ATTEMPTS") {
            config.retry = RetryPolicy::new(attempts, config.retry.base_delay);
        }
        if let Some(ms) = parse_var::<u64>(&get, "PDF_RENDER_BACKOFF_MS") {
            config.retry = RetryPolicy::new(config.retry.max_attempts, Duration::from_millis(ms));
        }
        if let Some(ms) = parse_var::<u64>(&get, "PDF_BROWSER_INIT_WAIT_MS") {
            config.init_wait = Duration::from_millis(ms);
        }
        if let Some(dirs) = get("PDF_RESOURCE_DIRS") {
            config.resource_dirs = split_list(&dirs).map(String::from).collect();
        }
        if let Some(entries) = parse_var::<usize>(&get, "PDF_CACHE_MAX_ENTRIES") {
            config.cache_max_entries = entries;
        }
        if let Some(bytes) = parse_var::<usize>(&get, "PDF_CACHE_MAX_BYTES") {
            config.cache_max_bytes = bytes;
        }
        if let Some(bytes) = parse_var::<u64>(&get, "PDF_MAX_HTML_BYTES") {
            config.max_html_bytes = bytes;
        }

        config
    }
}

fn parse_var<T>(get: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring invalid configuration value");
            None
        }
    }
}

fn split_list(value: &str) -> impl Iterator<Item = &str> {
    value.split(':').map(str::trim).filter(|s| !s.is_empty())
}
