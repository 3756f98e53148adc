//! MCP Server implementation using rmcp

use crate::browser::{BrowserManager, ChromiumLauncher};
use crate::config::ServerConfig;
use crate::error::Error;
use crate::render::{require_html, PdfService, RenderOptions, RenderResult};
use crate::shutdown::shutdown_signal;
use crate::source::{resolve_path, ArtifactCache, CachedPdf, HtmlSource};
use anyhow::Result;
use base64::Engine;
use rmcp::{
    handler::server::tool::ToolRouter, handler::server::wrapper::Parameters, model::*,
    schemars::JsonSchema, tool, tool_handler, tool_router, ServerHandler, ServiceExt,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// PDF Render MCP Server
#[derive(Clone)]
pub struct PdfRenderServer {
    service: Arc<PdfService>,
    cache: Arc<ArtifactCache>,
    tool_router: ToolRouter<Self>,
    /// Server configuration
    config: Arc<ServerConfig>,
}

// ============================================================================
// Request/Response types for generate_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GeneratePdfParams {
    /// HTML to render: {"html": "<html>..."} or {"path": "/absolute/file.html"}
    #[serde(default)]
    pub source: Option<HtmlSource>,
    /// Inline HTML, shorthand for source {"html": ...}
    #[serde(default)]
    pub html: Option<String>,
    /// Render options (filename is required)
    #[serde(flatten)]
    pub options: RenderOptions,
    /// Optional file or directory path to save the PDF to
    #[serde(default)]
    pub output_path: Option<String>,
    /// Include the PDF bytes as base64 in the response (default: false)
    #[serde(default)]
    pub include_base64: bool,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GeneratePdfResult {
    /// Source identifier
    pub source: String,
    pub success: bool,
    /// Generated filename: <name>_<YYYY-MM-DD_HH-mm-ss>.pdf
    pub filename: String,
    /// PDF size in bytes
    pub size: usize,
    pub mime_type: String,
    /// Cache key for retrieving the PDF later with get_cached_pdf
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_cache_key: Option<String>,
    /// Path the PDF was written to, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_path: Option<String>,
    /// Base64 encoded PDF, if requested
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_base64: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Request/Response types for get_cached_pdf
// ============================================================================

#[derive(Debug, Deserialize, JsonSchema)]
pub struct GetCachedPdfParams {
    /// Cache key returned by generate_pdf
    pub cache_key: String,
}

#[derive(Debug, Serialize, JsonSchema)]
pub struct GetCachedPdfResult {
    pub cache_key: String,
    pub filename: String,
    pub size: usize,
    /// Base64 encoded PDF
    pub data_base64: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// Response type for browser_status
// ============================================================================

#[derive(Debug, Serialize, JsonSchema)]
pub struct BrowserStatusResult {
    /// Whether a connected browser process is running
    pub connected: bool,
    /// Browser processes launched since startup
    pub launches: u64,
    /// Execution mode (development or production)
    pub mode: String,
    /// Browser executable in use, if resolved
    #[serde(skip_serializing_if = "Option::is_none")]
    pub executable: Option<String>,
    /// Number of cached PDFs
    pub cached_pdfs: usize,
}

// ============================================================================
// Tool implementations
// ============================================================================

#[tool_router]
impl PdfRenderServer {
    pub fn new() -> Self {
        Self::with_config(ServerConfig::default())
    }

    /// Create a server that renders with headless Chromium
    pub fn with_config(config: ServerConfig) -> Self {
        let launcher = ChromiumLauncher::new(config.launch.clone());
        let browsers = BrowserManager::new(Arc::new(launcher), config.init_wait);
        let service = PdfService::new(Arc::new(browsers), config.retry);
        Self::with_service(config, Arc::new(service))
    }

    /// Create a server around an existing render service
    pub fn with_service(config: ServerConfig, service: Arc<PdfService>) -> Self {
        let cache = ArtifactCache::new(config.cache_max_entries, config.cache_max_bytes);
        Self {
            service,
            cache: Arc::new(cache),
            tool_router: Self::tool_router(),
            config: Arc::new(config),
        }
    }

    /// Render HTML to PDF
    #[tool(
        description = "Render an HTML document to PDF using headless Chromium. The output is always cached (output_cache_key) for retrieval with get_cached_pdf.

Options:
- filename (required): base name, sanitized and suffixed with a timestamp
- orientation: \"portrait\" (default) or \"landscape\"
- paper_size: letter, legal, tabloid, ledger, a0-a6 (default: a4, case-insensitive)
- margins: {\"top\", \"right\", \"bottom\", \"left\"} as CSS lengths (default: 0.5in/0.25in/0.5in/0.25in)
- print_background (default: true), display_header_footer (default: false)
- header_template / footer_template: HTML used when display_header_footer is true
- scale: 0.1-2.0 (default: 1.0), timeout_ms (default: 30000)

Source format: must be one of {\"html\": \"<html>...</html>\"} or {\"path\": \"/absolute/file.html\"}"
    )]
    async fn generate_pdf(&self, Parameters(params): Parameters<GeneratePdfParams>) -> String {
        let result = self
            .process_generate_pdf(&params)
            .await
            .unwrap_or_else(|e| {
                tracing::warn!(error = %e, "generate_pdf failed");
                GeneratePdfResult {
                    source: Self::source_name(&params),
                    success: false,
                    filename: String::new(),
                    size: 0,
                    mime_type: String::new(),
                    output_cache_key: None,
                    output_path: None,
                    data_base64: None,
                    error: Some(e.client_message()),
                }
            });

        serde_json::to_string_pretty(&result).unwrap_or_default()
    }

    /// Fetch a previously rendered PDF
    #[tool(
        description = "Return a PDF rendered earlier by generate_pdf as base64, looked up by its output_cache_key."
    )]
    async fn get_cached_pdf(&self, Parameters(params): Parameters<GetCachedPdfParams>) -> String {
        let result = self.process_get_cached_pdf(&params).unwrap_or_else(|e| {
            tracing::warn!(error = %e, "get_cached_pdf failed");
            GetCachedPdfResult {
                cache_key: params.cache_key.clone(),
                filename: String::new(),
                size: 0,
                data_base64: String::new(),
                error: Some(e.client_message()),
            }
        });

        serde_json::to_string_pretty(&result).unwrap_or_default()
    }

    /// Report the state of the shared browser process
    #[tool(description = "Report whether the headless browser is running and how often it has been launched.")]
    async fn browser_status(&self) -> String {
        let result = self.process_browser_status().await;
        serde_json::to_string_pretty(&result).unwrap_or_default()
    }
}

impl PdfRenderServer {
    /// Close the browser process
    pub async fn shutdown(&self) {
        self.service.shutdown().await;
    }

    fn source_name(params: &GeneratePdfParams) -> String {
        match (&params.source, &params.html) {
            (Some(source), _) => source.name(),
            (None, Some(_)) => "<inline>".to_string(),
            (None, None) => "<none>".to_string(),
        }
    }

    fn resolve_html(&self, params: &GeneratePdfParams) -> crate::error::Result<String> {
        match &params.source {
            None => require_html(params.html.as_deref()).map(str::to_string),
            Some(HtmlSource::Inline { html }) => Ok(html.clone()),
            Some(HtmlSource::Path { path }) => {
                let path = self.validate_path_access(path)?;
                resolve_path(path, self.config.max_html_bytes)
            }
        }
    }

    pub async fn process_generate_pdf(
        &self,
        params: &GeneratePdfParams,
    ) -> crate::error::Result<GeneratePdfResult> {
        let html = self.resolve_html(params)?;

        let RenderResult {
            success,
            filename,
            buffer,
            size,
            mime_type,
        } = self.service.generate_pdf(&html, &params.options).await?;

        let output_path = self.write_output(&params.output_path, &filename, &buffer)?;
        let data_base64 = params
            .include_base64
            .then(|| base64::engine::general_purpose::STANDARD.encode(&buffer));

        let output_cache_key = self.cache.insert(CachedPdf {
            filename: filename.clone(),
            data: buffer,
        });

        Ok(GeneratePdfResult {
            source: Self::source_name(params),
            success,
            filename,
            size,
            mime_type: mime_type.to_string(),
            output_cache_key,
            output_path,
            data_base64,
            error: None,
        })
    }

    pub fn process_get_cached_pdf(
        &self,
        params: &GetCachedPdfParams,
    ) -> crate::error::Result<GetCachedPdfResult> {
        let cached = self
            .cache
            .get(&params.cache_key)
            .ok_or_else(|| Error::CacheKeyNotFound {
                key: params.cache_key.clone(),
            })?;

        Ok(GetCachedPdfResult {
            cache_key: params.cache_key.clone(),
            size: cached.size(),
            data_base64: base64::engine::general_purpose::STANDARD.encode(&cached.data),
            filename: cached.filename,
            error: None,
        })
    }

    pub async fn process_browser_status(&self) -> BrowserStatusResult {
        let stats = self.service.browsers().stats().await;
        BrowserStatusResult {
            connected: stats.connected,
            launches: stats.launches,
            mode: self.config.launch.mode.to_string(),
            executable: self
                .config
                .launch
                .resolve_executable()
                .map(|p| p.display().to_string()),
            cached_pdfs: self.cache.len(),
        }
    }

    /// Validate that a path is within allowed resource directories.
    /// If no resource_dirs are configured, all paths are allowed.
    fn validate_path_access(&self, path: &str) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(PathBuf::from(path));
        }

        let canonical = std::fs::canonicalize(path).map_err(|_| Error::PathAccessDenied {
            path: path.to_string(),
        })?;

        if self.within_resource_dirs(&canonical) {
            Ok(canonical)
        } else {
            Err(Error::PathAccessDenied {
                path: path.to_string(),
            })
        }
    }

    /// Validate that an output path is within allowed resource directories.
    /// Canonicalizes the parent directory since the output file may not exist yet.
    fn validate_output_path_access(&self, path: &Path) -> crate::error::Result<PathBuf> {
        if self.config.resource_dirs.is_empty() {
            return Ok(path.to_path_buf());
        }

        let denied = || Error::PathAccessDenied {
            path: path.display().to_string(),
        };
        let parent = match path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        let file_name = path.file_name().ok_or_else(denied)?;
        let canonical_parent = std::fs::canonicalize(parent).map_err(|_| denied())?;
        let canonical_target = canonical_parent.join(file_name);

        if self.within_resource_dirs(&canonical_target) {
            Ok(canonical_target)
        } else {
            Err(denied())
        }
    }

    fn within_resource_dirs(&self, canonical: &Path) -> bool {
        self.config.resource_dirs.iter().any(|dir| {
            std::fs::canonicalize(dir)
                .map(|cd| canonical.starts_with(&cd))
                .unwrap_or(false)
        })
    }

    /// Write the PDF to `output_path`. A directory (existing, or given with a
    /// trailing slash) receives the generated filename.
    fn write_output(
        &self,
        output_path: &Option<String>,
        filename: &str,
        data: &[u8],
    ) -> crate::error::Result<Option<String>> {
        let Some(path_str) = output_path else {
            return Ok(None);
        };

        let requested = Path::new(path_str);
        let is_dir = path_str.ends_with('/') || requested.is_dir();
        let target = if is_dir {
            requested.join(filename)
        } else {
            requested.to_path_buf()
        };

        let target = self.validate_output_path_access(&target)?;

        if let Some(parent) = target.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        std::fs::write(&target, data)?;
        tracing::debug!(path = %target.display(), "PDF written");
        Ok(Some(target.display().to_string()))
    }
}

impl Default for PdfRenderServer {
    fn default() -> Self {
        Self::new()
    }
}

#[tool_handler]
impl ServerHandler for PdfRenderServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "PDF Render Server converts HTML documents to PDF with headless Chromium. \
                 Rendered PDFs are cached and can be fetched again by key."
                    .into(),
            ),
        }
    }
}

/// Run the MCP server with default configuration
pub async fn run_server() -> Result<()> {
    run_server_with_config(ServerConfig::default()).await
}

/// Run the MCP server until the client disconnects or a termination signal
/// arrives, then close the browser.
pub async fn run_server_with_config(config: ServerConfig) -> Result<()> {
    tracing::info!(
        mode = %config.launch.mode,
        max_attempts = config.retry.max_attempts,
        "Starting PDF Render Server"
    );
    let server = PdfRenderServer::with_config(config);

    tracing::info!("PDF Render Server ready, waiting for connections...");

    let service = server.clone().serve(rmcp::transport::io::stdio()).await?;
    tokio::select! {
        reason = service.waiting() => {
            tracing::info!(reason = ?reason, "MCP session ended");
        }
        _ = shutdown_signal() => {}
    }

    server.shutdown().await;
    Ok(())
}
