//! HTML source resolution and rendered PDF caching

pub mod cache;
pub mod resolver;

pub use cache::{ArtifactCache, CachedPdf};
pub use resolver::{resolve_path, HtmlSource};
