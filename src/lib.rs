//! Pagesnap Library
//!
//! Renders web pages to PDF, screenshots, HTML and link-preview metadata by
//! multiplexing a single headless browser across a bounded pool of pages.
//!
//! # Module Overview
//!
//! - [`engine`] - Engine traits and the Chromium implementation
//! - [`lifecycle`] - Lazy engine start and idle shutdown
//! - [`pool`] - Bounded page-slot admission and deferred release
//! - [`cache`] - Namespaced TTL cache for captured markup
//! - [`render`] - PDF, screenshot, HTML, metadata and preview operations
//! - [`metadata`] - Metadata extraction from captured markup
//! - [`preview`] - Link-preview normalization
//! - [`config`] - Configuration file support
//! - [`output`] - JSON output schemas
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use pagesnap_lib::{ChromiumLauncher, Config, PageRenderer, PdfRequest};
//!
//! # async fn example() -> pagesnap_lib::Result<()> {
//! let config = Config::default();
//! let renderer = PageRenderer::start(&config, Arc::new(ChromiumLauncher));
//! let pdf = renderer
//!     .pdf("https://example.com", "en", PdfRequest::default())
//!     .await?;
//! let preview = renderer.preview("https://example.com", "en", None).await?;
//! println!("{:?}", preview.title);
//! renderer.shutdown().await;
//! # let _ = pdf;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod metadata;
pub mod output;
pub mod pool;
pub mod preview;
pub mod render;
pub mod viewport;

pub use cache::ContentCache;
pub use config::{CacheConfig, Config, EngineConfig, IdlePolicy, NetworkIdleConfig, PoolConfig};
pub use engine::{
    ChromiumLauncher, Engine, EngineLauncher, EnginePage, ImageFormat, LaunchOptions, PdfOptions,
};
pub use error::{ErrorCategory, ErrorPayload, Result, SnapError};
pub use lifecycle::EngineManager;
pub use metadata::{Favicon, PageMetadata};
pub use output::{ArtifactOutput, ErrorOutput, SnapOutput, PAGESNAP_OUTPUT_VERSION};
pub use pool::{PagePool, PageSlot};
pub use preview::PreviewRecord;
pub use render::{html_cache_key, Artifact, PageRenderer, PdfRequest, ScreenshotRequest};
pub use viewport::Viewport;
