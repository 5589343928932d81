//! Rendering operations: each one takes a page slot, performs a single task
//! and releases the slot.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ContentCache;
use crate::config::Config;
use crate::engine::{EngineLauncher, ImageFormat, PdfOptions};
use crate::lifecycle::EngineManager;
use crate::metadata::PageMetadata;
use crate::pool::PagePool;
use crate::preview::PreviewRecord;
use crate::{Result, SnapError, Viewport};

/// Cache key for rendered markup of `url` in `locale`.
pub fn html_cache_key(url: &str, locale: &str) -> String {
    format!("html-{}-{}", url, locale)
}

/// Output of a binary export.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Artifact {
    Bytes(Vec<u8>),
    File(PathBuf),
}

#[derive(Debug, Clone, Default)]
pub struct PdfRequest {
    /// Settle time after navigation starts; the pool default when `None`.
    pub wait: Option<Duration>,
    /// Write the PDF here instead of returning the bytes.
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Default)]
pub struct ScreenshotRequest {
    pub wait: Option<Duration>,
    pub viewport: Viewport,
    pub format: ImageFormat,
    pub path: Option<PathBuf>,
}

/// Entry point for all page renders.
pub struct PageRenderer {
    pool: PagePool,
    cache: Arc<ContentCache<String>>,
    pdf: PdfOptions,
    default_locale: String,
}

impl PageRenderer {
    /// Build a renderer without background tasks.
    pub fn new(config: &Config, launcher: Arc<dyn EngineLauncher>) -> Self {
        let engines = Arc::new(EngineManager::new(launcher, &config.engine));
        Self {
            pool: PagePool::new(engines, &config.pool),
            cache: Arc::new(ContentCache::new(&config.cache)),
            pdf: PdfOptions::default(),
            default_locale: config.default_locale.clone(),
        }
    }

    /// Build a renderer and start the engine idle monitor. Requires a Tokio runtime.
    pub fn start(config: &Config, launcher: Arc<dyn EngineLauncher>) -> Self {
        let renderer = Self::new(config, launcher);
        renderer
            .pool
            .start_idle_monitor(config.engine.idle_poll_interval);
        renderer
    }

    pub fn with_pdf_options(mut self, pdf: PdfOptions) -> Self {
        self.pdf = pdf;
        self
    }

    pub fn pool(&self) -> &PagePool {
        &self.pool
    }

    pub fn cache(&self) -> &ContentCache<String> {
        &self.cache
    }

    pub async fn pdf(&self, url: &str, locale: &str, request: PdfRequest) -> Result<Artifact> {
        validate_url(url)?;
        let locale = self.locale(locale);
        let slot = self.pool.acquire(url, locale, request.wait).await?;
        let result = slot.page().pdf(&self.pdf).await;
        slot.release();

        let data = non_empty(result?, "PDF")?;
        tracing::info!(url, bytes = data.len(), "pdf rendered");
        deliver(data, request.path.as_deref()).await
    }

    pub async fn screenshot(
        &self,
        url: &str,
        locale: &str,
        request: ScreenshotRequest,
    ) -> Result<Artifact> {
        validate_url(url)?;
        let locale = self.locale(locale);
        let viewport = request.viewport.or_default_dimensions();
        let slot = self.pool.acquire(url, locale, request.wait).await?;
        let result = async {
            slot.page().set_viewport(viewport).await?;
            slot.page().screenshot(request.format).await
        }
        .await;
        slot.release();

        let data = non_empty(result?, "screenshot")?;
        tracing::info!(url, %viewport, format = ?request.format, bytes = data.len(), "screenshot captured");
        deliver(data, request.path.as_deref()).await
    }

    /// Rendered markup, served from the cache when a fresh copy exists.
    pub async fn html(&self, url: &str, locale: &str, wait: Option<Duration>) -> Result<String> {
        validate_url(url)?;
        let locale = self.locale(locale);
        let key = html_cache_key(url, locale);
        if let Some(html) = self.cache.get(None, &key) {
            tracing::debug!(url, locale, "html cache hit");
            return Ok(html);
        }

        let slot = self.pool.acquire(url, locale, wait).await?;
        let result = slot.page().content().await;
        slot.release();

        let html = result?;
        if html.is_empty() {
            return Err(SnapError::processing(format!("{} produced no markup", url)));
        }
        self.cache.prune_expired();
        self.cache.put(None, &key, html.clone())?;
        tracing::debug!(url, locale, bytes = html.len(), "html cached");
        Ok(html)
    }

    /// Metadata parsed from the captured markup; no second fetch is made.
    pub async fn metadata(
        &self,
        url: &str,
        locale: &str,
        wait: Option<Duration>,
    ) -> Result<PageMetadata> {
        let html = self.html(url, locale, wait).await?;
        PageMetadata::parse(&html, url)
    }

    pub async fn preview(
        &self,
        url: &str,
        locale: &str,
        wait: Option<Duration>,
    ) -> Result<PreviewRecord> {
        let metadata = self.metadata(url, locale, wait).await?;
        Ok(PreviewRecord::from_metadata(&metadata, url))
    }

    /// Wait for outstanding slots, then close the engine.
    pub async fn shutdown(&self) {
        self.pool.shutdown().await;
    }

    fn locale<'a>(&'a self, locale: &'a str) -> &'a str {
        if locale.trim().is_empty() {
            &self.default_locale
        } else {
            locale.trim()
        }
    }
}

fn validate_url(url: &str) -> Result<()> {
    if url.trim().is_empty() {
        return Err(SnapError::invalid_input("url", "required"));
    }
    Ok(())
}

fn non_empty(data: Vec<u8>, what: &str) -> Result<Vec<u8>> {
    if data.is_empty() {
        return Err(SnapError::processing(format!("{} export produced no data", what)));
    }
    Ok(data)
}

async fn deliver(data: Vec<u8>, path: Option<&Path>) -> Result<Artifact> {
    let Some(path) = path else {
        return Ok(Artifact::Bytes(data));
    };
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(path, &data).await?;
    Ok(Artifact::File(path.to_path_buf()))
}
