//! Headless engine abstraction.
//!
//! The rest of the crate only talks to the browser through three traits:
//!
//! - [`EngineLauncher`] starts an engine process with a [`LaunchOptions`]
//! - [`Engine`] is one live browser instance that hands out pages
//! - [`EnginePage`] is a single navigable rendering context
//!
//! [`chromium`] implements them on top of `chromiumoxide`; tests plug in
//! in-memory fakes.

pub mod chromium;
mod network;

use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::{EngineConfig, NetworkIdleConfig};
use crate::{Result, Viewport};

pub use chromium::ChromiumLauncher;
pub use network::NetworkActivity;

/// Arguments passed to every engine launch on top of headless/incognito/window size.
pub const DEFAULT_LAUNCH_ARGS: &[&str] = &["--disable-features=site-per-process", "--no-sandbox"];

/// Fixed launch configuration for the engine process.
#[derive(Debug, Clone, PartialEq)]
pub struct LaunchOptions {
    pub headless: bool,
    pub incognito: bool,
    pub window: Viewport,
    pub executable: Option<PathBuf>,
    pub launch_timeout: Duration,
    pub request_timeout: Duration,
    pub args: Vec<String>,
}

impl Default for LaunchOptions {
    fn default() -> Self {
        Self::from(&EngineConfig::default())
    }
}

impl From<&EngineConfig> for LaunchOptions {
    fn from(config: &EngineConfig) -> Self {
        Self {
            headless: config.headless,
            incognito: true,
            window: config.window,
            executable: config.executable.clone(),
            launch_timeout: config.launch_timeout,
            request_timeout: config.request_timeout,
            args: DEFAULT_LAUNCH_ARGS.iter().map(|a| a.to_string()).collect(),
        }
    }
}

/// Page formatting used for PDF export.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PdfOptions {
    /// Paper width in inches.
    pub paper_width: f64,
    /// Paper height in inches.
    pub paper_height: f64,
    /// Uniform margin in CSS pixels (96 per inch).
    pub margin_px: f64,
    pub print_background: bool,
    pub landscape: bool,
}

impl PdfOptions {
    pub fn margin_inches(&self) -> f64 {
        self.margin_px / 96.0
    }
}

impl Default for PdfOptions {
    /// US Letter, 37px margins, backgrounds printed.
    fn default() -> Self {
        Self {
            paper_width: 8.5,
            paper_height: 11.0,
            margin_px: 37.0,
            print_background: true,
            landscape: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageFormat {
    #[default]
    Jpeg,
    Png,
    Webp,
}

impl ImageFormat {
    pub fn extension(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "jpg",
            ImageFormat::Png => "png",
            ImageFormat::Webp => "webp",
        }
    }

    pub fn mime_type(self) -> &'static str {
        match self {
            ImageFormat::Jpeg => "image/jpeg",
            ImageFormat::Png => "image/png",
            ImageFormat::Webp => "image/webp",
        }
    }
}

impl FromStr for ImageFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "jpeg" | "jpg" => Ok(ImageFormat::Jpeg),
            "png" => Ok(ImageFormat::Png),
            "webp" => Ok(ImageFormat::Webp),
            other => Err(format!(
                "Unsupported image type '{}'. Supported: jpeg, png, webp.",
                other
            )),
        }
    }
}

/// `Accept-Language` value sent on every request of a page rendered for `locale`.
pub fn accept_language(locale: &str) -> String {
    format!("{};q=0.7", locale.trim())
}

/// Starts engine instances.
#[async_trait]
pub trait EngineLauncher: Send + Sync {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn Engine>>;
}

/// A live engine instance.
#[async_trait]
pub trait Engine: Send + Sync {
    /// False once the underlying process or connection has gone away.
    fn is_connected(&self) -> bool;

    async fn new_page(&self) -> Result<Box<dyn EnginePage>>;

    /// Closing an already closed engine must succeed.
    async fn close(&self) -> Result<()>;
}

/// One rendering context.
#[async_trait]
pub trait EnginePage: Send + Sync {
    /// Enable request interception and rewrite `Accept-Language` on every outgoing request.
    async fn override_accept_language(&self, value: &str) -> Result<()>;

    /// Start navigating to `url` without waiting for the load to finish.
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn wait_for_network_idle(&self, idle: &NetworkIdleConfig) -> Result<()>;

    async fn set_viewport(&self, viewport: Viewport) -> Result<()>;

    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>>;

    async fn screenshot(&self, format: ImageFormat) -> Result<Vec<u8>>;

    /// Fully rendered document markup.
    async fn content(&self) -> Result<String>;

    async fn close(&self) -> Result<()>;
}
