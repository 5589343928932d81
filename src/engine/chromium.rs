//! Chromium engine driven over the DevTools protocol with `chromiumoxide`.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::browser_protocol::emulation::SetDeviceMetricsOverrideParams;
use chromiumoxide::cdp::browser_protocol::fetch::{
    self, ContinueRequestParams, EventRequestPaused, HeaderEntry,
};
use chromiumoxide::cdp::browser_protocol::network::{
    self, EventLoadingFailed, EventLoadingFinished, EventRequestWillBeSent,
};
use chromiumoxide::cdp::browser_protocol::page::{
    CaptureScreenshotFormat, NavigateParams, PrintToPdfParams,
};
use chromiumoxide::error::CdpError;
use chromiumoxide::page::ScreenshotParams;
use chromiumoxide::Page;
use futures::StreamExt;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

use super::{
    Engine, EngineLauncher, EnginePage, ImageFormat, LaunchOptions, NetworkActivity, PdfOptions,
};
use crate::config::NetworkIdleConfig;
use crate::{Result, SnapError, Viewport};

/// Launches Chromium/Chrome processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChromiumLauncher;

#[async_trait]
impl EngineLauncher for ChromiumLauncher {
    async fn launch(&self, options: &LaunchOptions) -> Result<Arc<dyn Engine>> {
        let mut builder = BrowserConfig::builder()
            .window_size(options.window.width, options.window.height)
            .launch_timeout(options.launch_timeout)
            .request_timeout(options.request_timeout);
        if !options.headless {
            builder = builder.with_head();
        }
        if options.incognito {
            builder = builder.incognito();
        }
        if let Some(executable) = &options.executable {
            builder = builder.chrome_executable(executable);
        }
        for arg in &options.args {
            builder = builder.arg(arg.as_str());
        }
        let config = builder.build().map_err(SnapError::EngineStart)?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| SnapError::EngineStart(e.to_string()))?;

        let connected = Arc::new(AtomicBool::new(true));
        let flag = connected.clone();
        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(err) = event {
                    tracing::debug!(error = %err, "chromium handler reported an error");
                }
            }
            flag.store(false, Ordering::SeqCst);
            tracing::debug!("chromium connection closed");
        });

        tracing::info!(
            headless = options.headless,
            window = %options.window,
            "chromium launched"
        );

        Ok(Arc::new(ChromiumEngine {
            browser: RwLock::new(browser),
            connected,
            window: options.window,
            handler_task: Mutex::new(Some(handler_task)),
        }))
    }
}

pub struct ChromiumEngine {
    browser: RwLock<Browser>,
    connected: Arc<AtomicBool>,
    window: Viewport,
    handler_task: Mutex<Option<JoinHandle<()>>>,
}

#[async_trait]
impl Engine for ChromiumEngine {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn new_page(&self) -> Result<Box<dyn EnginePage>> {
        let page = self
            .browser
            .read()
            .await
            .new_page("about:blank")
            .await
            .map_err(|e| SnapError::EngineStart(format!("Failed to open page: {}", e)))?;
        let page = ChromiumPage::attach(page).await?;
        page.set_viewport(self.window).await?;
        Ok(Box::new(page))
    }

    async fn close(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        let mut browser = self.browser.write().await;
        if let Err(err) = browser.close().await {
            tracing::warn!(error = %err, "chromium close command failed");
        }
        if let Err(err) = browser.wait().await {
            tracing::warn!(error = %err, "waiting for chromium to exit failed");
        }
        if let Some(task) = self
            .handler_task
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take()
        {
            task.abort();
        }
        tracing::info!("chromium closed");
        Ok(())
    }
}

pub struct ChromiumPage {
    page: Page,
    network: Arc<NetworkActivity>,
    listeners: Mutex<Vec<JoinHandle<()>>>,
}

impl ChromiumPage {
    async fn attach(page: Page) -> Result<Self> {
        page.execute(network::EnableParams::default())
            .await
            .map_err(|e| cdp_error("enable network events", e))?;

        let network = Arc::new(NetworkActivity::new());
        let mut listeners = Vec::new();

        let mut started = page
            .event_listener::<EventRequestWillBeSent>()
            .await
            .map_err(|e| cdp_error("listen for requests", e))?;
        let tracker = network.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = started.next().await {
                tracker.request_started(event.request_id.inner());
            }
        }));

        let mut finished = page
            .event_listener::<EventLoadingFinished>()
            .await
            .map_err(|e| cdp_error("listen for responses", e))?;
        let tracker = network.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = finished.next().await {
                tracker.request_finished(event.request_id.inner());
            }
        }));

        let mut failed = page
            .event_listener::<EventLoadingFailed>()
            .await
            .map_err(|e| cdp_error("listen for failed requests", e))?;
        let tracker = network.clone();
        listeners.push(tokio::spawn(async move {
            while let Some(event) = failed.next().await {
                tracker.request_finished(event.request_id.inner());
            }
        }));

        Ok(Self {
            page,
            network,
            listeners: Mutex::new(listeners),
        })
    }

    fn push_listener(&self, task: JoinHandle<()>) {
        self.listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .push(task);
    }
}

#[async_trait]
impl EnginePage for ChromiumPage {
    async fn override_accept_language(&self, value: &str) -> Result<()> {
        let mut paused = self
            .page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| cdp_error("listen for intercepted requests", e))?;
        self.page
            .execute(fetch::EnableParams::default())
            .await
            .map_err(|e| cdp_error("enable request interception", e))?;

        let page = self.page.clone();
        let value = value.to_string();
        self.push_listener(tokio::spawn(async move {
            while let Some(event) = paused.next().await {
                let mut headers: Vec<HeaderEntry> = event
                    .request
                    .headers
                    .inner()
                    .as_object()
                    .map(|map| {
                        map.iter()
                            .filter(|(name, _)| !name.eq_ignore_ascii_case("accept-language"))
                            .map(|(name, v)| {
                                let v = v.as_str().map(str::to_string).unwrap_or_else(|| v.to_string());
                                HeaderEntry::new(name.clone(), v)
                            })
                            .collect()
                    })
                    .unwrap_or_default();
                headers.push(HeaderEntry::new("Accept-Language", value.clone()));

                let mut params = ContinueRequestParams::new(event.request_id.clone());
                params.headers = Some(headers);
                if let Err(err) = page.execute(params).await {
                    tracing::debug!(error = %err, "failed to continue intercepted request");
                }
            }
        }));
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        let response = self
            .page
            .execute(NavigateParams::new(url))
            .await
            .map_err(|e| SnapError::Navigation(format!("{}: {}", url, e)))?;
        if let Some(error) = response.result.error_text.as_deref() {
            return Err(SnapError::Navigation(format!("{}: {}", url, error)));
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self, idle: &NetworkIdleConfig) -> Result<()> {
        self.network.wait_for_idle(idle).await
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.page
            .execute(SetDeviceMetricsOverrideParams::new(
                viewport.width as i64,
                viewport.height as i64,
                1.0,
                false,
            ))
            .await
            .map_err(|e| cdp_error("set viewport", e))?;
        Ok(())
    }

    async fn pdf(&self, options: &PdfOptions) -> Result<Vec<u8>> {
        let margin = options.margin_inches();
        let params = PrintToPdfParams {
            landscape: Some(options.landscape),
            print_background: Some(options.print_background),
            paper_width: Some(options.paper_width),
            paper_height: Some(options.paper_height),
            margin_top: Some(margin),
            margin_bottom: Some(margin),
            margin_left: Some(margin),
            margin_right: Some(margin),
            ..PrintToPdfParams::default()
        };
        self.page
            .pdf(params)
            .await
            .map_err(|e| SnapError::processing(format!("PDF export failed: {}", e)))
    }

    async fn screenshot(&self, format: ImageFormat) -> Result<Vec<u8>> {
        let format = match format {
            ImageFormat::Jpeg => CaptureScreenshotFormat::Jpeg,
            ImageFormat::Png => CaptureScreenshotFormat::Png,
            ImageFormat::Webp => CaptureScreenshotFormat::Webp,
        };
        self.page
            .screenshot(ScreenshotParams::builder().format(format).build())
            .await
            .map_err(|e| SnapError::processing(format!("Screenshot failed: {}", e)))
    }

    async fn content(&self) -> Result<String> {
        self.page
            .content()
            .await
            .map_err(|e| SnapError::processing(format!("Reading page content failed: {}", e)))
    }

    async fn close(&self) -> Result<()> {
        for task in self
            .listeners
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .drain(..)
        {
            task.abort();
        }
        self.page
            .clone()
            .close()
            .await
            .map_err(|e| cdp_error("close page", e))
    }
}

fn cdp_error(action: &str, err: CdpError) -> SnapError {
    SnapError::Navigation(format!("Failed to {}: {}", action, err))
}
