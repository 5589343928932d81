//! In-process engine double shared by the integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use pagesnap_lib::{
    Config, Engine, EngineLauncher, EnginePage, ImageFormat, LaunchOptions, NetworkIdleConfig,
    PdfOptions, Result, SnapError, Viewport,
};
use tokio::sync::watch;

pub const EXAMPLE_HTML: &str = r#"<!doctype html>
<html lang="en">
<head>
  <title>Example Domain</title>
  <meta name="description" content="An example page">
  <meta property="og:image" content="">
  <meta property="og:type" content="article">
  <meta property="og:site_name" content="Example">
  <link rel="icon" href="/favicon.ico">
</head>
<body><p>Hello</p></body>
</html>"#;

/// Counters and knobs observed by tests.
#[derive(Default)]
pub struct FakeState {
    pub launches: AtomicUsize,
    pub engine_closes: AtomicUsize,
    pub pages_created: AtomicUsize,
    pub pages_closed: AtomicUsize,
    pub live_pages: AtomicUsize,
    pub peak_live_pages: AtomicUsize,
    pub content_calls: AtomicUsize,
    pub at_gate: AtomicUsize,
    pub fail_launch: AtomicBool,
    pub fail_navigation: AtomicBool,
    pub html: Mutex<String>,
    pub navigations: Mutex<Vec<String>>,
    pub accept_languages: Mutex<Vec<String>>,
    pub viewports: Mutex<Vec<Viewport>>,
    pub formats: Mutex<Vec<ImageFormat>>,
    connected: Mutex<Option<Arc<AtomicBool>>>,
    gate: Mutex<Option<watch::Receiver<bool>>>,
}

impl FakeState {
    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    pub fn launches(&self) -> usize {
        Self::count(&self.launches)
    }

    pub fn pages_created(&self) -> usize {
        Self::count(&self.pages_created)
    }

    pub fn pages_closed(&self) -> usize {
        Self::count(&self.pages_closed)
    }

    pub fn set_html(&self, html: &str) {
        *self.html.lock().unwrap() = html.to_string();
    }

    /// Simulate the browser process going away.
    pub fn disconnect(&self) {
        if let Some(flag) = self.connected.lock().unwrap().as_ref() {
            flag.store(false, Ordering::SeqCst);
        }
    }

    /// Hold every navigation until the returned sender publishes `true`.
    pub fn install_gate(&self) -> watch::Sender<bool> {
        let (tx, rx) = watch::channel(false);
        *self.gate.lock().unwrap() = Some(rx);
        tx
    }
}

#[derive(Clone)]
pub struct FakeLauncher {
    pub state: Arc<FakeState>,
}

impl FakeLauncher {
    pub fn new() -> Self {
        let state = Arc::new(FakeState::default());
        state.set_html(EXAMPLE_HTML);
        Self { state }
    }
}

#[async_trait]
impl EngineLauncher for FakeLauncher {
    async fn launch(&self, _options: &LaunchOptions) -> Result<Arc<dyn Engine>> {
        if self.state.fail_launch.load(Ordering::SeqCst) {
            return Err(SnapError::EngineStart("no browser in tests".to_string()));
        }
        self.state.launches.fetch_add(1, Ordering::SeqCst);
        let connected = Arc::new(AtomicBool::new(true));
        *self.state.connected.lock().unwrap() = Some(connected.clone());
        Ok(Arc::new(FakeEngine {
            state: self.state.clone(),
            connected,
        }))
    }
}

struct FakeEngine {
    state: Arc<FakeState>,
    connected: Arc<AtomicBool>,
}

#[async_trait]
impl Engine for FakeEngine {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn new_page(&self) -> Result<Box<dyn EnginePage>> {
        let state = &self.state;
        state.pages_created.fetch_add(1, Ordering::SeqCst);
        let live = state.live_pages.fetch_add(1, Ordering::SeqCst) + 1;
        state.peak_live_pages.fetch_max(live, Ordering::SeqCst);
        Ok(Box::new(FakePage {
            state: state.clone(),
            closed: AtomicBool::new(false),
        }))
    }

    async fn close(&self) -> Result<()> {
        if self.connected.swap(false, Ordering::SeqCst) {
            self.state.engine_closes.fetch_add(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

struct FakePage {
    state: Arc<FakeState>,
    closed: AtomicBool,
}

#[async_trait]
impl EnginePage for FakePage {
    async fn override_accept_language(&self, value: &str) -> Result<()> {
        self.state
            .accept_languages
            .lock()
            .unwrap()
            .push(value.to_string());
        Ok(())
    }

    async fn navigate(&self, url: &str) -> Result<()> {
        self.state.navigations.lock().unwrap().push(url.to_string());
        let gate = self.state.gate.lock().unwrap().clone();
        if let Some(mut gate) = gate {
            self.state.at_gate.fetch_add(1, Ordering::SeqCst);
            while !*gate.borrow_and_update() {
                if gate.changed().await.is_err() {
                    break;
                }
            }
        }
        if self.state.fail_navigation.load(Ordering::SeqCst) {
            return Err(SnapError::Navigation(format!("net::ERR_FAILED at {url}")));
        }
        Ok(())
    }

    async fn wait_for_network_idle(&self, _idle: &NetworkIdleConfig) -> Result<()> {
        Ok(())
    }

    async fn set_viewport(&self, viewport: Viewport) -> Result<()> {
        self.state.viewports.lock().unwrap().push(viewport);
        Ok(())
    }

    async fn pdf(&self, _options: &PdfOptions) -> Result<Vec<u8>> {
        Ok(b"%PDF-1.4 fake".to_vec())
    }

    async fn screenshot(&self, format: ImageFormat) -> Result<Vec<u8>> {
        self.state.formats.lock().unwrap().push(format);
        Ok(vec![0xFF, 0xD8, 0xFF])
    }

    async fn content(&self) -> Result<String> {
        self.state.content_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.state.html.lock().unwrap().clone())
    }

    async fn close(&self) -> Result<()> {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.state.pages_closed.fetch_add(1, Ordering::SeqCst);
            self.state.live_pages.fetch_sub(1, Ordering::SeqCst);
        }
        Ok(())
    }
}

/// Defaults with no settle time so tests only wait on what they exercise.
pub fn test_config(max_slots: usize) -> Config {
    let mut config = Config::default();
    config.pool.max_slots = max_slots;
    config.pool.settle = Duration::ZERO;
    config
}

/// Poll `condition`, letting the paused clock move forward in 1ms steps.
pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..10_000 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(1)).await;
    }
    panic!("condition not reached");
}
