//! Bounded pool of page slots on top of the engine lifecycle manager.
//!
//! Admission is a FIFO semaphore with one permit per slot, so the number of
//! checked-out pages can never exceed `max_slots`. A slot returns its permit
//! only after the page has been closed, which happens a fixed grace delay
//! after release.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};
use tokio_util::sync::{CancellationToken, DropGuard};

use crate::config::{NetworkIdleConfig, PoolConfig};
use crate::engine::{accept_language, EnginePage};
use crate::lifecycle::EngineManager;
use crate::{Result, SnapError};

/// Largest slot count a pool accepts: the semaphore permit limit, capped so
/// that draining every slot fits a single `u32` acquisition.
pub const MAX_POOL_SLOTS: usize = if Semaphore::MAX_PERMITS < u32::MAX as usize {
    Semaphore::MAX_PERMITS
} else {
    u32::MAX as usize
};

/// Bounded set of rendering slots sharing one engine.
#[derive(Clone)]
pub struct PagePool {
    engines: Arc<EngineManager>,
    slots: Arc<Semaphore>,
    max_slots: usize,
    settle: Duration,
    release_delay: Duration,
    admission_timeout: Option<Duration>,
    network_idle: NetworkIdleConfig,
    monitor: CancellationToken,
    // Cancels `monitor` when the last clone of the pool goes away.
    _monitor_guard: Arc<DropGuard>,
}

impl fmt::Debug for PagePool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PagePool")
            .field("max_slots", &self.max_slots)
            .field("in_use", &self.in_use())
            .field("settle", &self.settle)
            .field("release_delay", &self.release_delay)
            .finish_non_exhaustive()
    }
}

impl PagePool {
    /// Build a pool from `config`.
    ///
    /// `Config::validate` rejects slot counts outside `1..=MAX_POOL_SLOTS`.
    /// Configs built in code may skip validation, so the count is clamped
    /// into that range here (with a warning) instead of panicking inside the
    /// semaphore.
    pub fn new(engines: Arc<EngineManager>, config: &PoolConfig) -> Self {
        let max_slots = config.max_slots.clamp(1, MAX_POOL_SLOTS);
        if max_slots != config.max_slots {
            tracing::warn!(
                requested = config.max_slots,
                max_slots,
                "pool.max_slots out of range; clamped"
            );
        }
        let monitor = CancellationToken::new();
        Self {
            engines,
            slots: Arc::new(Semaphore::new(max_slots)),
            max_slots,
            settle: config.settle,
            release_delay: config.release_delay,
            admission_timeout: config.admission_timeout,
            network_idle: config.network_idle,
            _monitor_guard: Arc::new(monitor.clone().drop_guard()),
            monitor,
        }
    }

    pub fn engines(&self) -> &Arc<EngineManager> {
        &self.engines
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// Slots currently checked out (including ones waiting out their release delay).
    pub fn in_use(&self) -> usize {
        self.max_slots
            .saturating_sub(self.slots.available_permits())
    }

    pub fn available(&self) -> usize {
        self.slots.available_permits()
    }

    /// Acquire a page navigated to `url` for `locale` and settled.
    ///
    /// Waits for a free slot without any upper bound unless an admission
    /// timeout is configured. Waiters are admitted in arrival order.
    pub async fn acquire(
        &self,
        url: &str,
        locale: &str,
        settle: Option<Duration>,
    ) -> Result<PageSlot> {
        tracing::debug!(url, locale, "acquiring page slot");
        if self.slots.is_closed() {
            return Err(SnapError::processing("page pool is shut down"));
        }
        let engine = self.engines.acquire().await?;
        let permit = self.admit().await?;
        tracing::debug!(
            url,
            in_use = self.in_use(),
            max_slots = self.max_slots,
            "page slot admitted"
        );

        // The engine may have been torn down while this caller was queued.
        let engine = if engine.is_connected() {
            engine
        } else {
            self.engines.acquire().await?
        };
        let page: Arc<dyn EnginePage> = Arc::from(engine.new_page().await?);
        let slot = PageSlot::new(page, permit, url, self.release_delay);

        slot.page()
            .override_accept_language(&accept_language(locale))
            .await?;
        slot.page().navigate(url).await?;

        let settle = settle.unwrap_or(self.settle);
        if !settle.is_zero() {
            tokio::time::sleep(settle).await;
        }
        slot.page().wait_for_network_idle(&self.network_idle).await?;
        Ok(slot)
    }

    async fn admit(&self) -> Result<OwnedSemaphorePermit> {
        let acquire = self.slots.clone().acquire_owned();
        let permit = match self.admission_timeout {
            Some(limit) => tokio::time::timeout(limit, acquire)
                .await
                .map_err(|_| SnapError::AdmissionTimeout(limit))?,
            None => acquire.await,
        };
        permit.map_err(|_| SnapError::processing("page pool is shut down"))
    }

    /// Start the background task that closes the engine after sustained idleness.
    ///
    /// Must be called from within a Tokio runtime. The monitor stops on
    /// [`PagePool::shutdown`] or once every clone of the pool is dropped.
    /// Calling it more than once starts additional monitors sharing the same
    /// stop signal.
    pub fn start_idle_monitor(&self, poll_interval: Duration) {
        let engines = self.engines.clone();
        let slots = self.slots.clone();
        let max_slots = self.max_slots;
        let stop = self.monitor.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    _ = stop.cancelled() => break,
                    _ = ticker.tick() => {
                        let active = max_slots.saturating_sub(slots.available_permits());
                        engines.close_if_idle(active).await;
                    }
                }
            }
            tracing::debug!("idle monitor stopped");
        });
    }

    /// Wait until every checked-out slot has been returned.
    pub async fn drain(&self) {
        let permits = u32::try_from(self.max_slots).unwrap_or(u32::MAX);
        if let Ok(all) = self.slots.acquire_many(permits).await {
            drop(all);
        }
    }

    /// Stop the idle monitor, wait for outstanding slots, close the engine and
    /// refuse further acquisitions.
    pub async fn shutdown(&self) {
        self.monitor.cancel();
        self.drain().await;
        self.slots.close();
        self.engines.shutdown().await;
    }
}

/// A checked-out page. Released exactly once: explicitly through
/// [`PageSlot::release`] or implicitly on drop.
pub struct PageSlot {
    page: Arc<dyn EnginePage>,
    permit: Option<OwnedSemaphorePermit>,
    url: String,
    release_delay: Duration,
    runtime: tokio::runtime::Handle,
}

impl fmt::Debug for PageSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageSlot")
            .field("url", &self.url)
            .field("released", &self.permit.is_none())
            .finish_non_exhaustive()
    }
}

impl PageSlot {
    fn new(
        page: Arc<dyn EnginePage>,
        permit: OwnedSemaphorePermit,
        url: &str,
        release_delay: Duration,
    ) -> Self {
        Self {
            page,
            permit: Some(permit),
            url: url.to_string(),
            release_delay,
            runtime: tokio::runtime::Handle::current(),
        }
    }

    pub fn page(&self) -> &dyn EnginePage {
        self.page.as_ref()
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Close the page and free the slot after the release delay.
    pub fn release(mut self) {
        self.schedule_release();
    }

    fn schedule_release(&mut self) {
        let Some(permit) = self.permit.take() else {
            return;
        };
        let page = self.page.clone();
        let delay = self.release_delay;
        let url = std::mem::take(&mut self.url);
        self.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(err) = page.close().await {
                tracing::warn!(url = %url, error = %err, "page close failed");
            }
            drop(permit);
            tracing::debug!(url = %url, "page slot released");
        });
    }
}

impl Drop for PageSlot {
    fn drop(&mut self) {
        self.schedule_release();
    }
}
