//! Engine lifecycle: lazy start, last-use tracking and idle shutdown.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use std::time::Duration;

use tokio::sync::Mutex;
use tokio::time::Instant;

use crate::config::{EngineConfig, IdlePolicy};
use crate::engine::{Engine, EngineLauncher, LaunchOptions};
use crate::Result;

/// Owns at most one live engine and hands out shared handles to it.
pub struct EngineManager {
    launcher: Arc<dyn EngineLauncher>,
    options: LaunchOptions,
    idle_period: Duration,
    idle_policy: IdlePolicy,
    // Held across a launch so concurrent cold starts produce a single engine.
    engine: Mutex<Option<Arc<dyn Engine>>>,
    last_access: StdMutex<Instant>,
    launches: AtomicUsize,
}

impl fmt::Debug for EngineManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineManager")
            .field("options", &self.options)
            .field("idle_period", &self.idle_period)
            .field("idle_policy", &self.idle_policy)
            .field("launches", &self.launch_count())
            .finish_non_exhaustive()
    }
}

impl EngineManager {
    pub fn new(launcher: Arc<dyn EngineLauncher>, config: &EngineConfig) -> Self {
        Self {
            launcher,
            options: LaunchOptions::from(config),
            idle_period: config.idle_period,
            idle_policy: config.idle_policy,
            engine: Mutex::new(None),
            last_access: StdMutex::new(Instant::now()),
            launches: AtomicUsize::new(0),
        }
    }

    pub fn launch_options(&self) -> &LaunchOptions {
        &self.options
    }

    /// Return the live engine, launching one if none exists or the last one disconnected.
    pub async fn acquire(&self) -> Result<Arc<dyn Engine>> {
        let mut slot = self.engine.lock().await;
        self.touch();
        if let Some(engine) = slot.as_ref() {
            if engine.is_connected() {
                return Ok(engine.clone());
            }
            tracing::info!("engine disconnected; relaunching");
        }
        let engine = self.launcher.launch(&self.options).await?;
        let launches = self.launches.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!(launches, "engine started");
        *slot = Some(engine.clone());
        Ok(engine)
    }

    /// Shut the engine down when it has been idle longer than the idle period.
    ///
    /// `active_slots` is the number of pages currently checked out; under
    /// [`IdlePolicy::WaitForSlots`] a non-zero count postpones the shutdown.
    pub async fn close_if_idle(&self, active_slots: usize) -> bool {
        let mut slot = self.engine.lock().await;
        if slot.is_none() {
            return false;
        }
        let idle_for = self.idle_for();
        if idle_for <= self.idle_period {
            return false;
        }
        if self.idle_policy == IdlePolicy::WaitForSlots && active_slots > 0 {
            tracing::debug!(
                active_slots,
                idle_secs = idle_for.as_secs(),
                "engine idle but slots still checked out; keeping it"
            );
            return false;
        }
        if let Some(engine) = slot.take() {
            tracing::info!(
                idle_secs = idle_for.as_secs(),
                active_slots,
                "closing idle engine"
            );
            close_quietly(engine.as_ref()).await;
        }
        true
    }

    /// Close the engine if one is live. Safe to call repeatedly.
    pub async fn shutdown(&self) {
        if let Some(engine) = self.engine.lock().await.take() {
            if engine.is_connected() {
                close_quietly(engine.as_ref()).await;
            }
        }
    }

    pub async fn is_running(&self) -> bool {
        self.engine
            .lock()
            .await
            .as_ref()
            .is_some_and(|engine| engine.is_connected())
    }

    /// How long since the last [`EngineManager::acquire`] call.
    pub fn idle_for(&self) -> Duration {
        Instant::now().saturating_duration_since(*self.lock_last_access())
    }

    pub fn launch_count(&self) -> usize {
        self.launches.load(Ordering::SeqCst)
    }

    fn touch(&self) {
        *self.lock_last_access() = Instant::now();
    }

    fn lock_last_access(&self) -> std::sync::MutexGuard<'_, Instant> {
        self.last_access
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

async fn close_quietly(engine: &dyn Engine) {
    if let Err(err) = engine.close().await {
        tracing::warn!(error = %err, "engine close failed");
    }
}
