use std::collections::HashSet;
use std::sync::Mutex;
use std::time::Duration;

use tokio::time::Instant;

use crate::config::NetworkIdleConfig;
use crate::{Result, SnapError};

const MAX_POLL_INTERVAL: Duration = Duration::from_millis(50);

#[derive(Debug)]
struct ActivityState {
    inflight: HashSet<String>,
    last_activity: Instant,
}

/// In-flight request bookkeeping for network-idle detection.
///
/// Every request start or finish counts as activity. The page is idle once at
/// most `max_inflight` requests are outstanding and nothing has happened for
/// `idle_window`.
#[derive(Debug)]
pub struct NetworkActivity {
    state: Mutex<ActivityState>,
}

impl Default for NetworkActivity {
    fn default() -> Self {
        Self::new()
    }
}

impl NetworkActivity {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(ActivityState {
                inflight: HashSet::new(),
                last_activity: Instant::now(),
            }),
        }
    }

    pub fn request_started(&self, request_id: &str) {
        let mut state = self.lock();
        state.inflight.insert(request_id.to_string());
        state.last_activity = Instant::now();
    }

    pub fn request_finished(&self, request_id: &str) {
        let mut state = self.lock();
        state.inflight.remove(request_id);
        state.last_activity = Instant::now();
    }

    pub fn inflight(&self) -> usize {
        self.lock().inflight.len()
    }

    pub fn is_idle(&self, max_inflight: usize, idle_window: Duration) -> bool {
        let state = self.lock();
        state.inflight.len() <= max_inflight
            && Instant::now().saturating_duration_since(state.last_activity) >= idle_window
    }

    /// Poll until idle, failing with a navigation error after `idle.timeout`.
    pub async fn wait_for_idle(&self, idle: &NetworkIdleConfig) -> Result<()> {
        let deadline = Instant::now() + idle.timeout;
        let poll = idle.idle_window.min(MAX_POLL_INTERVAL).max(Duration::from_millis(1));
        loop {
            if self.is_idle(idle.max_inflight, idle.idle_window) {
                return Ok(());
            }
            if Instant::now() >= deadline {
                return Err(SnapError::Navigation(format!(
                    "network idle timed out after {:?} with {} requests in flight",
                    idle.timeout,
                    self.inflight()
                )));
            }
            tokio::time::sleep(poll).await;
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ActivityState> {
        self.state
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
