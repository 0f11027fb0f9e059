use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use super::{SyncHandle, SyncReport};
use crate::error::SyncError;
use crate::host::HostTree;
use crate::providers::{Provider, StorageProvider};

pub type SyncHook = Arc<dyn Fn(&SyncReport) + Send + Sync>;

/// Runs `sync()` on a fixed interval. The interval lives on the manager so it
/// is persisted with the rest of its settings.
pub struct AutoSync<H: HostTree + 'static, P: StorageProvider + 'static = Provider> {
    handle: SyncHandle<H, P>,
    hook: Option<SyncHook>,
    task: Option<JoinHandle<()>>,
}

impl<H: HostTree + 'static, P: StorageProvider + 'static> AutoSync<H, P> {
    pub fn new(handle: SyncHandle<H, P>) -> Self {
        AutoSync { handle, hook: None, task: None }
    }

    /// Called after every successful automatic sync.
    pub fn set_hook(&mut self, hook: impl Fn(&SyncReport) + Send + Sync + 'static) {
        self.hook = Some(Arc::new(hook));
    }

    pub fn is_running(&self) -> bool {
        self.task.is_some()
    }

    /// Store a new rate (minutes, clamped) and restart the timer. Zero
    /// disables automatic syncing. Returns the rate in effect.
    pub async fn change_sync_rate(&mut self, minutes: u32) -> u32 {
        let rate = self.handle.lock().await.set_sync_rate(minutes);
        self.schedule(rate);
        rate
    }

    /// Restart the timer with the manager's current rate.
    pub async fn reset(&mut self) -> u32 {
        let rate = self.handle.lock().await.sync_rate();
        self.schedule(rate);
        rate
    }

    pub fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }

    fn schedule(&mut self, minutes: u32) {
        self.stop();
        if minutes == 0 {
            info!("auto-sync disabled");
            return;
        }

        let period = Duration::from_secs(u64::from(minutes) * 60);
        let handle = self.handle.clone();
        let hook = self.hook.clone();
        info!("auto-sync every {} min", minutes);
        self.task = Some(tokio::spawn(async move {
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                debug!("running auto-sync");
                match handle.sync().await {
                    Ok(report) => {
                        if let Some(hook) = &hook {
                            hook(&report);
                        }
                    }
                    Err(SyncError::Busy) => info!("auto-sync skipped, another operation is in flight"),
                    Err(e) => warn!("auto-sync failed: {}", e),
                }
            }
        }));
    }
}

impl<H: HostTree + 'static, P: StorageProvider + 'static> Drop for AutoSync<H, P> {
    fn drop(&mut self) {
        self.stop();
    }
}
