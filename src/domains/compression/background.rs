//! OS background execution windows.

use std::sync::Arc;

/// Callback run by the OS when a granted window is about to close
pub type ExpiryHandler = Box<dyn FnOnce() + Send + 'static>;

/// Identifier of an OS background task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BackgroundTaskId(pub i32);

/// OS facility that grants extra execution time after the app leaves the foreground.
pub trait BackgroundTaskHost: Send + Sync {
    /// Ask the OS for a background window; `None` when refused.
    fn begin_background_task(&self, name: &str, on_expiry: ExpiryHandler) -> Option<BackgroundTaskId>;

    fn end_background_task(&self, id: BackgroundTaskId);
}

/// A granted background window. Ends the OS task when released or dropped.
pub struct BackgroundTaskBudget {
    id: BackgroundTaskId,
    granted_seconds: u32,
    host: Arc<dyn BackgroundTaskHost>,
    ended: bool,
}

impl BackgroundTaskBudget {
    pub fn begin(
        host: Arc<dyn BackgroundTaskHost>,
        name: &str,
        granted_seconds: u32,
        on_expiry: ExpiryHandler,
    ) -> Option<Self> {
        let id = host.begin_background_task(name, on_expiry)?;
        log::info!("Background task {:?} granted ({}s)", id, granted_seconds);
        Some(Self {
            id,
            granted_seconds,
            host,
            ended: false,
        })
    }

    pub fn granted_seconds(&self) -> u32 {
        self.granted_seconds
    }

    pub fn release(mut self) {
        self.end();
    }

    fn end(&mut self) {
        if !self.ended {
            self.ended = true;
            self.host.end_background_task(self.id);
            log::info!("Background task {:?} ended", self.id);
        }
    }
}

impl Drop for BackgroundTaskBudget {
    fn drop(&mut self) {
        self.end();
    }
}

impl std::fmt::Debug for BackgroundTaskBudget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundTaskBudget")
            .field("id", &self.id)
            .field("granted_seconds", &self.granted_seconds)
            .finish()
    }
}
