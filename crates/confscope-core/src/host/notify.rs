//! Notification and progress interface.

use std::fmt;

use tokio::sync::oneshot;

/// User-facing messages and cancellable progress notifications.
pub trait Notifier: Send + Sync {
    fn show_error(&self, message: &str);

    fn show_warning(&self, message: &str);

    fn show_info(&self, message: &str);

    /// Opens a cancellable progress notification that stays visible until
    /// the returned handle is closed or dropped.
    fn open_progress(&self, title: &str) -> ProgressHandle;
}

/// Owner side of an open progress notification.
pub struct ProgressHandle {
    cancelled: oneshot::Receiver<()>,
    on_close: Option<Box<dyn FnOnce() + Send>>,
}

impl ProgressHandle {
    /// `cancelled` fires when the user cancels the notification.
    pub fn new(cancelled: oneshot::Receiver<()>) -> Self {
        Self {
            cancelled,
            on_close: None,
        }
    }

    /// Handle for a host without cancellation support.
    pub fn detached() -> Self {
        let (_tx, rx) = oneshot::channel();
        Self::new(rx)
    }

    pub fn with_close(mut self, on_close: impl FnOnce() + Send + 'static) -> Self {
        self.on_close = Some(Box::new(on_close));
        self
    }

    /// Resolves once the user cancels. Never resolves when the host cannot
    /// cancel.
    pub async fn cancelled(&mut self) {
        if (&mut self.cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    pub fn close(self) {}
}

impl Drop for ProgressHandle {
    fn drop(&mut self) {
        if let Some(on_close) = self.on_close.take() {
            on_close();
        }
    }
}

impl fmt::Debug for ProgressHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProgressHandle").finish_non_exhaustive()
    }
}
