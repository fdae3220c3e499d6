//! Command interception by unregister-then-redispatch.
//!
//! The host registry keeps one active handler per command id, so a wrapper
//! cannot call "the next handler" directly. Instead the wrapper removes
//! itself, runs its hook, and dispatches the same command id again, which
//! now reaches whatever was registered underneath.

use std::fmt;
use std::future::Future;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::BoxFuture;
use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::CommandError;
use crate::host::{CommandRegistration, CommandRegistry, command_handler};

/// Async hook run around the intercepted command.
pub type Hook = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

pub fn hook<F, Fut>(f: F) -> Hook
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

/// Hook for plain synchronous work.
pub fn sync_hook<F>(f: F) -> Hook
where
    F: Fn() + Send + Sync + 'static,
{
    Arc::new(move || {
        f();
        Box::pin(async {})
    })
}

/// Lifetime of an interceptor's registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterceptMode {
    /// Re-registers itself after every invocation.
    Strong,
    /// Intercepts the next invocation only; the owner re-arms it.
    Weak,
}

/// Wraps one host command with a pre-action and post-callback.
pub struct CommandInterceptor {
    inner: Arc<Inner>,
}

struct Inner {
    command: String,
    mode: InterceptMode,
    registry: Arc<dyn CommandRegistry>,
    action: Hook,
    callback: Option<Hook>,
    registration: Mutex<Option<CommandRegistration>>,
    // Set by the owner's destroy; a Strong wrapper mid-call must not re-arm.
    destroyed: AtomicBool,
}

impl CommandInterceptor {
    /// Strong interceptors register immediately; weak ones wait for
    /// [`CommandInterceptor::register`].
    pub fn new(
        command: impl Into<String>,
        mode: InterceptMode,
        registry: Arc<dyn CommandRegistry>,
        action: Hook,
        callback: Option<Hook>,
    ) -> Self {
        let interceptor = Self {
            inner: Arc::new(Inner {
                command: command.into(),
                mode,
                registry,
                action,
                callback,
                registration: Mutex::new(None),
                destroyed: AtomicBool::new(false),
            }),
        };
        if mode == InterceptMode::Strong {
            interceptor.register();
        }
        interceptor
    }

    pub fn command(&self) -> &str {
        &self.inner.command
    }

    pub fn mode(&self) -> InterceptMode {
        self.inner.mode
    }

    pub fn is_registered(&self) -> bool {
        self.inner.registration.lock().is_some()
    }

    /// Installs the wrapper. No-op when already installed.
    pub fn register(&self) {
        self.inner.destroyed.store(false, Ordering::SeqCst);
        Inner::register(&self.inner);
    }

    /// Removes the wrapper. Idempotent. An invocation already in flight
    /// finishes but does not re-arm.
    pub fn destroy(&self) {
        self.inner.destroyed.store(true, Ordering::SeqCst);
        self.inner.destroy();
    }
}

impl Drop for CommandInterceptor {
    fn drop(&mut self) {
        self.destroy();
    }
}

impl fmt::Debug for CommandInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandInterceptor")
            .field("command", &self.inner.command)
            .field("mode", &self.inner.mode)
            .field("registered", &self.is_registered())
            .finish()
    }
}

impl Inner {
    fn register(this: &Arc<Self>) {
        let mut slot = this.registration.lock();
        if slot.is_some() {
            return;
        }

        let weak = Arc::downgrade(this);
        let handler = command_handler(move |args| {
            let inner = weak.upgrade();
            async move {
                match inner {
                    Some(inner) => inner.intercept(args).await,
                    None => Ok(None),
                }
            }
        });
        *slot = Some(this.registry.register(&this.command, handler));
        debug!(command = %this.command, mode = ?this.mode, "interceptor armed");
    }

    fn destroy(&self) {
        let registration = self.registration.lock().take();
        if let Some(registration) = registration {
            registration.dispose();
            debug!(command = %self.command, "interceptor disarmed");
        }
    }

    async fn intercept(self: Arc<Self>, args: Vec<Value>) -> Result<Option<Value>, CommandError> {
        // Must come first: the re-dispatch below would otherwise land here again.
        self.destroy();
        (self.action)().await;

        let result = self.registry.execute(&self.command, args).await;
        if let Err(err) = &result {
            warn!(command = %self.command, error = %err, "underlying command failed");
        }

        if let Some(callback) = &self.callback {
            callback().await;
        }
        if self.mode == InterceptMode::Strong && !self.destroyed.load(Ordering::SeqCst) {
            Inner::register(&self);
        }
        result
    }
}
