//! Host command registry interface.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde_json::Value;

use crate::error::CommandError;

pub type CommandFuture = BoxFuture<'static, Result<Option<Value>, CommandError>>;

/// Handler invoked with the command's arguments.
pub type CommandHandler = Arc<dyn Fn(Vec<Value>) -> CommandFuture + Send + Sync>;

/// Wraps an async closure as a [`CommandHandler`].
pub fn command_handler<F, Fut>(handler: F) -> CommandHandler
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Option<Value>, CommandError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(handler(args)))
}

/// Live registration of a handler. Disposing it (or dropping it) removes the
/// handler and uncovers whatever was registered before.
pub struct CommandRegistration {
    command: String,
    disposer: Option<Box<dyn FnOnce() + Send>>,
}

impl CommandRegistration {
    pub fn new(command: impl Into<String>, disposer: impl FnOnce() + Send + 'static) -> Self {
        Self {
            command: command.into(),
            disposer: Some(Box::new(disposer)),
        }
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn dispose(mut self) {
        self.release();
    }

    fn release(&mut self) {
        if let Some(disposer) = self.disposer.take() {
            disposer();
        }
    }
}

impl Drop for CommandRegistration {
    fn drop(&mut self) {
        self.release();
    }
}

impl fmt::Debug for CommandRegistration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CommandRegistration")
            .field("command", &self.command)
            .field("active", &self.disposer.is_some())
            .finish()
    }
}

/// Named command registry. The most recent registration for an id handles
/// `execute`; disposing it restores the previous handler.
#[async_trait]
pub trait CommandRegistry: Send + Sync {
    fn register(&self, command: &str, handler: CommandHandler) -> CommandRegistration;

    async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Option<Value>, CommandError>;
}
