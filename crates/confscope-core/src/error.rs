//! Error types for store, command and session operations.

use crate::types::ConfigScope;

/// Failures reported by a configuration store.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The scope cannot be written (e.g. a folder scope, or no open project).
    #[error("cannot write {key} to {scope} settings: {reason}")]
    Unwritable {
        key: String,
        scope: ConfigScope,
        reason: String,
    },

    /// Backing storage failed.
    #[error("failed to persist {key}: {source}")]
    Io {
        key: String,
        #[source]
        source: std::io::Error,
    },

    /// Stored document is not valid settings JSON.
    #[error("invalid settings document {location}: {message}")]
    Malformed { location: String, message: String },
}

impl StoreError {
    pub fn unwritable(key: impl Into<String>, scope: ConfigScope, reason: impl Into<String>) -> Self {
        Self::Unwritable {
            key: key.into(),
            scope,
            reason: reason.into(),
        }
    }

    pub fn malformed(location: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Malformed {
            location: location.into(),
            message: message.into(),
        }
    }
}

/// Failures reported by a command registry.
#[derive(Debug, Clone, thiserror::Error)]
pub enum CommandError {
    #[error("command '{0}' not found")]
    NotFound(String),

    #[error("command '{command}' failed: {message}")]
    Failed { command: String, message: String },
}

impl CommandError {
    pub fn failed(command: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Failed {
            command: command.into(),
            message: message.into(),
        }
    }
}

/// Misuse of an edit session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("no edit session is active")]
    NotEditing,

    #[error("'{0}' is not a managed color")]
    UnmanagedKey(String),
}
