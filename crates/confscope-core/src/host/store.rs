//! Scoped configuration store interface.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::broadcast;

use crate::error::StoreError;
use crate::types::ConfigScope;

/// Per-scope view of a single key, as opposed to the merged effective value.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScopedValues {
    pub global: Option<Value>,
    pub workspace: Option<Value>,
    pub workspace_folder: Option<Value>,
}

impl ScopedValues {
    pub fn get(&self, scope: ConfigScope) -> Option<&Value> {
        match scope {
            ConfigScope::Global => self.global.as_ref(),
            ConfigScope::Workspace => self.workspace.as_ref(),
            ConfigScope::WorkspaceFolder => self.workspace_folder.as_ref(),
        }
    }

    /// The narrowest scope that defines a value wins.
    pub fn effective(&self) -> Option<&Value> {
        self.workspace_folder
            .as_ref()
            .or(self.workspace.as_ref())
            .or(self.global.as_ref())
    }
}

/// Keys touched by a single store update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationChange {
    keys: Vec<String>,
}

impl ConfigurationChange {
    pub fn new<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// True when `section` is one of the changed keys, a parent of one, or
    /// nested below one (`a.b` affects `a`, `a.b` and `a.b.c`).
    pub fn affects(&self, section: &str) -> bool {
        self.keys.iter().any(|key| paths_overlap(key, section))
    }
}

fn paths_overlap(a: &str, b: &str) -> bool {
    fn is_prefix(prefix: &str, path: &str) -> bool {
        path.strip_prefix(prefix)
            .is_some_and(|rest| rest.is_empty() || rest.starts_with('.'))
    }
    is_prefix(a, b) || is_prefix(b, a)
}

/// Host settings store with independent Global and Workspace scopes.
#[async_trait]
pub trait ConfigurationStore: Send + Sync {
    /// Values stored for `key` in each scope.
    fn inspect(&self, key: &str) -> ScopedValues;

    /// Merged value the host would hand out without naming a scope.
    fn get(&self, key: &str) -> Option<Value> {
        self.inspect(key).effective().cloned()
    }

    /// Writes `value` to `scope`; `None` removes the key from that scope.
    async fn update(
        &self,
        key: &str,
        value: Option<Value>,
        scope: ConfigScope,
    ) -> Result<(), StoreError>;

    /// Stream of change events. Only changes made after subscribing are seen.
    fn subscribe(&self) -> broadcast::Receiver<ConfigurationChange>;

    /// Whether the open project already has its own settings file.
    async fn workspace_settings_exist(&self) -> bool;
}
