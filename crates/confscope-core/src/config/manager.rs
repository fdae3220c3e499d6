//! Configuration manager: locking, snapshots and the cascading update.

use std::collections::HashMap;
use std::fmt;
use std::future::Future;
use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::broadcast::error::RecvError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::fingerprint::is_empty_value;
use super::lock::NamespaceLock;
use super::snapshot::{ChangeAttribution, SectionSnapshot};
use crate::host::{ConfigurationStore, Notifier, ScopedValues};
use crate::types::{ConfigScope, SectionRef};

/// Result of a cascading update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateOutcome {
    /// The namespace was busy; nothing ran.
    Skipped,
    Applied(CascadeReport),
}

impl UpdateOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, UpdateOutcome::Skipped)
    }

    pub fn report(&self) -> Option<&CascadeReport> {
        match self {
            UpdateOutcome::Skipped => None,
            UpdateOutcome::Applied(report) => Some(report),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CascadeReport {
    /// Last value produced for Global (the fallback value when it ran).
    pub global: Value,
    pub workspace: Value,
    /// Whether Global was re-applied because Workspace came back empty.
    pub fallback: bool,
    /// Scopes handed to the setter, in order.
    pub persisted: Vec<ConfigScope>,
}

/// Listener registration created by [`ConfigurationManager::on_change`].
/// Delivery stops when it is disposed or dropped.
#[derive(Debug)]
pub struct ChangeSubscription {
    task: JoinHandle<()>,
}

impl ChangeSubscription {
    pub fn dispose(self) {}
}

impl Drop for ChangeSubscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Shared manager for every tracked configuration namespace.
///
/// One instance is built by the composition root and handed out by
/// reference; see [`crate::context::AppContext`].
pub struct ConfigurationManager {
    store: Arc<dyn ConfigurationStore>,
    notifier: Arc<dyn Notifier>,
    locks: Mutex<HashMap<String, NamespaceLock>>,
    snapshots: Mutex<HashMap<SectionRef, SectionSnapshot>>,
    attributions: Mutex<HashMap<SectionRef, ChangeAttribution>>,
}

impl ConfigurationManager {
    pub fn new(store: Arc<dyn ConfigurationStore>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            store,
            notifier,
            locks: Mutex::new(HashMap::new()),
            snapshots: Mutex::new(HashMap::new()),
            attributions: Mutex::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &Arc<dyn ConfigurationStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Starts tracking `namespace`. Idempotent; a busy namespace stays busy.
    pub fn track(&self, namespace: &str) -> &Self {
        self.lock_for(namespace);
        self
    }

    pub fn is_tracked(&self, namespace: &str) -> bool {
        self.locks.lock().contains_key(namespace)
    }

    pub fn is_busy(&self, namespace: &str) -> bool {
        self.locks
            .lock()
            .get(namespace)
            .is_some_and(NamespaceLock::is_busy)
    }

    fn lock_for(&self, namespace: &str) -> NamespaceLock {
        self.locks
            .lock()
            .entry(namespace.to_string())
            .or_default()
            .clone()
    }

    /// Calls `listener` for every store change affecting `full_section`
    /// while `namespace` is tracked. Must be called inside a Tokio runtime.
    pub fn on_change<F, Fut>(
        self: &Arc<Self>,
        namespace: &str,
        full_section: &str,
        listener: F,
    ) -> ChangeSubscription
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut changes = self.store.subscribe();
        let manager = Arc::downgrade(self);
        let namespace = namespace.to_string();
        let full_section = full_section.to_string();

        let task = tokio::spawn(async move {
            loop {
                match changes.recv().await {
                    Ok(change) => {
                        let Some(manager) = manager.upgrade() else {
                            break;
                        };
                        let relevant =
                            manager.is_tracked(&namespace) && change.affects(&full_section);
                        drop(manager);
                        if relevant {
                            listener().await;
                        }
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        warn!(skipped, section = %full_section, "configuration listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                }
            }
        });

        ChangeSubscription { task }
    }

    /// Cascading update writing through [`ConfigurationManager::write`].
    pub async fn run_update<U, UF>(&self, section: &SectionRef, update: U) -> UpdateOutcome
    where
        U: FnMut(ConfigScope) -> UF,
        UF: Future<Output = Value>,
    {
        self.run_update_with(section, update, move |scope, value| {
            self.write(section, scope, value)
        })
        .await
    }

    /// Runs `update` for Global, then Workspace, then Global again when
    /// Workspace came back empty but Global did not, handing each value to
    /// `setter`. Empty values are only persisted when the project already
    /// has a settings file.
    ///
    /// A call for a namespace with a cascade in flight returns
    /// [`UpdateOutcome::Skipped`] without running anything.
    pub async fn run_update_with<U, UF, S, SF>(
        &self,
        section: &SectionRef,
        mut update: U,
        mut setter: S,
    ) -> UpdateOutcome
    where
        U: FnMut(ConfigScope) -> UF,
        UF: Future<Output = Value>,
        S: FnMut(ConfigScope, Value) -> SF,
        SF: Future<Output = ()>,
    {
        let lock = self.lock_for(&section.namespace);
        let Some(_busy) = lock.try_acquire() else {
            debug!(namespace = %section.namespace, "namespace busy, update skipped");
            return UpdateOutcome::Skipped;
        };

        let workspace_settings = self.store.workspace_settings_exist().await;
        let mut persisted = Vec::new();

        let mut global = update(ConfigScope::Global).await;
        if should_persist(&global, workspace_settings) {
            setter(ConfigScope::Global, global.clone()).await;
            persisted.push(ConfigScope::Global);
        }

        let workspace = update(ConfigScope::Workspace).await;
        if should_persist(&workspace, workspace_settings) {
            setter(ConfigScope::Workspace, workspace.clone()).await;
            persisted.push(ConfigScope::Workspace);
        }

        let fallback = is_empty_value(&workspace) && !is_empty_value(&global);
        if fallback {
            global = update(ConfigScope::Global).await;
            if should_persist(&global, workspace_settings) {
                setter(ConfigScope::Global, global.clone()).await;
                persisted.push(ConfigScope::Global);
            }
        }

        info!(section = %section, fallback, ?persisted, "cascading update applied");
        UpdateOutcome::Applied(CascadeReport {
            global,
            workspace,
            fallback,
            persisted,
        })
    }

    /// Scope-local value of `section`. Also diffs the section against its
    /// snapshot and records which scope changed.
    pub fn read(&self, section: &SectionRef, scope: ConfigScope) -> Option<Value> {
        let values = self.store.inspect(&section.key());
        self.observe(section, &values);
        values.get(scope).cloned()
    }

    /// Scope-local value without touching snapshots.
    pub fn peek(&self, section: &SectionRef, scope: ConfigScope) -> Option<Value> {
        self.store.inspect(&section.key()).get(scope).cloned()
    }

    pub fn effective(&self, section: &SectionRef) -> Option<Value> {
        self.store.get(&section.key())
    }

    fn observe(&self, section: &SectionRef, values: &ScopedValues) {
        let changed = self
            .snapshots
            .lock()
            .entry(section.clone())
            .or_default()
            .observe(values);

        if let Some(scope) = changed {
            debug!(section = %section, %scope, "section change attributed");
            self.attributions
                .lock()
                .entry(section.clone())
                .or_default()
                .mark(scope);
        }
    }

    /// Persists `value` to `scope`; `null` removes it. Failures are reported
    /// to the user and swallowed.
    pub async fn write(&self, section: &SectionRef, scope: ConfigScope, value: Value) {
        let key = section.key();
        let value = (!value.is_null()).then_some(value);
        if let Err(err) = self.store.update(&key, value, scope).await {
            warn!(key, %scope, error = %err, "configuration write failed");
            self.notifier.show_error(&err.to_string());
        }
    }

    /// Returns whether `section` changed since the last call, clearing the
    /// flag.
    pub fn consume_change_flag(&self, section: &SectionRef) -> bool {
        self.attributions
            .lock()
            .get_mut(section)
            .is_some_and(ChangeAttribution::consume)
    }

    pub fn last_changed_scope(&self, section: &SectionRef) -> Option<ConfigScope> {
        self.attributions
            .lock()
            .get(section)
            .and_then(ChangeAttribution::scope)
    }

    /// Scope a write should target when the caller names none.
    pub fn target_scope(&self, section: &SectionRef) -> ConfigScope {
        self.last_changed_scope(section)
            .unwrap_or(ConfigScope::Global)
    }

    /// Removes `section` from Global and Workspace. Returns false when the
    /// namespace was busy and nothing was cleared.
    pub async fn clear_scoped_value(&self, section: &SectionRef) -> bool {
        let lock = self.lock_for(&section.namespace);
        let Some(_busy) = lock.try_acquire() else {
            debug!(namespace = %section.namespace, "namespace busy, clear skipped");
            return false;
        };

        for scope in ConfigScope::WRITABLE {
            self.write(section, scope, Value::Null).await;
        }
        true
    }
}

impl fmt::Debug for ConfigurationManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut namespaces: Vec<String> = self.locks.lock().keys().cloned().collect();
        namespaces.sort();
        f.debug_struct("ConfigurationManager")
            .field("namespaces", &namespaces)
            .finish_non_exhaustive()
    }
}

fn should_persist(value: &Value, workspace_settings: bool) -> bool {
    workspace_settings || !is_empty_value(value)
}
