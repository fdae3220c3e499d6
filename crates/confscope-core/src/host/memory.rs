//! In-process host implementations.
//!
//! Used by the CLI for the parts of the host that have no file-backed
//! counterpart (commands, clipboard, notifications) and by the test suite
//! for everything.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::sync::{broadcast, oneshot};
use tracing::debug;

use super::{
    ActiveDocument, Clipboard, CommandHandler, CommandRegistration, CommandRegistry,
    ConfigurationChange, ConfigurationStore, Notifier, ProgressHandle, ScopedValues, Workbench,
};
use crate::error::{CommandError, StoreError};
use crate::types::ConfigScope;

const CHANGE_CAPACITY: usize = 64;

/// A write that reached the store.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedUpdate {
    pub key: String,
    pub scope: ConfigScope,
    pub value: Option<Value>,
}

#[derive(Debug, Default)]
struct StoreState {
    global: BTreeMap<String, Value>,
    workspace: BTreeMap<String, Value>,
    workspace_folder: BTreeMap<String, Value>,
    failing: HashSet<ConfigScope>,
    updates: Vec<RecordedUpdate>,
}

impl StoreState {
    fn scope_mut(&mut self, scope: ConfigScope) -> &mut BTreeMap<String, Value> {
        match scope {
            ConfigScope::Global => &mut self.global,
            ConfigScope::Workspace => &mut self.workspace,
            ConfigScope::WorkspaceFolder => &mut self.workspace_folder,
        }
    }
}

/// Settings store kept entirely in memory.
#[derive(Debug)]
pub struct MemoryStore {
    state: Mutex<StoreState>,
    workspace_settings: AtomicBool,
    changes: broadcast::Sender<ConfigurationChange>,
}

impl MemoryStore {
    pub fn new() -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            state: Mutex::new(StoreState::default()),
            workspace_settings: AtomicBool::new(false),
            changes,
        }
    }

    pub fn with_workspace_settings(self, exists: bool) -> Self {
        self.workspace_settings.store(exists, Ordering::SeqCst);
        self
    }

    /// Stores a value without recording an update or emitting a change,
    /// including in the read-only folder scope.
    pub fn seed(&self, scope: ConfigScope, key: &str, value: Value) {
        self.state
            .lock()
            .scope_mut(scope)
            .insert(key.to_string(), value);
    }

    /// Makes every subsequent write to `scope` fail.
    pub fn fail_writes(&self, scope: ConfigScope) {
        self.state.lock().failing.insert(scope);
    }

    pub fn updates(&self) -> Vec<RecordedUpdate> {
        self.state.lock().updates.clone()
    }

    pub fn updates_for(&self, key: &str) -> Vec<RecordedUpdate> {
        self.state
            .lock()
            .updates
            .iter()
            .filter(|update| update.key == key)
            .cloned()
            .collect()
    }

    /// Emits a change event as if another writer touched `keys`.
    pub fn emit_change<I, S>(&self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let _ = self.changes.send(ConfigurationChange::new(keys));
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConfigurationStore for MemoryStore {
    fn inspect(&self, key: &str) -> ScopedValues {
        let state = self.state.lock();
        ScopedValues {
            global: state.global.get(key).cloned(),
            workspace: state.workspace.get(key).cloned(),
            workspace_folder: state.workspace_folder.get(key).cloned(),
        }
    }

    async fn update(
        &self,
        key: &str,
        value: Option<Value>,
        scope: ConfigScope,
    ) -> Result<(), StoreError> {
        let creates = value.is_some();
        let changed = {
            let mut state = self.state.lock();
            if !scope.is_writable() {
                return Err(StoreError::unwritable(key, scope, "scope is read-only"));
            }
            if state.failing.contains(&scope) {
                return Err(StoreError::unwritable(key, scope, "write rejected by store"));
            }
            state.updates.push(RecordedUpdate {
                key: key.to_string(),
                scope,
                value: value.clone(),
            });
            let values = state.scope_mut(scope);
            match value {
                Some(value) => values.insert(key.to_string(), value.clone()).as_ref() != Some(&value),
                None => values.remove(key).is_some(),
            }
        };

        if scope == ConfigScope::Workspace && creates {
            self.workspace_settings.store(true, Ordering::SeqCst);
        }
        if changed {
            debug!(key, %scope, "memory store changed");
            let _ = self.changes.send(ConfigurationChange::new([key]));
        }
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConfigurationChange> {
        self.changes.subscribe()
    }

    async fn workspace_settings_exist(&self) -> bool {
        self.workspace_settings.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct CommandTable {
    next_id: u64,
    handlers: HashMap<String, Vec<(u64, CommandHandler)>>,
}

/// Command registry with per-command handler stacks.
#[derive(Default)]
pub struct MemoryCommands {
    table: Arc<Mutex<CommandTable>>,
    executed: Mutex<Vec<String>>,
}

impl MemoryCommands {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live handlers stacked on `command`.
    pub fn handler_count(&self, command: &str) -> usize {
        self.table
            .lock()
            .handlers
            .get(command)
            .map_or(0, Vec::len)
    }

    /// Every `execute` call in order, including re-dispatches.
    pub fn executed(&self) -> Vec<String> {
        self.executed.lock().clone()
    }
}

impl std::fmt::Debug for MemoryCommands {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let table = self.table.lock();
        let counts: BTreeMap<&str, usize> = table
            .handlers
            .iter()
            .map(|(command, stack)| (command.as_str(), stack.len()))
            .collect();
        f.debug_struct("MemoryCommands")
            .field("handlers", &counts)
            .finish()
    }
}

#[async_trait]
impl CommandRegistry for MemoryCommands {
    fn register(&self, command: &str, handler: CommandHandler) -> CommandRegistration {
        let id = {
            let mut table = self.table.lock();
            table.next_id += 1;
            let id = table.next_id;
            table
                .handlers
                .entry(command.to_string())
                .or_default()
                .push((id, handler));
            id
        };

        let table = Arc::downgrade(&self.table);
        let key = command.to_string();
        CommandRegistration::new(command, move || {
            if let Some(table) = table.upgrade() {
                let mut table = table.lock();
                if let Some(stack) = table.handlers.get_mut(&key) {
                    stack.retain(|(registered, _)| *registered != id);
                    if stack.is_empty() {
                        table.handlers.remove(&key);
                    }
                }
            }
        })
    }

    async fn execute(&self, command: &str, args: Vec<Value>) -> Result<Option<Value>, CommandError> {
        self.executed.lock().push(command.to_string());
        let handler = self
            .table
            .lock()
            .handlers
            .get(command)
            .and_then(|stack| stack.last())
            .map(|(_, handler)| Arc::clone(handler));

        match handler {
            Some(handler) => handler(args).await,
            None => Err(CommandError::NotFound(command.to_string())),
        }
    }
}

/// Severity of a recorded notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoticeLevel {
    Error,
    Warning,
    Info,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notice {
    pub level: NoticeLevel,
    pub message: String,
}

struct OpenProgress {
    title: String,
    cancel: Option<oneshot::Sender<()>>,
    open: Arc<AtomicBool>,
}

/// Notifier that records messages and lets callers cancel progress.
#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    progress: Mutex<Vec<OpenProgress>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().clone()
    }

    pub fn messages(&self, level: NoticeLevel) -> Vec<String> {
        self.notices
            .lock()
            .iter()
            .filter(|notice| notice.level == level)
            .map(|notice| notice.message.clone())
            .collect()
    }

    /// Titles of progress notifications that are still shown.
    pub fn open_progress_titles(&self) -> Vec<String> {
        self.progress
            .lock()
            .iter()
            .filter(|progress| progress.open.load(Ordering::SeqCst))
            .map(|progress| progress.title.clone())
            .collect()
    }

    /// Cancels the most recent open progress notification, as if the user
    /// pressed its cancel button. Returns false when none is open.
    pub fn cancel_latest(&self) -> bool {
        let mut progress = self.progress.lock();
        let latest = progress
            .iter_mut()
            .rev()
            .find(|progress| progress.open.load(Ordering::SeqCst) && progress.cancel.is_some());
        match latest.and_then(|progress| progress.cancel.take()) {
            Some(cancel) => cancel.send(()).is_ok(),
            None => false,
        }
    }

    fn record(&self, level: NoticeLevel, message: &str) {
        self.notices.lock().push(Notice {
            level,
            message: message.to_string(),
        });
    }
}

impl std::fmt::Debug for RecordingNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecordingNotifier")
            .field("notices", &self.notices.lock().len())
            .field("open_progress", &self.open_progress_titles())
            .finish()
    }
}

impl Notifier for RecordingNotifier {
    fn show_error(&self, message: &str) {
        self.record(NoticeLevel::Error, message);
    }

    fn show_warning(&self, message: &str) {
        self.record(NoticeLevel::Warning, message);
    }

    fn show_info(&self, message: &str) {
        self.record(NoticeLevel::Info, message);
    }

    fn open_progress(&self, title: &str) -> ProgressHandle {
        let (cancel, cancelled) = oneshot::channel();
        let open = Arc::new(AtomicBool::new(true));
        self.progress.lock().push(OpenProgress {
            title: title.to_string(),
            cancel: Some(cancel),
            open: Arc::clone(&open),
        });
        ProgressHandle::new(cancelled).with_close(move || open.store(false, Ordering::SeqCst))
    }
}

/// Clipboard holding a single string.
#[derive(Debug, Default)]
pub struct MemoryClipboard {
    text: Mutex<String>,
}

impl MemoryClipboard {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: Mutex::new(text.into()),
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }
}

#[async_trait]
impl Clipboard for MemoryClipboard {
    async fn read_text(&self) -> String {
        self.text()
    }

    async fn write_text(&self, text: &str) {
        *self.text.lock() = text.to_string();
    }
}

/// Workbench whose active document is set by the caller.
#[derive(Debug, Default)]
pub struct MemoryWorkbench {
    active: Mutex<Option<ActiveDocument>>,
}

impl MemoryWorkbench {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_active(&self, document: Option<ActiveDocument>) {
        *self.active.lock() = document;
    }
}

impl Workbench for MemoryWorkbench {
    fn active_document(&self) -> Option<ActiveDocument> {
        self.active.lock().clone()
    }
}
