//! Application context for unified dependency injection.

use std::sync::Arc;

use crate::config::ConfigurationManager;
use crate::host::memory::{MemoryClipboard, MemoryCommands, MemoryWorkbench, RecordingNotifier};
use crate::host::{Clipboard, CommandRegistry, ConfigurationStore, Notifier, Workbench};
use crate::session::{FilterHost, OutputFilter, ThemeSession};
use crate::settings::Settings;

/// Unified application context for dependency injection.
///
/// Owns the host collaborators and the one shared [`ConfigurationManager`].
/// Frontends create this once and pass it to commands; nothing else
/// constructs a manager.
#[derive(Clone)]
pub struct AppContext {
    store: Arc<dyn ConfigurationStore>,
    notifier: Arc<dyn Notifier>,
    commands: Arc<dyn CommandRegistry>,
    clipboard: Arc<dyn Clipboard>,
    workbench: Arc<dyn Workbench>,
    settings: Settings,
    manager: Arc<ConfigurationManager>,
}

impl AppContext {
    /// Context over `store` and `notifier`, with in-memory command registry,
    /// clipboard and workbench.
    pub fn new(store: Arc<dyn ConfigurationStore>, notifier: Arc<dyn Notifier>) -> Self {
        let manager = Arc::new(ConfigurationManager::new(
            Arc::clone(&store),
            Arc::clone(&notifier),
        ));
        Self {
            store,
            notifier,
            commands: Arc::new(MemoryCommands::new()),
            clipboard: Arc::new(MemoryClipboard::default()),
            workbench: Arc::new(MemoryWorkbench::new()),
            settings: Settings::default(),
            manager,
        }
    }

    /// Context over `store` that records notifications in memory.
    pub fn with_store(store: Arc<dyn ConfigurationStore>) -> Self {
        Self::new(store, Arc::new(RecordingNotifier::new()))
    }

    pub fn with_commands(mut self, commands: Arc<dyn CommandRegistry>) -> Self {
        self.commands = commands;
        self
    }

    pub fn with_clipboard(mut self, clipboard: Arc<dyn Clipboard>) -> Self {
        self.clipboard = clipboard;
        self
    }

    pub fn with_workbench(mut self, workbench: Arc<dyn Workbench>) -> Self {
        self.workbench = workbench;
        self
    }

    pub fn with_settings(mut self, settings: Settings) -> Self {
        self.settings = settings;
        self
    }

    pub fn store(&self) -> &Arc<dyn ConfigurationStore> {
        &self.store
    }

    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    pub fn commands(&self) -> &Arc<dyn CommandRegistry> {
        &self.commands
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// The shared manager, with `namespace` tracked.
    pub fn configuration_manager(&self, namespace: &str) -> Arc<ConfigurationManager> {
        self.manager.track(namespace);
        Arc::clone(&self.manager)
    }

    /// Get an OutputFilter over the configured rules section.
    pub fn output_filter(&self) -> Arc<OutputFilter> {
        let section = self.settings.output_filter.rules_section();
        let manager = self.configuration_manager(&section.namespace);
        let host = FilterHost {
            commands: Arc::clone(&self.commands),
            clipboard: Arc::clone(&self.clipboard),
            workbench: Arc::clone(&self.workbench),
        };
        OutputFilter::new(manager, host, section)
    }

    /// Get a ThemeSession for the configured theme.
    pub fn theme_session(&self) -> Arc<ThemeSession> {
        let manager = self.configuration_manager(&self.settings.theme.namespace);
        ThemeSession::new(manager, self.settings.theme.clone())
    }
}

impl std::fmt::Debug for AppContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppContext")
            .field("settings", &self.settings)
            .field("manager", &self.manager)
            .finish_non_exhaustive()
    }
}
