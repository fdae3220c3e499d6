//! Output channel filter rules and the copy/paste helper around them.
//!
//! When the active document is a channel with a filter rule, copying with
//! nothing selected puts the serialized rule on the clipboard instead. The
//! next paste is intercepted once: it pastes the rule, then restores what was
//! on the clipboard before.

use std::collections::BTreeMap;
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tracing::{debug, info};

use crate::config::{ChangeSubscription, ConfigurationManager, UpdateOutcome};
use crate::host::{
    ActiveDocument, Clipboard, CommandRegistration, CommandRegistry, Notifier, Workbench,
    command_handler,
};
use crate::interceptor::{CommandInterceptor, InterceptMode, hook, sync_hook};
use crate::rules::{self, RuleRecord};
use crate::types::{ConfigScope, SectionRef};

pub const COPY_COMMAND: &str = "editor.action.clipboardCopyAction";
pub const PASTE_COMMAND: &str = "editor.action.clipboardPasteAction";

pub const PASTE_HINT: &str = "You can paste the rule to the Filter in Output now.";
pub const SETTINGS_HINT: &str = "You can check the rules in settings.";
pub const NO_DOCUMENT_WARNING: &str = "No active output channel to copy a filter rule from.";

/// Host pieces the filter talks to besides configuration.
#[derive(Clone)]
pub struct FilterHost {
    pub commands: Arc<dyn CommandRegistry>,
    pub clipboard: Arc<dyn Clipboard>,
    pub workbench: Arc<dyn Workbench>,
}

pub struct OutputFilter {
    manager: Arc<ConfigurationManager>,
    host: FilterHost,
    section: SectionRef,
    rules: Mutex<BTreeMap<String, RuleRecord>>,
    hint: Arc<HintSlot>,
    paste: CommandInterceptor,
    copy: Mutex<Option<CommandRegistration>>,
    subscription: Mutex<Option<ChangeSubscription>>,
}

impl OutputFilter {
    pub fn new(manager: Arc<ConfigurationManager>, host: FilterHost, section: SectionRef) -> Arc<Self> {
        manager.track(&section.namespace);

        let hint = Arc::new(HintSlot::default());
        let dismiss = Arc::clone(&hint);
        let restore = Arc::clone(&hint);
        let clipboard = Arc::clone(&host.clipboard);
        let paste = CommandInterceptor::new(
            PASTE_COMMAND,
            InterceptMode::Weak,
            Arc::clone(&host.commands),
            sync_hook(move || dismiss.close()),
            Some(hook(move || {
                let clipboard = Arc::clone(&clipboard);
                let text = restore.saved.lock().clone();
                async move { clipboard.write_text(&text).await }
            })),
        );

        Arc::new(Self {
            manager,
            host,
            section,
            rules: Mutex::new(BTreeMap::new()),
            hint,
            paste,
            copy: Mutex::new(None),
            subscription: Mutex::new(None),
        })
    }

    pub fn section(&self) -> &SectionRef {
        &self.section
    }

    /// Parsed rules from the most recent refresh, keyed by channel id.
    pub fn rules(&self) -> BTreeMap<String, RuleRecord> {
        self.rules.lock().clone()
    }

    pub fn target_for(&self, channel: &str) -> Option<RuleRecord> {
        self.rules.lock().get(channel).cloned()
    }

    pub fn is_copy_overridden(&self) -> bool {
        self.copy.lock().is_some()
    }

    pub fn is_paste_armed(&self) -> bool {
        self.paste.is_registered()
    }

    /// Refreshes rules once now and again on every change to the rules
    /// section until [`OutputFilter::dispose`].
    pub fn attach(self: &Arc<Self>) {
        let filter = Arc::downgrade(self);
        let subscription =
            self.manager
                .on_change(&self.section.namespace, &self.section.key(), move || {
                    let filter = filter.upgrade();
                    async move {
                        if let Some(filter) = filter {
                            filter.refresh_rules().await;
                        }
                    }
                });
        *self.subscription.lock() = Some(subscription);

        let filter = Arc::clone(self);
        tokio::spawn(async move {
            filter.refresh_rules().await;
        });
    }

    /// Re-reads the rules of each scope, normalizes them and writes the
    /// canonical form back through the cascading update.
    pub async fn refresh_rules(&self) -> UpdateOutcome {
        let manager = &self.manager;
        let section = &self.section;

        manager
            .run_update(section, |scope| {
                let value = match manager.peek(section, scope) {
                    Some(Value::Object(raw)) => {
                        let parsed = rules::validate(rules::parse(&raw));
                        let canonical = rules::to_raw(&parsed);
                        *self.rules.lock() = parsed;
                        Value::Object(canonical)
                    }
                    _ => Value::Object(Map::new()),
                };
                async move { value }
            })
            .await
    }

    /// Installs the copy override while `document` is a channel with a rule
    /// and removes it otherwise.
    pub fn handle_active_document_changed(self: &Arc<Self>, document: Option<&ActiveDocument>) {
        let is_target = document.is_some_and(|document| self.target_for(&document.id).is_some());

        let stale = {
            let mut copy = self.copy.lock();
            if is_target {
                if copy.is_none() {
                    *copy = Some(self.register_copy());
                }
                None
            } else {
                copy.take()
            }
        };
        if let Some(registration) = stale {
            registration.dispose();
            debug!("copy override removed");
        }
    }

    fn register_copy(self: &Arc<Self>) -> CommandRegistration {
        let filter: Weak<Self> = Arc::downgrade(self);
        let handler = command_handler(move |_args| {
            let filter = filter.upgrade();
            async move {
                if let Some(filter) = filter {
                    filter.copy_rule().await;
                }
                Ok(None)
            }
        });
        debug!("copy override installed");
        self.host.commands.register(COPY_COMMAND, handler)
    }

    /// Copy handler body. With nothing selected in a channel that has a rule,
    /// the rule replaces the clipboard and the next paste is intercepted.
    pub async fn copy_rule(&self) {
        let Some(document) = self.host.workbench.active_document() else {
            self.manager.notifier().show_warning(NO_DOCUMENT_WARNING);
            return;
        };
        self.hint.close();

        if document.has_selection() {
            self.host.clipboard.write_text(&document.selected_text).await;
            return;
        }
        let Some(record) = self.target_for(&document.id) else {
            return;
        };

        let previous = self.host.clipboard.read_text().await;
        *self.hint.saved.lock() = previous;
        self.paste.register();

        let text = rules::serialize(&record);
        self.host.clipboard.write_text(&text).await;
        info!(channel = %document.id, rule = %text, "filter rule copied");
        self.hint.open(self.manager.notifier());
    }

    /// Scope the rules were last edited in, Global when unknown.
    pub fn target_scope(&self) -> ConfigScope {
        self.manager.target_scope(&self.section)
    }

    pub fn dispose(&self) {
        self.subscription.lock().take();
        let copy = self.copy.lock().take();
        if let Some(registration) = copy {
            registration.dispose();
        }
        self.paste.destroy();
        self.hint.close();
    }
}

impl Drop for OutputFilter {
    fn drop(&mut self) {
        self.hint.close();
    }
}

/// Paste hint notification plus the clipboard text to restore after paste.
#[derive(Default)]
struct HintSlot {
    dismiss: Mutex<Option<oneshot::Sender<()>>>,
    saved: Mutex<String>,
}

impl HintSlot {
    fn open(&self, notifier: &Arc<dyn Notifier>) {
        let (dismiss, dismissed) = oneshot::channel();
        if let Some(previous) = self.dismiss.lock().replace(dismiss) {
            let _ = previous.send(());
        }

        let mut progress = notifier.open_progress(PASTE_HINT);
        let notifier = Arc::clone(notifier);
        tokio::spawn(async move {
            tokio::select! {
                _ = progress.cancelled() => notifier.show_info(SETTINGS_HINT),
                _ = dismissed => {}
            }
        });
    }

    fn close(&self) {
        if let Some(dismiss) = self.dismiss.lock().take() {
            let _ = dismiss.send(());
        }
    }
}
