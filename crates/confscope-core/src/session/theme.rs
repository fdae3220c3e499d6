//! Theme color edit session.
//!
//! While a session is in edit mode, every attributable change to the color
//! overrides section is folded into the theme block of the shared color
//! customization object. Cancelling the session clears the overrides from
//! both scopes; committing writes the working copy to the scope the user
//! last edited.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::{Map, Value};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::config::{ChangeSubscription, ConfigurationManager, UpdateOutcome};
use crate::error::SessionError;
use crate::settings::ThemeSettings;
use crate::types::ConfigScope;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditPhase {
    Idle,
    EditMode,
    Committing,
}

/// Whether change notifications should be acted on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditGuard {
    /// No session was started yet in this process.
    NeverStarted,
    Active,
    /// A session ran before but is not reacting right now.
    Idle,
}

/// How a session's notification went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The user cancelled; overrides were cleared.
    Cancelled,
    /// Closed by commit or by a newer session.
    Dismissed,
}

/// Completion handle returned by [`ThemeSession::start_edit`].
#[derive(Debug)]
pub struct EditTicket {
    task: JoinHandle<SessionEnd>,
}

impl EditTicket {
    pub async fn finished(self) -> SessionEnd {
        self.task.await.unwrap_or(SessionEnd::Dismissed)
    }
}

struct SessionState {
    phase: EditPhase,
    guard: EditGuard,
    working: Map<String, Value>,
    dismiss: Option<oneshot::Sender<()>>,
    generation: u64,
}

pub struct ThemeSession {
    manager: Arc<ConfigurationManager>,
    settings: ThemeSettings,
    state: Mutex<SessionState>,
    subscription: Mutex<Option<ChangeSubscription>>,
}

impl ThemeSession {
    pub fn new(manager: Arc<ConfigurationManager>, settings: ThemeSettings) -> Arc<Self> {
        manager.track(&settings.namespace);
        Arc::new(Self {
            manager,
            settings,
            state: Mutex::new(SessionState {
                phase: EditPhase::Idle,
                guard: EditGuard::NeverStarted,
                working: Map::new(),
                dismiss: None,
                generation: 0,
            }),
            subscription: Mutex::new(None),
        })
    }

    pub fn settings(&self) -> &ThemeSettings {
        &self.settings
    }

    pub fn phase(&self) -> EditPhase {
        self.state.lock().phase
    }

    pub fn guard(&self) -> EditGuard {
        self.state.lock().guard
    }

    pub fn working_copy(&self) -> Map<String, Value> {
        self.state.lock().working.clone()
    }

    /// Reacts to color override changes until [`ThemeSession::detach`].
    pub fn attach(self: &Arc<Self>) {
        let colors = self.settings.colors_section();
        let session = Arc::downgrade(self);
        let subscription = self
            .manager
            .on_change(&colors.namespace, &colors.key(), move || {
                let session = session.upgrade();
                async move {
                    if let Some(session) = session {
                        session.handle_configuration_change().await;
                    }
                }
            });
        *self.subscription.lock() = Some(subscription);
    }

    pub fn detach(&self) {
        self.subscription.lock().take();
    }

    /// Enters edit mode, dismissing any previous session's notification.
    pub fn start_edit(self: &Arc<Self>) -> EditTicket {
        let colors = self.settings.colors_section();
        let working = self.managed_only(self.manager.effective(&colors));
        self.prime_snapshot();

        let (dismiss, dismissed) = oneshot::channel();
        let (previous, generation) = {
            let mut state = self.state.lock();
            state.phase = EditPhase::EditMode;
            state.guard = EditGuard::Active;
            state.working = working;
            state.generation += 1;
            (state.dismiss.replace(dismiss), state.generation)
        };
        if let Some(previous) = previous {
            let _ = previous.send(());
        }

        let mut progress = self
            .manager
            .notifier()
            .open_progress(&format!("Editing {} colors", self.settings.name));
        let session = Arc::downgrade(self);
        let task = tokio::spawn(async move {
            let end = tokio::select! {
                _ = progress.cancelled() => SessionEnd::Cancelled,
                _ = dismissed => SessionEnd::Dismissed,
            };
            drop(progress);
            if end == SessionEnd::Cancelled {
                if let Some(session) = session.upgrade() {
                    session.cancel(generation).await;
                }
            }
            end
        });

        info!(theme = %self.settings.name, generation, "theme edit started");
        EditTicket { task }
    }

    /// Re-derives the theme block when the overrides changed since the last
    /// observation. Returns whether it did.
    pub async fn handle_configuration_change(&self) -> bool {
        if self.guard() != EditGuard::Active {
            return false;
        }

        let colors = self.settings.colors_section();
        self.manager.read(&colors, ConfigScope::Global);
        if !self.manager.consume_change_flag(&colors) {
            return false;
        }

        let working = self.managed_only(self.manager.effective(&colors));
        self.state.lock().working = working;
        self.apply_composite().await;
        true
    }

    pub fn set_color(&self, key: &str, value: &str) -> Result<(), SessionError> {
        if !self.is_managed(key) {
            return Err(SessionError::UnmanagedKey(key.to_string()));
        }
        let mut state = self.state.lock();
        if state.phase != EditPhase::EditMode {
            return Err(SessionError::NotEditing);
        }
        state
            .working
            .insert(key.to_string(), Value::String(value.to_string()));
        Ok(())
    }

    /// Writes the working copy to the scope the user last edited (Global by
    /// default), re-derives the theme block and closes the session.
    pub async fn commit(&self) -> Result<ConfigScope, SessionError> {
        let working = {
            let mut state = self.state.lock();
            if state.phase != EditPhase::EditMode {
                return Err(SessionError::NotEditing);
            }
            state.phase = EditPhase::Committing;
            state.guard = EditGuard::Idle;
            state.working.clone()
        };

        let colors = self.settings.colors_section();
        let target = self.manager.target_scope(&colors);
        let mut stored = match self.manager.peek(&colors, target) {
            Some(Value::Object(map)) => map,
            _ => Map::new(),
        };
        stored.retain(|key, _| !self.is_managed(key));
        stored.extend(working);

        self.manager.write(&colors, target, Value::Object(stored)).await;
        self.apply_composite().await;
        self.prime_snapshot();

        let dismiss = {
            let mut state = self.state.lock();
            state.phase = EditPhase::Idle;
            state.dismiss.take()
        };
        if let Some(dismiss) = dismiss {
            let _ = dismiss.send(());
        }

        info!(theme = %self.settings.name, %target, "theme edit committed");
        Ok(target)
    }

    /// Clears the overrides from both scopes and keeps editing.
    pub async fn reset(&self) -> Result<(), SessionError> {
        if self.phase() != EditPhase::EditMode {
            return Err(SessionError::NotEditing);
        }

        self.cleanup().await;
        self.prime_snapshot();

        let mut state = self.state.lock();
        state.working.clear();
        if state.phase == EditPhase::EditMode {
            state.guard = EditGuard::Active;
        }
        Ok(())
    }

    async fn cancel(&self, generation: u64) {
        {
            let mut state = self.state.lock();
            if state.generation != generation || state.phase != EditPhase::EditMode {
                return;
            }
            state.dismiss = None;
        }

        self.cleanup().await;
        self.prime_snapshot();

        let mut state = self.state.lock();
        state.phase = EditPhase::Idle;
        state.guard = EditGuard::Idle;
        state.working.clear();
        info!(theme = %self.settings.name, "theme edit cancelled");
    }

    async fn cleanup(&self) {
        self.state.lock().guard = EditGuard::Idle;

        let colors = self.settings.colors_section();
        if !self.manager.clear_scoped_value(&colors).await {
            debug!(section = %colors, "overrides busy, clear skipped");
        }
        self.apply_composite().await;
        tokio::time::sleep(self.settings.settle_delay()).await;
    }

    /// Rebuilds the theme block of the customization object in each scope
    /// from that scope's overrides.
    pub async fn apply_composite(&self) -> UpdateOutcome {
        let colors = self.settings.colors_section();
        let target = &self.settings.customizations_section();
        let block = self.settings.theme_block();
        let manager = &self.manager;

        manager
            .run_update_with(
                &colors,
                |scope| {
                    let composite = compose_customizations(
                        manager.peek(target, scope),
                        manager.peek(&colors, scope),
                        &block,
                        &self.settings.managed_colors,
                    );
                    async move { composite }
                },
                move |scope, value| manager.write(target, scope, value),
            )
            .await
    }

    fn prime_snapshot(&self) {
        let colors = self.settings.colors_section();
        self.manager.read(&colors, ConfigScope::Global);
        self.manager.consume_change_flag(&colors);
    }

    fn is_managed(&self, key: &str) -> bool {
        self.settings.managed_colors.iter().any(|color| color == key)
    }

    fn managed_only(&self, value: Option<Value>) -> Map<String, Value> {
        match value {
            Some(Value::Object(map)) => map
                .into_iter()
                .filter(|(key, _)| self.is_managed(key))
                .collect(),
            _ => Map::new(),
        }
    }
}

impl Drop for ThemeSession {
    fn drop(&mut self) {
        if let Some(dismiss) = self.state.get_mut().dismiss.take() {
            let _ = dismiss.send(());
        }
    }
}

/// Replaces the managed keys of `block` inside `current` with the managed
/// keys of `overrides`, keeping every other entry.
///
/// A block that existed before is kept even when it ends up empty, so that
/// clearing the last managed color is still written out.
pub fn compose_customizations(
    current: Option<Value>,
    overrides: Option<Value>,
    block: &str,
    managed: &[String],
) -> Value {
    let mut customizations = match current {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };
    let existing = customizations.remove(block);
    let had_block = existing.is_some();
    let mut theme = match existing {
        Some(Value::Object(map)) => map,
        _ => Map::new(),
    };

    theme.retain(|key, _| !managed.contains(key));
    if let Some(Value::Object(overrides)) = overrides {
        theme.extend(overrides.into_iter().filter(|(key, _)| managed.contains(key)));
    }

    if had_block || !theme.is_empty() {
        customizations.insert(block.to_string(), Value::Object(theme));
    }
    Value::Object(customizations)
}
