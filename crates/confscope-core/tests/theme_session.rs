use std::sync::Arc;
use std::time::Duration;

use confscope_core::config::ConfigurationManager;
use confscope_core::error::SessionError;
use confscope_core::host::ConfigurationStore;
use confscope_core::host::memory::{MemoryStore, RecordingNotifier};
use confscope_core::session::{EditGuard, EditPhase, SessionEnd, ThemeSession};
use confscope_core::settings::ThemeSettings;
use confscope_core::types::ConfigScope;
use serde_json::{Value, json};

const COLORS: &str = "synthwave.colors";
const CUSTOMIZATIONS: &str = "workbench.colorCustomizations";
const BLOCK: &str = "[Dark SynthWave 84]";

fn settings() -> ThemeSettings {
    ThemeSettings {
        managed_colors: vec!["editor.background".to_string(), "focusBorder".to_string()],
        settle_ms: 0,
        ..ThemeSettings::default()
    }
}

fn setup(store: MemoryStore) -> (Arc<MemoryStore>, Arc<RecordingNotifier>, Arc<ThemeSession>) {
    let store = Arc::new(store);
    let notifier = Arc::new(RecordingNotifier::new());
    let manager = Arc::new(ConfigurationManager::new(store.clone(), notifier.clone()));
    let session = ThemeSession::new(manager, settings());
    (store, notifier, session)
}

fn customizations(store: &MemoryStore, scope: ConfigScope) -> Option<Value> {
    store.inspect(CUSTOMIZATIONS).get(scope).cloned()
}

async fn eventually(mut condition: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while !condition() {
        assert!(tokio::time::Instant::now() < deadline, "condition not reached");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

#[tokio::test]
async fn changes_are_ignored_until_a_session_starts() {
    let (store, _, session) = setup(MemoryStore::new());
    store.seed(ConfigScope::Global, COLORS, json!({"focusBorder": "#f00"}));

    assert_eq!(session.guard(), EditGuard::NeverStarted);
    assert!(!session.handle_configuration_change().await);
    assert_eq!(customizations(&store, ConfigScope::Global), None);
}

#[tokio::test]
async fn start_edit_seeds_working_copy_from_allow_list() {
    let (store, notifier, session) = setup(MemoryStore::new());
    store.seed(
        ConfigScope::Global,
        COLORS,
        json!({"focusBorder": "#f00", "statusBar.background": "#0f0"}),
    );

    let _ticket = session.start_edit();

    assert_eq!(session.phase(), EditPhase::EditMode);
    assert_eq!(session.guard(), EditGuard::Active);
    assert_eq!(
        Value::Object(session.working_copy()),
        json!({"focusBorder": "#f00"})
    );
    assert_eq!(
        notifier.open_progress_titles(),
        vec!["Editing Dark SynthWave 84 colors"]
    );
    // Priming means the existing values are not reported as a change.
    assert!(!session.handle_configuration_change().await);
}

#[tokio::test]
async fn external_edit_rebuilds_theme_block() {
    let (store, _, session) = setup(MemoryStore::new());
    store.seed(
        ConfigScope::Global,
        CUSTOMIZATIONS,
        json!({"editor.foreground": "#fff", BLOCK: {"badge.background": "#f0f"}}),
    );
    session.attach();
    let _ticket = session.start_edit();

    store
        .update(COLORS, Some(json!({"editor.background": "#111", "other": "#222"})), ConfigScope::Global)
        .await
        .unwrap();

    eventually(|| {
        customizations(&store, ConfigScope::Global)
            == Some(json!({
                "editor.foreground": "#fff",
                BLOCK: {"badge.background": "#f0f", "editor.background": "#111"}
            }))
    })
    .await;
    assert_eq!(customizations(&store, ConfigScope::Workspace), None);
    assert_eq!(
        Value::Object(session.working_copy()),
        json!({"editor.background": "#111"})
    );
}

#[tokio::test]
async fn set_color_requires_edit_mode_and_managed_key() {
    let (_, _, session) = setup(MemoryStore::new());

    assert!(matches!(
        session.set_color("focusBorder", "#fff"),
        Err(SessionError::NotEditing)
    ));

    let _ticket = session.start_edit();
    assert!(matches!(
        session.set_color("tab.border", "#fff"),
        Err(SessionError::UnmanagedKey(key)) if key == "tab.border"
    ));
    session.set_color("focusBorder", "#fff").unwrap();
    assert_eq!(
        Value::Object(session.working_copy()),
        json!({"focusBorder": "#fff"})
    );
}

#[tokio::test]
async fn commit_writes_to_last_edited_scope() {
    let (store, notifier, session) = setup(MemoryStore::new().with_workspace_settings(true));
    let ticket = session.start_edit();

    store.seed(ConfigScope::Workspace, COLORS, json!({"focusBorder": "#00f", "custom": 1}));
    assert!(session.handle_configuration_change().await);
    session.set_color("editor.background", "#222").unwrap();

    let target = session.commit().await.unwrap();

    assert_eq!(target, ConfigScope::Workspace);
    assert_eq!(
        store.inspect(COLORS).workspace,
        Some(json!({"custom": 1, "focusBorder": "#00f", "editor.background": "#222"}))
    );
    assert_eq!(
        customizations(&store, ConfigScope::Workspace),
        Some(json!({BLOCK: {"focusBorder": "#00f", "editor.background": "#222"}}))
    );
    assert_eq!(session.phase(), EditPhase::Idle);
    assert_eq!(session.guard(), EditGuard::Idle);
    assert_eq!(ticket.finished().await, SessionEnd::Dismissed);
    eventually(|| notifier.open_progress_titles().is_empty()).await;

    assert!(matches!(session.commit().await, Err(SessionError::NotEditing)));
    assert!(!session.handle_configuration_change().await);
}

#[tokio::test]
async fn commit_defaults_to_global() {
    let (store, _, session) = setup(MemoryStore::new());
    let _ticket = session.start_edit();
    session.set_color("focusBorder", "#abc").unwrap();

    assert_eq!(session.commit().await.unwrap(), ConfigScope::Global);
    assert_eq!(store.inspect(COLORS).global, Some(json!({"focusBorder": "#abc"})));
    assert_eq!(
        customizations(&store, ConfigScope::Global),
        Some(json!({BLOCK: {"focusBorder": "#abc"}}))
    );
}

#[tokio::test]
async fn cancel_clears_overrides_from_both_scopes() {
    let (store, notifier, session) = setup(MemoryStore::new().with_workspace_settings(true));
    store.seed(ConfigScope::Global, COLORS, json!({"focusBorder": "#f00"}));
    store.seed(ConfigScope::Workspace, COLORS, json!({"editor.background": "#000"}));
    store.seed(
        ConfigScope::Global,
        CUSTOMIZATIONS,
        json!({"tab.border": "#111", BLOCK: {"focusBorder": "#f00"}}),
    );

    let ticket = session.start_edit();
    assert!(notifier.cancel_latest());

    assert_eq!(ticket.finished().await, SessionEnd::Cancelled);
    assert_eq!(store.inspect(COLORS).global, None);
    assert_eq!(store.inspect(COLORS).workspace, None);
    assert_eq!(
        customizations(&store, ConfigScope::Global),
        Some(json!({"tab.border": "#111", BLOCK: {}}))
    );
    assert_eq!(session.phase(), EditPhase::Idle);
    assert_eq!(session.guard(), EditGuard::Idle);
    assert!(session.working_copy().is_empty());
}

#[tokio::test]
async fn new_session_dismisses_previous_one() {
    let (_, notifier, session) = setup(MemoryStore::new());

    let first = session.start_edit();
    let second = session.start_edit();

    assert_eq!(first.finished().await, SessionEnd::Dismissed);
    eventually(|| notifier.open_progress_titles().len() == 1).await;
    assert_eq!(session.phase(), EditPhase::EditMode);

    session.commit().await.unwrap();
    assert_eq!(second.finished().await, SessionEnd::Dismissed);
}

#[tokio::test]
async fn reset_clears_and_keeps_editing() {
    let (store, _, session) = setup(MemoryStore::new());
    store.seed(ConfigScope::Global, COLORS, json!({"focusBorder": "#f00"}));
    let _ticket = session.start_edit();

    session.reset().await.unwrap();

    assert_eq!(store.inspect(COLORS).global, None);
    assert_eq!(session.phase(), EditPhase::EditMode);
    assert_eq!(session.guard(), EditGuard::Active);
    assert!(session.working_copy().is_empty());
    assert!(!session.handle_configuration_change().await);
}

#[tokio::test]
async fn reset_outside_edit_mode_fails() {
    let (_, _, session) = setup(MemoryStore::new());
    assert!(matches!(session.reset().await, Err(SessionError::NotEditing)));
}
