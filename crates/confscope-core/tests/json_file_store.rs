use std::path::PathBuf;

use confscope_core::error::StoreError;
use confscope_core::host::{ConfigurationStore, JsonFileStore};
use confscope_core::types::ConfigScope;
use serde_json::{Value, json};
use tempfile::TempDir;

fn store_in(temp: &TempDir) -> JsonFileStore {
    let project = temp.path().join("project");
    std::fs::create_dir_all(&project).unwrap();
    JsonFileStore::from_paths(temp.path().join("user").join("settings.json"), Some(project))
}

fn read_json(path: PathBuf) -> Value {
    serde_json::from_str(&std::fs::read_to_string(path).unwrap()).unwrap()
}

#[tokio::test]
async fn inspect_reads_flat_keys_from_both_files() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    std::fs::create_dir_all(store.global_path().parent().unwrap()).unwrap();
    std::fs::write(
        store.global_path(),
        r#"{"outputFilter.rules": {"main:Main": "error"}, "editor.fontSize": 12}"#,
    )
    .unwrap();
    let workspace = store.workspace_path().unwrap();
    std::fs::create_dir_all(workspace.parent().unwrap()).unwrap();
    std::fs::write(&workspace, r#"{"outputFilter.rules": {"git:Git": "!fetch"}}"#).unwrap();

    let values = store.inspect("outputFilter.rules");

    assert_eq!(values.global, Some(json!({"main:Main": "error"})));
    assert_eq!(values.workspace, Some(json!({"git:Git": "!fetch"})));
    assert_eq!(values.workspace_folder, None);
    assert_eq!(store.get("outputFilter.rules"), Some(json!({"git:Git": "!fetch"})));
    assert_eq!(store.get("editor.fontSize"), Some(json!(12)));
}

#[tokio::test]
async fn workspace_write_creates_settings_file() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    assert!(!store.workspace_settings_exist().await);

    store
        .update("synthwave.colors", Some(json!({"focusBorder": "#f00"})), ConfigScope::Workspace)
        .await
        .unwrap();

    assert!(store.workspace_settings_exist().await);
    let path = store.workspace_path().unwrap();
    assert!(path.ends_with(".vscode/settings.json"));
    assert_eq!(
        read_json(path.clone()),
        json!({"synthwave.colors": {"focusBorder": "#f00"}})
    );
    assert!(std::fs::read_to_string(path).unwrap().ends_with("}\n"));
}

#[tokio::test]
async fn update_keeps_unrelated_keys_and_removes_on_none() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    std::fs::create_dir_all(store.global_path().parent().unwrap()).unwrap();
    std::fs::write(store.global_path(), r#"{"editor.fontSize": 12}"#).unwrap();

    store
        .update("outputFilter.rules", Some(json!({"main:Main": "error"})), ConfigScope::Global)
        .await
        .unwrap();
    assert_eq!(
        read_json(store.global_path().to_path_buf()),
        json!({"editor.fontSize": 12, "outputFilter.rules": {"main:Main": "error"}})
    );

    store
        .update("outputFilter.rules", None, ConfigScope::Global)
        .await
        .unwrap();
    assert_eq!(
        read_json(store.global_path().to_path_buf()),
        json!({"editor.fontSize": 12})
    );
}

#[tokio::test]
async fn removing_from_missing_file_does_not_create_it() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);

    store
        .update("outputFilter.rules", None, ConfigScope::Workspace)
        .await
        .unwrap();

    assert!(!store.workspace_settings_exist().await);
}

#[tokio::test]
async fn folder_scope_and_missing_project_are_unwritable() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);

    let err = store
        .update("a.b", Some(json!(1)), ConfigScope::WorkspaceFolder)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Unwritable { scope: ConfigScope::WorkspaceFolder, .. }));

    let no_project = JsonFileStore::from_paths(temp.path().join("settings.json"), None);
    let err = no_project
        .update("a.b", Some(json!(1)), ConfigScope::Workspace)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no project is open"));
    assert!(!no_project.workspace_settings_exist().await);
}

#[tokio::test]
async fn malformed_file_fails_writes_and_reads_as_unset() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    std::fs::create_dir_all(store.global_path().parent().unwrap()).unwrap();
    std::fs::write(store.global_path(), "{ // comment\n \"a.b\": 1 }").unwrap();

    assert_eq!(store.inspect("a.b").global, None);
    let err = store
        .update("a.b", Some(json!(2)), ConfigScope::Global)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::Malformed { .. }));
}

#[tokio::test]
async fn changes_are_broadcast_only_when_content_changes() {
    let temp = TempDir::new().unwrap();
    let store = store_in(&temp);
    let mut changes = store.subscribe();

    store
        .update("outputFilter.rules", Some(json!({"a": 1})), ConfigScope::Global)
        .await
        .unwrap();
    store
        .update("outputFilter.rules", Some(json!({"a": 1})), ConfigScope::Global)
        .await
        .unwrap();

    let change = changes.try_recv().unwrap();
    assert_eq!(change.keys(), ["outputFilter.rules".to_string()]);
    assert!(changes.try_recv().is_err());
}
