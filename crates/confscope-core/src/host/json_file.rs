//! Settings store backed by `settings.json` files.
//!
//! Global settings live in `<config_dir>/confscope/settings.json`, workspace
//! settings in `<project>/.vscode/settings.json`. Keys are stored flat at the
//! top level of each document (`"outputFilter.rules": {...}`).

use std::path::{Path, PathBuf};

use anyhow::Context;
use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::broadcast;
use tracing::{debug, warn};

use super::{ConfigurationChange, ConfigurationStore, ScopedValues};
use crate::error::StoreError;
use crate::types::ConfigScope;

const CHANGE_CAPACITY: usize = 64;

#[derive(Debug, Clone)]
pub struct JsonFileStore {
    global_path: PathBuf,
    project_root: Option<PathBuf>,
    changes: broadcast::Sender<ConfigurationChange>,
}

impl JsonFileStore {
    pub fn from_defaults(project_root: Option<PathBuf>) -> anyhow::Result<Self> {
        let global_path = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
            .context("Failed to resolve global settings location")?
            .join("confscope")
            .join("settings.json");
        Ok(Self::from_paths(global_path, project_root))
    }

    pub fn from_paths(global_path: PathBuf, project_root: Option<PathBuf>) -> Self {
        let (changes, _) = broadcast::channel(CHANGE_CAPACITY);
        Self {
            global_path,
            project_root,
            changes,
        }
    }

    pub fn global_path(&self) -> &Path {
        &self.global_path
    }

    pub fn project_root(&self) -> Option<&Path> {
        self.project_root.as_deref()
    }

    pub fn workspace_path(&self) -> Option<PathBuf> {
        self.project_root
            .as_ref()
            .map(|root| root.join(".vscode").join("settings.json"))
    }

    fn path_for(&self, key: &str, scope: ConfigScope) -> Result<PathBuf, StoreError> {
        match scope {
            ConfigScope::Global => Ok(self.global_path.clone()),
            ConfigScope::Workspace => self
                .workspace_path()
                .ok_or_else(|| StoreError::unwritable(key, scope, "no project is open")),
            ConfigScope::WorkspaceFolder => Err(StoreError::unwritable(
                key,
                scope,
                "folder settings are read-only",
            )),
        }
    }

    fn read_scope(&self, path: Option<PathBuf>, key: &str) -> Option<Value> {
        let path = path?;
        match load_settings(&path) {
            Ok(mut settings) => settings.remove(key),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "ignoring unreadable settings file");
                None
            }
        }
    }
}

#[async_trait]
impl ConfigurationStore for JsonFileStore {
    fn inspect(&self, key: &str) -> ScopedValues {
        ScopedValues {
            global: self.read_scope(Some(self.global_path.clone()), key),
            workspace: self.read_scope(self.workspace_path(), key),
            workspace_folder: None,
        }
    }

    async fn update(
        &self,
        key: &str,
        value: Option<Value>,
        scope: ConfigScope,
    ) -> Result<(), StoreError> {
        let path = self.path_for(key, scope)?;
        if value.is_none() && !path.exists() {
            return Ok(());
        }

        let mut settings = load_settings(&path)?;
        let changed = match value {
            Some(value) => settings.insert(key.to_string(), value.clone()).as_ref() != Some(&value),
            None => settings.remove(key).is_some(),
        };
        if !changed {
            return Ok(());
        }

        write_settings(&path, key, &settings)?;
        debug!(key, %scope, path = %path.display(), "settings file updated");
        let _ = self.changes.send(ConfigurationChange::new([key]));
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<ConfigurationChange> {
        self.changes.subscribe()
    }

    async fn workspace_settings_exist(&self) -> bool {
        self.workspace_path().is_some_and(|path| path.is_file())
    }
}

fn load_settings(path: &Path) -> Result<Map<String, Value>, StoreError> {
    if !path.exists() {
        return Ok(Map::new());
    }
    let bytes = std::fs::read(path).map_err(|source| StoreError::Io {
        key: path.display().to_string(),
        source,
    })?;
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    let value: Value = serde_json::from_slice(&bytes)
        .map_err(|e| StoreError::malformed(path.display().to_string(), e.to_string()))?;
    match value {
        Value::Object(map) => Ok(map),
        _ => Err(StoreError::malformed(
            path.display().to_string(),
            "expected a JSON object at the root",
        )),
    }
}

fn write_settings(path: &Path, key: &str, settings: &Map<String, Value>) -> Result<(), StoreError> {
    let io_error = |source| StoreError::Io {
        key: key.to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(io_error)?;
    }
    let mut bytes = serde_json::to_vec_pretty(settings)
        .map_err(|e| StoreError::malformed(path.display().to_string(), e.to_string()))?;
    bytes.push(b'\n');
    std::fs::write(path, bytes).map_err(io_error)
}
