//! Shared core types used across the configuration and session layers.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Storage scopes exposed by the host configuration store.
///
/// `Workspace` shadows `Global` in the effective view. `WorkspaceFolder` is
/// only ever observed, never written.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ConfigScope {
    /// User-wide settings.
    Global,
    /// Project-wide settings.
    Workspace,
    /// Per-folder settings of a multi-root project.
    WorkspaceFolder,
}

impl ConfigScope {
    /// Scopes the cascading update writes, in order.
    pub const WRITABLE: [ConfigScope; 2] = [ConfigScope::Global, ConfigScope::Workspace];

    pub fn is_writable(self) -> bool {
        matches!(self, ConfigScope::Global | ConfigScope::Workspace)
    }
}

impl fmt::Display for ConfigScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConfigScope::Global => "global",
            ConfigScope::Workspace => "workspace",
            ConfigScope::WorkspaceFolder => "workspace-folder",
        };
        f.write_str(name)
    }
}

impl TryFrom<&str> for ConfigScope {
    type Error = anyhow::Error;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.to_lowercase().as_str() {
            "global" | "user" => Ok(ConfigScope::Global),
            "workspace" | "project" => Ok(ConfigScope::Workspace),
            "workspace-folder" | "folder" => Ok(ConfigScope::WorkspaceFolder),
            other => anyhow::bail!("Unknown configuration scope: {}", other),
        }
    }
}

/// A setting addressed by namespace and section.
///
/// The store key is `namespace.section`; an empty namespace addresses a
/// top-level key such as `workbench.colorCustomizations`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SectionRef {
    pub namespace: String,
    pub section: String,
}

impl SectionRef {
    pub fn new(namespace: impl Into<String>, section: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            section: section.into(),
        }
    }

    /// Section addressed by its full key, outside any namespace.
    pub fn root(key: impl Into<String>) -> Self {
        Self::new(String::new(), key)
    }

    pub fn key(&self) -> String {
        if self.namespace.is_empty() {
            self.section.clone()
        } else {
            format!("{}.{}", self.namespace, self.section)
        }
    }
}

impl fmt::Display for SectionRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.key())
    }
}
