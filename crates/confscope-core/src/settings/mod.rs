//! Application settings loaded from `confscope.toml`.
//!
//! These configure the engine itself (which namespaces the workflows manage,
//! which theme they customize); they are not the user settings the engine
//! synchronizes.

pub mod parser;

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

pub use parser::{load_settings, parse_settings_str, to_toml};

use crate::types::SectionRef;

/// Colors the theme edit session manages by default.
pub const DEFAULT_MANAGED_COLORS: &[&str] = &[
    "activityBar.background",
    "activityBar.foreground",
    "button.background",
    "debugToolBar.background",
    "editor.background",
    "editor.foreground",
    "editorGroupHeader.tabsBackground",
    "focusBorder",
    "menu.background",
    "notifications.background",
    "notifications.foreground",
    "panel.background",
    "sideBar.background",
    "sideBar.foreground",
    "statusBar.background",
    "statusBar.foreground",
    "tab.activeBackground",
    "tab.activeForeground",
    "titleBar.activeBackground",
    "titleBar.activeForeground",
];

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub output_filter: OutputFilterSettings,
    pub theme: ThemeSettings,
}

impl Settings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default location: `<config_dir>/confscope/confscope.toml`.
    pub fn default_path() -> anyhow::Result<PathBuf> {
        Ok(dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))?
            .join("confscope")
            .join("confscope.toml"))
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        self.output_filter.validate()?;
        self.theme.validate()?;
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputFilterSettings {
    pub namespace: String,
    pub section: String,
}

impl Default for OutputFilterSettings {
    fn default() -> Self {
        Self {
            namespace: "outputFilter".to_string(),
            section: "rules".to_string(),
        }
    }
}

impl OutputFilterSettings {
    pub fn rules_section(&self) -> SectionRef {
        SectionRef::new(&self.namespace, &self.section)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.namespace.trim().is_empty() || self.section.trim().is_empty() {
            anyhow::bail!("output_filter.namespace and output_filter.section must not be empty");
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ThemeSettings {
    /// Namespace holding the user's color overrides.
    pub namespace: String,
    pub section: String,
    /// Theme whose `[name]` block in the customization object is managed.
    pub name: String,
    /// Top-level key of the shared customization object.
    pub customizations_key: String,
    pub managed_colors: Vec<String>,
    /// Pause after clearing values so the store's own notifications settle.
    pub settle_ms: u64,
}

impl Default for ThemeSettings {
    fn default() -> Self {
        Self {
            namespace: "synthwave".to_string(),
            section: "colors".to_string(),
            name: "Dark SynthWave 84".to_string(),
            customizations_key: "workbench.colorCustomizations".to_string(),
            managed_colors: DEFAULT_MANAGED_COLORS.iter().map(|c| c.to_string()).collect(),
            settle_ms: 100,
        }
    }
}

impl ThemeSettings {
    pub fn colors_section(&self) -> SectionRef {
        SectionRef::new(&self.namespace, &self.section)
    }

    pub fn customizations_section(&self) -> SectionRef {
        SectionRef::root(&self.customizations_key)
    }

    /// Key of the theme-scoped block inside the customization object.
    pub fn theme_block(&self) -> String {
        format!("[{}]", self.name)
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.namespace.trim().is_empty() || self.section.trim().is_empty() {
            anyhow::bail!("theme.namespace and theme.section must not be empty");
        }
        if self.name.trim().is_empty() {
            anyhow::bail!("theme.name must not be empty");
        }
        if self.customizations_key.trim().is_empty() {
            anyhow::bail!("theme.customizations_key must not be empty");
        }
        if self.managed_colors.is_empty() {
            anyhow::bail!("theme.managed_colors must list at least one color");
        }
        if self.settle_ms > 10_000 {
            anyhow::bail!("theme.settle_ms must be at most 10000, got {}", self.settle_ms);
        }
        Ok(())
    }
}
