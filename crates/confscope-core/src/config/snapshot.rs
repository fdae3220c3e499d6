//! Per-section snapshots and change attribution.

use crate::host::ScopedValues;
use crate::types::ConfigScope;

use super::fingerprint::{Fingerprint, fingerprint};

/// Last observed fingerprint of a section in each writable scope.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SectionSnapshot {
    global: Option<Fingerprint>,
    workspace: Option<Fingerprint>,
}

impl SectionSnapshot {
    /// Records `values` and returns the scope whose value changed since the
    /// previous observation. When both changed, Workspace wins since it
    /// shadows Global.
    pub fn observe(&mut self, values: &ScopedValues) -> Option<ConfigScope> {
        let global = values.global.as_ref().map(fingerprint);
        let workspace = values.workspace.as_ref().map(fingerprint);

        let global_changed = global != self.global;
        let workspace_changed = workspace != self.workspace;
        if global_changed {
            self.global = global;
        }
        if workspace_changed {
            self.workspace = workspace;
        }

        match (global_changed, workspace_changed) {
            (_, true) => Some(ConfigScope::Workspace),
            (true, false) => Some(ConfigScope::Global),
            (false, false) => None,
        }
    }
}

/// Whether a section changed since the flag was last consumed, and where.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeAttribution {
    changed: bool,
    scope: Option<ConfigScope>,
}

impl ChangeAttribution {
    pub fn mark(&mut self, scope: ConfigScope) {
        self.changed = true;
        self.scope = Some(scope);
    }

    /// Returns the flag and clears it. The scope is kept for write-target
    /// inference.
    pub fn consume(&mut self) -> bool {
        std::mem::take(&mut self.changed)
    }

    pub fn is_changed(&self) -> bool {
        self.changed
    }

    pub fn scope(&self) -> Option<ConfigScope> {
        self.scope
    }
}
