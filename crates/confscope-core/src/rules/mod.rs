//! Output filter rules.
//!
//! Rules are stored as a map from `"domain:displayName"` to a comma-joined
//! rule string; tokens prefixed with `!` exclude, everything else includes.

pub mod codec;

use serde::{Deserialize, Serialize};

pub use codec::{parse, serialize, to_raw, validate};

/// Rules attached to one document domain.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleRecord {
    pub display_name: String,
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl RuleRecord {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            ..Default::default()
        }
    }

    pub fn with_include<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn with_exclude<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(tokens.into_iter().map(Into::into));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.include.is_empty() && self.exclude.is_empty()
    }
}
