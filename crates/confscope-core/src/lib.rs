//! Confscope Core Library
//!
//! Keeps settings sections consistent across the Global and Workspace
//! scopes: serialized cascading updates, per-scope change attribution,
//! command interception and the edit sessions built on top of them.

pub mod config;
pub mod context;
pub mod error;
pub mod host;
pub mod interceptor;
pub mod rules;
pub mod session;
pub mod settings;
pub mod types;

/// Re-exports of commonly used types
pub mod prelude {
    // Configuration
    pub use crate::config::{CascadeReport, ConfigurationManager, UpdateOutcome};
    pub use crate::settings::Settings;
    pub use crate::types::{ConfigScope, SectionRef};

    // Host
    pub use crate::host::{
        ActiveDocument, Clipboard, CommandRegistry, ConfigurationStore, Notifier, Workbench,
    };

    // Sessions
    pub use crate::context::AppContext;
    pub use crate::interceptor::{CommandInterceptor, InterceptMode};
    pub use crate::rules::RuleRecord;
    pub use crate::session::{OutputFilter, ThemeSession};
}
