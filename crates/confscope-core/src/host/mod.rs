//! Host collaborator interfaces.
//!
//! The engine never talks to an editor directly. Everything it needs from the
//! host (settings storage, the command registry, notifications, clipboard and
//! the active document) is reached through the traits re-exported here.
//! `memory` provides in-process implementations, `json_file` a settings store
//! backed by `settings.json` files.

pub mod clipboard;
pub mod commands;
pub mod json_file;
pub mod memory;
pub mod notify;
pub mod store;
pub mod workbench;

pub use clipboard::Clipboard;
pub use commands::{CommandFuture, CommandHandler, CommandRegistration, CommandRegistry, command_handler};
pub use json_file::JsonFileStore;
pub use notify::{Notifier, ProgressHandle};
pub use store::{ConfigurationChange, ConfigurationStore, ScopedValues};
pub use workbench::{ActiveDocument, Workbench};
