//! Edit-session consumers of the configuration manager.

pub mod output_filter;
pub mod theme;

pub use output_filter::{FilterHost, OutputFilter};
pub use theme::{EditGuard, EditPhase, EditTicket, SessionEnd, ThemeSession, compose_customizations};
