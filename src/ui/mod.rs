//! Terminal rendering of wizard steps.

pub mod host;
pub mod picker;
pub mod terminal_guard;

pub use host::{TerminalHost, TerminalPrompt};
pub use picker::Picker;
