//! UI layer: plain-text rendering for the CLI.

pub mod conversation_list;

/// Returns the UI module name for smoke checks.
pub fn module_name() -> &'static str {
    "ui"
}
