//! Infrastructure layer: config, logging, storage, and local backends.

pub mod config;
pub mod error;
pub mod event_hub;
pub mod local_auth;
pub mod logging;
pub mod message_log;
pub mod secrets;
pub mod storage_layout;
#[cfg(test)]
pub mod stubs;

/// Returns the infra module name for smoke checks.
pub fn module_name() -> &'static str {
    "infra"
}
