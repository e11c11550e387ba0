use std::{path::PathBuf, time::Duration};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub startup: StartupConfig,
    pub messages: MessagesConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StartupConfig {
    /// Upper bound on the startup session fetch before falling back to logged out.
    pub session_fetch_timeout_ms: u64,
}

impl Default for StartupConfig {
    fn default() -> Self {
        Self {
            session_fetch_timeout_ms: 1_500,
        }
    }
}

impl StartupConfig {
    pub fn session_fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.session_fetch_timeout_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct MessagesConfig {
    pub path: PathBuf,
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("messages.toml"),
        }
    }
}
