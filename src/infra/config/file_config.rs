use std::path::PathBuf;

use serde::Deserialize;

use crate::infra::config::{AppConfig, LogConfig, MessagesConfig, StartupConfig};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub startup: Option<FileStartupConfig>,
    pub messages: Option<FileMessagesConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(startup) = self.startup {
            startup.merge_into(&mut config.startup);
        }

        if let Some(messages) = self.messages {
            messages.merge_into(&mut config.messages);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileStartupConfig {
    pub session_fetch_timeout_ms: Option<u64>,
}

impl FileStartupConfig {
    fn merge_into(self, config: &mut StartupConfig) {
        if let Some(timeout_ms) = self.session_fetch_timeout_ms {
            config.session_fetch_timeout_ms = timeout_ms;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileMessagesConfig {
    pub path: Option<PathBuf>,
}

impl FileMessagesConfig {
    fn merge_into(self, config: &mut MessagesConfig) {
        if let Some(path) = self.path {
            config.path = path;
        }
    }
}
