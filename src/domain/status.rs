use std::time::{SystemTime, UNIX_EPOCH};

use super::session::Session;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthStatus {
    Uninitialized,
    Checking,
    Authenticated,
    Unauthenticated,
}

impl AuthStatus {
    pub fn as_label(self) -> &'static str {
        match self {
            Self::Uninitialized => "AUTH_UNINITIALIZED",
            Self::Checking => "AUTH_CHECKING",
            Self::Authenticated => "AUTH_AUTHENTICATED",
            Self::Unauthenticated => "AUTH_UNAUTHENTICATED",
        }
    }
}

/// Observable session state handed to every reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionSnapshot {
    pub status: AuthStatus,
    pub session: Option<Session>,
    pub updated_at_unix_ms: u128,
}

impl Default for SessionSnapshot {
    fn default() -> Self {
        Self {
            status: AuthStatus::Uninitialized,
            session: None,
            updated_at_unix_ms: now_unix_ms(),
        }
    }
}

impl SessionSnapshot {
    pub fn current_session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    /// True until the startup check has produced a verdict.
    pub fn is_checking_auth(&self) -> bool {
        matches!(self.status, AuthStatus::Uninitialized | AuthStatus::Checking)
    }

    pub fn is_authenticated(&self) -> bool {
        self.status == AuthStatus::Authenticated
    }
}

pub fn now_unix_ms() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis()
}
