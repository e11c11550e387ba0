use std::{
    fs,
    io::ErrorKind,
    path::PathBuf,
};

use async_trait::async_trait;

use crate::{
    domain::{events::AuthEvent, session::Session},
    infra::{error::AppError, event_hub::AuthEventHub},
    usecases::contracts::{AuthBackend, AuthBackendError, AuthEventHandler, Subscription},
};

const SESSION_FILE_UNREADABLE: &str = "SESSION_FILE_UNREADABLE";
const SESSION_FILE_CORRUPT: &str = "SESSION_FILE_CORRUPT";
const SESSION_FILE_REMOVE_FAILED: &str = "SESSION_FILE_REMOVE_FAILED";

/// Auth backend that keeps the session in a TOML file on this device and
/// announces changes to in-process subscribers.
#[derive(Clone)]
pub struct LocalAuthBackend {
    session_file: PathBuf,
    hub: AuthEventHub,
}

impl LocalAuthBackend {
    pub fn new(session_file: PathBuf) -> Self {
        Self {
            session_file,
            hub: AuthEventHub::new(),
        }
    }

    #[cfg(test)]
    pub fn session_file(&self) -> &std::path::Path {
        &self.session_file
    }

    /// Persists `session` and announces it: `USER_UPDATED` when the same user
    /// was already stored, `SIGNED_IN` otherwise. Issues token material when
    /// the session carries none.
    pub fn sign_in(&self, session: Session) -> Result<(), AppError> {
        let previous = self.read_session().ok().flatten();
        let session = if session.raw.is_empty() {
            session.with_raw(issue_token())
        } else {
            session
        };

        self.write_session(&session)?;
        tracing::info!(user_id = %session.user_id, "local session stored");

        let event = match previous {
            Some(previous) if previous.user_id == session.user_id => {
                AuthEvent::user_updated(session)
            }
            _ => AuthEvent::signed_in(session),
        };
        self.hub.publish(event);
        Ok(())
    }

    /// Rotates the stored token, moves its expiry when one is given, then
    /// emits `TOKEN_REFRESHED`. Returns the refreshed session, or `None` when
    /// nothing is stored.
    pub fn refresh(&self, expires_at_unix_ms: Option<i64>) -> Result<Option<Session>, AppError> {
        let stored = self
            .read_session()
            .map_err(|error| AppError::SessionUnavailable { code: error.code() })?;
        let Some(mut session) = stored else {
            tracing::info!("no local session to refresh");
            return Ok(None);
        };

        if let Some(expires_at) = expires_at_unix_ms {
            session = session.with_expiry(expires_at);
        }
        let session = session.with_raw(issue_token());
        self.write_session(&session)?;

        tracing::info!(user_id = %session.user_id, "local session refreshed");
        self.hub.publish(AuthEvent::token_refreshed(session.clone()));
        Ok(Some(session))
    }

    fn write_session(&self, session: &Session) -> Result<(), AppError> {
        let encoded = toml::to_string(session).map_err(AppError::SessionEncode)?;
        fs::write(&self.session_file, encoded).map_err(|source| AppError::SessionWrite {
            path: self.session_file.clone(),
            source,
        })
    }

    fn read_session(&self) -> Result<Option<Session>, AuthBackendError> {
        let raw = match fs::read_to_string(&self.session_file) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                return match self.session_file.parent() {
                    Some(dir) if !dir.is_dir() => Err(AuthBackendError::NotConfigured {
                        details: format!("session directory {} does not exist", dir.display()),
                    }),
                    _ => Ok(None),
                };
            }
            Err(source) => {
                tracing::warn!(
                    code = SESSION_FILE_UNREADABLE,
                    path = %self.session_file.display(),
                    error = %source,
                    "session file could not be read"
                );
                return Err(AuthBackendError::Unavailable {
                    code: SESSION_FILE_UNREADABLE,
                });
            }
        };

        let session: Session = toml::from_str(&raw).map_err(|source| {
            tracing::warn!(
                code = SESSION_FILE_CORRUPT,
                path = %self.session_file.display(),
                error = %source,
                "session file is not valid"
            );
            AuthBackendError::Rejected {
                code: SESSION_FILE_CORRUPT,
            }
        })?;

        let now = chrono::Utc::now().timestamp_millis();
        if session.is_expired_at(now) {
            tracing::info!(user_id = %session.user_id, "stored session expired");
            return Ok(None);
        }

        Ok(Some(session))
    }
}

#[async_trait]
impl AuthBackend for LocalAuthBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthBackendError> {
        self.read_session()
    }

    fn subscribe(&self, handler: AuthEventHandler) -> Subscription {
        self.hub.subscribe(handler)
    }

    async fn sign_out(&self) -> Result<(), AuthBackendError> {
        match fs::remove_file(&self.session_file) {
            Ok(()) => {}
            Err(source) if source.kind() == ErrorKind::NotFound => {}
            Err(source) => {
                tracing::warn!(
                    code = SESSION_FILE_REMOVE_FAILED,
                    path = %self.session_file.display(),
                    error = %source,
                    "session file could not be removed"
                );
                return Err(AuthBackendError::Unavailable {
                    code: SESSION_FILE_REMOVE_FAILED,
                });
            }
        }

        self.hub.publish(AuthEvent::signed_out());
        Ok(())
    }
}

fn issue_token() -> String {
    format!("local.{}", uuid::Uuid::new_v4().simple())
}
