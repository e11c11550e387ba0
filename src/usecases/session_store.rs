use std::sync::Arc;

use tokio::sync::watch;

use crate::domain::{
    session::Session,
    status::{now_unix_ms, AuthStatus, SessionSnapshot},
};

/// Single-writer, many-reader holder of the current session.
///
/// Readers only hear about real changes: a transition that leaves status and
/// session untouched is swallowed.
#[derive(Clone, Debug)]
pub struct SessionStore {
    inner: Arc<watch::Sender<SessionSnapshot>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionStore {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(SessionSnapshot::default());
        Self {
            inner: Arc::new(tx),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.subscribe()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.borrow().clone()
    }

    /// Resolves with the first snapshot matching `predicate`, including the current one.
    pub async fn wait_for<F>(&self, predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.subscribe();
        let snapshot = match rx.wait_for(predicate).await {
            Ok(snapshot) => snapshot.clone(),
            // The sender lives in `self`, so the channel cannot close while we wait.
            Err(_) => self.snapshot(),
        };
        snapshot
    }

    /// Resolves once the startup check has a verdict. Only meaningful after `start`.
    pub async fn wait_until_settled(&self) -> SessionSnapshot {
        self.wait_for(|snapshot| !snapshot.is_checking_auth()).await
    }

    pub(crate) fn on_check_started(&self) -> bool {
        self.transition(AuthStatus::Checking, None)
    }

    pub(crate) fn on_authenticated(&self, session: Session) -> bool {
        self.transition(AuthStatus::Authenticated, Some(session))
    }

    pub(crate) fn on_unauthenticated(&self) -> bool {
        self.transition(AuthStatus::Unauthenticated, None)
    }

    pub(crate) fn on_reset(&self) -> bool {
        self.transition(AuthStatus::Uninitialized, None)
    }

    fn transition(&self, status: AuthStatus, session: Option<Session>) -> bool {
        self.inner.send_if_modified(|snapshot| {
            if snapshot.status == status && snapshot.session == session {
                return false;
            }

            snapshot.status = status;
            snapshot.session = session;
            snapshot.updated_at_unix_ms = now_unix_ms();
            true
        })
    }
}
