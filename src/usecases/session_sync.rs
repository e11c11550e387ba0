//! Reconciles the startup session fetch with the stream of auth events.
//!
//! Lifecycle: `Uninitialized -> Checking -> {Authenticated, Unauthenticated}`,
//! then `Authenticated <-> Unauthenticated` driven by events and `sign_out`.
//!
//! The subscription handler never touches state. It drops token refreshes and
//! unknown kinds, then parks the event in a one-element slot (newest wins) and
//! wakes the driver task. The driver applies one event at a time, so a burst
//! collapses into its latest event without any timer.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex, Weak,
    },
    time::Duration,
};

use tokio::{sync::Notify, task::JoinHandle};

use crate::domain::{
    events::{AuthEvent, AuthEventKind},
    session::Session,
    status::{AuthStatus, SessionSnapshot},
};

use super::{
    contracts::{AuthBackend, Subscription},
    session_store::SessionStore,
};

const SESSION_FETCH_FAILED: &str = "SESSION_FETCH_FAILED";
const SESSION_FETCH_TIMEOUT: &str = "SESSION_FETCH_TIMEOUT";
const SIGN_OUT_BACKEND_FAILED: &str = "SIGN_OUT_BACKEND_FAILED";
const AUTH_EVENT_UNRECOGNIZED: &str = "AUTH_EVENT_UNRECOGNIZED";
const AUTH_EVENT_SUPERSEDED: &str = "AUTH_EVENT_SUPERSEDED";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignOutOutcome {
    pub backend_acknowledged: bool,
}

/// Process-scoped owner of the session lifecycle. Build once in the
/// composition root; `start` and `stop` bracket one mounted UI context.
pub struct SessionSynchronizer {
    backend: Arc<dyn AuthBackend>,
    store: SessionStore,
    reconciler: Arc<Reconciler>,
    fetch_timeout: Duration,
    running: Mutex<Option<Running>>,
}

struct Running {
    subscription: Subscription,
    driver: JoinHandle<()>,
}

impl SessionSynchronizer {
    pub fn new(backend: Arc<dyn AuthBackend>, fetch_timeout: Duration) -> Self {
        let store = SessionStore::new();
        Self {
            backend,
            reconciler: Arc::new(Reconciler::new(store.clone())),
            store,
            fetch_timeout,
            running: Mutex::new(None),
        }
    }

    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.store.snapshot()
    }

    #[cfg(test)]
    pub fn is_started(&self) -> bool {
        self.running
            .lock()
            .map(|running| running.is_some())
            .unwrap_or(false)
    }

    #[cfg(test)]
    pub fn is_reconciling(&self) -> bool {
        self.reconciler.reconciling.load(Ordering::SeqCst)
    }

    /// Subscribes to auth events and kicks off the startup fetch.
    ///
    /// Returns `false` without doing anything when already started. Must be
    /// called from within a tokio runtime.
    pub fn start(&self) -> bool {
        let Ok(mut running) = self.running.lock() else {
            tracing::error!("session synchronizer lifecycle lock poisoned");
            return false;
        };

        if running.is_some() {
            tracing::debug!("session synchronizer already started; skipping startup check");
            return false;
        }

        self.reconciler.clear_pending();
        self.store.on_check_started();

        let weak = Arc::downgrade(&self.reconciler);
        let subscription = self
            .backend
            .subscribe(Box::new(move |event| offer_event(&weak, event)));

        let driver = tokio::spawn(drive(
            Arc::clone(&self.backend),
            Arc::clone(&self.reconciler),
            self.fetch_timeout,
        ));

        *running = Some(Running {
            subscription,
            driver,
        });

        tracing::info!(
            fetch_timeout_ms = self.fetch_timeout.as_millis() as u64,
            "session synchronizer started"
        );
        true
    }

    /// Tears down the subscription and the driver, and re-arms `start`.
    pub fn stop(&self) {
        let taken = match self.running.lock() {
            Ok(mut running) => running.take(),
            Err(_) => None,
        };

        let Some(Running {
            subscription,
            driver,
        }) = taken
        else {
            return;
        };

        subscription.unsubscribe();
        driver.abort();
        self.reconciler.clear_pending();
        self.store.on_reset();

        tracing::info!("session synchronizer stopped");
    }

    /// Logs out locally first, then tells the backend. Local state is
    /// `Unauthenticated` whatever the backend answers.
    pub async fn sign_out(&self) -> SignOutOutcome {
        self.reconciler.clear_pending();
        self.store.on_unauthenticated();

        match self.backend.sign_out().await {
            Ok(()) => {
                tracing::info!("signed out");
                SignOutOutcome {
                    backend_acknowledged: true,
                }
            }
            Err(error) => {
                tracing::warn!(
                    code = SIGN_OUT_BACKEND_FAILED,
                    error_code = error.code(),
                    error = %error,
                    "backend sign-out failed; local session already cleared"
                );
                SignOutOutcome {
                    backend_acknowledged: false,
                }
            }
        }
    }
}

impl Drop for SessionSynchronizer {
    fn drop(&mut self) {
        self.stop();
    }
}

struct Reconciler {
    store: SessionStore,
    pending: Mutex<Option<AuthEvent>>,
    wake: Notify,
    reconciling: AtomicBool,
}

impl Reconciler {
    fn new(store: SessionStore) -> Self {
        Self {
            store,
            pending: Mutex::new(None),
            wake: Notify::new(),
            reconciling: AtomicBool::new(false),
        }
    }

    fn offer(&self, event: AuthEvent) {
        match &event.kind {
            AuthEventKind::TokenRefreshed => {
                tracing::trace!("token refresh ignored");
                return;
            }
            AuthEventKind::Unrecognized(label) => {
                tracing::debug!(
                    code = AUTH_EVENT_UNRECOGNIZED,
                    kind = %label,
                    "ignoring unrecognized auth event"
                );
                return;
            }
            AuthEventKind::SignedIn | AuthEventKind::SignedOut | AuthEventKind::UserUpdated => {}
        }

        let superseded = match self.pending.lock() {
            Ok(mut slot) => slot.replace(event),
            Err(_) => {
                tracing::error!("auth event slot poisoned; dropping event");
                return;
            }
        };

        if let Some(previous) = superseded {
            tracing::debug!(
                code = AUTH_EVENT_SUPERSEDED,
                kind = previous.kind.as_label(),
                "pending auth event replaced by a newer one"
            );
        }

        self.wake.notify_one();
    }

    fn take_pending(&self) -> Option<AuthEvent> {
        self.pending.lock().ok().and_then(|mut slot| slot.take())
    }

    fn clear_pending(&self) {
        let _ = self.take_pending();
    }

    fn settle_startup(&self, session: Option<Session>) {
        // A local sign-out during the fetch wins over whatever the fetch found.
        if self.store.snapshot().status != AuthStatus::Checking {
            tracing::debug!("startup fetch result discarded; state moved on while checking");
            return;
        }

        match session {
            Some(session) => {
                tracing::info!(user_id = %session.user_id, "startup session restored");
                self.store.on_authenticated(session);
            }
            None => {
                tracing::info!("no startup session; showing login");
                self.store.on_unauthenticated();
            }
        }
    }

    fn apply(&self, event: AuthEvent) {
        self.reconciling.store(true, Ordering::SeqCst);

        let kind = event.kind.as_label().to_owned();
        let changed = match (event.kind, event.session) {
            (AuthEventKind::SignedIn | AuthEventKind::UserUpdated, Some(session)) => {
                self.store.on_authenticated(session)
            }
            // Nothing to be authenticated as.
            (AuthEventKind::SignedIn | AuthEventKind::UserUpdated, None)
            | (AuthEventKind::SignedOut, _) => self.store.on_unauthenticated(),
            (AuthEventKind::TokenRefreshed | AuthEventKind::Unrecognized(_), _) => false,
        };

        tracing::debug!(kind = %kind, changed, "auth event reconciled");
        self.reconciling.store(false, Ordering::SeqCst);
    }
}

fn offer_event(reconciler: &Weak<Reconciler>, event: AuthEvent) {
    if let Some(reconciler) = reconciler.upgrade() {
        reconciler.offer(event);
    }
}

async fn drive(backend: Arc<dyn AuthBackend>, reconciler: Arc<Reconciler>, timeout: Duration) {
    let session = fetch_startup_session(backend.as_ref(), timeout).await;

    // An event pushed while checking is newer than the fetch; skip the stale result.
    match reconciler.take_pending() {
        Some(event) => {
            tracing::debug!("startup fetch superseded by auth event received while checking");
            reconciler.apply(event);
        }
        None => reconciler.settle_startup(session),
    }

    loop {
        while let Some(event) = reconciler.take_pending() {
            reconciler.apply(event);
        }
        reconciler.wake.notified().await;
    }
}

async fn fetch_startup_session(backend: &dyn AuthBackend, timeout: Duration) -> Option<Session> {
    match tokio::time::timeout(timeout, backend.get_session()).await {
        Ok(Ok(session)) => session,
        Ok(Err(error)) => {
            tracing::warn!(
                code = SESSION_FETCH_FAILED,
                error_code = error.code(),
                error = %error,
                "startup session fetch failed; continuing logged out"
            );
            None
        }
        Err(_) => {
            tracing::warn!(
                code = SESSION_FETCH_TIMEOUT,
                timeout_ms = timeout.as_millis() as u64,
                "startup session fetch timed out; continuing logged out"
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        infra::stubs::{FetchBehavior, ScriptedAuthBackend},
        usecases::contracts::AuthBackendError,
    };

    const TEST_TIMEOUT: Duration = Duration::from_millis(200);

    fn kari() -> Session {
        Session::new("u-kari", "Kari")
    }

    fn ola() -> Session {
        Session::new("u-ola", "Ola")
    }

    fn synchronizer(backend: &Arc<ScriptedAuthBackend>) -> SessionSynchronizer {
        SessionSynchronizer::new(Arc::clone(backend) as Arc<dyn AuthBackend>, TEST_TIMEOUT)
    }

    async fn drain() {
        for _ in 0..8 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn startup_with_existing_session_authenticates() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(Some(kari())));
        let sync = synchronizer(&backend);

        assert!(sync.start());
        let snapshot = sync.store().wait_until_settled().await;

        assert_eq!(snapshot.status, AuthStatus::Authenticated);
        assert_eq!(snapshot.session, Some(kari()));
    }

    #[tokio::test]
    async fn startup_without_session_is_unauthenticated() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(None));
        let sync = synchronizer(&backend);

        sync.start();
        let snapshot = sync.store().wait_until_settled().await;

        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        assert!(!snapshot.is_checking_auth());
    }

    #[tokio::test]
    async fn startup_is_idempotent_while_running() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(Some(kari())));
        let sync = synchronizer(&backend);

        assert!(sync.start());
        assert!(!sync.start());
        sync.store().wait_until_settled().await;
        assert!(!sync.start());

        assert_eq!(backend.fetch_calls(), 1);
        assert_eq!(backend.subscriber_count(), 1);
    }

    #[tokio::test]
    async fn stop_tears_down_once_and_allows_fresh_start() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(Some(kari())));
        let sync = synchronizer(&backend);

        sync.start();
        sync.store().wait_until_settled().await;
        sync.stop();
        sync.stop();

        assert_eq!(backend.subscriber_count(), 0);
        assert_eq!(backend.unsubscribe_calls(), 1);
        assert_eq!(sync.snapshot().status, AuthStatus::Uninitialized);
        assert!(!sync.is_started());

        assert!(sync.start());
        sync.store().wait_until_settled().await;
        assert_eq!(backend.fetch_calls(), 2);
    }

    #[tokio::test]
    async fn fetch_failure_degrades_to_logged_out() {
        let backend = Arc::new(ScriptedAuthBackend::new(FetchBehavior::Fail(
            AuthBackendError::NotConfigured {
                details: "missing url".to_owned(),
            },
        )));
        let sync = synchronizer(&backend);

        sync.start();
        let snapshot = sync.store().wait_until_settled().await;

        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
        assert!(snapshot.current_session().is_none());
    }

    #[tokio::test]
    async fn hung_fetch_times_out_to_logged_out() {
        let backend = Arc::new(ScriptedAuthBackend::new(FetchBehavior::Hang));
        let sync = SessionSynchronizer::new(
            Arc::clone(&backend) as Arc<dyn AuthBackend>,
            Duration::from_millis(20),
        );

        sync.start();
        let snapshot = sync.store().wait_until_settled().await;

        assert_eq!(snapshot.status, AuthStatus::Unauthenticated);
    }

    #[tokio::test]
    async fn token_refresh_never_changes_observable_state() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(Some(kari())));
        let sync = synchronizer(&backend);
        sync.start();
        let settled = sync.store().wait_until_settled().await;
        let mut rx = sync.store().subscribe();
        rx.borrow_and_update();

        for _ in 0..5 {
            backend.emit(AuthEvent::token_refreshed(ola()));
        }
        backend.emit(AuthEvent::new(AuthEventKind::TokenRefreshed, None));
        drain().await;

        assert!(!rx.has_changed().expect("store alive"));
        assert_eq!(sync.snapshot().session, settled.session);
        assert!(!sync.snapshot().is_checking_auth());
    }

    #[tokio::test]
    async fn unrecognized_event_is_a_no_op() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(Some(kari())));
        let sync = synchronizer(&backend);
        sync.start();
        sync.store().wait_until_settled().await;

        backend.emit(AuthEvent::new(
            AuthEventKind::Unrecognized("PASSWORD_RECOVERY".to_owned()),
            None,
        ));
        drain().await;

        assert_eq!(sync.snapshot().session, Some(kari()));
    }

    #[tokio::test]
    async fn signed_in_and_out_events_drive_transitions() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(None));
        let sync = synchronizer(&backend);
        sync.start();
        sync.store().wait_until_settled().await;

        backend.emit(AuthEvent::signed_in(kari()));
        let snapshot = sync
            .store()
            .wait_for(|s| s.status == AuthStatus::Authenticated)
            .await;
        assert_eq!(snapshot.session, Some(kari()));

        backend.emit(AuthEvent::user_updated(Session::new("u-kari", "Kari N.")));
        let snapshot = sync
            .store()
            .wait_for(|s| s.session.as_ref().map(|x| x.display_name.as_str()) == Some("Kari N."))
            .await;
        assert_eq!(snapshot.status, AuthStatus::Authenticated);

        backend.emit(AuthEvent::signed_out());
        let snapshot = sync
            .store()
            .wait_for(|s| s.status == AuthStatus::Unauthenticated)
            .await;
        assert!(snapshot.session.is_none());
    }

    #[tokio::test]
    async fn signed_in_without_payload_is_treated_as_signed_out() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(Some(kari())));
        let sync = synchronizer(&backend);
        sync.start();
        sync.store().wait_until_settled().await;

        backend.emit(AuthEvent::new(AuthEventKind::SignedIn, None));
        let snapshot = sync
            .store()
            .wait_for(|s| s.status == AuthStatus::Unauthenticated)
            .await;

        assert!(snapshot.session.is_none());
    }

    #[tokio::test]
    async fn back_to_back_events_settle_on_one_of_them() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(None));
        let sync = synchronizer(&backend);
        sync.start();
        sync.store().wait_until_settled().await;

        backend.emit(AuthEvent::signed_in(kari()));
        backend.emit(AuthEvent::signed_out());
        backend.emit(AuthEvent::signed_in(ola()));
        drain().await;

        let snapshot = sync.snapshot();
        assert_eq!(snapshot.status, AuthStatus::Authenticated);
        assert_eq!(snapshot.session, Some(ola()));
        assert!(!sync.is_reconciling());
    }

    #[tokio::test]
    async fn refresh_does_not_overwrite_a_pending_event() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(None));
        let sync = synchronizer(&backend);
        sync.start();
        sync.store().wait_until_settled().await;

        backend.emit(AuthEvent::signed_in(kari()));
        backend.emit(AuthEvent::token_refreshed(ola()));
        drain().await;

        assert_eq!(sync.snapshot().session, Some(kari()));
    }

    #[tokio::test]
    async fn events_during_checking_apply_after_the_fetch() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedAuthBackend::new(FetchBehavior::Gated {
            gate: Arc::clone(&gate),
            session: None,
        }));
        let sync = synchronizer(&backend);
        sync.start();
        drain().await;

        backend.emit(AuthEvent::signed_in(kari()));
        drain().await;
        assert_eq!(sync.snapshot().status, AuthStatus::Checking);

        gate.notify_one();
        let snapshot = sync
            .store()
            .wait_for(|s| s.status == AuthStatus::Authenticated)
            .await;

        assert_eq!(snapshot.session, Some(kari()));
    }

    #[tokio::test]
    async fn sign_out_clears_session_when_backend_acknowledges() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(Some(kari())));
        let sync = synchronizer(&backend);
        sync.start();
        sync.store().wait_until_settled().await;

        let outcome = sync.sign_out().await;

        assert!(outcome.backend_acknowledged);
        assert!(sync.snapshot().current_session().is_none());
        assert_eq!(backend.sign_out_calls(), 1);
    }

    #[tokio::test]
    async fn sign_out_clears_session_when_backend_fails() {
        let backend = Arc::new(
            ScriptedAuthBackend::with_session(Some(kari())).failing_sign_out(
                AuthBackendError::Unavailable {
                    code: "AUTH_BACKEND_UNREACHABLE",
                },
            ),
        );
        let sync = synchronizer(&backend);
        sync.start();
        sync.store().wait_until_settled().await;

        let outcome = sync.sign_out().await;

        assert!(!outcome.backend_acknowledged);
        assert_eq!(sync.snapshot().status, AuthStatus::Unauthenticated);
        assert!(sync.snapshot().current_session().is_none());
    }

    #[tokio::test]
    async fn sign_out_during_checking_wins_over_late_fetch() {
        let gate = Arc::new(Notify::new());
        let backend = Arc::new(ScriptedAuthBackend::new(FetchBehavior::Gated {
            gate: Arc::clone(&gate),
            session: Some(kari()),
        }));
        let sync = synchronizer(&backend);
        sync.start();
        drain().await;

        sync.sign_out().await;
        gate.notify_one();
        drain().await;

        assert_eq!(sync.snapshot().status, AuthStatus::Unauthenticated);
        assert!(sync.snapshot().current_session().is_none());
    }

    #[tokio::test]
    async fn dropping_the_synchronizer_unsubscribes() {
        let backend = Arc::new(ScriptedAuthBackend::with_session(None));
        {
            let sync = synchronizer(&backend);
            sync.start();
            sync.store().wait_until_settled().await;
            assert_eq!(backend.subscriber_count(), 1);
        }

        assert_eq!(backend.subscriber_count(), 0);
    }
}
