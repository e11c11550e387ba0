use std::sync::{Arc, Mutex};

use crate::{
    domain::events::AuthEvent,
    usecases::contracts::{AuthEventHandler, Subscription},
};

/// Fan-out of auth events to registered handlers, for in-process backends.
#[derive(Clone, Default)]
pub struct AuthEventHub {
    inner: Arc<Mutex<HubState>>,
}

#[derive(Default)]
struct HubState {
    next_id: u64,
    handlers: Vec<(u64, Arc<AuthEventHandler>)>,
    teardowns: usize,
}

impl AuthEventHub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, handler: AuthEventHandler) -> Subscription {
        let id = match self.inner.lock() {
            Ok(mut state) => {
                let id = state.next_id;
                state.next_id += 1;
                state.handlers.push((id, Arc::new(handler)));
                id
            }
            Err(_) => {
                tracing::error!("auth event hub poisoned; subscription is inert");
                return Subscription::new(|| {});
            }
        };

        let inner = Arc::downgrade(&self.inner);
        Subscription::new(move || {
            let Some(inner) = inner.upgrade() else {
                return;
            };
            if let Ok(mut state) = inner.lock() {
                state.handlers.retain(|(handler_id, _)| *handler_id != id);
                state.teardowns += 1;
            };
        })
    }

    /// Delivers `event` to every handler. Handlers run outside the hub lock.
    pub fn publish(&self, event: AuthEvent) {
        let handlers: Vec<Arc<AuthEventHandler>> = match self.inner.lock() {
            Ok(state) => state.handlers.iter().map(|(_, h)| Arc::clone(h)).collect(),
            Err(_) => return,
        };

        tracing::debug!(
            kind = event.kind.as_label(),
            subscribers = handlers.len(),
            "publishing auth event"
        );

        for handler in handlers {
            handler(event.clone());
        }
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.handlers.len())
            .unwrap_or_default()
    }

    #[cfg(test)]
    pub fn teardown_count(&self) -> usize {
        self.inner
            .lock()
            .map(|state| state.teardowns)
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    fn counting_handler(counter: &Arc<AtomicUsize>) -> AuthEventHandler {
        let counter = Arc::clone(counter);
        Box::new(move |_event| {
            counter.fetch_add(1, Ordering::SeqCst);
        })
    }

    #[test]
    fn publishes_to_every_live_subscriber() {
        let hub = AuthEventHub::new();
        let first = Arc::new(AtomicUsize::new(0));
        let second = Arc::new(AtomicUsize::new(0));
        let _a = hub.subscribe(counting_handler(&first));
        let _b = hub.subscribe(counting_handler(&second));

        hub.publish(AuthEvent::signed_out());

        assert_eq!(first.load(Ordering::SeqCst), 1);
        assert_eq!(second.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unsubscribed_handler_stops_receiving() {
        let hub = AuthEventHub::new();
        let calls = Arc::new(AtomicUsize::new(0));
        let subscription = hub.subscribe(counting_handler(&calls));

        subscription.unsubscribe();
        hub.publish(AuthEvent::signed_out());

        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(hub.subscriber_count(), 0);
        assert_eq!(hub.teardown_count(), 1);
    }

    #[test]
    fn handler_may_query_the_hub_without_deadlock() {
        let hub = AuthEventHub::new();
        let inner_hub = hub.clone();
        let _subscription = hub.subscribe(Box::new(move |_event| {
            let _ = inner_hub.subscriber_count();
        }));

        hub.publish(AuthEvent::signed_out());

        assert_eq!(hub.subscriber_count(), 1);
    }
}
