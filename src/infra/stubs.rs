//! In-memory collaborators for tests.

use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
};

use async_trait::async_trait;
use tokio::sync::Notify;

use crate::{
    domain::{
        events::AuthEvent,
        message::Message,
        session::{Session, UserId},
    },
    infra::event_hub::AuthEventHub,
    usecases::contracts::{
        AuthBackend, AuthBackendError, AuthEventHandler, MessageStore, MessageStoreError,
        Subscription,
    },
};

pub enum FetchBehavior {
    Return(Option<Session>),
    Fail(AuthBackendError),
    Hang,
    /// Blocks until `gate` is notified, then returns `session`.
    Gated {
        gate: Arc<Notify>,
        session: Option<Session>,
    },
}

pub struct ScriptedAuthBackend {
    fetch: FetchBehavior,
    sign_out_result: Result<(), AuthBackendError>,
    hub: AuthEventHub,
    fetch_calls: AtomicUsize,
    sign_out_calls: AtomicUsize,
}

impl ScriptedAuthBackend {
    pub fn new(fetch: FetchBehavior) -> Self {
        Self {
            fetch,
            sign_out_result: Ok(()),
            hub: AuthEventHub::new(),
            fetch_calls: AtomicUsize::new(0),
            sign_out_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_session(session: Option<Session>) -> Self {
        Self::new(FetchBehavior::Return(session))
    }

    pub fn failing_sign_out(mut self, error: AuthBackendError) -> Self {
        self.sign_out_result = Err(error);
        self
    }

    /// Simulates a push notification from the transport.
    pub fn emit(&self, event: AuthEvent) {
        self.hub.publish(event);
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub fn sign_out_calls(&self) -> usize {
        self.sign_out_calls.load(Ordering::SeqCst)
    }

    pub fn subscriber_count(&self) -> usize {
        self.hub.subscriber_count()
    }

    pub fn unsubscribe_calls(&self) -> usize {
        self.hub.teardown_count()
    }
}

#[async_trait]
impl AuthBackend for ScriptedAuthBackend {
    async fn get_session(&self) -> Result<Option<Session>, AuthBackendError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        match &self.fetch {
            FetchBehavior::Return(session) => Ok(session.clone()),
            FetchBehavior::Fail(error) => Err(error.clone()),
            FetchBehavior::Hang => std::future::pending().await,
            FetchBehavior::Gated { gate, session } => {
                gate.notified().await;
                Ok(session.clone())
            }
        }
    }

    fn subscribe(&self, handler: AuthEventHandler) -> Subscription {
        self.hub.subscribe(handler)
    }

    async fn sign_out(&self) -> Result<(), AuthBackendError> {
        self.sign_out_calls.fetch_add(1, Ordering::SeqCst);
        self.sign_out_result.clone()
    }
}

#[derive(Default)]
pub struct InMemoryMessageStore {
    messages: Mutex<Vec<Message>>,
    failure: Option<MessageStoreError>,
}

impl InMemoryMessageStore {
    /// Stored order is returned as-is, so tests can feed unsorted data.
    pub fn with_messages(messages: Vec<Message>) -> Self {
        Self {
            messages: Mutex::new(messages),
            failure: None,
        }
    }

    pub fn failing(error: MessageStoreError) -> Self {
        Self {
            messages: Mutex::new(Vec::new()),
            failure: Some(error),
        }
    }

    pub fn snapshot(&self) -> Vec<Message> {
        self.messages.lock().expect("store lock").clone()
    }
}

#[async_trait]
impl MessageStore for InMemoryMessageStore {
    async fn messages_for_user(&self, user: &UserId) -> Result<Vec<Message>, MessageStoreError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        Ok(self
            .messages
            .lock()
            .expect("store lock")
            .iter()
            .filter(|m| m.sender_id == *user || m.receiver_id == *user)
            .cloned()
            .collect())
    }

    async fn mark_all_read_from(
        &self,
        receiver: &UserId,
        sender: &UserId,
    ) -> Result<usize, MessageStoreError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let mut messages = self.messages.lock().expect("store lock");
        let mut changed = 0;
        for message in messages
            .iter_mut()
            .filter(|m| m.receiver_id == *receiver && m.sender_id == *sender && !m.read)
        {
            message.read = true;
            changed += 1;
        }

        Ok(changed)
    }

    async fn send_message(
        &self,
        sender: &UserId,
        receiver: &UserId,
        content: &str,
    ) -> Result<Message, MessageStoreError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }

        let mut messages = self.messages.lock().expect("store lock");
        let created_at_unix_ms = messages
            .iter()
            .map(|m| m.created_at_unix_ms)
            .max()
            .map_or(0, |latest| latest + 1);
        let message = Message {
            id: format!("sent-{}", messages.len()),
            sender_id: sender.clone(),
            receiver_id: receiver.clone(),
            content: content.to_owned(),
            read: false,
            created_at_unix_ms,
            sender: None,
            receiver: None,
        };
        messages.push(message.clone());
        Ok(message)
    }
}
