use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{
    events::AuthEvent,
    message::Message,
    session::{Session, UserId},
};

pub type AuthEventHandler = Box<dyn Fn(AuthEvent) + Send + Sync + 'static>;

/// Handle to a live auth event subscription. The teardown runs exactly once,
/// on `unsubscribe` or on drop.
pub struct Subscription {
    teardown: Option<Box<dyn FnOnce() + Send + 'static>>,
}

impl Subscription {
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    pub fn unsubscribe(mut self) {
        self.run_teardown();
    }

    fn run_teardown(&mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run_teardown();
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("active", &self.teardown.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthBackendError {
    #[error("auth backend is not configured: {details}")]
    NotConfigured { details: String },
    #[error("auth backend unavailable ({code})")]
    Unavailable { code: &'static str },
    #[error("auth backend rejected the request ({code})")]
    Rejected { code: &'static str },
}

impl AuthBackendError {
    pub fn code(&self) -> &'static str {
        match self {
            Self::NotConfigured { .. } => "AUTH_BACKEND_NOT_CONFIGURED",
            Self::Unavailable { code } | Self::Rejected { code } => code,
        }
    }
}

/// Hosted authentication service, seen as an opaque event source.
#[async_trait]
pub trait AuthBackend: Send + Sync {
    async fn get_session(&self) -> Result<Option<Session>, AuthBackendError>;

    /// `handler` may be called from any task, any number of times, until the
    /// returned subscription is torn down.
    fn subscribe(&self, handler: AuthEventHandler) -> Subscription;

    async fn sign_out(&self) -> Result<(), AuthBackendError>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStoreError {
    Unauthorized,
    Unavailable,
    InvalidData,
}

#[async_trait]
pub trait MessageStore: Send + Sync {
    /// Every message sent or received by `user`, newest first.
    async fn messages_for_user(&self, user: &UserId) -> Result<Vec<Message>, MessageStoreError>;

    /// Marks unread messages from `sender` to `receiver` as read. Returns how many changed.
    async fn mark_all_read_from(
        &self,
        receiver: &UserId,
        sender: &UserId,
    ) -> Result<usize, MessageStoreError>;

    /// Appends a new unread message and returns it as stored.
    async fn send_message(
        &self,
        sender: &UserId,
        receiver: &UserId,
        content: &str,
    ) -> Result<Message, MessageStoreError>;
}
