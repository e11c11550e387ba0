use crate::domain::{
    conversation::{aggregate, conversation_with, total_unread, ConversationSummary},
    message::{sort_newest_first, Message},
    session::{Session, UserId},
};

use super::contracts::{MessageStore, MessageStoreError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationsOutput {
    pub summaries: Vec<ConversationSummary>,
    pub total_unread: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationsError {
    Unauthorized,
    TemporarilyUnavailable,
    DataContractViolation,
}

/// Fetches the signed-in user's messages and folds them into conversations.
pub async fn load_conversations(
    store: &dyn MessageStore,
    session: &Session,
) -> Result<ConversationsOutput, ConversationsError> {
    let mut messages = store
        .messages_for_user(&session.user_id)
        .await
        .map_err(map_store_error)?;

    // The store promises newest first; do not rely on it.
    sort_newest_first(&mut messages);

    let summaries = aggregate(&messages, &session.user_id);
    let total_unread = total_unread(&messages, &session.user_id);

    tracing::debug!(
        messages = messages.len(),
        conversations = summaries.len(),
        total_unread,
        "conversations recomputed"
    );

    Ok(ConversationsOutput {
        summaries,
        total_unread,
    })
}

/// Every message exchanged with `partner`, oldest first.
pub async fn load_thread(
    store: &dyn MessageStore,
    session: &Session,
    partner: &UserId,
) -> Result<Vec<Message>, ConversationsError> {
    let mut messages = store
        .messages_for_user(&session.user_id)
        .await
        .map_err(map_store_error)?;
    sort_newest_first(&mut messages);

    Ok(conversation_with(&messages, &session.user_id, partner)
        .into_iter()
        .cloned()
        .collect())
}

/// Marks everything `partner` sent to the signed-in user as read.
pub async fn mark_conversation_read(
    store: &dyn MessageStore,
    session: &Session,
    partner: &UserId,
) -> Result<usize, ConversationsError> {
    let changed = store
        .mark_all_read_from(&session.user_id, partner)
        .await
        .map_err(map_store_error)?;

    tracing::info!(partner_id = %partner, changed, "conversation marked as read");
    Ok(changed)
}

/// Sends `content` from the signed-in user to `partner`.
pub async fn send_message(
    store: &dyn MessageStore,
    session: &Session,
    partner: &UserId,
    content: &str,
) -> Result<Message, ConversationsError> {
    let message = store
        .send_message(&session.user_id, partner, content)
        .await
        .map_err(map_store_error)?;

    tracing::info!(partner_id = %partner, message_id = %message.id, "message sent");
    Ok(message)
}

fn map_store_error(error: MessageStoreError) -> ConversationsError {
    match error {
        MessageStoreError::Unauthorized => ConversationsError::Unauthorized,
        MessageStoreError::Unavailable => ConversationsError::TemporarilyUnavailable,
        MessageStoreError::InvalidData => ConversationsError::DataContractViolation,
    }
}
