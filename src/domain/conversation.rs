//! Folding the flat message log into per-partner conversation summaries.

use std::collections::HashMap;

use super::{
    message::{is_newest_first, unknown_partner_name, Message},
    session::UserId,
};

/// Rollup of every message exchanged with one partner. Recomputed, never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationSummary {
    pub partner_id: UserId,
    pub partner_display_name: String,
    pub last_message_text: String,
    pub last_message_at: i64,
    pub unread_count: u32,
}

impl ConversationSummary {
    fn start(message: &Message, partner_id: &UserId, current_user: &UserId) -> Self {
        Self {
            partner_id: partner_id.clone(),
            partner_display_name: message
                .partner_display_name(current_user)
                .unwrap_or(unknown_partner_name())
                .to_owned(),
            last_message_text: message.content.clone(),
            last_message_at: message.created_at_unix_ms,
            unread_count: u32::from(message.is_unread_for(current_user)),
        }
    }

    fn replace_last_message(&mut self, message: &Message, current_user: &UserId) {
        self.last_message_text = message.content.clone();
        self.last_message_at = message.created_at_unix_ms;
        if let Some(name) = message.partner_display_name(current_user) {
            self.partner_display_name = name.to_owned();
        }
    }

    fn fill_missing_name(&mut self, message: &Message, current_user: &UserId) {
        if self.partner_display_name != unknown_partner_name() {
            return;
        }

        if let Some(name) = message.partner_display_name(current_user) {
            self.partner_display_name = name.to_owned();
        }
    }
}

/// Groups `messages` by partner relative to `current_user`.
///
/// `messages` must be ordered newest first; this is checked in debug builds only.
/// Callers holding data from an external source should run
/// [`sort_newest_first`](super::message::sort_newest_first) beforehand.
///
/// When two messages for the same partner share a timestamp, the one seen first
/// stays the conversation's last message. Summaries come back newest first, with
/// equal timestamps in first-seen order.
pub fn aggregate(messages: &[Message], current_user: &UserId) -> Vec<ConversationSummary> {
    debug_assert!(
        is_newest_first(messages),
        "aggregate expects messages sorted newest first"
    );

    let mut summaries: Vec<ConversationSummary> = Vec::new();
    let mut index_by_partner: HashMap<&UserId, usize> = HashMap::new();

    for message in messages {
        let partner_id = message.partner_of(current_user);

        let Some(&index) = index_by_partner.get(partner_id) else {
            index_by_partner.insert(partner_id, summaries.len());
            summaries.push(ConversationSummary::start(message, partner_id, current_user));
            continue;
        };

        let summary = &mut summaries[index];
        if message.created_at_unix_ms > summary.last_message_at {
            summary.replace_last_message(message, current_user);
        } else {
            summary.fill_missing_name(message, current_user);
        }

        if message.is_unread_for(current_user) {
            summary.unread_count += 1;
        }
    }

    // Vec::sort_by is stable, so ties keep first-seen order.
    summaries.sort_by(|a, b| b.last_message_at.cmp(&a.last_message_at));
    summaries
}

/// Flat count of unread messages addressed to `current_user`.
pub fn total_unread(messages: &[Message], current_user: &UserId) -> u32 {
    let count = messages
        .iter()
        .filter(|message| message.is_unread_for(current_user))
        .count();

    u32::try_from(count).unwrap_or(u32::MAX)
}

/// Messages exchanged with `partner`, oldest first, for a thread view.
pub fn conversation_with<'a>(
    messages: &'a [Message],
    current_user: &UserId,
    partner: &UserId,
) -> Vec<&'a Message> {
    let mut thread: Vec<&Message> = messages
        .iter()
        .filter(|message| message.partner_of(current_user) == partner)
        .collect();

    thread.sort_by_key(|message| message.created_at_unix_ms);
    thread
}
