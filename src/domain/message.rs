use super::session::UserId;

const UNKNOWN_PARTNER_NAME: &str = "Unknown";

/// Public profile of a message participant, as joined by the message store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Profile {
    pub id: UserId,
    pub email: String,
    pub full_name: Option<String>,
}

impl Profile {
    /// Full name if set, otherwise the email address.
    pub fn display_name(&self) -> Option<&str> {
        self.full_name
            .as_deref()
            .filter(|name| !name.trim().is_empty())
            .or_else(|| Some(self.email.as_str()).filter(|email| !email.is_empty()))
    }
}

/// A single direct message. Only `read` ever changes after creation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: String,
    pub sender_id: UserId,
    pub receiver_id: UserId,
    pub content: String,
    pub read: bool,
    pub created_at_unix_ms: i64,
    pub sender: Option<Profile>,
    pub receiver: Option<Profile>,
}

impl Message {
    pub fn is_received_by(&self, user: &UserId) -> bool {
        self.receiver_id == *user
    }

    /// The other participant relative to `user`.
    pub fn partner_of(&self, user: &UserId) -> &UserId {
        if self.is_received_by(user) {
            &self.sender_id
        } else {
            &self.receiver_id
        }
    }

    pub fn is_unread_for(&self, user: &UserId) -> bool {
        self.is_received_by(user) && !self.read
    }

    pub fn partner_display_name(&self, user: &UserId) -> Option<&str> {
        let profile = if self.is_received_by(user) {
            self.sender.as_ref()
        } else {
            self.receiver.as_ref()
        };

        profile.and_then(Profile::display_name)
    }
}

pub fn unknown_partner_name() -> &'static str {
    UNKNOWN_PARTNER_NAME
}

/// Stable sort, newest first. Equal timestamps keep their relative order.
pub fn sort_newest_first(messages: &mut [Message]) {
    messages.sort_by(|a, b| b.created_at_unix_ms.cmp(&a.created_at_unix_ms));
}

pub fn is_newest_first(messages: &[Message]) -> bool {
    messages
        .windows(2)
        .all(|pair| pair[0].created_at_unix_ms >= pair[1].created_at_unix_ms)
}
