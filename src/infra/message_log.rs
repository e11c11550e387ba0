use std::{
    collections::HashMap,
    fs,
    io::ErrorKind,
    path::PathBuf,
    sync::Mutex,
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{
    domain::{
        message::{sort_newest_first, Message, Profile},
        session::UserId,
    },
    usecases::contracts::{MessageStore, MessageStoreError},
};

const MESSAGE_LOG_UNREADABLE: &str = "MESSAGE_LOG_UNREADABLE";
const MESSAGE_LOG_INVALID: &str = "MESSAGE_LOG_INVALID";
const MESSAGE_LOG_WRITE_FAILED: &str = "MESSAGE_LOG_WRITE_FAILED";

/// On-disk shape: `[[profiles]]` and `[[messages]]` tables.
#[derive(Debug, Default, Serialize, Deserialize)]
struct MessageLogFile {
    #[serde(default)]
    profiles: Vec<ProfileRecord>,
    #[serde(default)]
    messages: Vec<MessageRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct ProfileRecord {
    id: UserId,
    #[serde(default)]
    email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    full_name: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct MessageRecord {
    id: String,
    sender_id: UserId,
    receiver_id: UserId,
    content: String,
    #[serde(default)]
    read: bool,
    /// RFC 3339 timestamp.
    created_at: String,
}

impl From<ProfileRecord> for Profile {
    fn from(record: ProfileRecord) -> Self {
        Self {
            id: record.id,
            email: record.email,
            full_name: record.full_name,
        }
    }
}

/// Message store over a local TOML log, joined with participant profiles.
#[derive(Debug)]
pub struct FileMessageStore {
    path: PathBuf,
    // Serializes read-modify-write cycles from this process.
    io_lock: Mutex<()>,
}

impl FileMessageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            io_lock: Mutex::new(()),
        }
    }

    fn read_log(&self) -> Result<MessageLogFile, MessageStoreError> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(source) if source.kind() == ErrorKind::NotFound => {
                tracing::debug!(
                    path = %self.path.display(),
                    "message log missing; treating as empty"
                );
                return Ok(MessageLogFile::default());
            }
            Err(source) if source.kind() == ErrorKind::PermissionDenied => {
                tracing::warn!(
                    code = MESSAGE_LOG_UNREADABLE,
                    path = %self.path.display(),
                    "message log access denied"
                );
                return Err(MessageStoreError::Unauthorized);
            }
            Err(source) => {
                tracing::warn!(
                    code = MESSAGE_LOG_UNREADABLE,
                    path = %self.path.display(),
                    error = %source,
                    "message log could not be read"
                );
                return Err(MessageStoreError::Unavailable);
            }
        };

        toml::from_str(&raw).map_err(|source| {
            tracing::warn!(
                code = MESSAGE_LOG_INVALID,
                path = %self.path.display(),
                error = %source,
                "message log is not valid"
            );
            MessageStoreError::InvalidData
        })
    }

    fn write_log(&self, log: &MessageLogFile) -> Result<(), MessageStoreError> {
        let encoded = toml::to_string(log).map_err(|source| {
            tracing::warn!(
                code = MESSAGE_LOG_WRITE_FAILED,
                error = %source,
                "message log encode failed"
            );
            MessageStoreError::InvalidData
        })?;

        fs::write(&self.path, encoded).map_err(|source| {
            tracing::warn!(
                code = MESSAGE_LOG_WRITE_FAILED,
                path = %self.path.display(),
                error = %source,
                "message log could not be written"
            );
            MessageStoreError::Unavailable
        })
    }
}

#[async_trait]
impl MessageStore for FileMessageStore {
    async fn messages_for_user(&self, user: &UserId) -> Result<Vec<Message>, MessageStoreError> {
        let log = {
            let _guard = self.io_lock.lock().map_err(|_| MessageStoreError::Unavailable)?;
            self.read_log()?
        };

        let profiles: HashMap<UserId, Profile> = log
            .profiles
            .into_iter()
            .map(|record| (record.id.clone(), Profile::from(record)))
            .collect();

        let mut messages = log
            .messages
            .into_iter()
            .filter(|record| record.sender_id == *user || record.receiver_id == *user)
            .map(|record| to_message(record, &profiles))
            .collect::<Result<Vec<_>, _>>()?;

        sort_newest_first(&mut messages);
        Ok(messages)
    }

    async fn mark_all_read_from(
        &self,
        receiver: &UserId,
        sender: &UserId,
    ) -> Result<usize, MessageStoreError> {
        let _guard = self.io_lock.lock().map_err(|_| MessageStoreError::Unavailable)?;
        let mut log = self.read_log()?;

        let mut changed = 0;
        for record in log
            .messages
            .iter_mut()
            .filter(|r| r.receiver_id == *receiver && r.sender_id == *sender && !r.read)
        {
            record.read = true;
            changed += 1;
        }

        if changed > 0 {
            self.write_log(&log)?;
        }

        Ok(changed)
    }

    async fn send_message(
        &self,
        sender: &UserId,
        receiver: &UserId,
        content: &str,
    ) -> Result<Message, MessageStoreError> {
        let _guard = self.io_lock.lock().map_err(|_| MessageStoreError::Unavailable)?;
        let mut log = self.read_log()?;

        let record = MessageRecord {
            id: uuid::Uuid::new_v4().to_string(),
            sender_id: sender.clone(),
            receiver_id: receiver.clone(),
            content: content.to_owned(),
            read: false,
            created_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Millis, true),
        };
        log.messages.push(record.clone());
        self.write_log(&log)?;

        tracing::info!(message_id = %record.id, receiver_id = %receiver, "message appended");

        let profiles: HashMap<UserId, Profile> = log
            .profiles
            .into_iter()
            .map(|profile| (profile.id.clone(), Profile::from(profile)))
            .collect();
        to_message(record, &profiles)
    }
}

fn to_message(
    record: MessageRecord,
    profiles: &HashMap<UserId, Profile>,
) -> Result<Message, MessageStoreError> {
    let created_at_unix_ms = chrono::DateTime::parse_from_rfc3339(&record.created_at)
        .map(|at| at.timestamp_millis())
        .map_err(|source| {
            tracing::warn!(
                code = MESSAGE_LOG_INVALID,
                message_id = %record.id,
                error = %source,
                "message has an invalid created_at"
            );
            MessageStoreError::InvalidData
        })?;

    Ok(Message {
        sender: profiles.get(&record.sender_id).cloned(),
        receiver: profiles.get(&record.receiver_id).cloned(),
        id: record.id,
        sender_id: record.sender_id,
        receiver_id: record.receiver_id,
        content: record.content,
        read: record.read,
        created_at_unix_ms,
    })
}
