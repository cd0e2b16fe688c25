#[cfg(test)]
#[path = "message_test.rs"]
mod tests;

use chrono::DateTime;
use chrono::Utc;
use parley_client::Role;
use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

const LOCAL_ID_PREFIX: &str = "local-";

#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default, Debug)]
pub enum MessageStatus {
    /// Loaded from the backend.
    #[default]
    Persisted,
    /// Sent by the user, shown before the backend confirmed it.
    Optimistic,
    /// Assistant placeholder receiving streamed text.
    Streaming,
    /// Assistant reply whose stream finished.
    Complete,
    /// Assistant reply whose stream failed or was stopped.
    Failed,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Debug)]
pub struct Message {
    pub id: String,
    pub session_id: Option<String>,
    pub role: Role,
    pub text: String,
    pub created_at: DateTime<Utc>,
    pub status: MessageStatus,
}

impl Message {
    pub fn local_id() -> String {
        format!("{LOCAL_ID_PREFIX}{}", Uuid::new_v4())
    }

    pub fn new_user(session_id: Option<String>, text: &str, now: DateTime<Utc>) -> Message {
        Message {
            id: Message::local_id(),
            session_id,
            role: Role::User,
            text: text.to_string(),
            created_at: now,
            status: MessageStatus::Optimistic,
        }
    }

    pub fn new_placeholder(session_id: Option<String>, now: DateTime<Utc>) -> Message {
        Message {
            id: Message::local_id(),
            session_id,
            role: Role::Assistant,
            text: String::new(),
            created_at: now,
            status: MessageStatus::Streaming,
        }
    }

    pub fn is_local(&self) -> bool {
        self.id.starts_with(LOCAL_ID_PREFIX)
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == MessageStatus::Streaming
    }

    pub fn append(&mut self, text: &str) {
        self.text.push_str(text);
    }

    /// Appends `marker` after whatever text already arrived. Returns the
    /// suffix that was added.
    pub fn mark_failed(&mut self, marker: &str) -> String {
        let suffix = if self.text.is_empty() {
            marker.to_string()
        } else {
            format!("\n\n{marker}")
        };
        self.text.push_str(&suffix);
        self.status = MessageStatus::Failed;
        suffix
    }
}

impl From<parley_client::Message> for Message {
    fn from(message: parley_client::Message) -> Self {
        Message {
            id: message.id,
            session_id: message.session_id,
            role: message.role,
            text: message.content,
            created_at: message.created_at,
            status: MessageStatus::Persisted,
        }
    }
}
