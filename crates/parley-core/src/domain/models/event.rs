use strum_macros::Display;

use super::Message;
use super::SessionEntry;
use super::SessionSource;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum NotificationLevel {
    Info,
    Warning,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub text: String,
}

impl Notification {
    pub fn info(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Info,
            text: text.into(),
        }
    }

    pub fn warning(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Warning,
            text: text.into(),
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            level: NotificationLevel::Error,
            text: text.into(),
        }
    }
}

/// Changes the message list view has to reflect, in the order they happened
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ActiveSessionChanged {
        session_id: Option<String>,
        source: SessionSource,
    },
    /// The window was replaced by the first page of a session's history.
    HistoryLoaded {
        session_id: String,
        messages: Vec<Message>,
        has_more: bool,
    },
    /// Older messages were prepended to the window.
    OlderLoaded {
        messages: Vec<Message>,
        has_more: bool,
    },
    MessageAppended(Message),
    StreamDelta {
        message_id: String,
        delta: String,
    },
    /// The placeholder reached its final state. `marker` is the error text
    /// appended to it, if any.
    StreamFinished {
        message: Message,
        marker: Option<String>,
    },
    WindowCleared,
    SessionsListed(Vec<SessionEntry>),
    Notification(Notification),
}
