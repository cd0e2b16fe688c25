//! Session stream controller for the Parley chat client.
//!
//! This crate owns the client-side state of a conversation: the window of loaded
//! messages, the active session and where it came from, pagination of older
//! history, and the in-flight streamed reply. It talks to the backend only
//! through the traits in `parley-client` and persists nothing but the active
//! session id and the login credential.

pub mod configuration;
pub mod domain;
pub mod errors;
pub mod infrastructure;
pub use configuration::{Config, ConfigKey};
pub use domain::models::{
    Action, Event, Message, MessageStatus, Notification, NotificationLevel, SessionEntry,
    SessionSource, SlashCommand,
};
pub use domain::services::{Conversation, ControllerProps, Phase, SessionController};
pub use errors::ControllerError;
pub use infrastructure::storage::{FileActiveSessionStore, FileCredentialStore};
