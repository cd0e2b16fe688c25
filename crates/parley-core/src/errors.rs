//! Errors surfaced by controller operations.
//!
//! None of these are fatal: the controller turns each one into a notification
//! and keeps running.

use parley_client::ClientError;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ControllerError {
    #[error(transparent)]
    Client(#[from] ClientError),
    #[error("A reply is still streaming, wait for it to finish or stop it")]
    SendInFlight,
    #[error("Cannot send an empty message")]
    EmptyMessage,
    #[error("Messages of this session are still loading, send again once they are shown")]
    HistoryLoading,
    #[error("No active session")]
    NoActiveSession,
    #[error("Storage error: {0}")]
    Storage(String),
}

impl ControllerError {
    pub fn storage(err: anyhow::Error) -> Self {
        ControllerError::Storage(format!("{err:#}"))
    }
}
