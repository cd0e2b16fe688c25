//! Client SDK for the Parley chat backend
//!
//! This crate describes the backend contract the session controller depends on
//! as two traits, one for the session catalogue and its message history and one
//! for the streaming chat endpoint, and ships the reqwest implementation of both.
//! Keeping the contract behind traits lets the controller run against in-memory
//! fakes in tests and against the real HTTP backend in the binary.

use async_trait::async_trait;
use futures::Stream;
use std::pin::Pin;

pub mod auth;
pub mod decoder;
pub mod errors;
pub mod http_client;
pub mod types;

pub use errors::ClientError;
pub use types::*;

/// Incremental events produced by one streaming chat call, in arrival order.
pub type ChatStream = Pin<Box<dyn Stream<Item = Result<StreamEvent, ClientError>> + Send>>;

/// Session catalogue and paginated message history
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// List the caller's sessions, newest first as the backend orders them
    async fn list_sessions(&self, credential: &Credential)
        -> Result<Vec<SessionSummary>, ClientError>;

    /// Fetch one page of a session's history, oldest first within the page
    async fn fetch_messages(
        &self,
        credential: &Credential,
        session_id: &str,
        page: PageRequest,
    ) -> Result<Vec<Message>, ClientError>;

    /// Delete a session and its messages
    async fn delete_session(&self, credential: &Credential, session_id: &str)
        -> Result<(), ClientError>;
}

/// Streaming chat completion endpoint
#[async_trait]
pub trait ChatTransport: Send + Sync {
    /// Send a user message and receive the assistant reply as a stream of events.
    ///
    /// When the request carries no conversation id the backend creates a session
    /// and the stream starts with [`StreamEvent::SessionAssigned`].
    async fn stream_chat(
        &self,
        credential: &Credential,
        request: ChatRequest,
    ) -> Result<ChatStream, ClientError>;
}

/// Factory for creating backend clients
pub struct ClientFactory;

impl ClientFactory {
    /// Create an HTTP client for a remote backend
    pub fn create_http_client(base_url: String) -> http_client::HttpBackendClient {
        http_client::HttpBackendClient::new(base_url)
    }
}
