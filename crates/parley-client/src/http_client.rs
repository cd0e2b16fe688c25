use async_trait::async_trait;
use futures_util::StreamExt;
use std::time::Duration;

use crate::decoder::Utf8ChunkDecoder;
use crate::{
    ChatRequest, ChatStream, ChatTransport, ClientError, Credential, Message, PageRequest,
    SessionStore, SessionSummary, StreamEvent,
};

/// Response header carrying the id of a session created by `POST /chat`
pub const SESSION_ID_HEADER: &str = "x-session-id";

/// HTTP client for the chat backend
pub struct HttpBackendClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpBackendClient {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout: Duration::from_secs(30),
        }
    }

    /// Timeout for request/response calls. Streams are not bounded by it.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub(crate) fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub(crate) fn http(&self) -> &reqwest::Client {
        &self.client
    }

    pub(crate) fn timeout(&self) -> Duration {
        self.timeout
    }
}

pub(crate) async fn error_for_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, ClientError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "Failed to read error body".to_string());
    tracing::error!(status = status.as_u16(), body = %body, "backend request failed");
    Err(ClientError::from_status(status, body))
}

#[async_trait]
impl SessionStore for HttpBackendClient {
    async fn list_sessions(
        &self,
        credential: &Credential,
    ) -> Result<Vec<SessionSummary>, ClientError> {
        let response = self
            .client
            .get(self.url("/chat/sessions"))
            .header("Authorization", credential.bearer())
            .timeout(self.timeout)
            .send()
            .await?;

        let sessions = error_for_status(response)
            .await?
            .json::<Vec<SessionSummary>>()
            .await?;
        tracing::debug!(count = sessions.len(), "listed sessions");
        Ok(sessions)
    }

    async fn fetch_messages(
        &self,
        credential: &Credential,
        session_id: &str,
        page: PageRequest,
    ) -> Result<Vec<Message>, ClientError> {
        let path = format!(
            "/chat/sessions/{}/messages",
            urlencoding::encode(session_id)
        );
        let response = self
            .client
            .get(self.url(&path))
            .header("Authorization", credential.bearer())
            .query(&[("limit", page.limit), ("offset", page.offset)])
            .timeout(self.timeout)
            .send()
            .await?;

        let messages = error_for_status(response)
            .await?
            .json::<Vec<Message>>()
            .await?;
        tracing::debug!(
            session_id = session_id,
            offset = page.offset,
            returned = messages.len(),
            "fetched history page"
        );
        Ok(messages)
    }

    async fn delete_session(
        &self,
        credential: &Credential,
        session_id: &str,
    ) -> Result<(), ClientError> {
        let path = format!("/chat/sessions/{}", urlencoding::encode(session_id));
        let response = self
            .client
            .delete(self.url(&path))
            .header("Authorization", credential.bearer())
            .timeout(self.timeout)
            .send()
            .await?;

        error_for_status(response).await?;
        tracing::debug!(session_id = session_id, "deleted session");
        Ok(())
    }
}

#[async_trait]
impl ChatTransport for HttpBackendClient {
    async fn stream_chat(
        &self,
        credential: &Credential,
        request: ChatRequest,
    ) -> Result<ChatStream, ClientError> {
        let response = self
            .client
            .post(self.url("/chat"))
            .header("Content-Type", "application/json")
            .header("Accept", "text/plain")
            .header("Authorization", credential.bearer())
            .json(&request)
            .send()
            .await?;

        let response = error_for_status(response).await?;

        // Only a conversation started without an id learns its id here.
        let assigned = if request.conversation_id.is_none() {
            response
                .headers()
                .get(SESSION_ID_HEADER)
                .and_then(|value| value.to_str().ok())
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        } else {
            None
        };

        let mut bytes = Box::pin(response.bytes_stream());

        let event_stream = async_stream::stream! {
            if let Some(session_id) = assigned {
                yield Ok(StreamEvent::SessionAssigned(session_id));
            }

            let mut decoder = Utf8ChunkDecoder::new();
            while let Some(chunk) = bytes.next().await {
                match chunk {
                    Ok(chunk) => {
                        let text = decoder.push(&chunk);
                        if !text.is_empty() {
                            yield Ok(StreamEvent::TextDelta(text));
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, "chat stream interrupted");
                        yield Err(ClientError::StreamInterrupted(err.to_string()));
                        return;
                    }
                }
            }

            if let Some(rest) = decoder.finish() {
                yield Ok(StreamEvent::TextDelta(rest));
            }
        };

        Ok(Box::pin(event_stream))
    }
}
