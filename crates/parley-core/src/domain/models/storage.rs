use anyhow::Result;
use async_trait::async_trait;
use parley_client::Credential;

/// Durable storage of the active session id, so a restart resumes the same
/// conversation. A missing or blank value means no active session.
#[async_trait]
pub trait ActiveSessionStore: Send + Sync {
    async fn get_active_session_id(&self) -> Result<Option<String>>;
    async fn set_active_session_id(&self, session_id: &str) -> Result<()>;
    async fn clear_active_session_id(&self) -> Result<()>;
}

/// Durable storage of the bearer credential obtained at login
#[async_trait]
pub trait CredentialStore: Send + Sync {
    async fn load(&self) -> Result<Option<Credential>>;
    async fn save(&self, credential: &Credential) -> Result<()>;
    async fn clear(&self) -> Result<()>;
}
