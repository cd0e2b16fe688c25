use std::path::Path;
use std::path::PathBuf;

use anyhow::Result;
use async_trait::async_trait;

use super::read_value;
use super::remove_value;
use super::write_value;
use crate::domain::models::ActiveSessionStore;

pub const ACTIVE_SESSION_FILE: &str = "active_session";

/// Keeps the active session id in a single plain text file.
pub struct FileActiveSessionStore {
    path: PathBuf,
}

impl FileActiveSessionStore {
    pub fn new(state_dir: &Path) -> Self {
        FileActiveSessionStore {
            path: state_dir.join(ACTIVE_SESSION_FILE),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl ActiveSessionStore for FileActiveSessionStore {
    async fn get_active_session_id(&self) -> Result<Option<String>> {
        read_value(&self.path).await
    }

    async fn set_active_session_id(&self, session_id: &str) -> Result<()> {
        tracing::debug!(session_id, path = %self.path.display(), "persisting active session");
        write_value(&self.path, session_id.trim()).await
    }

    async fn clear_active_session_id(&self) -> Result<()> {
        remove_value(&self.path).await
    }
}
