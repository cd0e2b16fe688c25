use chrono::DateTime;
use chrono::Utc;
use parley_client::SessionSummary;
use strum_macros::Display;

const UNTITLED: &str = "New chat";

/// Where the active session id came from
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "kebab-case")]
pub enum SessionSource {
    SidebarSelected,
    CreatedBySend,
    RestoredFromStorage,
    #[default]
    None,
}

impl SessionSource {
    /// A session created by the send in flight already holds its transcript
    /// locally; every other source has to load history from the backend.
    pub fn needs_history_fetch(&self) -> bool {
        matches!(
            self,
            SessionSource::SidebarSelected | SessionSource::RestoredFromStorage
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionEntry {
    pub id: String,
    pub title: String,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
}

impl From<SessionSummary> for SessionEntry {
    fn from(summary: SessionSummary) -> Self {
        let title = summary
            .title
            .map(|title| title.trim().to_string())
            .filter(|title| !title.is_empty())
            .unwrap_or_else(|| UNTITLED.to_string());

        SessionEntry {
            id: summary.id,
            title,
            is_active: summary.is_active,
            created_at: summary.created_at,
        }
    }
}
