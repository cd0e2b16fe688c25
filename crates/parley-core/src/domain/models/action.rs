/// User intents accepted by the session controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    SelectSession(String),
    NewChat,
    SendMessage(String),
    LoadOlder,
    DeleteSession(String),
    RefreshSessions,
    Stop,
}
