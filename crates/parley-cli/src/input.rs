use parley_core::Action;
use parley_core::SessionEntry;
use parley_core::SlashCommand;

pub fn help_text() -> String {
    let text = r#"
COMMANDS:
- /new (/n) - Start a new chat.
- /sessions (/s) - List your sessions.
- /select (/open) [NUMBER|ID] - Open a session from the last listing, or by id.
- /delete (/rm) [NUMBER|ID] - Delete a session.
- /older (/more) - Load earlier messages of the open session.
- /stop - Stop the reply that is streaming.
- /help (/h) - Show this help.
- /quit /exit (/q) - Exit.

Any other line is sent as a message. CTRL+C stops a streaming reply, or exits when nothing is streaming.
"#;

    text.trim().to_string()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Action(Action),
    Help,
    Quit,
    Invalid(String),
    Empty,
}

/// Maps a line typed in chat mode to what it asks for. Session numbers refer
/// to `sessions`, the last listing shown.
pub fn parse_line(line: &str, sessions: &[SessionEntry]) -> Input {
    let line = line.trim();
    if line.is_empty() {
        return Input::Empty;
    }

    let Some(command) = SlashCommand::parse(line) else {
        return Input::Action(Action::SendMessage(line.to_string()));
    };

    if command.is_quit() {
        return Input::Quit;
    }
    if command.is_help() {
        return Input::Help;
    }
    if command.is_new_chat() {
        return Input::Action(Action::NewChat);
    }
    if command.is_sessions() {
        return Input::Action(Action::RefreshSessions);
    }
    if command.is_load_older() {
        return Input::Action(Action::LoadOlder);
    }
    if command.is_stop() {
        return Input::Action(Action::Stop);
    }
    if command.is_select() || command.is_delete() {
        let Some(target) = command.target() else {
            return Input::Invalid(format!("{} needs a session number or id", command.command));
        };
        let session_id = match resolve_session(target, sessions) {
            Ok(session_id) => session_id,
            Err(message) => return Input::Invalid(message),
        };

        if command.is_select() {
            return Input::Action(Action::SelectSession(session_id));
        }
        return Input::Action(Action::DeleteSession(session_id));
    }

    Input::Invalid(format!("Unknown command {}, try /help", command.command))
}

fn resolve_session(target: &str, sessions: &[SessionEntry]) -> Result<String, String> {
    let Ok(number) = target.parse::<usize>() else {
        return Ok(target.to_string());
    };

    // Purely numeric ids that match no listed position are taken as ids.
    match number.checked_sub(1).and_then(|index| sessions.get(index)) {
        Some(session) => Ok(session.id.clone()),
        None if sessions.iter().any(|session| session.id == target) => Ok(target.to_string()),
        None if sessions.is_empty() => Ok(target.to_string()),
        None => Err(format!(
            "No session #{number}, the listing has {} entries",
            sessions.len()
        )),
    }
}
