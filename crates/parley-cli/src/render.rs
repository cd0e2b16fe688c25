use parley_client::Role;
use parley_core::Event;
use parley_core::Message;
use parley_core::NotificationLevel;
use parley_core::SessionEntry;
use parley_core::SessionSource;

/// Turns controller events into plain terminal text.
///
/// Streamed text is returned without a trailing newline so chunks print
/// where the previous one stopped.
#[derive(Default)]
pub struct Renderer {
    sessions: Vec<SessionEntry>,
    active_session_id: Option<String>,
    show_sessions: bool,
    reply_only: bool,
}

impl Renderer {
    /// Renderer for `chat --message`: prints the reply and errors, nothing else.
    pub fn reply_only() -> Renderer {
        Renderer {
            reply_only: true,
            ..Renderer::default()
        }
    }

    pub fn sessions(&self) -> &[SessionEntry] {
        &self.sessions
    }

    /// Print the next session listing instead of only remembering it.
    pub fn show_sessions_next(&mut self) {
        self.show_sessions = true;
    }

    pub fn render(&mut self, event: &Event) -> String {
        if self.reply_only {
            return self.render_reply(event);
        }

        match event {
            Event::ActiveSessionChanged { session_id, source } => {
                self.active_session_id = session_id.clone();
                match (session_id, source) {
                    (None, _) => "-- new chat --\n".to_string(),
                    (Some(_), SessionSource::CreatedBySend) => String::new(),
                    (Some(id), source) => format!("-- session {id} ({source}) --\n"),
                }
            }
            Event::HistoryLoaded {
                messages, has_more, ..
            } => {
                let mut text = messages.iter().map(format_message).collect::<String>();
                if messages.is_empty() {
                    text.push_str("(no messages yet)\n");
                }
                if *has_more {
                    text.push_str("(/older loads earlier messages)\n");
                }
                text
            }
            Event::OlderLoaded { messages, has_more } => {
                let mut text = format!("-- {} earlier messages --\n", messages.len());
                text.extend(messages.iter().map(format_message));
                text.push_str(if *has_more {
                    "-- end of page, /older for more --\n"
                } else {
                    "-- start of conversation --\n"
                });
                text
            }
            Event::MessageAppended(message) => match message.role {
                // Already on screen as typed.
                Role::User => String::new(),
                _ if message.is_in_flight() => format!("{}: {}", message.role, message.text),
                _ => format_message(message),
            },
            Event::StreamDelta { delta, .. } => delta.clone(),
            Event::StreamFinished { marker, .. } => {
                format!("{}\n", marker.as_deref().unwrap_or_default())
            }
            Event::WindowCleared => String::new(),
            Event::SessionsListed(sessions) => {
                self.sessions = sessions.clone();
                if !self.show_sessions {
                    return String::new();
                }
                self.show_sessions = false;
                self.format_sessions()
            }
            Event::Notification(notification) => {
                format!("[{}] {}\n", notification.level, notification.text)
            }
        }
    }

    fn render_reply(&mut self, event: &Event) -> String {
        match event {
            Event::StreamDelta { delta, .. } => delta.clone(),
            Event::StreamFinished { marker, .. } => {
                format!("{}\n", marker.as_deref().unwrap_or_default())
            }
            Event::Notification(notification) if notification.level == NotificationLevel::Error => {
                format!("[{}] {}\n", notification.level, notification.text)
            }
            _ => String::new(),
        }
    }

    fn format_sessions(&self) -> String {
        if self.sessions.is_empty() {
            return "No sessions yet.\n".to_string();
        }

        self.sessions
            .iter()
            .enumerate()
            .map(|(index, session)| {
                let marker = if self.active_session_id.as_deref() == Some(session.id.as_str()) {
                    "*"
                } else {
                    " "
                };
                format!("{marker} {:>2}. {} ({})\n", index + 1, session.title, session.id)
            })
            .collect()
    }
}

fn format_message(message: &Message) -> String {
    format!("{}: {}\n", message.role, message.text)
}
