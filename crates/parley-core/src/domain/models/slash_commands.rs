#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlashCommand {
    pub command: String,
    pub args: Vec<String>,
}

impl SlashCommand {
    pub fn parse(text: &str) -> Option<SlashCommand> {
        let text = text.trim();
        if !text.starts_with('/') {
            return None;
        }

        let mut parts = text.split_whitespace();
        let command = parts.next()?.to_lowercase();
        if command.len() < 2 {
            return None;
        }

        Some(SlashCommand {
            command,
            args: parts.map(str::to_string).collect(),
        })
    }

    /// First argument, used as a session reference by `/select` and `/delete`.
    pub fn target(&self) -> Option<&str> {
        self.args.first().map(String::as_str)
    }

    pub fn is_new_chat(&self) -> bool {
        self.command == "/new" || self.command == "/n"
    }

    pub fn is_sessions(&self) -> bool {
        self.command == "/sessions" || self.command == "/s"
    }

    pub fn is_select(&self) -> bool {
        self.command == "/select" || self.command == "/open"
    }

    pub fn is_delete(&self) -> bool {
        self.command == "/delete" || self.command == "/rm"
    }

    pub fn is_load_older(&self) -> bool {
        self.command == "/older" || self.command == "/more"
    }

    pub fn is_stop(&self) -> bool {
        self.command == "/stop"
    }

    pub fn is_help(&self) -> bool {
        self.command == "/help" || self.command == "/h"
    }

    pub fn is_quit(&self) -> bool {
        self.command == "/quit" || self.command == "/exit" || self.command == "/q"
    }
}
