mod action;
mod event;
mod message;
mod session;
mod slash_commands;
mod storage;

pub use action::*;
pub use event::*;
pub use message::*;
pub use session::*;
pub use slash_commands::*;
pub use storage::*;
