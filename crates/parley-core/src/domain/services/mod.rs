mod controller;
mod conversation;

pub use controller::*;
pub use conversation::*;
