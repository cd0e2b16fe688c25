//! Command-line client for the Parley chat backend
//!
//! Wires the HTTP backend client and the file-backed stores into the session
//! controller, and drives it from a plain line-mode chat on stdin/stdout. The
//! account commands talk to the auth endpoints directly.

pub mod account;
pub mod backend;
pub mod chat;
pub mod input;
pub mod render;
