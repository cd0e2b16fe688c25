//! Core domain logic for the chat client.
//!
//! This module contains the conversation state machine and the models it
//! operates on, independent of the HTTP transport and of how state is rendered.

pub mod models;
pub mod services;
