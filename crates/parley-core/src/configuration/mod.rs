//! Configuration management for the chat client.
//!
//! This module provides centralized configuration handling for the backend
//! endpoint, pagination, timeouts and the local state directory.

mod config;

pub use config::*;
