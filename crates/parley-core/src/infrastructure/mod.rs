//! Infrastructure layer providing external integrations.
//!
//! This module contains the durable client-side storage used by the controller.

pub mod storage;
