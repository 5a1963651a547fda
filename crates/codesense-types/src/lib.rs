//! Shared domain types for the CodeSense client.
//!
//! This crate contains the types used across the client workspace:
//! chat messages and sessions, ingestion jobs and repositories, the
//! streaming chat wire protocol, client events, configuration, and the
//! associated error types.
//!
//! Zero infrastructure dependencies -- only serde, uuid, chrono, thiserror.

pub mod chat;
pub mod config;
pub mod error;
pub mod event;
pub mod identity;
pub mod ingestion;
pub mod stream;
