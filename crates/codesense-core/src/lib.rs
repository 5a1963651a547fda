//! Orchestration core of the CodeSense client.
//!
//! This crate defines the "ports" (the [`api::CodeSenseApi`] and
//! [`chat::repository::SessionRepository`] traits) that the infrastructure
//! layer implements, plus the logic that drives them: the streaming response
//! decoder, the ingestion coordinator, the session manager, and the chat
//! orchestrator. It depends only on `codesense-types` -- never on
//! `codesense-infra` or any HTTP/database crate.

pub mod api;
pub mod chat;
pub mod event;
pub mod ingestion;
pub mod stream;

#[cfg(test)]
pub(crate) mod testing;
