//! Conversation state, session persistence, and the chat turn state machine.
//!
//! `SessionRepository` is the persistence port the infrastructure layer
//! implements; `ChatOrchestrator` drives one streamed turn at a time against
//! the transcript it owns.

pub mod memory;
pub mod orchestrator;
pub mod repository;
pub mod session;
pub mod transcript;
