//! Observability setup for the CodeSense client.
//!
//! Library crates only emit `tracing` events; the embedding application calls
//! [`tracing_setup::init_tracing`] once at startup to decide where they go.

pub mod tracing_setup;
