//! Infrastructure layer for the CodeSense client.
//!
//! Contains implementations of the ports defined in `codesense-core`: the
//! reqwest-based service client, SQLite session storage, configuration
//! loading, and the `CodeSenseClient` that wires them together.

pub mod client;
pub mod config;
pub mod http;
pub mod sqlite;

pub use client::CodeSenseClient;
