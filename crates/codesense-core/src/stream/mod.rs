//! Incremental decoding of the streaming chat protocol.

pub mod decoder;
