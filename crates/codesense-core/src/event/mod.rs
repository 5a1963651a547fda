//! Client event distribution.
//!
//! Provides an `EventBus` that distributes `ClientEvent` messages to all
//! UI subscribers via a `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::EventBus;
