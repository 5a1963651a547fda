//! HTTP access to the code-intelligence service.

pub mod client;

pub use client::HttpCodeSenseApi;
