//! Provider specific [`ClientWrapper`](crate::client_wrapper::ClientWrapper) implementations.
//!
//! The orchestrator only depends on the trait; these clients are what the
//! demos and most applications plug into it.

pub mod common;

pub mod console;
pub mod openai;
