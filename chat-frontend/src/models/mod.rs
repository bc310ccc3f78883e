//! Domain models for the chat front-end.

pub mod message;

pub use message::{ChatMessage, ChatRole};
