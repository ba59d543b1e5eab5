//! Request payloads accepted by the handlers.

mod chat;

pub use chat::{ChatData, ChatMessage};
