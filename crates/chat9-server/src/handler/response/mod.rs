//! Response payloads returned by the handlers.

mod chat;
mod error_response;
mod stream;

pub use chat::{ChatConfig, ChatReply, ChatResult, SourceNode};
pub use error_response::ErrorResponse;
pub use stream::{ChatStream, ChatStreamEvent};
