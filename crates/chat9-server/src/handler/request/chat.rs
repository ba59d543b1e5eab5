use chat9_engine::{Message, Params};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Request body of the chat endpoints.
///
/// The last message is the new user turn; everything before it is history.
#[must_use]
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatData {
    /// Conversation so far, oldest first.
    pub messages: Vec<Message>,
    /// Free-form parameters forwarded to the engine.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Params>,
    /// Documents retrieval is restricted to. Empty means no restriction.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_ids: Option<Vec<String>>,
}

impl ChatData {
    /// Document ids to restrict retrieval to.
    pub fn document_ids(&self) -> &[String] {
        self.document_ids.as_deref().unwrap_or_default()
    }

    /// Parameters forwarded to the engine, empty when absent.
    pub fn params(&self) -> Params {
        self.data.clone().unwrap_or_default()
    }

    /// Content of the last message.
    pub fn last_message_content(&self) -> chat9_engine::Result<&str> {
        self.messages
            .last()
            .map(Message::content)
            .ok_or_else(|| chat9_engine::Error::invalid_request("no messages provided"))
    }

    /// Every message before the last one, in order.
    pub fn history(&self) -> Vec<Message> {
        match self.messages.split_last() {
            Some((_, history)) => history.to_vec(),
            None => Vec::new(),
        }
    }
}

/// Request body of the single-message endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ChatMessage {
    /// The user's message.
    pub content: String,
}
