use chat9_engine::{ChatResponse, Message, Metadata, NodeWithScore};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::service::FileServer;

/// A retrieved node cited by an answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct SourceNode {
    pub id: String,
    pub metadata: Metadata,
    pub score: Option<f64>,
    pub text: String,
    /// Public link to the source document, when one can be built.
    pub url: Option<String>,
}

impl SourceNode {
    /// Converts an engine node, linking it through the file server.
    pub fn from_node(node: &NodeWithScore, files: &FileServer) -> Self {
        Self {
            id: node.id().to_owned(),
            metadata: node.metadata().clone(),
            score: node.score(),
            text: node.text().to_owned(),
            url: files.node_url(node.metadata()),
        }
    }

    /// Converts every node in order.
    pub fn from_nodes(nodes: &[NodeWithScore], files: &FileServer) -> Vec<Self> {
        nodes
            .iter()
            .map(|node| Self::from_node(node, files))
            .collect()
    }
}

/// Chat UI settings returned by `GET /api/chat/config`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ChatConfig {
    pub starter_questions: Option<Vec<String>>,
}

/// Complete answer returned by `POST /api/chat/request`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ChatResult {
    /// The assistant's answer.
    pub result: Message,
    /// Nodes the answer was grounded on.
    pub nodes: Vec<SourceNode>,
}

impl ChatResult {
    /// Builds the result from a collected engine response.
    pub fn new(response: ChatResponse, files: &FileServer) -> Self {
        let nodes = SourceNode::from_nodes(&response.source_nodes, files);
        Self {
            result: Message::assistant(response.response),
            nodes,
        }
    }
}

/// Answer returned by `POST /api/chat/message`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ChatReply {
    pub content: String,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn result_is_an_assistant_message() -> anyhow::Result<()> {
        let files = FileServer::new("data", "output", Some("/api/files".to_owned()));
        let response = ChatResponse::new(
            "answer",
            vec![
                NodeWithScore::new("n1", "first")
                    .with_score(0.9)
                    .with_metadata_entry("file_name", "a.md"),
                NodeWithScore::new("n2", "second"),
            ],
        );

        let json = serde_json::to_value(ChatResult::new(response, &files))?;
        assert_eq!(json["result"], json!({"role": "assistant", "content": "answer"}));
        assert_eq!(json["nodes"][0]["id"], "n1");
        assert_eq!(json["nodes"][0]["score"], 0.9);
        assert_eq!(json["nodes"][0]["url"], "/api/files/data/a.md");
        assert_eq!(json["nodes"][1]["id"], "n2");
        assert!(json["nodes"][1]["url"].is_null());
        Ok(())
    }
}
