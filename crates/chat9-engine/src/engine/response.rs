//! Chat engine responses.

use std::fmt;

use futures::stream::{self, BoxStream, StreamExt, TryStreamExt};

use crate::node::NodeWithScore;
use crate::Result;

/// Stream of generated text fragments.
pub type TokenStream = BoxStream<'static, Result<String>>;

/// Complete answer of a chat engine.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatResponse {
    /// Generated answer text.
    pub response: String,
    /// Nodes cited by the answer.
    pub source_nodes: Vec<NodeWithScore>,
}

impl ChatResponse {
    /// Creates a response.
    pub fn new(response: impl Into<String>, source_nodes: Vec<NodeWithScore>) -> Self {
        Self {
            response: response.into(),
            source_nodes,
        }
    }
}

impl fmt::Display for ChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.response)
    }
}

/// Handle to an answer that is still being generated.
pub struct StreamingChatResponse {
    source_nodes: Vec<NodeWithScore>,
    tokens: TokenStream,
}

impl StreamingChatResponse {
    /// Creates a handle from cited nodes and a token stream.
    pub fn new(source_nodes: Vec<NodeWithScore>, tokens: TokenStream) -> Self {
        Self {
            source_nodes,
            tokens,
        }
    }

    /// Creates a handle whose stream yields the given fragments.
    pub fn from_tokens(source_nodes: Vec<NodeWithScore>, tokens: Vec<String>) -> Self {
        Self::new(source_nodes, stream::iter(tokens.into_iter().map(Ok)).boxed())
    }

    /// Returns the cited nodes.
    pub fn source_nodes(&self) -> &[NodeWithScore] {
        &self.source_nodes
    }

    /// Splits the handle into nodes and token stream.
    pub fn into_parts(self) -> (Vec<NodeWithScore>, TokenStream) {
        (self.source_nodes, self.tokens)
    }

    /// Waits for generation to finish and returns the complete answer.
    pub async fn collect(self) -> Result<ChatResponse> {
        let response = self.tokens.try_collect::<Vec<_>>().await?.concat();
        Ok(ChatResponse::new(response, self.source_nodes))
    }
}

impl fmt::Debug for StreamingChatResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamingChatResponse")
            .field("source_nodes", &self.source_nodes)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;

    #[tokio::test]
    async fn collect_concatenates_tokens() -> anyhow::Result<()> {
        let nodes = vec![NodeWithScore::new("n1", "text")];
        let handle = StreamingChatResponse::from_tokens(
            nodes.clone(),
            vec!["an".to_owned(), "swer".to_owned()],
        );

        let response = handle.collect().await?;
        assert_eq!(response.response, "answer");
        assert_eq!(response.source_nodes, nodes);
        assert_eq!(response.to_string(), "answer");
        Ok(())
    }

    #[tokio::test]
    async fn collect_surfaces_stream_errors() {
        let tokens = stream::iter(vec![Ok("partial".to_owned()), Err(Error::stream("closed"))]);
        let handle = StreamingChatResponse::new(Vec::new(), tokens.boxed());

        let error = handle.collect().await.err();
        assert!(matches!(error, Some(Error::Stream(_))));
    }
}
