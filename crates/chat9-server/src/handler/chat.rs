//! Chat handlers answering questions over the indexed documents.
//!
//! Every request builds a fresh engine restricted to the requested
//! documents. `POST /api/chat` streams the answer as server-sent events,
//! `POST /api/chat/request` returns it in one JSON body. Both schedule
//! downloads of the cited files in the background.
//!
//! `POST /api/chat/message` answers a single message with the unfiltered
//! engine built at startup. `GET /api/chat/config` returns the starter
//! questions of the chat UI.

use aide::axum::ApiRouter;
use aide::transform::TransformOperation;
use axum::extract::State;
use chat9_engine::{
    ChatEngineService, EngineOptions, EventCallbackHandler, SharedChatEngine,
    StreamingChatResponse, generate_filters,
};

use crate::extract::Json;
use crate::handler::request::{ChatData, ChatMessage};
use crate::handler::response::{ChatConfig, ChatReply, ChatResult, ChatStream, ErrorResponse};
use crate::handler::{ErrorKind, Result};
use crate::service::{FileServer, PostProcessor, ServiceState, StarterQuestions};

/// Tracing target for chat operations.
const TRACING_TARGET: &str = "chat9_server::handler::chat";

/// Builds a request-scoped engine and starts generating the answer.
async fn start_chat(
    engines: &ChatEngineService,
    data: &ChatData,
    events: Option<EventCallbackHandler>,
) -> chat9_engine::Result<StreamingChatResponse> {
    let filters = generate_filters(data.document_ids());

    tracing::info!(
        target: TRACING_TARGET,
        filters = %filters,
        document_count = data.document_ids().len(),
        "Creating chat engine"
    );

    let mut options = EngineOptions::new()
        .with_filters(filters)
        .with_params(data.params());
    if let Some(events) = events {
        options = options.with_event_handler(events);
    }

    let engine = engines.chat_engine(options).await?;

    let content = data.last_message_content()?;
    let history = data.history();

    engine.stream_chat(content, history).await
}

/// Streams an answer as server-sent events.
#[tracing::instrument(skip_all, fields(message_count = data.messages.len()))]
async fn chat(
    State(engines): State<ChatEngineService>,
    State(post_processor): State<PostProcessor>,
    State(file_server): State<FileServer>,
    Json(data): Json<ChatData>,
) -> Result<ChatStream> {
    let (event_handler, events) = EventCallbackHandler::channel();
    let response = start_chat(&engines, &data, Some(event_handler)).await?;

    post_processor.process_response_nodes(response.source_nodes());

    tracing::debug!(
        target: TRACING_TARGET,
        node_count = response.source_nodes().len(),
        "Streaming chat response"
    );

    Ok(ChatStream::new(response, events, data, file_server))
}

/// Returns the complete answer with its source nodes.
#[tracing::instrument(skip_all, fields(message_count = data.messages.len()))]
async fn chat_request(
    State(engines): State<ChatEngineService>,
    State(post_processor): State<PostProcessor>,
    State(file_server): State<FileServer>,
    Json(data): Json<ChatData>,
) -> Result<Json<ChatResult>> {
    let response = start_chat(&engines, &data, None).await?;

    post_processor.process_response_nodes(response.source_nodes());

    let response = response.collect().await?;

    tracing::debug!(
        target: TRACING_TARGET,
        node_count = response.source_nodes.len(),
        content_len = response.response.len(),
        "Chat request answered"
    );

    Ok(Json(ChatResult::new(response, &file_server)))
}

fn chat_request_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Answer chat")
        .description(
            "Answers the last message of the conversation and returns the complete answer \
             with the source nodes it was grounded on.",
        )
        .response::<200, Json<ChatResult>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<500, Json<ErrorResponse>>()
}

/// Answers a single message with the shared engine.
#[tracing::instrument(skip_all, fields(content_len = message.content.len()))]
async fn chat_message(
    State(engine): State<SharedChatEngine>,
    Json(message): Json<ChatMessage>,
) -> Result<Json<ChatReply>> {
    let response = engine.chat(&message.content).await.map_err(|error| {
        tracing::error!(
            target: TRACING_TARGET,
            error = %error,
            error_kind = %error.kind(),
            "Error in chat endpoint"
        );
        ErrorKind::InternalServerError.with_detail(error.to_string())
    })?;

    Ok(Json(ChatReply {
        content: response.to_string(),
    }))
}

fn chat_message_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Send message")
        .description("Answers a single message without history or document filters.")
        .response::<200, Json<ChatReply>>()
        .response::<400, Json<ErrorResponse>>()
        .response::<500, Json<ErrorResponse>>()
}

/// Returns the chat UI configuration.
async fn chat_config(State(starters): State<StarterQuestions>) -> Json<ChatConfig> {
    Json(ChatConfig {
        starter_questions: starters.questions().map(<[String]>::to_vec),
    })
}

fn chat_config_docs(op: TransformOperation) -> TransformOperation {
    op.summary("Get chat configuration")
        .description("Returns the starter questions offered before the first message.")
        .response::<200, Json<ChatConfig>>()
}

/// Returns routes for chat.
pub fn routes() -> ApiRouter<ServiceState> {
    use aide::axum::routing::*;

    ApiRouter::new()
        // SSE endpoint - uses regular axum routing as aide doesn't document SSE
        .route("/api/chat", axum::routing::post(chat))
        .api_route("/api/chat/request", post_with(chat_request, chat_request_docs))
        .api_route("/api/chat/message", post_with(chat_message, chat_message_docs))
        .api_route("/api/chat/config", get_with(chat_config, chat_config_docs))
        .with_path_items(|item| item.tag("Chat"))
}

#[cfg(test)]
mod tests {
    use std::path::Path;
    use std::time::Duration;

    use axum::http::StatusCode;
    use chat9_engine::provider::{MockConfig, MockProvider};
    use chat9_engine::{Message, MetadataFilters, NodeWithScore, generate_filters};
    use serde_json::{Value, json};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use crate::handler::test::{
        create_test_server, create_test_server_with, create_test_server_with_provider,
    };
    use crate::service::{FileDownloadService, PostProcessor};

    fn provider() -> MockProvider {
        MockProvider::new(MockConfig::default())
    }

    /// Serves one LlamaCloud pipeline file, `p1/report.pdf`.
    async fn llama_cloud() -> MockServer {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/api/v1/pipelines/p1/files"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([{"name": "report.pdf", "file_id": "f1"}])),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/api/v1/files/f1/content"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"url": format!("{}/blob/f1", server.uri())})),
            )
            .mount(&server)
            .await;

        Mock::given(method("GET"))
            .and(path("/blob/f1"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"%PDF-1.7".to_vec()))
            .expect(1)
            .mount(&server)
            .await;

        server
    }

    fn downloading_processor(server: &MockServer, dir: &Path) -> anyhow::Result<PostProcessor> {
        let downloads =
            FileDownloadService::new(&server.uri(), "llx-test", dir, Duration::from_secs(5))?;
        Ok(PostProcessor::new(Some(downloads)))
    }

    fn cited_pipeline_file() -> MockProvider {
        provider().with_response("answer").with_nodes(vec![
            NodeWithScore::new("n1", "cited")
                .with_metadata_entry("pipeline_id", "p1")
                .with_metadata_entry("file_name", "report.pdf"),
        ])
    }

    /// Parses an SSE body into `(event, data)` pairs.
    fn sse_events(body: &str) -> Vec<(String, Value)> {
        body.split("\n\n")
            .filter_map(|block| {
                let mut name = None;
                let mut data = None;
                for line in block.lines() {
                    if let Some(value) = line.strip_prefix("event:") {
                        name = Some(value.trim().to_owned());
                    } else if let Some(value) = line.strip_prefix("data:") {
                        data = serde_json::from_str(value.trim()).ok();
                    }
                }
                Some((name?, data?))
            })
            .collect()
    }

    #[tokio::test]
    async fn stream_without_documents_is_unrestricted() -> anyhow::Result<()> {
        let provider = provider().with_response("Hello there");
        let server = create_test_server_with_provider(provider.clone()).await?;

        let response = server
            .post("/api/chat")
            .json(&json!({
                "messages": [{"role": "user", "content": "hi"}],
                "documentIds": []
            }))
            .await;
        response.assert_status_ok();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message, "hi");
        assert!(calls[0].history.is_empty());
        assert_eq!(calls[0].filters, MetadataFilters::unrestricted());

        let events = sse_events(&response.text());
        let (last_name, last_data) = events.last().cloned().unwrap_or_default();
        assert_eq!(last_name, "done");
        assert_eq!(last_data["content"], "Hello there");

        let text: String = events
            .iter()
            .filter(|(name, _)| name == "text")
            .filter_map(|(_, data)| data["delta"].as_str())
            .collect();
        assert_eq!(text, "Hello there");

        assert!(events.iter().any(|(name, _)| name == "events"));
        assert!(events.iter().any(|(name, _)| name == "sources"));
        Ok(())
    }

    #[tokio::test]
    async fn stream_passes_history_and_filters() -> anyhow::Result<()> {
        let provider = provider();
        let server = create_test_server_with_provider(provider.clone()).await?;

        server
            .post("/api/chat")
            .json(&json!({
                "messages": [
                    {"role": "user", "content": "a"},
                    {"role": "assistant", "content": "b"},
                    {"role": "user", "content": "c"}
                ],
                "documentIds": ["d1", "d1", "d2"],
                "data": {"top_k": 2}
            }))
            .await
            .assert_status_ok();

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message, "c");
        assert_eq!(
            calls[0].history,
            vec![Message::user("a"), Message::assistant("b")]
        );
        assert_eq!(
            calls[0].filters,
            generate_filters(&["d1".to_owned(), "d2".to_owned()])
        );
        assert_eq!(calls[0].params.get("top_k"), Some(&json!(2)));
        Ok(())
    }

    #[tokio::test]
    async fn stream_sources_only_include_requested_documents() -> anyhow::Result<()> {
        let provider = provider().with_nodes(vec![
            NodeWithScore::new("n1", "first").with_metadata_entry("doc_id", "d1"),
            NodeWithScore::new("n2", "second").with_metadata_entry("doc_id", "d2"),
        ]);
        let server = create_test_server_with_provider(provider).await?;

        let response = server
            .post("/api/chat")
            .json(&json!({
                "messages": [{"role": "user", "content": "hi"}],
                "documentIds": ["d2"]
            }))
            .await;
        response.assert_status_ok();

        let events = sse_events(&response.text());
        let sources = events
            .iter()
            .find(|(name, _)| name == "sources")
            .map(|(_, data)| data["nodes"].clone())
            .unwrap_or_default();
        assert_eq!(sources.as_array().map(Vec::len), Some(1));
        assert_eq!(sources[0]["id"], "n2");
        Ok(())
    }

    #[tokio::test]
    async fn engine_failure_is_reported_as_500() -> anyhow::Result<()> {
        let server = create_test_server_with_provider(provider().with_failure("offline")).await?;

        let response = server
            .post("/api/chat")
            .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        let detail = body["detail"].as_str().unwrap_or_default();
        assert!(detail.starts_with("Error in chat engine:"));
        assert!(detail.contains("offline"));
        Ok(())
    }

    #[tokio::test]
    async fn empty_conversation_is_reported_as_500() -> anyhow::Result<()> {
        let server = create_test_server().await?;

        let response = server
            .post("/api/chat")
            .json(&json!({"messages": []}))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.starts_with("Error in chat engine:"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn malformed_json_is_a_bad_request() -> anyhow::Result<()> {
        let server = create_test_server().await?;

        let response = server
            .post("/api/chat")
            .text("{not json")
            .content_type("application/json")
            .await;

        response.assert_status_bad_request();
        let body: Value = response.json();
        assert_eq!(body["name"], "bad_request");
        Ok(())
    }

    #[tokio::test]
    async fn request_returns_complete_result() -> anyhow::Result<()> {
        let provider = provider().with_response("answer").with_nodes(vec![
            NodeWithScore::new("n1", "first").with_score(0.8),
            NodeWithScore::new("n2", "second").with_score(0.5),
        ]);
        let server = create_test_server_with_provider(provider.clone()).await?;

        let response = server
            .post("/api/chat/request")
            .json(&json!({"messages": [{"role": "user", "content": "question"}]}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(
            body["result"],
            json!({"role": "assistant", "content": "answer"})
        );
        assert_eq!(body["nodes"][0]["id"], "n1");
        assert_eq!(body["nodes"][1]["id"], "n2");
        assert_eq!(body["nodes"].as_array().map(Vec::len), Some(2));

        let calls = provider.calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].message, "question");
        Ok(())
    }

    #[tokio::test]
    async fn request_applies_document_filters() -> anyhow::Result<()> {
        let provider = provider().with_nodes(vec![
            NodeWithScore::new("n1", "first").with_metadata_entry("doc_id", "d1"),
            NodeWithScore::new("n2", "second").with_metadata_entry("doc_id", "d2"),
        ]);
        let server = create_test_server_with_provider(provider).await?;

        let response = server
            .post("/api/chat/request")
            .json(&json!({
                "messages": [{"role": "user", "content": "hi"}],
                "documentIds": ["d1"]
            }))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["nodes"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["nodes"][0]["id"], "n1");
        Ok(())
    }

    #[tokio::test]
    async fn request_failure_uses_the_same_error_body() -> anyhow::Result<()> {
        let server = create_test_server_with_provider(provider().with_failure("offline")).await?;

        let response = server
            .post("/api/chat/request")
            .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
            .await;

        response.assert_status(StatusCode::INTERNAL_SERVER_ERROR);
        let body: Value = response.json();
        assert!(
            body["detail"]
                .as_str()
                .is_some_and(|detail| detail.starts_with("Error in chat engine:"))
        );
        Ok(())
    }

    #[tokio::test]
    async fn stream_downloads_cited_pipeline_files() -> anyhow::Result<()> {
        let llama_cloud = llama_cloud().await;
        let dir = tempfile::tempdir()?;
        let post_processor = downloading_processor(&llama_cloud, dir.path())?;
        let server = create_test_server_with(cited_pipeline_file(), post_processor.clone()).await?;

        server
            .post("/api/chat")
            .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
            .await
            .assert_status_ok();

        assert!(post_processor.shutdown(Duration::from_secs(5)).await);
        assert_eq!(
            tokio::fs::read(dir.path().join("p1$report.pdf")).await?,
            b"%PDF-1.7"
        );
        Ok(())
    }

    #[tokio::test]
    async fn request_downloads_cited_pipeline_files() -> anyhow::Result<()> {
        let llama_cloud = llama_cloud().await;
        let dir = tempfile::tempdir()?;
        let post_processor = downloading_processor(&llama_cloud, dir.path())?;
        let server = create_test_server_with(cited_pipeline_file(), post_processor.clone()).await?;

        let response = server
            .post("/api/chat/request")
            .json(&json!({"messages": [{"role": "user", "content": "hi"}]}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["nodes"][0]["id"], "n1");

        assert!(post_processor.shutdown(Duration::from_secs(5)).await);
        assert!(dir.path().join("p1$report.pdf").exists());
        Ok(())
    }

    #[tokio::test]
    async fn config_returns_starter_questions() -> anyhow::Result<()> {
        let server = create_test_server().await?;

        let response = server.get("/api/chat/config").await;
        response.assert_status_ok();
        response.assert_json(&json!({"starterQuestions": ["What is in the report?"]}));
        Ok(())
    }

    #[tokio::test]
    async fn message_uses_the_shared_engine() -> anyhow::Result<()> {
        let server = create_test_server_with_provider(provider().with_response("pong")).await?;

        let response = server
            .post("/api/chat/message")
            .json(&json!({"content": "ping"}))
            .await;
        response.assert_status_ok();
        response.assert_json(&json!({"content": "pong"}));
        Ok(())
    }

    #[tokio::test]
    async fn message_echoes_without_canned_response() -> anyhow::Result<()> {
        let server = create_test_server().await?;

        let response = server
            .post("/api/chat/message")
            .json(&json!({"content": "ping"}))
            .await;
        response.assert_json(&json!({"content": "You said: ping"}));
        Ok(())
    }
}
