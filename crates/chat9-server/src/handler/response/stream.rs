//! Server-sent event transport for streaming chat answers.
//!
//! [`ChatStream`] is returned directly as the handler's response body. On
//! conversion it spawns a producer task that relays engine events and
//! tokens as they arrive, then sends the cited sources and the full answer.
//! Dropping the client connection closes the channel and stops the task.

use std::convert::Infallible;

use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use chat9_engine::{ChatEvent, EventReceiver, StreamingChatResponse};
use futures::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use super::SourceNode;
use crate::handler::request::ChatData;
use crate::service::FileServer;

/// Tracing target for the chat stream.
const TRACING_TARGET: &str = "chat9_server::handler::stream";

/// Capacity of the channel between the producer and the response body.
const STREAM_BUFFER: usize = 32;

/// A single server-sent event of a chat stream.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatStreamEvent {
    /// A chunk of the answer.
    Text { delta: String },
    /// Engine progress.
    Events { title: String, event: ChatEvent },
    /// Nodes the answer was grounded on.
    Sources { nodes: Vec<SourceNode> },
    /// The complete answer; always the last event of a successful stream.
    Done { content: String },
    /// The stream failed after it started.
    Error { message: String },
}

impl ChatStreamEvent {
    /// Wraps an engine event with its display title.
    pub fn from_event(event: ChatEvent) -> Self {
        Self::Events {
            title: event.title(),
            event,
        }
    }

    /// Returns the SSE event name.
    pub fn event_type(&self) -> &'static str {
        match self {
            Self::Text { .. } => "text",
            Self::Events { .. } => "events",
            Self::Sources { .. } => "sources",
            Self::Done { .. } => "done",
            Self::Error { .. } => "error",
        }
    }

    /// Encodes the event for the wire.
    fn to_sse(&self) -> Option<Event> {
        match serde_json::to_string(self) {
            Ok(data) => Some(Event::default().event(self.event_type()).data(data)),
            Err(error) => {
                tracing::error!(
                    target: TRACING_TARGET,
                    event_type = self.event_type(),
                    error = %error,
                    "Failed to serialize stream event"
                );
                None
            }
        }
    }
}

type EventSender = mpsc::Sender<Result<Event, Infallible>>;

/// Streaming response for one chat request.
pub struct ChatStream {
    response: StreamingChatResponse,
    events: EventReceiver,
    data: ChatData,
    files: FileServer,
}

impl ChatStream {
    /// Creates the transport for an engine response and its event receiver.
    pub fn new(
        response: StreamingChatResponse,
        events: EventReceiver,
        data: ChatData,
        files: FileServer,
    ) -> Self {
        Self {
            response,
            events,
            data,
            files,
        }
    }

    async fn produce(self, sender: EventSender) {
        let Self {
            response,
            mut events,
            data,
            files,
        } = self;

        let (source_nodes, mut tokens) = response.into_parts();
        let mut content = String::new();
        let mut events_open = true;

        loop {
            tokio::select! {
                biased;

                event = events.recv(), if events_open => match event {
                    Some(event) => {
                        if !send(&sender, ChatStreamEvent::from_event(event)).await {
                            return disconnected(&data);
                        }
                    }
                    None => events_open = false,
                },
                token = tokens.next() => match token {
                    Some(Ok(delta)) => {
                        content.push_str(&delta);
                        if !send(&sender, ChatStreamEvent::Text { delta }).await {
                            return disconnected(&data);
                        }
                    }
                    Some(Err(error)) => {
                        tracing::error!(
                            target: TRACING_TARGET,
                            error = %error,
                            "Chat stream failed"
                        );
                        let message = format!("Error in chat engine: {error}");
                        send(&sender, ChatStreamEvent::Error { message }).await;
                        return;
                    }
                    None => break,
                },
            }
        }

        for event in events.drain() {
            if !send(&sender, ChatStreamEvent::from_event(event)).await {
                return disconnected(&data);
            }
        }

        let nodes = SourceNode::from_nodes(&source_nodes, &files);
        let node_count = nodes.len();
        if !send(&sender, ChatStreamEvent::Sources { nodes }).await {
            return disconnected(&data);
        }

        let content_len = content.len();
        if !send(&sender, ChatStreamEvent::Done { content }).await {
            return disconnected(&data);
        }

        tracing::debug!(
            target: TRACING_TARGET,
            message_count = data.messages.len(),
            node_count,
            content_len,
            "Chat stream completed"
        );
    }
}

impl IntoResponse for ChatStream {
    fn into_response(self) -> Response {
        let (sender, receiver) = mpsc::channel(STREAM_BUFFER);
        tokio::spawn(self.produce(sender));

        Sse::new(ReceiverStream::new(receiver))
            .keep_alive(KeepAlive::default())
            .into_response()
    }
}

/// Sends an event. Returns false once the client is gone.
async fn send(sender: &EventSender, event: ChatStreamEvent) -> bool {
    match event.to_sse() {
        Some(sse) => sender.send(Ok(sse)).await.is_ok(),
        None => true,
    }
}

fn disconnected(data: &ChatData) {
    tracing::debug!(
        target: TRACING_TARGET,
        message_count = data.messages.len(),
        "Client disconnected from chat stream"
    );
}
