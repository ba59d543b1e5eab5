//! Generation lifecycle events relayed to streaming callers.

use serde::Serialize;
use tokio::sync::mpsc;

/// A lifecycle event emitted by a chat engine while it works on a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ChatEvent {
    /// Retrieval of context for the query has started.
    RetrievalStarted { query: String },
    /// Retrieval finished with the given number of sources.
    RetrievalFinished { source_count: usize },
    /// The language model started generating.
    GenerationStarted { model: String },
    /// The language model finished generating.
    GenerationFinished,
}

impl ChatEvent {
    /// Returns a human-readable title for display in chat clients.
    pub fn title(&self) -> String {
        match self {
            Self::RetrievalStarted { query } => {
                format!("Retrieving context for query: '{query}'")
            }
            Self::RetrievalFinished { source_count } => {
                format!("Retrieved {source_count} sources to use as context for the query")
            }
            Self::GenerationStarted { model } => format!("Generating answer with {model}"),
            Self::GenerationFinished => "Finished generating answer".to_owned(),
        }
    }
}

/// Sender half handed to a chat engine for one request.
///
/// Cloning shares the same channel. Events sent after the receiver is gone
/// are dropped.
#[derive(Debug, Clone)]
pub struct EventCallbackHandler {
    sender: mpsc::UnboundedSender<ChatEvent>,
}

/// Receiver half consumed by the streaming transport.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: mpsc::UnboundedReceiver<ChatEvent>,
}

impl EventCallbackHandler {
    /// Creates a fresh handler and its receiver.
    pub fn channel() -> (Self, EventReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        (Self { sender }, EventReceiver { receiver })
    }

    /// Records an event.
    pub fn on_event(&self, event: ChatEvent) {
        let _ = self.sender.send(event);
    }
}

impl EventReceiver {
    /// Waits for the next event. Returns `None` once every handler is dropped.
    pub async fn recv(&mut self) -> Option<ChatEvent> {
        self.receiver.recv().await
    }

    /// Returns an already queued event without waiting.
    pub fn try_recv(&mut self) -> Option<ChatEvent> {
        self.receiver.try_recv().ok()
    }

    /// Drains every queued event.
    pub fn drain(&mut self) -> Vec<ChatEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn events_reach_receiver_in_order() {
        let (handler, mut receiver) = EventCallbackHandler::channel();
        let engine_side = handler.clone();

        engine_side.on_event(ChatEvent::RetrievalStarted {
            query: "hi".to_owned(),
        });
        engine_side.on_event(ChatEvent::RetrievalFinished { source_count: 2 });
        drop(engine_side);
        drop(handler);

        let events = receiver.drain();
        assert_eq!(events.len(), 2);
        assert_eq!(
            events[1].title(),
            "Retrieved 2 sources to use as context for the query"
        );
        assert_eq!(receiver.recv().await, None);
    }

    #[test]
    fn sending_after_receiver_dropped_is_silent() {
        let (handler, receiver) = EventCallbackHandler::channel();
        drop(receiver);
        handler.on_event(ChatEvent::GenerationFinished);
    }

    #[test]
    fn events_serialize_with_kind_tag() -> anyhow::Result<()> {
        let json = serde_json::to_value(ChatEvent::GenerationStarted {
            model: "gpt-4o-mini".to_owned(),
        })?;
        assert_eq!(json["kind"], "generation_started");
        assert_eq!(json["model"], "gpt-4o-mini");
        Ok(())
    }
}
