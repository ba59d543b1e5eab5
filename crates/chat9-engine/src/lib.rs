#![forbid(unsafe_code)]
#![cfg_attr(docsrs, feature(doc_cfg))]
#![doc = include_str!("../README.md")]

mod config;
mod error;
mod event;
mod filter;
mod message;
mod node;

pub mod engine;
pub mod provider;

pub use crate::config::{EngineConfig, EngineKind};
pub use crate::engine::{
    ChatEngine, ChatEngineProvider, ChatEngineService, ChatResponse, EngineOptions, Params,
    SharedChatEngine, StreamingChatResponse, TokenStream,
};
pub use crate::error::{Error, ErrorKind, Result};
pub use crate::event::{ChatEvent, EventCallbackHandler, EventReceiver};
pub use crate::filter::{DOCUMENT_ID_KEY, MetadataFilter, MetadataFilters, generate_filters};
pub use crate::message::{Message, MessageRole};
pub use crate::node::{Metadata, NodeWithScore};

/// Tracing target for the main library.
pub const TRACING_TARGET: &str = "chat9_engine";
