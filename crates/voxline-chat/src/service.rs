//! The seam between the bridge and a hosted chat model.

use crate::error::ChatError;
use async_trait::async_trait;
use futures_util::stream::BoxStream;
use voxline_types::{ChatReply, ChatRequest, TextFragment};

/// One decoded event of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// The next piece of reply text.
    Fragment(TextFragment),
    /// The service finished the reply. Nothing follows.
    End,
}

/// A streamed reply as it comes off the wire.
pub type EventStream = BoxStream<'static, Result<StreamEvent, ChatError>>;

/// A hosted chat-completion service.
#[async_trait]
pub trait ChatService: Send + Sync {
    /// Sends `request` and waits for the whole reply.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatReply, ChatError>;

    /// Sends `request` and returns the reply as an event stream.
    async fn chat_stream(&self, request: &ChatRequest) -> Result<EventStream, ChatError>;
}
