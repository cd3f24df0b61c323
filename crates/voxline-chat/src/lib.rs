//! Chat bridge between caller utterances and a hosted chat-completion API.
//!
//! The [`ChatService`] trait is the seam to the hosted model. The shipped
//! implementation, [`CohereChatClient`], speaks the Cohere v1 chat API both
//! synchronously and as a newline-delimited JSON event stream. Tests and the
//! server swap in their own implementations.
//!
//! [`ChatBridge`] sits on top of a service and applies the prompt policy:
//! an optional seed prefix is concatenated verbatim in front of the caller's
//! transcript. That policy is a prompt-injection risk (the caller controls
//! everything after the prefix) and is kept only because existing
//! deployments depend on it.

pub mod bridge;
pub mod cohere;
pub mod error;
mod ndjson;
pub mod service;

pub use bridge::{ChatBridge, ChatOptions, ReplyStream};
pub use cohere::{build_http_client, CohereChatClient, CohereConfig};
pub use error::ChatError;
pub use service::{ChatService, EventStream, StreamEvent};
