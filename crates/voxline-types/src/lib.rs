//! Shared types for the Voxline voice bridge.
//!
//! This crate holds the small set of domain types that cross crate
//! boundaries: the caller's utterance, the outbound chat request and its
//! reply, the response mode that parameterizes the webhook handlers, and the
//! identifiers and lifecycle states of hosted datasets and fine-tuned models.
//!
//! Nothing here performs I/O. The crates that talk to hosted services
//! (`voxline-chat`, `voxline-finetune`) and the server depend on this crate
//! and never on each other's internals.

use serde::{Deserialize, Serialize};
use std::fmt;

pub mod dataset;
pub mod mode;

pub use dataset::{DatasetId, DatasetStatus, Lifecycle, ModelId, ModelStatus, Phase};
pub use mode::{ChatTarget, GatherPolicy, ResponseMode};

/// Errors produced when constructing domain values from raw input.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TypeError {
    /// The transcript was empty or contained only whitespace.
    #[error("utterance is empty")]
    EmptyUtterance,

    /// A hosted-service identifier was empty.
    #[error("identifier is empty")]
    EmptyIdentifier,
}

/// A transcript of what the caller said during one turn.
///
/// Always holds non-blank, trimmed text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct Utterance(String);

impl Utterance {
    /// Builds an utterance from raw provider text.
    ///
    /// Leading and trailing whitespace is removed. Returns
    /// [`TypeError::EmptyUtterance`] if nothing is left.
    pub fn parse(raw: &str) -> Result<Self, TypeError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TypeError::EmptyUtterance);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the transcript text.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consumes the utterance and returns the transcript text.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Utterance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An outbound request to the hosted chat-completion service.
///
/// `message` is the final prompt text, with any seed prefix already applied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChatRequest {
    /// The prompt text sent to the model.
    pub message: String,
    /// Target model; the service default is used when absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<ModelId>,
    /// Whether the reply should be streamed as fragments.
    pub stream: bool,
}

impl ChatRequest {
    /// Creates a non-streaming request for the service's default model.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            model: None,
            stream: false,
        }
    }

    /// Targets a specific model.
    pub fn with_model(mut self, model: Option<ModelId>) -> Self {
        self.model = model;
        self
    }

    /// Marks the request as streaming or synchronous.
    pub fn streaming(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }
}

/// A complete reply from the chat service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatReply {
    /// The generated text.
    pub text: String,
}

impl ChatReply {
    pub fn new(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// One incremental piece of a streamed reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TextFragment(pub String);

impl TextFragment {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Provider fields that accompany a voice webhook.
///
/// All fields are optional; they are used for log correlation only.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CallContext {
    /// Provider-assigned call identifier.
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    /// Caller number.
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    /// Dialed number.
    #[serde(rename = "To", default)]
    pub to: Option<String>,
}
