//! Error types for the chat bridge.

/// Errors that can occur while talking to the chat service.
///
/// Every variant is a per-turn failure: callers degrade to a fallback reply
/// instead of propagating it.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// The request could not be sent or the response body could not be read.
    #[error("chat transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The service answered with a non-success status.
    #[error("chat service returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The response body did not have the expected shape.
    #[error("chat response could not be decoded: {0}")]
    Decode(String),

    /// The reply stream closed before its end-of-stream marker.
    #[error("chat stream ended before the end-of-stream marker")]
    Truncated,

    /// The service ended the stream with a failure reason.
    #[error("chat stream aborted by the service: {0}")]
    Aborted(String),

    /// The service produced no text.
    #[error("chat reply is empty")]
    EmptyReply,
}

impl From<serde_json::Error> for ChatError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
