//! Error types for voice document construction.

/// Errors that can occur while building or encoding a voice document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DocumentBuildError {
    /// Spoken text was empty or only whitespace.
    #[error("document text is empty")]
    EmptyText,

    /// Spoken text contains a character that cannot appear in the markup.
    #[error("document text contains a character not allowed in markup: U+{0:04X}")]
    InvalidCharacter(u32),

    /// The gather callback is not a usable relative path.
    #[error("invalid callback path {path:?}: {reason}")]
    InvalidCallbackPath { path: String, reason: &'static str },

    /// The gather language tag is empty or malformed.
    #[error("invalid gather language: {0:?}")]
    InvalidLanguage(String),

    /// The gather speech timeout must be at least one second.
    #[error("speech timeout must be at least 1 second")]
    InvalidTimeout,

    /// The document has no verbs to execute.
    #[error("document has no verbs")]
    Empty,
}
