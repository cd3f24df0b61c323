//! Voice-response documents for the telephony provider.
//!
//! A [`VoiceDocument`] is an ordered list of verbs the provider executes on
//! the live call: speak some text, optionally listen for the caller's speech
//! and POST the transcript to a callback path. Documents are validated when
//! they are built and encoded as TwiML markup by [`VoiceDocument::render`].
//!
//! Building a document has no side effects. Any failure is reported as a
//! [`DocumentBuildError`] so that the HTTP layer can answer with a server
//! error instead of an empty document.

pub mod document;
pub mod error;
mod render;

pub use document::{speak, speak_and_gather, GatherOptions, InputMode, Verb, VoiceDocument};
pub use error::DocumentBuildError;

/// Content type the provider expects for voice documents.
pub const CONTENT_TYPE: &str = "text/xml";
