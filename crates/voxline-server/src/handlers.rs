//! Voice webhook handlers.
//!
//! `POST /incoming-call` (and its alias `/answer`) greets the caller and
//! gathers speech. `POST /handle-user-input` receives the transcript, asks
//! the chat bridge for an answer and speaks it.

use crate::api::{ApiError, VoiceXml};
use crate::config::CallConfig;
use crate::AppState;
use axum::extract::rejection::FormRejection;
use axum::{Extension, Form};
use serde::Deserialize;
use std::sync::Arc;
use voxline_chat::ChatOptions;
use voxline_twiml::{DocumentBuildError, GatherOptions, InputMode, VoiceDocument};
use voxline_types::{CallContext, GatherPolicy, Utterance};

/// Where gathered speech is posted back to.
pub const USER_INPUT_PATH: &str = "/handle-user-input";

/// Provider form field carrying the transcript.
const SPEECH_FIELD: &str = "SpeechResult";

/// Call flow settings derived from configuration at startup.
#[derive(Debug, Clone)]
pub struct CallSettings {
    pub greeting: String,
    pub apology: String,
    pub callback_path: String,
    pub gather: GatherOptions,
    pub voice: Option<String>,
    pub hangup_after_reply: bool,
}

impl CallSettings {
    pub fn from_config(call: &CallConfig) -> Self {
        Self {
            greeting: call.greeting_text(),
            apology: call.apology.clone(),
            callback_path: USER_INPUT_PATH.to_string(),
            gather: GatherOptions {
                language: call.language.clone(),
                input: InputMode::Speech,
                speech_timeout_seconds: call.speech_timeout_seconds,
            },
            voice: call.voice.clone(),
            hangup_after_reply: call.hangup_after_reply,
        }
    }

    fn say(&self, text: &str) -> Result<VoiceDocument, DocumentBuildError> {
        VoiceDocument::new().say_with_voice(text, self.voice.as_deref())
    }

    /// The greeting, followed by a gather that posts to the callback path.
    pub fn greeting_document(&self) -> Result<VoiceDocument, DocumentBuildError> {
        self.say(&self.greeting)?
            .gather(&self.callback_path, self.gather.clone())
    }

    /// Speaks `text`, then gathers again or lets the call end.
    pub fn reply_document(
        &self,
        text: &str,
        policy: GatherPolicy,
    ) -> Result<VoiceDocument, DocumentBuildError> {
        let document = self.say(text)?;
        match policy {
            GatherPolicy::SpeakAndGather => {
                document.gather(&self.callback_path, self.gather.clone())
            }
            GatherPolicy::SpeakOnly if self.hangup_after_reply => Ok(document.hangup()),
            GatherPolicy::SpeakOnly => Ok(document),
        }
    }
}

/// Form posted to the user input callback.
///
/// Only the transcript is required; everything else is for logs.
#[derive(Debug, Default, Deserialize)]
pub struct UserInputForm {
    #[serde(rename = "SpeechResult", alias = "transcript", default)]
    pub speech_result: Option<String>,
    #[serde(rename = "Confidence", default)]
    pub confidence: Option<String>,
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
}

/// Handler for `POST /incoming-call` and `POST /answer`.
///
/// The body is optional. Provider fields are only logged.
pub async fn incoming_call_handler(
    Extension(state): Extension<Arc<AppState>>,
    form: Result<Form<CallContext>, FormRejection>,
) -> Result<VoiceXml, ApiError> {
    let context = form.map(|Form(context)| context).unwrap_or_default();
    tracing::info!(
        call_sid = context.call_sid.as_deref().unwrap_or("-"),
        from = context.from.as_deref().unwrap_or("-"),
        to = context.to.as_deref().unwrap_or("-"),
        "incoming call"
    );

    let document = state.call.greeting_document()?;
    VoiceXml::render(&document)
}

/// Handler for `POST /handle-user-input`.
///
/// A missing or blank transcript is a 400. A chat failure is not an HTTP
/// error: the caller hears the apology instead.
pub async fn user_input_handler(
    Extension(state): Extension<Arc<AppState>>,
    form: Result<Form<UserInputForm>, FormRejection>,
) -> Result<VoiceXml, ApiError> {
    let Form(form) = form.map_err(|rejection| {
        tracing::warn!(%rejection, "unreadable user input form");
        ApiError::MissingField(SPEECH_FIELD)
    })?;

    let call_sid = form.call_sid.as_deref().unwrap_or("-");
    let utterance = form
        .speech_result
        .as_deref()
        .and_then(|raw| Utterance::parse(raw).ok())
        .ok_or(ApiError::MissingField(SPEECH_FIELD))?;

    tracing::info!(
        call_sid,
        confidence = form.confidence.as_deref().unwrap_or("-"),
        utterance_chars = utterance.as_str().chars().count(),
        target = state.mode.target.label(),
        streaming = state.mode.streaming,
        "caller spoke"
    );

    let answer = state
        .bridge
        .answer(&utterance, &ChatOptions::default(), state.mode.streaming)
        .await;

    let reply = match answer {
        Ok(text) => match speakable(&text) {
            Some(text) => text,
            None => {
                tracing::warn!(call_sid, "chat reply has nothing speakable, apologizing");
                state.call.apology.clone()
            }
        },
        Err(err) => {
            tracing::warn!(call_sid, error = %err, "chat failed, apologizing");
            state.call.apology.clone()
        }
    };

    let document = state.call.reply_document(&reply, state.mode.gather)?;
    VoiceXml::render(&document)
}

/// Drops control characters the markup cannot carry. `None` if nothing
/// speakable is left.
fn speakable(text: &str) -> Option<String> {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || matches!(c, '\n' | '\r' | '\t'))
        .collect();
    if cleaned.trim().is_empty() {
        None
    } else {
        Some(cleaned)
    }
}
