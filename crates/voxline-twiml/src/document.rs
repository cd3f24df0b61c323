//! Voice document model and builders.

use crate::error::DocumentBuildError;
use serde::{Deserialize, Serialize};

/// How the provider should capture the caller's next input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputMode {
    /// Transcribed speech.
    #[default]
    Speech,
    /// Keypad digits.
    Dtmf,
    /// Either speech or keypad digits.
    SpeechAndDtmf,
}

impl InputMode {
    /// Attribute value understood by the provider.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Speech => "speech",
            Self::Dtmf => "dtmf",
            Self::SpeechAndDtmf => "dtmf speech",
        }
    }
}

/// Listening parameters for a gather directive.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GatherOptions {
    /// BCP-47 language tag of the expected speech, e.g. `en-US`.
    pub language: String,
    pub input: InputMode,
    /// Seconds of silence after which the provider stops listening.
    pub speech_timeout_seconds: u32,
}

impl Default for GatherOptions {
    fn default() -> Self {
        Self {
            language: "en-US".to_string(),
            input: InputMode::Speech,
            speech_timeout_seconds: 1,
        }
    }
}

/// A single instruction in a voice document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verb {
    /// Speak `text`, optionally with a named provider voice.
    Say { text: String, voice: Option<String> },
    /// Listen for input and POST the result to `action`.
    Gather {
        action: String,
        options: GatherOptions,
    },
    /// End the call.
    Hangup,
}

/// An ordered, validated sequence of verbs.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VoiceDocument {
    verbs: Vec<Verb>,
}

impl VoiceDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a `Say` verb.
    pub fn say(self, text: &str) -> Result<Self, DocumentBuildError> {
        self.say_with_voice(text, None)
    }

    /// Appends a `Say` verb spoken with the given provider voice.
    pub fn say_with_voice(
        mut self,
        text: &str,
        voice: Option<&str>,
    ) -> Result<Self, DocumentBuildError> {
        validate_text(text)?;
        if let Some(voice) = voice {
            validate_text(voice)?;
        }
        self.verbs.push(Verb::Say {
            text: text.to_string(),
            voice: voice.map(str::to_string),
        });
        Ok(self)
    }

    /// Appends a `Gather` verb that posts captured input to `callback_path`.
    pub fn gather(
        mut self,
        callback_path: &str,
        options: GatherOptions,
    ) -> Result<Self, DocumentBuildError> {
        validate_callback_path(callback_path)?;
        validate_language(&options.language)?;
        if options.speech_timeout_seconds == 0 {
            return Err(DocumentBuildError::InvalidTimeout);
        }
        self.verbs.push(Verb::Gather {
            action: callback_path.to_string(),
            options,
        });
        Ok(self)
    }

    /// Appends a `Hangup` verb.
    pub fn hangup(mut self) -> Self {
        self.verbs.push(Verb::Hangup);
        self
    }

    pub fn verbs(&self) -> &[Verb] {
        &self.verbs
    }

    /// Texts of all `Say` verbs, in order.
    pub fn spoken_text(&self) -> Vec<&str> {
        self.verbs
            .iter()
            .filter_map(|verb| match verb {
                Verb::Say { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    /// The gather directive, if the document has one.
    pub fn gather_directive(&self) -> Option<(&str, &GatherOptions)> {
        self.verbs.iter().find_map(|verb| match verb {
            Verb::Gather { action, options } => Some((action.as_str(), options)),
            _ => None,
        })
    }

    /// Encodes the document as provider markup.
    pub fn render(&self) -> Result<String, DocumentBuildError> {
        crate::render::render(self)
    }
}

/// Builds a document that speaks `text` and nothing else.
pub fn speak(text: &str) -> Result<VoiceDocument, DocumentBuildError> {
    VoiceDocument::new().say(text)
}

/// Builds a document that speaks `text` and then gathers the caller's reply,
/// posting it to `callback_path`.
pub fn speak_and_gather(
    text: &str,
    callback_path: &str,
    options: GatherOptions,
) -> Result<VoiceDocument, DocumentBuildError> {
    VoiceDocument::new()
        .say(text)?
        .gather(callback_path, options)
}

fn validate_text(text: &str) -> Result<(), DocumentBuildError> {
    if text.trim().is_empty() {
        return Err(DocumentBuildError::EmptyText);
    }
    if let Some(c) = text.chars().find(|c| !is_markup_char(*c)) {
        return Err(DocumentBuildError::InvalidCharacter(c as u32));
    }
    Ok(())
}

/// XML 1.0 `Char` production. Surrogates never appear in a Rust `char`.
fn is_markup_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r')
        || (c >= ' ' && c != '\u{FFFE}' && c != '\u{FFFF}')
}

fn validate_callback_path(path: &str) -> Result<(), DocumentBuildError> {
    let invalid = |reason| DocumentBuildError::InvalidCallbackPath {
        path: path.to_string(),
        reason,
    };

    if !path.starts_with('/') {
        return Err(invalid("must start with '/'"));
    }
    if path.starts_with("//") {
        return Err(invalid("must not name a host"));
    }
    if path.contains(['?', '#']) {
        return Err(invalid("query and fragment are not allowed"));
    }
    if !path.chars().all(is_path_char) {
        return Err(invalid("contains a character not allowed in a path"));
    }
    if path.split('/').any(|segment| segment == "..") {
        return Err(invalid("must not contain '..' segments"));
    }
    Ok(())
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || "-._~/%!$&'()*+,;=:@".contains(c)
}

fn validate_language(language: &str) -> Result<(), DocumentBuildError> {
    let well_formed = !language.is_empty()
        && language
            .split('-')
            .all(|part| !part.is_empty() && part.chars().all(|c| c.is_ascii_alphanumeric()));
    if well_formed {
        Ok(())
    } else {
        Err(DocumentBuildError::InvalidLanguage(language.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speak_holds_text_verbatim_without_gather() {
        for text in ["Hello", "4", "  padded  ", "Tom & Jerry <3", "¿Qué tal?"] {
            let doc = speak(text).unwrap();
            assert_eq!(doc.spoken_text(), vec![text]);
            assert!(doc.gather_directive().is_none());
        }
    }

    #[test]
    fn gather_action_matches_callback_path() {
        for path in ["/handle-user-input", "/a/b_c", "/x%20y", "/"] {
            let doc = speak_and_gather("Hi", path, GatherOptions::default()).unwrap();
            let (action, _) = doc.gather_directive().unwrap();
            assert_eq!(action, path);
        }
    }

    #[test]
    fn rejects_blank_text() {
        assert_eq!(speak("").unwrap_err(), DocumentBuildError::EmptyText);
        assert_eq!(speak(" \n").unwrap_err(), DocumentBuildError::EmptyText);
    }

    #[test]
    fn rejects_control_characters() {
        assert_eq!(
            speak("bell\u{7}").unwrap_err(),
            DocumentBuildError::InvalidCharacter(7)
        );
    }

    #[test]
    fn rejects_bad_callback_paths() {
        for path in [
            "handle",
            "//evil.example/x",
            "https://evil.example/x",
            "/a b",
            "/a?b=1",
            "/../etc",
            "",
        ] {
            let err = speak_and_gather("Hi", path, GatherOptions::default()).unwrap_err();
            assert!(
                matches!(err, DocumentBuildError::InvalidCallbackPath { .. }),
                "{path:?} gave {err:?}"
            );
        }
    }

    #[test]
    fn rejects_bad_gather_options() {
        let options = GatherOptions {
            language: "en US".into(),
            ..GatherOptions::default()
        };
        assert!(matches!(
            speak_and_gather("Hi", "/in", options).unwrap_err(),
            DocumentBuildError::InvalidLanguage(_)
        ));

        let options = GatherOptions {
            speech_timeout_seconds: 0,
            ..GatherOptions::default()
        };
        assert_eq!(
            speak_and_gather("Hi", "/in", options).unwrap_err(),
            DocumentBuildError::InvalidTimeout
        );
    }
}
