//! TwiML encoding.

use crate::document::{Verb, VoiceDocument};
use crate::error::DocumentBuildError;
use std::fmt::Write;

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

pub(crate) fn render(document: &VoiceDocument) -> Result<String, DocumentBuildError> {
    if document.verbs().is_empty() {
        return Err(DocumentBuildError::Empty);
    }

    let mut out = String::with_capacity(128);
    out.push_str(XML_DECLARATION);
    out.push_str("<Response>");

    for verb in document.verbs() {
        match verb {
            Verb::Say { text, voice } => {
                out.push_str("<Say");
                if let Some(voice) = voice {
                    push_attr(&mut out, "voice", voice);
                }
                out.push('>');
                out.push_str(&escape(text));
                out.push_str("</Say>");
            }
            Verb::Gather { action, options } => {
                out.push_str("<Gather");
                push_attr(&mut out, "input", options.input.as_str());
                push_attr(&mut out, "language", &options.language);
                push_attr(&mut out, "action", action);
                push_attr(&mut out, "method", "POST");
                push_attr(
                    &mut out,
                    "speechTimeout",
                    &options.speech_timeout_seconds.to_string(),
                );
                out.push_str("/>");
            }
            Verb::Hangup => out.push_str("<Hangup/>"),
        }
    }

    out.push_str("</Response>");
    tracing::trace!(bytes = out.len(), verbs = document.verbs().len(), "rendered voice document");
    Ok(out)
}

fn push_attr(out: &mut String, name: &str, value: &str) {
    // Writing into a String cannot fail.
    let _ = write!(out, " {}=\"{}\"", name, escape(value));
}

fn escape(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use crate::document::{speak, speak_and_gather, GatherOptions, VoiceDocument};
    use crate::error::DocumentBuildError;

    #[test]
    fn renders_say_only() {
        let xml = speak("Hello there").unwrap().render().unwrap();
        assert_eq!(
            xml,
            r#"<?xml version="1.0" encoding="UTF-8"?><Response><Say>Hello there</Say></Response>"#
        );
    }

    #[test]
    fn renders_gather_attributes() {
        let xml = speak_and_gather("Ask me", "/handle-user-input", GatherOptions::default())
            .unwrap()
            .render()
            .unwrap();
        assert!(xml.contains("<Say>Ask me</Say>"));
        assert!(xml.contains(
            r#"<Gather input="speech" language="en-US" action="/handle-user-input" method="POST" speechTimeout="1"/>"#
        ));
        assert!(xml.ends_with("</Response>"));
    }

    #[test]
    fn escapes_markup_characters() {
        let xml = speak(r#"Tom & "Jerry" <3"#).unwrap().render().unwrap();
        assert!(xml.contains("<Say>Tom &amp; &quot;Jerry&quot; &lt;3</Say>"));
    }

    #[test]
    fn renders_voice_and_hangup() {
        let xml = VoiceDocument::new()
            .say_with_voice("Bye", Some("Polly.Joanna"))
            .unwrap()
            .hangup()
            .render()
            .unwrap();
        assert!(xml.contains(r#"<Say voice="Polly.Joanna">Bye</Say><Hangup/>"#));
    }

    #[test]
    fn empty_document_is_an_error() {
        assert_eq!(
            VoiceDocument::new().render().unwrap_err(),
            DocumentBuildError::Empty
        );
    }
}
