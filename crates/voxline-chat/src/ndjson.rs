//! Decoding of the streamed chat reply.
//!
//! The service sends one JSON object per line. Only `text-generation` and
//! `stream-end` events matter here; the rest (stream start, citations, tool
//! calls) are skipped. Network chunks may split a line anywhere, so bytes are
//! buffered until a newline arrives.

use crate::error::ChatError;
use crate::service::{EventStream, StreamEvent};
use futures_util::stream::{self, BoxStream};
use futures_util::StreamExt;
use serde::Deserialize;
use std::collections::VecDeque;
use voxline_types::TextFragment;

/// Finish reasons that mean the reply is complete.
const SUCCESS_FINISH_REASONS: &[&str] = &["COMPLETE", "MAX_TOKENS"];

#[derive(Debug, Deserialize)]
struct WireEvent {
    event_type: String,
    #[serde(default)]
    text: Option<String>,
    #[serde(default)]
    finish_reason: Option<String>,
}

struct DecodeState {
    bytes: BoxStream<'static, Result<Vec<u8>, ChatError>>,
    buffer: Vec<u8>,
    pending: VecDeque<Result<StreamEvent, ChatError>>,
    done: bool,
}

impl DecodeState {
    /// Queues the decoded line. Returns `false` once an error has been queued.
    fn push_line(&mut self, line: &[u8]) -> bool {
        match parse_line(line) {
            Ok(Some(event)) => {
                self.pending.push_back(Ok(event));
                true
            }
            Ok(None) => true,
            Err(e) => {
                self.pending.push_back(Err(e));
                self.done = true;
                false
            }
        }
    }

    fn drain_complete_lines(&mut self) {
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if !self.push_line(&line) {
                return;
            }
        }
    }
}

/// Turns a raw byte stream into reply events.
pub(crate) fn decode_events(bytes: BoxStream<'static, Result<Vec<u8>, ChatError>>) -> EventStream {
    let state = DecodeState {
        bytes,
        buffer: Vec::new(),
        pending: VecDeque::new(),
        done: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(item) = state.pending.pop_front() {
                return Some((item, state));
            }
            if state.done {
                return None;
            }

            match state.bytes.next().await {
                Some(Ok(chunk)) => {
                    state.buffer.extend_from_slice(&chunk);
                    state.drain_complete_lines();
                }
                Some(Err(e)) => {
                    state.done = true;
                    state.pending.push_back(Err(e));
                }
                None => {
                    state.done = true;
                    let rest = std::mem::take(&mut state.buffer);
                    state.push_line(&rest);
                }
            }
        }
    })
    .boxed()
}

fn parse_line(line: &[u8]) -> Result<Option<StreamEvent>, ChatError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| ChatError::Decode(format!("stream line is not UTF-8: {}", e)))?
        .trim();
    if line.is_empty() {
        return Ok(None);
    }

    let event: WireEvent = serde_json::from_str(line)?;
    match event.event_type.as_str() {
        "text-generation" => Ok(event
            .text
            .filter(|t| !t.is_empty())
            .map(|t| StreamEvent::Fragment(TextFragment(t)))),
        "stream-end" => match event.finish_reason.as_deref() {
            None => Ok(Some(StreamEvent::End)),
            Some(reason) if SUCCESS_FINISH_REASONS.contains(&reason) => {
                Ok(Some(StreamEvent::End))
            }
            Some(reason) => Err(ChatError::Aborted(reason.to_string())),
        },
        other => {
            tracing::trace!(event_type = other, "skipping chat stream event");
            Ok(None)
        }
    }
}
