//! Prompt construction and reply consumption on top of a [`ChatService`].

use crate::error::ChatError;
use crate::service::{ChatService, EventStream, StreamEvent};
use futures_util::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use voxline_types::{ChatReply, ChatRequest, ModelId, TextFragment, Utterance};

/// Per-call prompt options.
///
/// Fields left `None` fall back to the bridge defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChatOptions {
    /// Text placed verbatim in front of the caller's message.
    pub seed_prefix: Option<String>,
    /// Model to target instead of the service default.
    pub model_id: Option<ModelId>,
}

impl ChatOptions {
    pub fn with_seed(mut self, seed: impl Into<String>) -> Self {
        self.seed_prefix = Some(seed.into());
        self
    }

    pub fn with_model(mut self, model: ModelId) -> Self {
        self.model_id = Some(model);
        self
    }

    fn or(&self, defaults: &ChatOptions) -> ChatOptions {
        ChatOptions {
            seed_prefix: self
                .seed_prefix
                .clone()
                .or_else(|| defaults.seed_prefix.clone()),
            model_id: self.model_id.clone().or_else(|| defaults.model_id.clone()),
        }
    }
}

/// Sends caller messages to a chat service.
#[derive(Clone)]
pub struct ChatBridge {
    service: Arc<dyn ChatService>,
    defaults: ChatOptions,
}

impl ChatBridge {
    pub fn new(service: Arc<dyn ChatService>) -> Self {
        Self {
            service,
            defaults: ChatOptions::default(),
        }
    }

    /// Sets the options applied when a call leaves a field unset.
    pub fn with_defaults(mut self, defaults: ChatOptions) -> Self {
        self.defaults = defaults;
        self
    }

    pub fn defaults(&self) -> &ChatOptions {
        &self.defaults
    }

    /// Builds the outbound request for `message`.
    ///
    /// The prompt is `seed_prefix + message` with no separator added. An
    /// empty seed counts as no seed.
    pub fn build_request(&self, message: &str, options: &ChatOptions, stream: bool) -> ChatRequest {
        let options = options.or(&self.defaults);
        let prompt = match options.seed_prefix.as_deref() {
            Some(seed) if !seed.is_empty() => format!("{}{}", seed, message),
            _ => message.to_string(),
        };
        ChatRequest::new(prompt)
            .with_model(options.model_id)
            .streaming(stream)
    }

    /// Sends `message` and waits for the whole reply.
    pub async fn send(&self, message: &str, options: &ChatOptions) -> Result<ChatReply, ChatError> {
        let request = self.build_request(message, options, false);
        self.service.chat(&request).await
    }

    /// Sends `message` and returns the reply as a fragment stream.
    pub async fn stream(
        &self,
        message: &str,
        options: &ChatOptions,
    ) -> Result<ReplyStream, ChatError> {
        let request = self.build_request(message, options, true);
        let events = self.service.chat_stream(&request).await?;
        Ok(ReplyStream::new(events))
    }

    /// Answers one caller turn, streamed or not, and returns the reply text.
    ///
    /// Fails with [`ChatError::EmptyReply`] when the service produced only
    /// whitespace, so callers never speak an empty document.
    pub async fn answer(
        &self,
        utterance: &Utterance,
        options: &ChatOptions,
        streaming: bool,
    ) -> Result<String, ChatError> {
        let text = if streaming {
            self.stream(utterance.as_str(), options)
                .await?
                .collect_text()
                .await?
        } else {
            self.send(utterance.as_str(), options).await?.text
        };

        if text.trim().is_empty() {
            return Err(ChatError::EmptyReply);
        }
        Ok(text)
    }
}

/// A lazy, finite, non-restartable sequence of reply fragments.
///
/// The stream finishes cleanly when the service sends its end-of-stream
/// marker. If the underlying body closes without the marker, the last item is
/// [`ChatError::Truncated`]. After any error or the marker, it yields `None`.
pub struct ReplyStream {
    events: EventStream,
    finished: bool,
}

impl ReplyStream {
    pub fn new(events: EventStream) -> Self {
        Self {
            events,
            finished: false,
        }
    }

    /// Consumes the stream and concatenates every fragment.
    pub async fn collect_text(mut self) -> Result<String, ChatError> {
        let mut text = String::new();
        while let Some(fragment) = self.next().await {
            text.push_str(fragment?.as_str());
        }
        Ok(text)
    }
}

impl Stream for ReplyStream {
    type Item = Result<TextFragment, ChatError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }

        match self.events.poll_next_unpin(cx) {
            Poll::Pending => Poll::Pending,
            Poll::Ready(Some(Ok(StreamEvent::Fragment(fragment)))) => {
                Poll::Ready(Some(Ok(fragment)))
            }
            Poll::Ready(Some(Ok(StreamEvent::End))) => {
                self.finished = true;
                Poll::Ready(None)
            }
            Poll::Ready(Some(Err(e))) => {
                self.finished = true;
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                Poll::Ready(Some(Err(ChatError::Truncated)))
            }
        }
    }
}
