//! Error types for dataset provisioning.

use std::path::PathBuf;
use std::time::Duration;
use voxline_types::{DatasetId, ModelId, TypeError};

/// Errors that can occur while provisioning a fine-tuned model.
#[derive(Debug, thiserror::Error)]
pub enum FinetuneError {
    /// The request could not be sent or the response could not be read.
    #[error("provisioning transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// The provider answered with a non-success status.
    #[error("provider returned HTTP {status}: {body}")]
    Status { status: u16, body: String },

    /// The provider's response did not have the expected shape.
    #[error("provider response could not be decoded: {0}")]
    Decode(String),

    /// The dataset file could not be read.
    #[error("failed to read dataset file {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Dataset validation reached its failed terminal state.
    #[error("dataset {dataset_id} failed validation: {}", .reason.as_deref().unwrap_or("no reason given"))]
    ValidationTerminalFailure {
        dataset_id: DatasetId,
        reason: Option<String>,
    },

    /// Dataset validation did not finish before the deadline.
    #[error("dataset {dataset_id} still not validated after {attempts} polls ({elapsed:?})")]
    ValidationTimedOut {
        dataset_id: DatasetId,
        attempts: u32,
        elapsed: Duration,
    },

    /// Fine-tuned model training reached its failed terminal state.
    #[error("fine-tuned model {model_id} failed: {}", .reason.as_deref().unwrap_or("no reason given"))]
    ModelTerminalFailure {
        model_id: ModelId,
        reason: Option<String>,
    },

    /// Fine-tuned model did not become ready before the deadline.
    #[error("fine-tuned model {model_id} still not ready after {attempts} polls ({elapsed:?})")]
    ModelTimedOut {
        model_id: ModelId,
        attempts: u32,
        elapsed: Duration,
    },

    /// Another task is already waiting on this dataset's validation.
    #[error("dataset {0} already has a validation watch")]
    AlreadyWatching(DatasetId),

    /// The provider returned an unusable identifier.
    #[error("invalid identifier from provider: {0}")]
    InvalidId(#[from] TypeError),
}

impl From<serde_json::Error> for FinetuneError {
    fn from(err: serde_json::Error) -> Self {
        Self::Decode(err.to_string())
    }
}
