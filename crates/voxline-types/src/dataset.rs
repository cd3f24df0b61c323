//! Hosted dataset and fine-tuned model identifiers and lifecycles.
//!
//! Both records are owned by the hosted provider and referenced here only by
//! opaque ids. Their status values collapse into a [`Phase`] so that one
//! polling state machine can wait on either.

use crate::TypeError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Server-assigned identifier of an uploaded dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DatasetId(String);

impl DatasetId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TypeError::EmptyIdentifier);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Server-assigned identifier of a chat model, base or fine-tuned.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ModelId(String);

impl ModelId {
    pub fn new(id: impl Into<String>) -> Result<Self, TypeError> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(TypeError::EmptyIdentifier);
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a hosted record sits relative to its terminal states.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Phase {
    /// Not terminal yet; keep waiting.
    Pending,
    /// Terminal success.
    Succeeded,
    /// Terminal failure, with the provider's reason when it gave one.
    Failed(Option<String>),
}

/// Anything with a provider-side lifecycle that can be polled to completion.
pub trait Lifecycle {
    fn phase(&self) -> Phase;
}

/// Validation lifecycle of an uploaded dataset.
///
/// `Created -> Validating -> Validated | Failed`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetStatus {
    /// Accepted by the provider; validation not yet started.
    Created,
    /// Validation in progress.
    Validating,
    /// Validation succeeded. The dataset can back a fine-tuned model.
    Validated,
    /// Validation failed.
    Failed {
        /// Provider-supplied reason, if any.
        reason: Option<String>,
    },
}

impl Lifecycle for DatasetStatus {
    fn phase(&self) -> Phase {
        match self {
            Self::Created | Self::Validating => Phase::Pending,
            Self::Validated => Phase::Succeeded,
            Self::Failed { reason } => Phase::Failed(reason.clone()),
        }
    }
}

/// Training lifecycle of a fine-tuned model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelStatus {
    Queued,
    Training,
    /// Deployed and accepting chat requests.
    Ready,
    Failed {
        reason: Option<String>,
    },
}

impl Lifecycle for ModelStatus {
    fn phase(&self) -> Phase {
        match self {
            Self::Queued | Self::Training => Phase::Pending,
            Self::Ready => Phase::Succeeded,
            Self::Failed { reason } => Phase::Failed(reason.clone()),
        }
    }
}
