//! The dataset-to-model provisioning workflow.

use crate::error::FinetuneError;
use crate::poll::{poll_until_terminal, PollOutcome, PollPolicy};
use crate::service::{BaseType, DatasetKind, DatasetService, DatasetUpload, FineTuneRequest};
use crate::watch::ValidationWatches;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use voxline_types::{DatasetId, ModelId};

fn default_dataset_path() -> PathBuf {
    PathBuf::from("dataset.jsonl")
}

fn default_dataset_name() -> String {
    "voxline-dataset".to_string()
}

fn default_model_name() -> String {
    "voxline-finetuned-model".to_string()
}

fn default_training_policy() -> PollPolicy {
    PollPolicy {
        interval_seconds: 30,
        max_wait_seconds: 6 * 60 * 60,
        max_attempts: None,
    }
}

/// Inputs to [`provision`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProvisionSettings {
    /// Local JSONL file with the labeled examples.
    #[serde(default = "default_dataset_path")]
    pub dataset_path: PathBuf,
    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,
    #[serde(default)]
    pub dataset_kind: DatasetKind,
    #[serde(default = "default_model_name")]
    pub model_name: String,
    #[serde(default)]
    pub base_type: BaseType,
    /// Polling for dataset validation.
    #[serde(default)]
    pub validation: PollPolicy,
    /// Polling for model training.
    #[serde(default = "default_training_policy")]
    pub training: PollPolicy,
}

impl Default for ProvisionSettings {
    fn default() -> Self {
        Self {
            dataset_path: default_dataset_path(),
            dataset_name: default_dataset_name(),
            dataset_kind: DatasetKind::default(),
            model_name: default_model_name(),
            base_type: BaseType::default(),
            validation: PollPolicy::default(),
            training: default_training_policy(),
        }
    }
}

/// Result of waiting on a dataset's validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationOutcome {
    Validated,
    Failed { reason: Option<String> },
    TimedOut { attempts: u32, elapsed: Duration },
}

/// Waits until `dataset_id` is validated, fails, or the policy runs out.
///
/// Holds the dataset's watch for the duration of the wait.
pub async fn wait_for_validation(
    service: &dyn DatasetService,
    dataset_id: &DatasetId,
    policy: &PollPolicy,
    watches: &ValidationWatches,
) -> Result<ValidationOutcome, FinetuneError> {
    let _watch = watches.acquire(dataset_id)?;

    tracing::info!(
        dataset_id = %dataset_id,
        interval_seconds = policy.interval_seconds,
        max_wait_seconds = policy.max_wait_seconds,
        "waiting for dataset validation"
    );

    let outcome = poll_until_terminal(policy, move || service.dataset_status(dataset_id)).await?;
    Ok(match outcome {
        PollOutcome::Succeeded { attempts } => {
            tracing::info!(dataset_id = %dataset_id, attempts, "dataset validated");
            ValidationOutcome::Validated
        }
        PollOutcome::Failed { reason, attempts } => {
            tracing::warn!(dataset_id = %dataset_id, attempts, reason = ?reason, "dataset validation failed");
            ValidationOutcome::Failed { reason }
        }
        PollOutcome::TimedOut { attempts, elapsed } => {
            tracing::warn!(dataset_id = %dataset_id, attempts, ?elapsed, "dataset validation timed out");
            ValidationOutcome::TimedOut { attempts, elapsed }
        }
    })
}

/// Uploads the dataset, waits for validation, creates a fine-tuned model and
/// waits for it to become ready.
///
/// # Errors
///
/// Returns [`FinetuneError::ValidationTerminalFailure`] or
/// [`FinetuneError::ValidationTimedOut`] without creating a model when
/// validation does not succeed, and the model equivalents when training
/// does not. Transport and provider errors are returned as they occur.
pub async fn provision(
    service: &dyn DatasetService,
    settings: &ProvisionSettings,
    watches: &ValidationWatches,
) -> Result<ModelId, FinetuneError> {
    let content = tokio::fs::read(&settings.dataset_path)
        .await
        .map_err(|source| FinetuneError::Io {
            path: settings.dataset_path.clone(),
            source,
        })?;

    let file_name = settings
        .dataset_path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| "dataset.jsonl".to_string());

    tracing::info!(
        path = %settings.dataset_path.display(),
        bytes = content.len(),
        name = %settings.dataset_name,
        kind = settings.dataset_kind.as_str(),
        "uploading dataset"
    );

    let dataset_id = service
        .create_dataset(DatasetUpload {
            name: settings.dataset_name.clone(),
            kind: settings.dataset_kind,
            file_name,
            content,
        })
        .await?;
    tracing::info!(dataset_id = %dataset_id, "dataset created");

    match wait_for_validation(service, &dataset_id, &settings.validation, watches).await? {
        ValidationOutcome::Validated => {}
        ValidationOutcome::Failed { reason } => {
            return Err(FinetuneError::ValidationTerminalFailure { dataset_id, reason });
        }
        ValidationOutcome::TimedOut { attempts, elapsed } => {
            return Err(FinetuneError::ValidationTimedOut {
                dataset_id,
                attempts,
                elapsed,
            });
        }
    }

    let model_id = service
        .create_finetuned_model(FineTuneRequest {
            name: settings.model_name.clone(),
            dataset_id: dataset_id.clone(),
            base_type: settings.base_type,
        })
        .await?;
    tracing::info!(model_id = %model_id, dataset_id = %dataset_id, "fine-tuned model requested");

    let polled_model = &model_id;
    let outcome =
        poll_until_terminal(&settings.training, move || service.model_status(polled_model))
            .await?;
    match outcome {
        PollOutcome::Succeeded { attempts } => {
            tracing::info!(model_id = %model_id, attempts, "fine-tuned model ready");
            Ok(model_id)
        }
        PollOutcome::Failed { reason, .. } => {
            Err(FinetuneError::ModelTerminalFailure { model_id, reason })
        }
        PollOutcome::TimedOut { attempts, elapsed } => Err(FinetuneError::ModelTimedOut {
            model_id,
            attempts,
            elapsed,
        }),
    }
}
