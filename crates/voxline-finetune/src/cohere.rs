//! Cohere dataset and fine-tuning client.

use crate::error::FinetuneError;
use crate::service::{BaseType, DatasetService, DatasetUpload, FineTuneRequest};
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use voxline_chat::{build_http_client, CohereConfig};
use voxline_types::{DatasetId, DatasetStatus, ModelId, ModelStatus};

/// Longest error body kept in a [`FinetuneError::Status`].
const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Deserialize)]
struct CreateDatasetResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct GetDatasetResponse {
    dataset: WireDataset,
}

#[derive(Debug, Deserialize)]
struct WireDataset {
    validation_status: String,
    #[serde(default)]
    validation_error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateModelBody<'a> {
    name: &'a str,
    settings: WireSettings<'a>,
}

#[derive(Debug, Serialize)]
struct WireSettings<'a> {
    base_model: WireBaseModel,
    dataset_id: &'a str,
}

#[derive(Debug, Serialize)]
struct WireBaseModel {
    base_type: BaseType,
}

#[derive(Debug, Deserialize)]
struct ModelResponse {
    finetuned_model: WireModel,
}

#[derive(Debug, Deserialize)]
struct WireModel {
    id: String,
    #[serde(default)]
    status: Option<String>,
}

fn dataset_status_from_wire(dataset: WireDataset) -> DatasetStatus {
    match dataset.validation_status.as_str() {
        "unknown" => DatasetStatus::Created,
        "queued" | "processing" => DatasetStatus::Validating,
        "validated" | "skipped" => DatasetStatus::Validated,
        "failed" => DatasetStatus::Failed {
            reason: dataset.validation_error.filter(|e| !e.is_empty()),
        },
        other => {
            tracing::warn!(
                status = other,
                "unrecognized dataset validation status, treating as in progress"
            );
            DatasetStatus::Validating
        }
    }
}

fn model_status_from_wire(status: Option<&str>) -> ModelStatus {
    match status {
        Some("STATUS_READY") => ModelStatus::Ready,
        Some(failed @ ("STATUS_FAILED" | "STATUS_DELETED")) => ModelStatus::Failed {
            reason: Some(failed.to_string()),
        },
        Some("STATUS_QUEUED") | Some("STATUS_NOT_STARTED") | None => ModelStatus::Queued,
        Some(other) => {
            tracing::debug!(status = other, "fine-tuned model still training");
            ModelStatus::Training
        }
    }
}

/// [`DatasetService`] backed by the Cohere datasets and fine-tuning APIs.
#[derive(Debug, Clone)]
pub struct CohereDatasetClient {
    config: CohereConfig,
    http: reqwest::Client,
}

impl CohereDatasetClient {
    pub fn new(config: CohereConfig) -> Self {
        let http = build_http_client(config.timeout());
        Self { config, http }
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, FinetuneError> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FinetuneError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }
        let body = response.bytes().await?;
        Ok(serde_json::from_slice(&body)?)
    }
}

#[async_trait]
impl DatasetService for CohereDatasetClient {
    async fn create_dataset(&self, upload: DatasetUpload) -> Result<DatasetId, FinetuneError> {
        let part = Part::bytes(upload.content)
            .file_name(upload.file_name)
            .mime_str("application/jsonl")?;
        let form = Form::new().part("data", part);

        let response = self
            .http
            .post(self.config.endpoint("/v1/datasets"))
            .timeout(self.config.timeout())
            .bearer_auth(&self.config.api_key)
            .query(&[("name", upload.name.as_str()), ("type", upload.kind.as_str())])
            .multipart(form)
            .send()
            .await?;

        let created: CreateDatasetResponse = Self::read_json(response).await?;
        Ok(DatasetId::new(created.id)?)
    }

    async fn dataset_status(&self, id: &DatasetId) -> Result<DatasetStatus, FinetuneError> {
        let response = self
            .http
            .get(self.config.endpoint(&format!("/v1/datasets/{}", id)))
            .timeout(self.config.timeout())
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let body: GetDatasetResponse = Self::read_json(response).await?;
        Ok(dataset_status_from_wire(body.dataset))
    }

    async fn create_finetuned_model(
        &self,
        request: FineTuneRequest,
    ) -> Result<ModelId, FinetuneError> {
        let body = CreateModelBody {
            name: &request.name,
            settings: WireSettings {
                base_model: WireBaseModel {
                    base_type: request.base_type,
                },
                dataset_id: request.dataset_id.as_str(),
            },
        };

        let response = self
            .http
            .post(self.config.endpoint("/v1/finetuning/finetuned-models"))
            .timeout(self.config.timeout())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await?;

        let created: ModelResponse = Self::read_json(response).await?;
        Ok(ModelId::new(created.finetuned_model.id)?)
    }

    async fn model_status(&self, id: &ModelId) -> Result<ModelStatus, FinetuneError> {
        let response = self
            .http
            .get(
                self.config
                    .endpoint(&format!("/v1/finetuning/finetuned-models/{}", id)),
            )
            .timeout(self.config.timeout())
            .bearer_auth(&self.config.api_key)
            .send()
            .await?;

        let body: ModelResponse = Self::read_json(response).await?;
        Ok(model_status_from_wire(body.finetuned_model.status.as_deref()))
    }
}
