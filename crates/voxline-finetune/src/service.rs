//! The seam between the provisioning workflow and the hosted provider.

use crate::error::FinetuneError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use voxline_types::{DatasetId, DatasetStatus, ModelId, ModelStatus};

/// What the uploaded examples are for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DatasetKind {
    ChatFinetuneInput,
    #[default]
    SingleLabelClassificationFinetuneInput,
    MultiLabelClassificationFinetuneInput,
    RerankerFinetuneInput,
}

impl DatasetKind {
    /// Value of the provider's `type` parameter.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ChatFinetuneInput => "chat-finetune-input",
            Self::SingleLabelClassificationFinetuneInput => {
                "single-label-classification-finetune-input"
            }
            Self::MultiLabelClassificationFinetuneInput => {
                "multi-label-classification-finetune-input"
            }
            Self::RerankerFinetuneInput => "reranker-finetune-input",
        }
    }
}

/// The base model family a fine-tune starts from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BaseType {
    #[serde(rename = "BASE_TYPE_GENERATIVE")]
    Generative,
    #[default]
    #[serde(rename = "BASE_TYPE_CLASSIFICATION")]
    Classification,
    #[serde(rename = "BASE_TYPE_RERANK")]
    Rerank,
    #[serde(rename = "BASE_TYPE_CHAT")]
    Chat,
}

/// A labeled-example file to upload.
#[derive(Debug, Clone)]
pub struct DatasetUpload {
    pub name: String,
    pub kind: DatasetKind,
    /// File name reported to the provider.
    pub file_name: String,
    pub content: Vec<u8>,
}

/// Parameters for creating a fine-tuned model from a validated dataset.
#[derive(Debug, Clone)]
pub struct FineTuneRequest {
    pub name: String,
    pub dataset_id: DatasetId,
    pub base_type: BaseType,
}

/// Hosted dataset and fine-tuning operations.
#[async_trait]
pub trait DatasetService: Send + Sync {
    /// Uploads a dataset and returns its server-assigned id.
    async fn create_dataset(&self, upload: DatasetUpload) -> Result<DatasetId, FinetuneError>;

    /// Fetches the dataset's current validation status.
    async fn dataset_status(&self, id: &DatasetId) -> Result<DatasetStatus, FinetuneError>;

    /// Requests a fine-tuned model and returns its server-assigned id.
    async fn create_finetuned_model(
        &self,
        request: FineTuneRequest,
    ) -> Result<ModelId, FinetuneError>;

    /// Fetches the model's current training status.
    async fn model_status(&self, id: &ModelId) -> Result<ModelStatus, FinetuneError>;
}
