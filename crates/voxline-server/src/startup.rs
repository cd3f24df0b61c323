//! Startup steps that run before the listener binds.

use crate::config::{Config, ConfigError};
use std::sync::Arc;
use thiserror::Error;
use tracing_subscriber::EnvFilter;
use voxline_finetune::{provision, DatasetService, FinetuneError, ValidationWatches};
use voxline_types::{ChatTarget, ModelId};

/// Errors that stop the process before it serves anything.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("fine-tuning failed: {0}")]
    Provision(#[from] FinetuneError),

    #[error("provisioning task did not complete: {0}")]
    Task(String),

    #[error("server error: {0}")]
    Io(#[from] std::io::Error),
}

/// Picks the config path from the first CLI argument, then
/// `VOXLINE_CONFIG_PATH`, then `config.toml`.
pub fn resolve_config_path() -> (String, &'static str) {
    if let Some(path) = std::env::args()
        .nth(1)
        .filter(|value| !value.trim().is_empty())
    {
        return (path, "cli-arg");
    }

    if let Ok(path) = std::env::var("VOXLINE_CONFIG_PATH") {
        if !path.trim().is_empty() {
            return (path, "env-var");
        }
    }

    ("config.toml".to_string(), "default")
}

/// Installs the global tracing subscriber.
pub fn init_tracing(config: &Config) {
    let filter =
        EnvFilter::try_new(&config.logging.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.logging.json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

/// Decides which model answers calls.
///
/// With fine-tuning enabled this uploads the dataset and waits, on its own
/// task, until the fine-tuned model is ready. The server must not accept
/// calls before this returns.
pub async fn resolve_chat_target(
    config: &Config,
    datasets: Arc<dyn DatasetService>,
) -> Result<ChatTarget, StartupError> {
    if config.finetune.enabled {
        let settings = config.finetune.provision.clone();
        tracing::info!(
            dataset = %settings.dataset_path.display(),
            model_name = %settings.model_name,
            "provisioning fine-tuned model before serving"
        );

        let task = tokio::spawn(async move {
            let watches = ValidationWatches::new();
            provision(datasets.as_ref(), &settings, &watches).await
        });
        let model = task
            .await
            .map_err(|e| StartupError::Task(e.to_string()))??;

        tracing::info!(model_id = %model, "answering calls with fine-tuned model");
        return Ok(ChatTarget::FineTuned(model));
    }

    match config.chat.model.as_deref() {
        Some(name) => {
            let model = ModelId::new(name).map_err(|e| ConfigError::Invalid {
                key: "chat.model",
                reason: e.to_string(),
            })?;
            tracing::info!(model_id = %model, "answering calls with configured model");
            Ok(ChatTarget::Named(model))
        }
        None => {
            tracing::info!("answering calls with the service default model");
            Ok(ChatTarget::ServiceDefault)
        }
    }
}

/// Waits for a SIGINT (Ctrl+C) or SIGTERM signal for graceful shutdown.
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => { tracing::info!("received SIGINT, initiating graceful shutdown"); }
        () = terminate => { tracing::info!("received SIGTERM, initiating graceful shutdown"); }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};
    use voxline_finetune::{DatasetUpload, FineTuneRequest};
    use voxline_types::{DatasetId, DatasetStatus, ModelStatus};

    /// Validates on the second poll; the model is ready at once.
    #[derive(Default)]
    struct SlowValidation {
        polls: AtomicU32,
    }

    #[async_trait]
    impl DatasetService for SlowValidation {
        async fn create_dataset(&self, _: DatasetUpload) -> Result<DatasetId, FinetuneError> {
            Ok(DatasetId::new("ds-1").unwrap())
        }

        async fn dataset_status(&self, _: &DatasetId) -> Result<DatasetStatus, FinetuneError> {
            if self.polls.fetch_add(1, Ordering::SeqCst) == 0 {
                Ok(DatasetStatus::Validating)
            } else {
                Ok(DatasetStatus::Validated)
            }
        }

        async fn create_finetuned_model(
            &self,
            _: FineTuneRequest,
        ) -> Result<ModelId, FinetuneError> {
            Ok(ModelId::new("ft-1").unwrap())
        }

        async fn model_status(&self, _: &ModelId) -> Result<ModelStatus, FinetuneError> {
            Ok(ModelStatus::Ready)
        }
    }

    #[tokio::test]
    async fn default_target_without_model_or_finetune() {
        let target = resolve_chat_target(&Config::default(), Arc::new(SlowValidation::default()))
            .await
            .unwrap();
        assert_eq!(target, ChatTarget::ServiceDefault);
    }

    #[tokio::test]
    async fn named_model_is_used() {
        let mut config = Config::default();
        config.chat.model = Some("command-r".to_string());
        let target = resolve_chat_target(&config, Arc::new(SlowValidation::default()))
            .await
            .unwrap();
        assert_eq!(target, ChatTarget::Named(ModelId::new("command-r").unwrap()));
    }

    #[tokio::test(start_paused = true)]
    async fn finetune_waits_for_ready_model() {
        let mut dataset = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut dataset, b"{\"text\":\"hi\",\"label\":\"greeting\"}\n")
            .unwrap();

        let mut config = Config::default();
        config.finetune.enabled = true;
        config.finetune.provision.dataset_path = dataset.path().to_path_buf();

        let service = Arc::new(SlowValidation::default());
        let target = resolve_chat_target(&config, service.clone()).await.unwrap();

        assert_eq!(target, ChatTarget::FineTuned(ModelId::new("ft-1").unwrap()));
        assert_eq!(service.polls.load(Ordering::SeqCst), 2);
    }
}
