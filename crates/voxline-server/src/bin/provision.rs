//! `voxline-provision`: uploads the configured dataset, waits for a
//! fine-tuned model, and optionally streams one test question to it.

use futures_util::StreamExt;
use std::sync::Arc;
use voxline_chat::{ChatBridge, ChatOptions, CohereChatClient};
use voxline_finetune::{provision, CohereDatasetClient, ValidationWatches};
use voxline_server::config::{self, Config};
use voxline_server::startup::{self, StartupError};

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let (config_path, _) = startup::resolve_config_path();

    let config = match config::load_config(Some(&config_path)).and_then(|config| {
        config.check_chat()?;
        config.check_finetune()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("voxline-provision: {}", e);
            std::process::exit(1);
        }
    };

    startup::init_tracing(&config);

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "provisioning failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let cohere = config.chat.cohere();
    let datasets = CohereDatasetClient::new(cohere.clone());
    let watches = ValidationWatches::new();

    let model = provision(&datasets, &config.finetune.provision, &watches).await?;
    tracing::info!(model_id = %model, "fine-tuned model ready");
    println!("{}", model);

    let Some(question) = config.finetune.test_question.as_deref() else {
        return Ok(());
    };

    let bridge = ChatBridge::new(Arc::new(CohereChatClient::new(cohere)));
    let options = ChatOptions::default().with_model(model);
    let mut reply = match bridge.stream(question, &options).await {
        Ok(reply) => reply,
        Err(e) => {
            tracing::warn!(error = %e, "test question could not be sent");
            return Ok(());
        }
    };

    while let Some(fragment) = reply.next().await {
        match fragment {
            Ok(fragment) => tracing::info!(text = fragment.as_str(), "received fragment"),
            Err(e) => {
                tracing::warn!(error = %e, "test reply stream failed");
                break;
            }
        }
    }
    Ok(())
}
