//! Voxline server binary.
//!
//! Loads configuration, resolves which model answers calls (provisioning a
//! fine-tuned one first when enabled), then serves the voice webhooks with
//! graceful shutdown on SIGTERM/SIGINT.

use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use voxline_chat::CohereChatClient;
use voxline_finetune::CohereDatasetClient;
use voxline_server::config::{self, Config};
use voxline_server::startup::{self, StartupError};
use voxline_server::{app, AppState};

#[tokio::main]
async fn main() {
    let dotenv = dotenvy::dotenv();
    let (config_path, config_source) = startup::resolve_config_path();

    let config = match config::load_config(Some(&config_path)).and_then(|config| {
        config.check_server()?;
        Ok(config)
    }) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("voxline-server: {}", e);
            std::process::exit(1);
        }
    };

    startup::init_tracing(&config);
    tracing::info!(
        source = config_source,
        path = %config_path,
        dotenv = dotenv.is_ok(),
        "resolved startup configuration"
    );

    if let Err(e) = run(config).await {
        tracing::error!(error = %e, "voxline server failed");
        std::process::exit(1);
    }
}

async fn run(config: Config) -> Result<(), StartupError> {
    let cohere = config.chat.cohere();
    let datasets = Arc::new(CohereDatasetClient::new(cohere.clone()));
    let target = startup::resolve_chat_target(&config, datasets).await?;

    let chat = Arc::new(CohereChatClient::new(cohere));
    let state = AppState::new(&config, chat, target);
    if state.signatures.is_none() {
        tracing::warn!("webhook signature validation is disabled");
    }

    let addr = SocketAddr::new(config.server.host, config.server.port);
    tracing::info!(
        %addr,
        gather = ?state.mode.gather,
        target = state.mode.target.label(),
        streaming = state.mode.streaming,
        "starting voxline server"
    );

    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app(state))
        .with_graceful_shutdown(startup::shutdown_signal())
        .await?;

    tracing::info!("voxline server shut down");
    Ok(())
}
